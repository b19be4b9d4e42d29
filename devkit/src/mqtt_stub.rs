/*!
Mock MQTT Client pour tests sans broker

Enregistre toutes les publications et permet de simuler la réception.
Implémente `ReportSink`, donc se branche partout où le collecteur publie.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::sync::{Arc, Mutex};
use symbion_collector::mqtt::ReportSink;
use symbion_report::{codec, Report};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone, Default)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel sur lequel arrivent les messages simulés
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Simule la publication d'un message (compatible avec AsyncClient)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage { topic: topic.into(), payload: payload.into(), qos, retain };
        log::info!("[mock] publié sur {}: {} octets", message.topic, message.payload.len());
        self.published_messages.lock().unwrap().push(message);
        Ok(())
    }

    /// Simule la réception d'un message (pour tests)
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage { topic: topic.into(), payload: payload.into(), qos: QoS::AtLeastOnce, retain: false };
        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender.send(message.clone()).map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }
        log::info!("[mock] reçu (simulé) sur {}", message.topic);
        Ok(())
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Parse le dernier message d'un topic en JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match self.find_messages_by_topic(topic).last() {
            Some(msg) => Ok(Some(serde_json::from_slice(&msg.payload)?)),
            None => Ok(None),
        }
    }

    /// Décode le dernier rapport binaire publié sur un topic
    pub fn last_report(&self, topic: &str) -> Result<Option<Report>> {
        match self.find_messages_by_topic(topic).last() {
            Some(msg) => Ok(Some(codec::decode(&msg.payload)?)),
            None => Ok(None),
        }
    }
}

impl ReportSink for MockMqttClient {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        MockMqttClient::publish(self, topic, QoS::AtLeastOnce, false, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::client_server_report;
    use symbion_collector::mqtt::publish_report;

    #[tokio::test]
    async fn test_mock_client_publish() {
        let client = MockMqttClient::new();
        client.publish("test/topic", QoS::AtLeastOnce, false, b"test message".to_vec()).await.unwrap();
        let messages = client.get_published_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, b"test message");
    }

    #[tokio::test]
    async fn test_simulated_incoming_reaches_receiver() {
        let client = MockMqttClient::new();
        let mut rx = client.setup_receiver();
        client.simulate_incoming("in/topic", b"{}".to_vec()).await.unwrap();
        assert_eq!(rx.recv().await.map(|m| m.topic), Some("in/topic".to_string()));
    }

    #[tokio::test]
    async fn test_published_report_decodes() {
        let client = MockMqttClient::new();
        let report = client_server_report();
        publish_report(&client, "symbion/reports@v1", &report).await.unwrap();
        assert_eq!(client.last_report("symbion/reports@v1").unwrap(), Some(report));
        assert!(client.last_report("other").unwrap().is_none());
    }
}
