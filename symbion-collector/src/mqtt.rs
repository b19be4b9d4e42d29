/**
 * MQTT - pont entre le broker et le collecteur
 *
 * RÔLE :
 * Trois topics entrants, un seul point d'aiguillage (`dispatch`) :
 * - rapports des sondes (binaire versionné) -> collecteur
 * - paquets échantillonnés (JSON) -> file de capture
 * - requêtes de contrôle (JSON) -> routeur, réponse sur `<topic>/reply`
 *
 * La boucle `spawn_mqtt_listener` ne fait que lire le broker et appliquer
 * `dispatch` ; toute la logique reste testable sans broker.
 */
use crate::capture::{CaptureSender, PacketSample};
use crate::collector::Collector;
use crate::config::MqttConf;
use crate::controls::ControlRouter;
use crate::probe::ProbeSink;
use anyhow::Result;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use symbion_report::codec;
use symbion_report::{ControlRequest, Report};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Outgoing side of the broker.
pub trait ReportSink: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

impl ReportSink for AsyncClient {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        AsyncClient::publish(self, topic, QoS::AtLeastOnce, false, payload).await?;
        Ok(())
    }
}

/// Encodes `report` and publishes it on `topic`.
pub async fn publish_report<S: ReportSink>(sink: &S, topic: &str, report: &Report) -> Result<()> {
    let payload = codec::encode(report)?;
    debug!("[mqtt] rapport publié sur {topic} ({} octets)", payload.len());
    sink.publish(topic, payload).await
}

/// Probe sink sending every cycle's report to the broker.
pub struct ReportPublisher<S> {
    sink: S,
    topic: String,
}

impl<S: ReportSink> ReportPublisher<S> {
    pub fn new(sink: S, topic: impl Into<String>) -> Self {
        Self { sink, topic: topic.into() }
    }
}

impl<S: ReportSink + 'static> ProbeSink for ReportPublisher<S> {
    async fn submit(&self, report: Report) -> Result<()> {
        publish_report(&self.sink, &self.topic, &report).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub reports: String,
    pub packets: String,
    pub controls: String,
}

impl Topics {
    pub fn reply_topic(&self) -> String {
        format!("{}/reply", self.controls)
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.reports, &self.packets, &self.controls]
    }
}

impl From<&MqttConf> for Topics {
    fn from(conf: &MqttConf) -> Self {
        Self {
            reports: conf.reports_topic.clone(),
            packets: conf.packets_topic.clone(),
            controls: conf.controls_topic.clone(),
        }
    }
}

/// Everything an incoming message can be routed to.
pub struct MqttContext {
    pub collector: Collector,
    pub capture: Option<CaptureSender>,
    pub router: Arc<ControlRouter>,
    pub topics: Topics,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PacketBatch {
    One(PacketSample),
    Many(Vec<PacketSample>),
}

/// Routes one incoming message. Returns the reply to publish, if any.
/// Malformed payloads are logged and dropped.
pub async fn dispatch(ctx: &MqttContext, topic: &str, payload: &[u8]) -> Option<(String, Vec<u8>)> {
    if topic == ctx.topics.reports {
        match codec::decode::<Report>(payload) {
            Ok(report) => {
                if let Err(e) = ctx.collector.add(report).await {
                    warn!("[mqtt] rapport ignoré: {e}");
                }
            }
            Err(e) => warn!("[mqtt] rapport illisible sur {topic}: {e}"),
        }
        None
    } else if topic == ctx.topics.packets {
        let Some(capture) = &ctx.capture else {
            debug!("[mqtt] paquets reçus sans capture active");
            return None;
        };
        match serde_json::from_slice::<PacketBatch>(payload) {
            Ok(PacketBatch::One(sample)) => {
                capture.submit(sample);
            }
            Ok(PacketBatch::Many(samples)) => {
                for sample in samples {
                    capture.submit(sample);
                }
            }
            Err(e) => warn!("[mqtt] paquet JSON invalide: {e}"),
        }
        None
    } else if topic == ctx.topics.controls {
        match serde_json::from_slice::<ControlRequest>(payload) {
            Ok(req) => {
                let resp = ctx.router.handle(&req);
                match serde_json::to_vec(&resp) {
                    Ok(bytes) => Some((ctx.topics.reply_topic(), bytes)),
                    Err(e) => {
                        error!("[mqtt] réponse de contrôle non sérialisable: {e}");
                        None
                    }
                }
            }
            Err(e) => {
                warn!("[mqtt] requête de contrôle invalide: {e}");
                None
            }
        }
    } else {
        debug!("[mqtt] topic ignoré: {topic}");
        None
    }
}

/// Connects to the broker and feeds every incoming message to [`dispatch`].
/// Subscriptions are renewed on each (re)connection.
pub fn spawn_mqtt_listener(conf: &MqttConf, ctx: MqttContext) -> (AsyncClient, JoinHandle<()>) {
    let mut opts = MqttOptions::new(conf.client_id.clone(), conf.host.clone(), conf.port);
    opts.set_keep_alive(Duration::from_secs(15));
    opts.set_max_packet_size(codec::MAX_FRAME_LEN, codec::MAX_FRAME_LEN);
    let (client, mut eventloop) = AsyncClient::new(opts, 64);
    info!("[mqtt] connexion à {}:{}", conf.host, conf.port);

    let listener = client.clone();
    let handle = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    for topic in ctx.topics.all() {
                        if let Err(e) = listener.try_subscribe(topic, QoS::AtLeastOnce) {
                            error!("[mqtt] abonnement à {topic} impossible: {e:?}");
                        }
                    }
                    info!("[mqtt] connecté, abonné à {:?}", ctx.topics.all());
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    if let Some((reply_topic, bytes)) = dispatch(&ctx, &p.topic, &p.payload).await {
                        // try_publish: the eventloop is polled by this very task
                        if let Err(e) = listener.try_publish(reply_topic, QoS::AtLeastOnce, false, bytes) {
                            warn!("[mqtt] réponse de contrôle perdue: {e:?}");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[mqtt] erreur: {e:?}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
    (client, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Capture;
    use crate::config::MqttConf;
    use serde_json::json;
    use symbion_report::{ControlResponse, Node, Topology};

    fn context(capture: Option<CaptureSender>) -> MqttContext {
        let mut router = ControlRouter::new();
        router.register("ping", |_: &ControlRequest| -> Result<serde_json::Value, crate::error::ControlError> {
            Ok(json!("pong"))
        });
        MqttContext {
            collector: Collector::spawn(Duration::from_secs(15)),
            capture,
            router: Arc::new(router),
            topics: Topics::from(&MqttConf::default()),
        }
    }

    #[tokio::test]
    async fn test_report_is_collected() {
        let ctx = context(None);
        let report = Report::new().with_topology("host", &Topology::new().with_node(Node::new("h;<host>")));
        let payload = codec::encode(&report).unwrap();
        assert!(dispatch(&ctx, "symbion/reports@v1", &payload).await.is_none());
        assert!(ctx.collector.report().await.unwrap().host.node("h;<host>").is_some());
    }

    #[tokio::test]
    async fn test_garbage_report_is_dropped() {
        let ctx = context(None);
        assert!(dispatch(&ctx, "symbion/reports@v1", b"\x09garbage").await.is_none());
        let snapshot = ctx.collector.report().await.unwrap();
        assert_eq!(snapshot.node_count(), 0);
        assert!(snapshot.probes.is_empty());
    }

    #[tokio::test]
    async fn test_control_gets_reply() {
        let ctx = context(None);
        let req = json!({ "probe_id": "p", "node_id": "n", "control": "ping" });
        let (topic, bytes) = dispatch(&ctx, "symbion/controls@v1", req.to_string().as_bytes()).await.unwrap();
        assert_eq!(topic, "symbion/controls@v1/reply");
        let resp: ControlResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(resp, ControlResponse::ok(json!("pong")));
    }

    #[tokio::test]
    async fn test_packets_reach_capture() {
        let (capture, tx) = Capture::spawn("box", 8, true);
        let ctx = context(Some(tx));
        let batch = json!([
            { "src_addr": "10.0.0.1", "src_port": 1, "dst_addr": "10.0.0.2", "dst_port": 2, "bytes": 10 },
            { "src_addr": "10.0.0.1", "src_port": 1, "dst_addr": "10.0.0.2", "dst_port": 2, "bytes": 20 }
        ]);
        dispatch(&ctx, "symbion/packets@v1", batch.to_string().as_bytes()).await;
        assert_eq!(capture.counts().seen, 2);

        let single = json!({ "src_addr": "a", "src_port": 1, "dst_addr": "b", "dst_port": 2, "bytes": 1 });
        dispatch(&ctx, "symbion/packets@v1", single.to_string().as_bytes()).await;
        assert_eq!(capture.counts().seen, 3);
    }
}
