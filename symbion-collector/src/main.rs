/**
 * SYMBION COLLECTOR - point d'entrée
 *
 * RÔLE : assemble la sonde locale, la capture, le collecteur à fenêtre
 * glissante et le pont MQTT, puis attend Ctrl-C.
 *
 * ORDRE D'ARRÊT : sonde -> capture -> collecteur, pour que le dernier cycle
 * de la sonde trouve encore un collecteur vivant.
 */
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use symbion_collector::config::load_config;
use symbion_collector::mqtt::{spawn_mqtt_listener, MqttContext, ReportPublisher, Topics};
use symbion_collector::{
    Capture, Collector, ControlError, ControlRouter, HostReporter, HostTagger, ProbeLoop, ProbeSettings, Reporter,
    Tagger,
};
use symbion_report::ControlRequest;
use tokio::time::interval;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("symbion_collector=info")),
        )
        .init();

    let cfg = load_config().await;
    cfg.validate().context("configuration rejetée")?;

    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    let probe_id = cfg.probe.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!("[collector] sonde {probe_id} sur {hostname}");

    let collector = Collector::spawn(cfg.window());
    let (capture, capture_tx) = Capture::spawn(hostname.clone(), cfg.capture.queue_capacity, cfg.capture.enabled);
    let capture = Arc::new(capture);

    let router = Arc::new(control_router(&capture));
    let ctx = MqttContext {
        collector: collector.clone(),
        capture: Some(capture_tx),
        router,
        topics: Topics::from(&cfg.mqtt),
    };
    let (client, listener) = spawn_mqtt_listener(&cfg.mqtt, ctx);

    let settings = ProbeSettings { id: probe_id, hostname: hostname.clone(), interval: cfg.probe_interval() };
    let reporters: Vec<Arc<dyn Reporter>> = vec![Arc::new(HostReporter::new(hostname.as_str())), capture.clone()];
    let taggers: Vec<Arc<dyn Tagger>> = vec![Arc::new(HostTagger::new(&hostname))];
    let probe = if cfg.probe.publish {
        let publisher = ReportPublisher::new(client.clone(), cfg.mqtt.reports_topic.clone());
        ProbeLoop::spawn(settings, reporters, taggers, publisher)
    } else {
        ProbeLoop::spawn(settings, reporters, taggers, collector.clone())
    };

    let mut summary = interval(cfg.window());
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("écoute de Ctrl-C impossible")?;
                break;
            }
            _ = summary.tick() => {
                let report = collector.report().await.context("collecteur arrêté")?;
                let counts = capture.counts();
                info!(
                    "[collector] {} nœud(s), {} sonde(s), capture {}/{} paquets",
                    report.node_count(),
                    report.probes.len(),
                    counts.delivered,
                    counts.seen
                );
            }
        }
    }

    info!("[collector] arrêt demandé");
    probe.stop().await;
    capture.stop();
    if let Err(e) = client.disconnect().await {
        tracing::debug!("[mqtt] déconnexion: {e:?}");
    }
    listener.abort();
    collector.stop().await.context("arrêt du collecteur")?;
    Ok(())
}

fn control_router(capture: &Arc<Capture>) -> ControlRouter {
    let mut router = ControlRouter::new();
    for (name, enabled) in [("capture_enable", true), ("capture_disable", false)] {
        let capture = capture.clone();
        router.register(name, move |_: &ControlRequest| -> Result<serde_json::Value, ControlError> {
            capture.set_enabled(enabled);
            Ok(json!({ "enabled": enabled }))
        });
    }
    let capture = capture.clone();
    router.register("capture_stats", move |_: &ControlRequest| -> Result<serde_json::Value, ControlError> {
        let c = capture.counts();
        Ok(json!({ "enabled": capture.is_enabled(), "seen": c.seen, "delivered": c.delivered, "dropped": c.dropped }))
    });
    router
}
