//! Periodic probe loop: gather, tag, stamp, hand over.

use crate::collector::Collector;
use crate::producer::{apply_taggers, collect_reports, Reporter, Tagger};
use anyhow::Result;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use symbion_report::{Probe, Report};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Where a probe cycle's report goes.
pub trait ProbeSink: Send + Sync + 'static {
    fn submit(&self, report: Report) -> impl Future<Output = Result<()>> + Send;
}

impl ProbeSink for Collector {
    async fn submit(&self, report: Report) -> Result<()> {
        Ok(self.add(report).await?)
    }
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub id: String,
    pub hostname: String,
    pub interval: Duration,
}

pub struct ProbeLoop {
    stop_tx: oneshot::Sender<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ProbeLoop {
    pub fn spawn<S: ProbeSink>(
        settings: ProbeSettings,
        reporters: Vec<Arc<dyn Reporter>>,
        taggers: Vec<Arc<dyn Tagger>>,
        sink: S,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<oneshot::Sender<()>>();
        let handle = tokio::spawn(async move {
            info!("[probe] {} démarrée, période {:?}", settings.id, settings.interval);
            let mut ticker = interval(settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    ack = &mut stop_rx => {
                        info!("[probe] {} arrêtée", settings.id);
                        if let Ok(ack) = ack {
                            let _ = ack.send(());
                        }
                        return;
                    }
                    _ = ticker.tick() => {
                        let report = run_cycle(&settings, &reporters, &taggers);
                        if let Err(e) = sink.submit(report).await {
                            warn!("[probe] envoi du rapport impossible: {e:#}");
                        }
                    }
                }
            }
        });
        Self { stop_tx, handle }
    }

    /// Waits for the loop to acknowledge, then for the task to end.
    pub async fn stop(self) {
        let (ack, ack_rx) = oneshot::channel();
        if self.stop_tx.send(ack).is_ok() {
            let _ = ack_rx.await;
        }
        let _ = self.handle.await;
    }
}

/// One probe cycle, without the hand-over.
pub fn run_cycle(settings: &ProbeSettings, reporters: &[Arc<dyn Reporter>], taggers: &[Arc<dyn Tagger>]) -> Report {
    let report = apply_taggers(collect_reports(reporters), taggers);
    report.with_probe(Probe {
        id: settings.id.clone(),
        hostname: settings.hostname.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        last_seen: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::HostReporter;

    fn settings() -> ProbeSettings {
        ProbeSettings { id: "probe-1".into(), hostname: "box".into(), interval: Duration::from_secs(3) }
    }

    #[test]
    fn test_cycle_stamps_probe() {
        let reporters: Vec<Arc<dyn Reporter>> = vec![Arc::new(HostReporter::new("box"))];
        let report = run_cycle(&settings(), &reporters, &[]);
        let probe = report.probes.lookup("probe-1").unwrap();
        assert_eq!(probe.hostname, "box");
        assert_eq!(report.host.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_feeds_collector_until_stopped() {
        let collector = Collector::spawn(Duration::from_secs(60));
        let reporters: Vec<Arc<dyn Reporter>> = vec![Arc::new(HostReporter::new("box"))];
        let probe = ProbeLoop::spawn(settings(), reporters, Vec::new(), collector.clone());

        tokio::time::sleep(Duration::from_secs(7)).await;
        probe.stop().await;

        let merged = collector.report().await.unwrap();
        assert!(merged.host.node("box;<host>").is_some());
        assert!(merged.probes.lookup("probe-1").is_some());
    }
}
