/**
 * CAPTURE - échantillonnage des paquets vers la topologie endpoint
 *
 * RÔLE :
 * Relie un producteur de paquets (sniffer, flux MQTT...) au rapport de la
 * sonde sans jamais le bloquer.
 *
 * FONCTIONNEMENT :
 * - `CaptureSender::submit` compte chaque paquet vu, puis tente un envoi
 *   non bloquant dans une file bornée ; file pleine ou capture coupée =
 *   paquet perdu mais compté
 * - Une tâche consommatrice replie les paquets livrés en arêtes entre
 *   endpoints (egress côté source, ingress côté destination) et les compte
 *   comme livrés sous le même verrou
 * - `Capture::report()` vide l'accumulateur et corrige chaque compteur par
 *   `Sampling { count: livrés, total: livrés + perdus }` ; tant que rien
 *   n'est livré, les pertes restent en attente pour l'intervalle suivant
 */
use crate::producer::Reporter;
use crate::state::{new_state, Shared};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use symbion_report::ids::make_endpoint_node_id;
use symbion_report::intern::{ADDR, PORT};
use symbion_report::{EdgeMetadata, Node, Report, Sampling, Topology};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One observed packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketSample {
    pub src_addr: String,
    pub src_port: u16,
    pub dst_addr: String,
    pub dst_port: u16,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    enabled: AtomicBool,
    seen: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
    /// Drops not yet attributed to a report.
    unreported_drops: AtomicU64,
}

/// Totals since the capture started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCounts {
    pub seen: u64,
    pub delivered: u64,
    pub dropped: u64,
}

impl CaptureStats {
    pub fn counts(&self) -> CaptureCounts {
        CaptureCounts {
            seen: self.seen.load(Ordering::Relaxed),
            delivered: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn drop_one(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.unreported_drops.fetch_add(1, Ordering::Relaxed);
    }
}

/// Producer side. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct CaptureSender {
    tx: mpsc::Sender<PacketSample>,
    stats: Arc<CaptureStats>,
}

impl CaptureSender {
    /// `true` when the sample was queued. Every call counts as seen.
    pub fn submit(&self, sample: PacketSample) -> bool {
        self.stats.seen.fetch_add(1, Ordering::Relaxed);
        if !self.stats.enabled.load(Ordering::Relaxed) {
            self.stats.drop_one();
            return false;
        }
        match self.tx.try_send(sample) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.stats.drop_one();
                false
            }
        }
    }
}

type EdgeKey = (String, String);

#[derive(Default)]
struct Accumulator {
    edges: BTreeMap<EdgeKey, EdgeMetadata>,
    /// Samples folded into `edges`.
    delivered: u64,
}

impl Accumulator {
    fn fold(&mut self, hostname: &str, sample: &PacketSample) {
        let src = make_endpoint_node_id(hostname, &sample.src_addr, sample.src_port);
        let dst = make_endpoint_node_id("", &sample.dst_addr, sample.dst_port);
        let egress = EdgeMetadata { egress_packet_count: Some(1), egress_byte_count: Some(sample.bytes), ..Default::default() };
        self.add((src.clone(), dst.clone()), egress);
        self.add((dst, src), egress.reversed());
        self.delivered += 1;
    }

    fn add(&mut self, key: EdgeKey, md: EdgeMetadata) {
        let slot = self.edges.entry(key).or_default();
        *slot = slot.merge(&md);
    }
}

pub struct Capture {
    hostname: String,
    stats: Arc<CaptureStats>,
    acc: Shared<Accumulator>,
    task: JoinHandle<()>,
}

impl Capture {
    /// Starts the consumer task. Samples beyond `capacity` queued ones are
    /// dropped.
    pub fn spawn(hostname: impl Into<String>, capacity: usize, enabled: bool) -> (Capture, CaptureSender) {
        let hostname = hostname.into();
        let (tx, mut rx) = mpsc::channel::<PacketSample>(capacity.max(1));
        let stats = Arc::new(CaptureStats::default());
        stats.enabled.store(enabled, Ordering::Relaxed);
        let acc = new_state(Accumulator::default());

        let task = {
            let acc = acc.clone();
            let hostname = hostname.clone();
            tokio::spawn(async move {
                while let Some(sample) = rx.recv().await {
                    acc.lock().fold(&hostname, &sample);
                }
                debug!("[capture] file fermée");
            })
        };
        info!("[capture] démarrée (file {capacity}, active: {enabled})");

        let sender = CaptureSender { tx, stats: stats.clone() };
        (Capture { hostname, stats, acc, task }, sender)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.stats.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.stats.enabled.load(Ordering::Relaxed)
    }

    pub fn counts(&self) -> CaptureCounts {
        self.stats.counts()
    }

    /// Endpoint topology built since the previous call, counters corrected
    /// for the dropped share of traffic.
    pub fn take_report(&self) -> Report {
        let (edges, sampling) = {
            let mut acc = self.acc.lock();
            let delivered = std::mem::take(&mut acc.delivered);
            // drops wait for the interval that carries delivered samples
            let dropped = if delivered > 0 { self.stats.unreported_drops.swap(0, Ordering::Relaxed) } else { 0 };
            (std::mem::take(&mut acc.edges), Sampling { count: delivered, total: delivered + dropped })
        };
        if sampling.total > sampling.count {
            debug!("[capture] {} paquet(s) perdu(s) sur {}", sampling.total - sampling.count, sampling.total);
        }

        let topology: Topology = edges
            .into_iter()
            .map(|((src, dst), md)| endpoint_node(&src).with_edge(&dst, md.scaled(&sampling)))
            .collect();
        Report { endpoint: topology, sampling, ..Report::new() }
    }

    /// Aborts the consumer task. Later samples are counted as dropped.
    pub fn stop(&self) {
        self.task.abort();
        info!("[capture] {} arrêtée", self.hostname);
    }
}

fn endpoint_node(id: &str) -> Node {
    let node = Node::new(id).with_topology("endpoint");
    match symbion_report::ids::parse_endpoint_node_id(id) {
        Some((_, addr, port)) => {
            let now = chrono::Utc::now();
            node.with_latest(ADDR, now, addr).with_latest(PORT, now, port.to_string())
        }
        None => node,
    }
}

impl Reporter for Capture {
    fn name(&self) -> &str {
        "capture"
    }

    fn report(&self) -> Result<Report> {
        Ok(self.take_report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bytes: u64) -> PacketSample {
        PacketSample { src_addr: "10.0.0.1".into(), src_port: 4242, dst_addr: "8.8.8.8".into(), dst_port: 53, bytes }
    }

    async fn drain(capture: &Capture, expected: u64) {
        for _ in 0..100 {
            let folded: u64 = capture
                .acc
                .lock()
                .edges
                .values()
                .filter_map(|m| m.egress_packet_count)
                .sum();
            if folded >= expected {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_samples_become_edges() {
        let (capture, tx) = Capture::spawn("box", 16, true);
        assert!(tx.submit(sample(100)));
        assert!(tx.submit(sample(50)));
        drain(&capture, 2).await;

        let report = capture.take_report();
        let src = "box;10.0.0.1;4242";
        let dst = ";8.8.8.8;53";
        let out = report.endpoint.edge_metadata(src, dst).unwrap();
        assert_eq!(out.egress_packet_count, Some(2));
        assert_eq!(out.egress_byte_count, Some(150));
        let back = report.endpoint.edge_metadata(dst, src).unwrap();
        assert_eq!(back.ingress_byte_count, Some(150));
        assert_eq!(report.sampling, Sampling { count: 2, total: 2 });

        assert!(capture.take_report().endpoint.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_counts() {
        let (capture, tx) = Capture::spawn("box", 1, true);
        // The consumer cannot run before the first yield: the queue holds one.
        let accepted = (0..4).filter(|_| tx.submit(sample(10))).count();
        assert_eq!(accepted, 1);
        assert_eq!(capture.counts(), CaptureCounts { seen: 4, delivered: 1, dropped: 3 });
        drain(&capture, 1).await;

        let report = capture.take_report();
        assert_eq!(report.sampling, Sampling { count: 1, total: 4 });
        let out = report.endpoint.edge_metadata("box;10.0.0.1;4242", ";8.8.8.8;53").unwrap();
        assert_eq!(out.egress_packet_count, Some(4));
        assert_eq!(out.egress_byte_count, Some(40));
    }

    #[tokio::test]
    async fn test_report_taken_while_queue_still_full() {
        let (capture, tx) = Capture::spawn("box", 1, true);
        let accepted = (0..4).filter(|_| tx.submit(sample(10))).count();
        assert_eq!(accepted, 1);

        // nothing folded yet: no edges, and the drops are kept for later
        let early = capture.take_report();
        assert!(early.endpoint.is_empty());
        assert!(early.sampling.is_empty());

        drain(&capture, 1).await;
        let late = capture.take_report();
        assert_eq!(late.sampling, Sampling { count: 1, total: 4 });

        let merged = early.merge(&late);
        assert_eq!(merged.sampling, Sampling { count: 1, total: 4 });
        let out = merged.endpoint.edge_metadata("box;10.0.0.1;4242", ";8.8.8.8;53").unwrap();
        assert_eq!(out.egress_packet_count, Some(4));
        assert_eq!(out.egress_byte_count, Some(40));
    }

    #[tokio::test]
    async fn test_disabled_capture_counts_but_drops() {
        let (capture, tx) = Capture::spawn("box", 16, false);
        assert!(!tx.submit(sample(10)));
        assert_eq!(capture.counts().seen, 1);
        capture.set_enabled(true);
        assert!(capture.is_enabled());
        assert!(tx.submit(sample(10)));
    }
}
