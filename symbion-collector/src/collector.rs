/**
 * COLLECTOR - fenêtre glissante de rapports
 *
 * RÔLE :
 * Reçoit les rapports des sondes, garde ceux arrivés depuis moins de
 * `window` et répond aux demandes d'instantané par leur fusion.
 *
 * FONCTIONNEMENT :
 * - Une seule tâche possède la liste (rapport, heure d'arrivée) : aucun verrou
 * - Les messages de la boîte sont traités strictement un par un
 * - Ingest : ajout puis purge des entrées trop vieilles
 * - Snapshot : purge puis fusion de tout ce qui reste dans un rapport neuf
 * - Stop : acquittement puis fin de tâche ; tout envoi ultérieur échoue
 *   avec `CollectorError::Stopped`
 */
use crate::error::CollectorError;
use std::collections::VecDeque;
use std::time::Duration;
use symbion_report::Report;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

const INBOX_CAPACITY: usize = 64;

enum Msg {
    Ingest(Report, Instant),
    Snapshot(oneshot::Sender<Report>),
    Stop(oneshot::Sender<()>),
}

/// Handle on the collector task. Clones share the same task.
#[derive(Clone)]
pub struct Collector {
    tx: mpsc::Sender<Msg>,
    window: Duration,
}

impl Collector {
    /// Spawns the collector task on the current runtime.
    pub fn spawn(window: Duration) -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        tokio::spawn(run(rx, window));
        info!("[collector] démarré, fenêtre {window:?}");
        Self { tx, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn add(&self, report: Report) -> Result<(), CollectorError> {
        self.tx
            .send(Msg::Ingest(report, Instant::now()))
            .await
            .map_err(|_| CollectorError::Stopped)
    }

    /// Merge of every report still inside the window.
    pub async fn report(&self) -> Result<Report, CollectorError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Msg::Snapshot(reply)).await.map_err(|_| CollectorError::Stopped)?;
        rx.await.map_err(|_| CollectorError::Stopped)
    }

    /// Returns once the task has acknowledged; nothing sent afterwards is
    /// processed.
    pub async fn stop(&self) -> Result<(), CollectorError> {
        let (ack, rx) = oneshot::channel();
        self.tx.send(Msg::Stop(ack)).await.map_err(|_| CollectorError::Stopped)?;
        rx.await.map_err(|_| CollectorError::Stopped)
    }
}

struct Window {
    entries: VecDeque<(Report, Instant)>,
    max_age: Duration,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|(_, arrived)| now.saturating_duration_since(*arrived) <= self.max_age);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!("[collector] {pruned} rapport(s) expiré(s)");
        }
    }

    fn merged(&self) -> Report {
        let base = Report { window: self.max_age, ..Report::new() };
        self.entries.iter().fold(base, |acc, (r, _)| acc.merge(r))
    }
}

async fn run(mut rx: mpsc::Receiver<Msg>, max_age: Duration) {
    let mut window = Window { entries: VecDeque::new(), max_age };
    while let Some(msg) = rx.recv().await {
        match msg {
            Msg::Ingest(report, arrived) => {
                window.entries.push_back((report, arrived));
                window.prune(Instant::now());
            }
            Msg::Snapshot(reply) => {
                window.prune(Instant::now());
                let _ = reply.send(window.merged());
            }
            Msg::Stop(ack) => {
                info!("[collector] arrêt ({} rapport(s) en fenêtre)", window.entries.len());
                rx.close();
                let _ = ack.send(());
                break;
            }
        }
    }
}
