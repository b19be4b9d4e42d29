/**
 * REPORT - vue complète d'une sonde à un instant donné
 *
 * RÔLE :
 * Regroupe une topologie par catégorie d'entités, la liste des sondes qui
 * ont contribué et les statistiques d'échantillonnage de la capture.
 *
 * FONCTIONNEMENT :
 * - `merge` fusionne chaque topologie nommée, les sondes (dernier `last_seen`
 *   gagnant), l'échantillonnage (sommes) et la fenêtre (la plus large)
 * - `topologies()` énumère TOUS les champs de type `Topology` : un champ
 *   oublié ici perd silencieusement ses données (voir le test d'exhaustivité)
 */
use crate::intern::intern;
use crate::persistent::PersistentMap;
use crate::serde_helpers::{deserialize_map, serialize_map};
use crate::topology::Topology;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const ENDPOINT: &str = "endpoint";
pub const ADDRESS: &str = "address";
pub const PROCESS: &str = "process";
pub const CONTAINER: &str = "container";
pub const CONTAINER_IMAGE: &str = "container_image";
pub const POD: &str = "pod";
pub const SERVICE: &str = "service";
pub const DEPLOYMENT: &str = "deployment";
pub const REPLICA_SET: &str = "replica_set";
pub const DAEMON_SET: &str = "daemon_set";
pub const HOST: &str = "host";
pub const OVERLAY: &str = "overlay";

/// Capture duty-cycle bookkeeping: `count` packets delivered out of `total`
/// seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampling {
    pub count: u64,
    pub total: u64,
}

impl Sampling {
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.total == 0
    }

    /// Fraction of traffic actually observed, 1.0 when nothing was sampled.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.count as f64 / self.total as f64
        }
    }

    pub fn merge(&self, other: &Sampling) -> Sampling {
        Sampling {
            count: self.count.saturating_add(other.count),
            total: self.total.saturating_add(other.total),
        }
    }

    /// Scales an observed counter up to the estimated real value, truncating
    /// toward zero. Unchanged when nothing was delivered.
    pub fn correct(&self, n: u64) -> u64 {
        if self.count == 0 {
            return n;
        }
        (n as f64 * (self.total as f64 / self.count as f64)) as u64
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub last_seen: DateTime<Utc>,
}

/// Probe id → [`Probe`]. Merge keeps the record seen last, left on a tie.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Probes(PersistentMap<Arc<str>, Probe>);

impl Probes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, probe: Probe) -> Self {
        let merged = match self.0.get(probe.id.as_str()) {
            Some(existing) if existing.last_seen >= probe.last_seen => return self.clone(),
            _ => probe,
        };
        Self(self.0.insert(intern(&merged.id), merged))
    }

    pub fn lookup(&self, id: &str) -> Option<&Probe> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Probe> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&self, other: &Probes) -> Probes {
        Probes(self.0.merge_with(&other.0, |_, left, right| {
            if right.last_seen > left.last_seen {
                right.clone()
            } else {
                left.clone()
            }
        }))
    }
}

impl Serialize for Probes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Probes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_map(deserializer).map(Self)
    }
}

fn is_zero(d: &Duration) -> bool {
    d.is_zero()
}

/// One probe's complete view, or the merge of many.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub endpoint: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub address: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub process: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub container: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub container_image: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub pod: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub service: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub deployment: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub replica_set: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub daemon_set: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub host: Topology,
    #[serde(default, skip_serializing_if = "Topology::is_empty")]
    pub overlay: Topology,

    #[serde(default, skip_serializing_if = "Probes::is_empty")]
    pub probes: Probes,
    #[serde(default, skip_serializing_if = "Sampling::is_empty")]
    pub sampling: Sampling,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub window: Duration,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every topology field with its name.
    pub fn topologies(&self) -> [(&'static str, &Topology); 12] {
        [
            (ENDPOINT, &self.endpoint),
            (ADDRESS, &self.address),
            (PROCESS, &self.process),
            (CONTAINER, &self.container),
            (CONTAINER_IMAGE, &self.container_image),
            (POD, &self.pod),
            (SERVICE, &self.service),
            (DEPLOYMENT, &self.deployment),
            (REPLICA_SET, &self.replica_set),
            (DAEMON_SET, &self.daemon_set),
            (HOST, &self.host),
            (OVERLAY, &self.overlay),
        ]
    }

    pub fn topologies_mut(&mut self) -> [(&'static str, &mut Topology); 12] {
        [
            (ENDPOINT, &mut self.endpoint),
            (ADDRESS, &mut self.address),
            (PROCESS, &mut self.process),
            (CONTAINER, &mut self.container),
            (CONTAINER_IMAGE, &mut self.container_image),
            (POD, &mut self.pod),
            (SERVICE, &mut self.service),
            (DEPLOYMENT, &mut self.deployment),
            (REPLICA_SET, &mut self.replica_set),
            (DAEMON_SET, &mut self.daemon_set),
            (HOST, &mut self.host),
            (OVERLAY, &mut self.overlay),
        ]
    }

    pub fn topology(&self, name: &str) -> Option<&Topology> {
        self.topologies().into_iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }

    /// New report with `topology` merged into the one called `name`. Unknown
    /// names leave the report unchanged.
    pub fn with_topology(&self, name: &str, topology: &Topology) -> Report {
        let mut out = self.clone();
        match out.topologies_mut().into_iter().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = slot.merge(topology),
            None => warn!("[report] topologie inconnue ignorée: {name}"),
        }
        out
    }

    pub fn with_probe(&self, probe: Probe) -> Report {
        Report { probes: self.probes.add(probe), ..self.clone() }
    }

    pub fn is_empty(&self) -> bool {
        self.topologies().iter().all(|(_, t)| t.is_empty())
            && self.probes.is_empty()
            && self.sampling.is_empty()
            && self.window.is_zero()
    }

    pub fn node_count(&self) -> usize {
        self.topologies().iter().map(|(_, t)| t.len()).sum()
    }

    pub fn merge(&self, other: &Report) -> Report {
        let mut out = Report {
            probes: self.probes.merge(&other.probes),
            sampling: self.sampling.merge(&other.sampling),
            window: self.window.max(other.window),
            ..Report::default()
        };
        for ((_, slot), (_, mine), (_, theirs)) in
            zip3(out.topologies_mut(), self.topologies(), other.topologies())
        {
            *slot = mine.merge(theirs);
        }
        out
    }
}

fn zip3<A, B, C>(
    a: impl IntoIterator<Item = A>,
    b: impl IntoIterator<Item = B>,
    c: impl IntoIterator<Item = C>,
) -> impl Iterator<Item = (A, B, C)> {
    a.into_iter().zip(b).zip(c).map(|((a, b), c)| (a, b, c))
}
