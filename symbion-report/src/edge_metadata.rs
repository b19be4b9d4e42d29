use crate::intern::intern;
use crate::persistent::PersistentMap;
use crate::report::Sampling;
use crate::serde_helpers::{deserialize_map, serialize_map};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Directional traffic statistics between two nodes.
///
/// Every counter is optional: `None` means "never observed" and stays absent
/// on the wire, `Some(0)` means "observed as zero".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_packet_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_packet_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_byte_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_byte_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_conn_count_tcp: Option<u64>,
}

fn sum(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (a, None) => a,
        (a, Some(b)) => Some(a.unwrap_or(0).saturating_add(b)),
    }
}

fn max(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (a, None) => a,
        (None, b) => b,
        (Some(a), Some(b)) => Some(a.max(b)),
    }
}

impl EdgeMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Two observations of the same edge at different times.
    ///
    /// Packet and byte counters add up; the connection count keeps the larger
    /// value since both observations describe the same connections.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            egress_packet_count: sum(self.egress_packet_count, other.egress_packet_count),
            ingress_packet_count: sum(self.ingress_packet_count, other.ingress_packet_count),
            egress_byte_count: sum(self.egress_byte_count, other.egress_byte_count),
            ingress_byte_count: sum(self.ingress_byte_count, other.ingress_byte_count),
            max_conn_count_tcp: max(self.max_conn_count_tcp, other.max_conn_count_tcp),
        }
    }

    /// Distinct edges collapsed onto one rendered edge: everything adds up.
    pub fn flatten(&self, other: &Self) -> Self {
        Self {
            max_conn_count_tcp: sum(self.max_conn_count_tcp, other.max_conn_count_tcp),
            ..self.merge(other)
        }
    }

    /// Same edge seen from the other end.
    pub fn reversed(&self) -> Self {
        Self {
            egress_packet_count: self.ingress_packet_count,
            ingress_packet_count: self.egress_packet_count,
            egress_byte_count: self.ingress_byte_count,
            ingress_byte_count: self.egress_byte_count,
            max_conn_count_tcp: self.max_conn_count_tcp,
        }
    }

    /// Counters corrected for a sampled capture. The connection count is a
    /// gauge and is left alone.
    pub fn scaled(&self, sampling: &Sampling) -> Self {
        Self {
            egress_packet_count: self.egress_packet_count.map(|n| sampling.correct(n)),
            ingress_packet_count: self.ingress_packet_count.map(|n| sampling.correct(n)),
            egress_byte_count: self.egress_byte_count.map(|n| sampling.correct(n)),
            ingress_byte_count: self.ingress_byte_count.map(|n| sampling.correct(n)),
            max_conn_count_tcp: self.max_conn_count_tcp,
        }
    }
}

/// Remote node id → [`EdgeMetadata`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeMetadatas(PersistentMap<Arc<str>, EdgeMetadata>);

impl EdgeMetadatas {
    pub fn new() -> Self {
        Self::default()
    }

    /// New map with `md` merged into the entry for `dst`.
    pub fn add(&self, dst: &str, md: EdgeMetadata) -> Self {
        let merged = match self.0.get(dst) {
            Some(existing) => existing.merge(&md),
            None => md,
        };
        Self(self.0.insert(intern(dst), merged))
    }

    pub fn lookup(&self, dst: &str) -> Option<&EdgeMetadata> {
        self.0.get(dst)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EdgeMetadata)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self(self.0.merge_with(&other.0, |_, a, b| a.merge(b)))
    }

    /// Every entry combined into one, as for a collapsed rendered edge.
    pub fn flatten(&self) -> EdgeMetadata {
        self.0.values().fold(EdgeMetadata::default(), |acc, md| acc.flatten(md))
    }
}

impl Serialize for EdgeMetadatas {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for EdgeMetadatas {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_map(deserializer).map(Self)
    }
}
