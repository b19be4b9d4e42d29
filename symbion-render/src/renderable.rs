use serde::Serialize;
use std::collections::BTreeMap;
use symbion_report::{EdgeMetadata, IdList, NodeSet};

pub const KEY_INGRESS_BYTES: &str = "ingress_bytes";
pub const KEY_EGRESS_BYTES: &str = "egress_bytes";
pub const KEY_INGRESS_PACKETS: &str = "ingress_packets";
pub const KEY_EGRESS_PACKETS: &str = "egress_packets";
pub const KEY_MAX_CONN_COUNT_TCP: &str = "max_conn_count_tcp";

/// Numeric statistics folded onto a rendered node.
///
/// Byte and packet totals add up. The TCP connection count keeps the largest
/// value seen: several edges open at once is better approximated by the
/// biggest one than by a sum of maxima.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregateMetadata(BTreeMap<&'static str, u64>);

impl AggregateMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn merge(&mut self, other: &AggregateMetadata) {
        for (key, value) in other.iter() {
            let slot = self.0.entry(key).or_insert(0);
            *slot = if key == KEY_MAX_CONN_COUNT_TCP { (*slot).max(value) } else { slot.saturating_add(value) };
        }
    }
}

impl From<&EdgeMetadata> for AggregateMetadata {
    fn from(md: &EdgeMetadata) -> Self {
        let pairs = [
            (KEY_INGRESS_BYTES, md.ingress_byte_count),
            (KEY_EGRESS_BYTES, md.egress_byte_count),
            (KEY_INGRESS_PACKETS, md.ingress_packet_count),
            (KEY_EGRESS_PACKETS, md.egress_packet_count),
            (KEY_MAX_CONN_COUNT_TCP, md.max_conn_count_tcp),
        ];
        Self(pairs.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect())
    }
}

/// What a map function makes of one raw node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappedNode {
    pub id: String,
    pub label_major: String,
    pub label_minor: String,
    pub rank: String,
}

/// One node of the display graph, possibly standing for many raw nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RenderableNode {
    pub id: String,
    pub label_major: String,
    pub label_minor: String,
    pub rank: String,
    pub pseudo: bool,
    pub adjacency: IdList,
    pub origins: IdList,
    pub metadata: AggregateMetadata,
    #[serde(skip_serializing_if = "NodeSet::is_empty")]
    pub children: NodeSet,
}

impl RenderableNode {
    pub fn new(mapped: &MappedNode) -> Self {
        Self {
            id: mapped.id.clone(),
            label_major: mapped.label_major.clone(),
            label_minor: mapped.label_minor.clone(),
            rank: mapped.rank.clone(),
            ..Self::default()
        }
    }

    pub fn new_pseudo(mapped: &MappedNode) -> Self {
        Self { pseudo: true, ..Self::new(mapped) }
    }

    /// Overwrites labels and rank with `mapped`'s.
    pub fn relabel(&mut self, mapped: &MappedNode) {
        self.label_major.clone_from(&mapped.label_major);
        self.label_minor.clone_from(&mapped.label_minor);
        self.rank.clone_from(&mapped.rank);
    }

    /// Same id on both sides: labels from `self`, everything else combined.
    pub fn merge(&self, other: &RenderableNode) -> RenderableNode {
        let mut metadata = self.metadata.clone();
        metadata.merge(&other.metadata);
        RenderableNode {
            id: self.id.clone(),
            label_major: self.label_major.clone(),
            label_minor: self.label_minor.clone(),
            rank: self.rank.clone(),
            pseudo: self.pseudo && other.pseudo,
            adjacency: self.adjacency.merge(&other.adjacency),
            origins: self.origins.merge(&other.origins),
            metadata,
            children: self.children.merge(&other.children),
        }
    }
}

/// Rendered graph keyed by mapped id.
pub type RenderableNodes = BTreeMap<String, RenderableNode>;

/// Union of two rendered graphs, merging nodes present on both sides.
pub fn merge_renderable_nodes(mut left: RenderableNodes, right: RenderableNodes) -> RenderableNodes {
    for (id, node) in right {
        let merged = match left.get(&id) {
            Some(existing) => existing.merge(&node),
            None => node,
        };
        left.insert(id, merged);
    }
    left
}
