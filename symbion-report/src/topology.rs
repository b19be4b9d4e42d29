use crate::controls::Controls;
use crate::edge_metadata::EdgeMetadata;
use crate::ids::{make_edge_id, make_local_adjacency_id};
use crate::intern::intern;
use crate::node::Node;
use crate::persistent::PersistentMap;
use crate::serde_helpers::{deserialize_map, serialize_map};
use crate::string_set::IdList;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Named collection of nodes of one kind.
///
/// Besides the nodes themselves a topology can carry the flat legacy tables:
/// adjacency keyed by `host|node` and edge metadata keyed by `src|dst`. Both
/// are folded in by [`Topology::adjacency_entries`] and
/// [`Topology::edge_metadata`], so readers never have to care which encoding
/// a producer used.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(
        default,
        skip_serializing_if = "PersistentMap::is_empty",
        serialize_with = "serialize_map",
        deserialize_with = "deserialize_map"
    )]
    nodes: PersistentMap<Arc<str>, Node>,
    #[serde(
        default,
        skip_serializing_if = "PersistentMap::is_empty",
        serialize_with = "serialize_map",
        deserialize_with = "deserialize_map"
    )]
    adjacency: PersistentMap<Arc<str>, IdList>,
    #[serde(
        default,
        skip_serializing_if = "PersistentMap::is_empty",
        serialize_with = "serialize_map",
        deserialize_with = "deserialize_map"
    )]
    edge_metadatas: PersistentMap<Arc<str>, EdgeMetadata>,
    #[serde(default, skip_serializing_if = "Controls::is_empty")]
    controls: Controls,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// New topology with `node` merged into whatever is already stored under
    /// its id.
    pub fn with_node(&self, node: Node) -> Self {
        let merged = match self.nodes.get(node.id()) {
            Some(existing) => existing.merge(&node),
            None => node,
        };
        Self { nodes: self.nodes.insert(Arc::from(merged.id()), merged), ..self.clone() }
    }

    /// Legacy adjacency entry; `adjacency_id` must be `host|node`.
    pub fn with_adjacency(&self, adjacency_id: &str, dsts: IdList) -> Self {
        let merged = match self.adjacency.get(adjacency_id) {
            Some(existing) => existing.merge(&dsts),
            None => dsts,
        };
        Self { adjacency: self.adjacency.insert(intern(adjacency_id), merged), ..self.clone() }
    }

    /// Legacy edge metadata keyed by `src|dst`.
    pub fn with_edge_metadata(&self, src: &str, dst: &str, md: EdgeMetadata) -> Self {
        let key = make_edge_id(src, dst);
        let merged = match self.edge_metadatas.get(key.as_str()) {
            Some(existing) => existing.merge(&md),
            None => md,
        };
        Self { edge_metadatas: self.edge_metadatas.insert(Arc::from(key), merged), ..self.clone() }
    }

    /// Every node replaced by `f(node)`, stored under its original id. The
    /// legacy tables are kept as they are.
    pub fn map_nodes(&self, f: impl Fn(&Node) -> Node) -> Self {
        let nodes = self.nodes.iter().map(|(id, n)| (Arc::clone(id), f(n))).collect();
        Self { nodes, ..self.clone() }
    }

    pub fn with_controls(&self, controls: &Controls) -> Self {
        Self { controls: self.controls.merge(controls), ..self.clone() }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.adjacency.is_empty()
            && self.edge_metadatas.is_empty()
            && self.controls.is_empty()
    }

    /// Every adjacency list of the topology, legacy keys first then one
    /// `>node` key per node with outgoing edges.
    pub fn adjacency_entries(&self) -> Vec<(String, IdList)> {
        let legacy = self.adjacency.iter().map(|(k, v)| (k.to_string(), v.clone()));
        let local = self
            .nodes
            .iter()
            .filter(|(_, n)| !n.adjacency().is_empty())
            .map(|(id, n)| (make_local_adjacency_id(id), n.adjacency().clone()));
        legacy.chain(local).collect()
    }

    /// Metadata of the raw edge `src → dst`, combining the legacy table with
    /// the source node's own edges.
    pub fn edge_metadata(&self, src: &str, dst: &str) -> Option<EdgeMetadata> {
        let legacy = self.edge_metadatas.get(make_edge_id(src, dst).as_str()).copied();
        let local = self.nodes.get(src).and_then(|n| n.edges().lookup(dst)).copied();
        match (legacy, local) {
            (Some(a), Some(b)) => Some(a.merge(&b)),
            (a, b) => a.or(b),
        }
    }

    pub fn merge(&self, other: &Topology) -> Topology {
        Topology {
            nodes: self.nodes.merge_with(&other.nodes, |_, a, b| a.merge(b)),
            adjacency: self.adjacency.merge_with(&other.adjacency, |_, a, b| a.merge(b)),
            edge_metadatas: self.edge_metadatas.merge_with(&other.edge_metadatas, |_, a, b| a.merge(b)),
            controls: self.controls.merge(&other.controls),
        }
    }
}

impl FromIterator<Node> for Topology {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        iter.into_iter().fold(Topology::new(), |t, n| t.with_node(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_node_merges_same_id() {
        let t = Topology::new()
            .with_node(Node::new("a").with_adjacent("x"))
            .with_node(Node::new("a").with_adjacent("y"));
        assert_eq!(t.len(), 1);
        assert_eq!(t.node("a").map(|n| n.adjacency().len()), Some(2));
    }

    #[test]
    fn test_merge_unions_ids() {
        let a: Topology = [Node::new("a"), Node::new("b").with_counter("c", 1)].into_iter().collect();
        let b: Topology = [Node::new("b").with_counter("c", 2), Node::new("c")].into_iter().collect();
        let merged = a.merge(&b);
        assert_eq!(merged.nodes().map(|(id, _)| id).collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(merged.node("b").and_then(|n| n.counters().lookup("c")), Some(3));
        assert_eq!(merged, b.merge(&a));
    }

    #[test]
    fn test_adjacency_entries_include_both_encodings() {
        let t = Topology::new()
            .with_node(Node::new("n1").with_adjacent("n2"))
            .with_node(Node::new("n2"))
            .with_adjacency("hostA|n3", IdList::from_ids(["n1"]));
        let keys: Vec<String> = t.adjacency_entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["hostA|n3", ">n1"]);
    }

    #[test]
    fn test_edge_metadata_combines_sources() {
        let md = EdgeMetadata { egress_byte_count: Some(5), ..Default::default() };
        let t = Topology::new()
            .with_node(Node::new("s").with_edge("d", md))
            .with_edge_metadata("s", "d", md);
        assert_eq!(t.edge_metadata("s", "d").and_then(|m| m.egress_byte_count), Some(10));
        assert_eq!(t.edge_metadata("d", "s"), None);
    }

    #[test]
    fn test_map_nodes_keeps_legacy_tables() {
        let t = Topology::new()
            .with_node(Node::new("a"))
            .with_adjacency("h|a", IdList::from_ids(["b"]));
        let mapped = t.map_nodes(|n| n.with_counter("seen", 1));
        assert_eq!(mapped.node("a").and_then(|n| n.counters().lookup("seen")), Some(1));
        assert_eq!(mapped.adjacency_entries(), t.adjacency_entries());
    }

    #[test]
    fn test_empty_topology_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&Topology::new()).unwrap(), "{}");
        assert!(Topology::new().is_empty());
    }
}
