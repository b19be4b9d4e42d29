/**
 * NODE - entité atomique du graphe
 *
 * RÔLE :
 * Un processus, un conteneur, un hôte, un endpoint réseau... identifié par
 * le couple (topologie, id). Porte l'adjacence sortante, les statistiques
 * par arête et les métadonnées versionnées.
 *
 * FONCTIONNEMENT :
 * - Immuable : chaque `with_*` renvoie un nouveau nœud, l'original reste valide
 * - Tous les champs s'appuient sur des conteneurs persistants : un clone ne
 *   copie que des pointeurs
 * - `merge` délègue à la loi de fusion de chaque conteneur
 *
 * UTILISATION :
 * ```text
 * let node = Node::new("host;42").with_latest("name", now, "curl").with_adjacent("host;80");
 * ```
 */
use crate::controls::NodeControls;
use crate::counters::Counters;
use crate::edge_metadata::{EdgeMetadata, EdgeMetadatas};
use crate::latest::StringLatestMap;
use crate::metrics::{Metric, Metrics};
use crate::sets::Sets;
use crate::string_set::{IdList, StringSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    topology: String,
    #[serde(default, skip_serializing_if = "Counters::is_empty")]
    counters: Counters,
    #[serde(default, skip_serializing_if = "Sets::is_empty")]
    sets: Sets,
    #[serde(default, skip_serializing_if = "IdList::is_empty")]
    adjacency: IdList,
    #[serde(default, skip_serializing_if = "EdgeMetadatas::is_empty")]
    edges: EdgeMetadatas,
    #[serde(default, skip_serializing_if = "NodeControls::is_empty")]
    controls: NodeControls,
    #[serde(default, skip_serializing_if = "StringLatestMap::is_empty")]
    latest: StringLatestMap,
    #[serde(default, skip_serializing_if = "Metrics::is_empty")]
    metrics: Metrics,
    #[serde(default, skip_serializing_if = "Sets::is_empty")]
    parents: Sets,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topology(&self) -> &str {
        &self.topology
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn sets(&self) -> &Sets {
        &self.sets
    }

    pub fn adjacency(&self) -> &IdList {
        &self.adjacency
    }

    pub fn edges(&self) -> &EdgeMetadatas {
        &self.edges
    }

    pub fn controls(&self) -> &NodeControls {
        &self.controls
    }

    pub fn latest(&self) -> &StringLatestMap {
        &self.latest
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn parents(&self) -> &Sets {
        &self.parents
    }

    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self { id: id.into(), ..self.clone() }
    }

    pub fn with_topology(&self, topology: impl Into<String>) -> Self {
        Self { topology: topology.into(), ..self.clone() }
    }

    pub fn with_latest(&self, key: &str, ts: DateTime<Utc>, value: impl Into<String>) -> Self {
        Self { latest: self.latest.set(key, ts, value.into()), ..self.clone() }
    }

    pub fn with_latests(&self, latest: &StringLatestMap) -> Self {
        Self { latest: self.latest.merge(latest), ..self.clone() }
    }

    pub fn with_counter(&self, key: &str, n: u64) -> Self {
        Self { counters: self.counters.add(key, n), ..self.clone() }
    }

    pub fn with_set(&self, key: &str, values: StringSet) -> Self {
        Self { sets: self.sets.add(key, values), ..self.clone() }
    }

    pub fn with_adjacent(&self, dst: &str) -> Self {
        Self { adjacency: self.adjacency.add(dst), ..self.clone() }
    }

    /// Adds `dst` to the adjacency and merges `md` into its edge entry.
    pub fn with_edge(&self, dst: &str, md: EdgeMetadata) -> Self {
        Self { adjacency: self.adjacency.add(dst), edges: self.edges.add(dst, md), ..self.clone() }
    }

    pub fn with_controls(&self, controls: NodeControls) -> Self {
        Self { controls: self.controls.merge(&controls), ..self.clone() }
    }

    pub fn with_metric(&self, key: &str, metric: Metric) -> Self {
        Self { metrics: self.metrics.add(key, metric), ..self.clone() }
    }

    /// Records `parent_id` as a parent in `topology`.
    pub fn with_parent(&self, topology: &str, parent_id: &str) -> Self {
        Self { parents: self.parents.add_string(topology, parent_id), ..self.clone() }
    }

    pub fn merge(&self, other: &Node) -> Node {
        Node {
            id: if self.id.is_empty() { other.id.clone() } else { self.id.clone() },
            topology: if self.topology.is_empty() { other.topology.clone() } else { self.topology.clone() },
            counters: self.counters.merge(&other.counters),
            sets: self.sets.merge(&other.sets),
            adjacency: self.adjacency.merge(&other.adjacency),
            edges: self.edges.merge(&other.edges),
            controls: self.controls.merge(&other.controls),
            latest: self.latest.merge(&other.latest),
            metrics: self.metrics.merge(&other.metrics),
            parents: self.parents.merge(&other.parents),
        }
    }

    /// Total order on (topology, id).
    pub fn cmp_identity(&self, other: &Node) -> Ordering {
        (self.topology.as_str(), self.id.as_str()).cmp(&(other.topology.as_str(), other.id.as_str()))
    }

    pub fn before(&self, other: &Node) -> bool {
        self.cmp_identity(other) == Ordering::Less
    }

    pub fn after(&self, other: &Node) -> bool {
        self.cmp_identity(other) == Ordering::Greater
    }

    pub fn same_identity(&self, other: &Node) -> bool {
        self.cmp_identity(other) == Ordering::Equal
    }
}

/// Nodes sorted by (topology, id), at most one per identity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeSet(Vec<Node>);

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts and collapses nodes of equal identity by merging them.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        nodes.sort_by(Node::cmp_identity);
        let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            match out.last_mut() {
                Some(last) if last.same_identity(&node) => *last = last.merge(&node),
                _ => out.push(node),
            }
        }
        Self(out)
    }

    pub fn add(&self, node: Node) -> Self {
        self.merge(&Self(vec![node]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.0.iter()
    }

    pub fn find(&self, topology: &str, id: &str) -> Option<&Node> {
        self.0
            .binary_search_by(|n| (n.topology(), n.id()).cmp(&(topology, id)))
            .ok()
            .map(|i| &self.0[i])
    }

    /// Linear zipper over two sorted inputs.
    pub fn merge(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp_identity(&b[j]) {
                Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(b[j].clone());
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(a[i].merge(&b[j]));
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        Self(out)
    }
}

impl FromIterator<Node> for NodeSet {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::from_nodes(iter)
    }
}

impl Serialize for NodeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Node>::deserialize(deserializer).map(Self::from_nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_builders_do_not_mutate() {
        let base = Node::new("h;1");
        let named = base.with_latest("name", now(), "curl");
        assert!(base.latest().is_empty());
        assert_eq!(named.latest().lookup("name").map(String::as_str), Some("curl"));
    }

    #[test]
    fn test_merge_keeps_own_identity() {
        let a = Node::new("a").with_topology("process");
        let b = Node::new("b").with_topology("endpoint").with_adjacent("x");
        let merged = a.merge(&b);
        assert_eq!((merged.id(), merged.topology()), ("a", "process"));
        assert!(merged.adjacency().contains("x"));

        let anon = Node::default().merge(&b);
        assert_eq!((anon.id(), anon.topology()), ("b", "endpoint"));
    }

    #[test]
    fn test_with_edge_records_adjacency() {
        let md = EdgeMetadata { egress_byte_count: Some(10), ..Default::default() };
        let n = Node::new("s").with_edge("c", md).with_edge("c", md);
        assert_eq!(n.adjacency().len(), 1);
        assert_eq!(n.edges().lookup("c").and_then(|m| m.egress_byte_count), Some(20));
    }

    #[test]
    fn test_identity_order() {
        let a = Node::new("z").with_topology("endpoint");
        let b = Node::new("a").with_topology("process");
        assert!(a.before(&b));
        assert!(b.after(&a));
        assert!(a.same_identity(&a.with_counter("x", 1)));
    }

    #[test]
    fn test_node_set_merge_dedups() {
        let left = NodeSet::from_nodes([Node::new("b").with_counter("n", 1), Node::new("a")]);
        let right = NodeSet::from_nodes([Node::new("b").with_counter("n", 2), Node::new("c")]);
        let merged = left.merge(&right);
        let ids: Vec<_> = merged.iter().map(Node::id).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(merged.find("", "b").and_then(|n| n.counters().lookup("n")), Some(3));
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let json = serde_json::to_value(Node::new("h;1").with_topology("process")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "h;1", "topology": "process"}));
    }
}
