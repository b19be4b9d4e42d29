//! Construction et décodage des identifiants de nœuds.
//!
//! Formats :
//! - endpoint `host;addr;port`, adresse `host;addr`, processus `host;pid`
//! - hôte `host;<host>`, conteneur `<id>;<container>`, image `<id>;<container_image>`
//! - arête `src|dst`
//! - adjacence `host|node` (table héritée) ou `>node` (synthétisée depuis un nœud)

use crate::error::InvariantViolation;

const SCOPE_DELIM: char = ';';
const EDGE_DELIM: char = '|';
const LOCAL_PREFIX: char = '>';

pub fn make_endpoint_node_id(host: &str, addr: &str, port: u16) -> String {
    format!("{host};{addr};{port}")
}

pub fn make_address_node_id(host: &str, addr: &str) -> String {
    format!("{host};{addr}")
}

pub fn make_process_node_id(host: &str, pid: u32) -> String {
    format!("{host};{pid}")
}

pub fn make_host_node_id(host: &str) -> String {
    format!("{host};<host>")
}

pub fn make_container_node_id(container_id: &str) -> String {
    format!("{container_id};<container>")
}

pub fn make_container_image_node_id(image_id: &str) -> String {
    format!("{image_id};<container_image>")
}

pub fn make_pod_node_id(namespace: &str, name: &str) -> String {
    format!("{namespace};{name};<pod>")
}

pub fn make_edge_id(src: &str, dst: &str) -> String {
    format!("{src}{EDGE_DELIM}{dst}")
}

/// Legacy adjacency key: outgoing edges of `node_id` as seen by `host`.
pub fn make_adjacency_id(host: &str, node_id: &str) -> String {
    format!("{host}{EDGE_DELIM}{node_id}")
}

/// Adjacency key synthesized from a node's own adjacency list.
pub fn make_local_adjacency_id(node_id: &str) -> String {
    format!("{LOCAL_PREFIX}{node_id}")
}

pub fn parse_edge_id(edge_id: &str) -> Result<(&str, &str), InvariantViolation> {
    match edge_id.split_once(EDGE_DELIM) {
        Some((src, dst)) if !src.is_empty() && !dst.is_empty() => Ok((src, dst)),
        _ => Err(InvariantViolation::MalformedEdgeId(edge_id.to_string())),
    }
}

/// Decoded adjacency key. `host` is `None` for synthesized (`>node`) keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjacencyId<'a> {
    pub host: Option<&'a str>,
    pub node_id: &'a str,
}

pub fn parse_adjacency_id(id: &str) -> Result<AdjacencyId<'_>, InvariantViolation> {
    let malformed = || InvariantViolation::MalformedAdjacencyId(id.to_string());
    if let Some(node_id) = id.strip_prefix(LOCAL_PREFIX) {
        if node_id.is_empty() {
            return Err(malformed());
        }
        return Ok(AdjacencyId { host: None, node_id });
    }
    match id.split_once(EDGE_DELIM) {
        Some((host, node_id)) if !node_id.is_empty() => Ok(AdjacencyId { host: Some(host), node_id }),
        _ => Err(malformed()),
    }
}

pub fn parse_endpoint_node_id(id: &str) -> Option<(&str, &str, u16)> {
    let mut parts = id.splitn(3, SCOPE_DELIM);
    let host = parts.next()?;
    let addr = parts.next()?;
    let port = parts.next()?.parse().ok()?;
    Some((host, addr, port))
}

pub fn parse_address_node_id(id: &str) -> Option<(&str, &str)> {
    id.split_once(SCOPE_DELIM)
}

pub fn parse_process_node_id(id: &str) -> Option<(&str, u32)> {
    let (host, pid) = id.split_once(SCOPE_DELIM)?;
    Some((host, pid.parse().ok()?))
}

/// The container id of a `<id>;<container>` node id.
pub fn parse_container_node_id(id: &str) -> Option<&str> {
    id.strip_suffix(";<container>")
}

pub fn parse_host_node_id(id: &str) -> Option<&str> {
    id.strip_suffix(";<host>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_round_trip() {
        let id = make_endpoint_node_id("client", "10.0.0.1", 4242);
        assert_eq!(id, "client;10.0.0.1;4242");
        assert_eq!(parse_endpoint_node_id(&id), Some(("client", "10.0.0.1", 4242)));
        assert_eq!(parse_endpoint_node_id("client;10.0.0.1"), None);
        assert_eq!(parse_endpoint_node_id("client;10.0.0.1;http"), None);
    }

    #[test]
    fn test_process_and_host_ids() {
        assert_eq!(parse_process_node_id(&make_process_node_id("h", 215)), Some(("h", 215)));
        assert_eq!(parse_host_node_id(&make_host_node_id("h")), Some("h"));
        assert_eq!(parse_container_node_id(&make_container_node_id("abc")), Some("abc"));
        assert_eq!(parse_container_node_id("abc;<host>"), None);
    }

    #[test]
    fn test_adjacency_ids() {
        assert_eq!(
            parse_adjacency_id("hostA|client;10.0.0.1;80"),
            Ok(AdjacencyId { host: Some("hostA"), node_id: "client;10.0.0.1;80" })
        );
        assert_eq!(parse_adjacency_id(">node"), Ok(AdjacencyId { host: None, node_id: "node" }));
        assert_eq!(
            parse_adjacency_id("no-delimiter"),
            Err(InvariantViolation::MalformedAdjacencyId("no-delimiter".into()))
        );
        assert!(parse_adjacency_id(">").is_err());
        assert!(parse_adjacency_id("host|").is_err());
    }

    #[test]
    fn test_edge_ids() {
        let id = make_edge_id("a;1", "b;2");
        assert_eq!(parse_edge_id(&id), Ok(("a;1", "b;2")));
        assert!(parse_edge_id("a;1").is_err());
    }
}
