//! Fonctions de projection des nœuds bruts vers le graphe affiché.
//!
//! Une `MapFunc` décide de l'identité affichée d'un nœud (ou de le masquer
//! en renvoyant `None`). Plusieurs nœuds bruts projetés sur le même id se
//! fondent en un seul nœud rendu. Une `PseudoFunc` fabrique un nœud de
//! substitution pour une extrémité d'arête qu'aucun nœud ne décrit.

use crate::renderable::MappedNode;
use std::net::IpAddr;
use symbion_report::ids::{
    parse_address_node_id, parse_container_node_id, parse_endpoint_node_id, parse_host_node_id,
    parse_process_node_id,
};
use symbion_report::intern::{
    CONTAINER_ID, CONTAINER_NAME, HOST_NAME, IMAGE_ID, IMAGE_NAME, NAME, NAMESPACE, PID, POD_NAME,
};
use symbion_report::{Node, Report, Topology};

pub type TopologySelector = fn(&Report) -> &Topology;
pub type MapFunc = fn(&str, &Node) -> Option<MappedNode>;
pub type PseudoFunc = fn(&str) -> Option<MappedNode>;

pub const THE_INTERNET_ID: &str = "theinternet";
const PSEUDO_PREFIX: &str = "pseudo:";

fn latest<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.latest().lookup(key).map(String::as_str)
}

pub fn endpoint_identity(id: &str, node: &Node) -> Option<MappedNode> {
    let (host, addr, port) = parse_endpoint_node_id(id)?;
    let label = match latest(node, NAME) {
        Some(name) => format!("{name} ({addr}:{port})"),
        None => format!("{addr}:{port}"),
    };
    Some(MappedNode { id: id.to_string(), label_major: label, label_minor: host.to_string(), rank: addr.to_string() })
}

pub fn address_identity(id: &str, _node: &Node) -> Option<MappedNode> {
    let (host, addr) = parse_address_node_id(id)?;
    Some(MappedNode {
        id: id.to_string(),
        label_major: addr.to_string(),
        label_minor: host.to_string(),
        rank: addr.to_string(),
    })
}

pub fn process_identity(id: &str, node: &Node) -> Option<MappedNode> {
    let (host, pid) = parse_process_node_id(id)?;
    let name = latest(node, NAME).unwrap_or("(unknown)");
    Some(MappedNode {
        id: id.to_string(),
        label_major: name.to_string(),
        label_minor: format!("{host} ({pid})"),
        rank: name.to_string(),
    })
}

/// Groups every node carrying the same process name. Nodes without a name
/// are hidden.
pub fn process_name(_id: &str, node: &Node) -> Option<MappedNode> {
    let name = latest(node, NAME)?;
    let minor = match latest(node, PID) {
        Some(pid) => format!("pid {pid}"),
        None => String::new(),
    };
    Some(MappedNode { id: name.to_string(), label_major: name.to_string(), label_minor: minor, rank: name.to_string() })
}

pub fn container_identity(id: &str, node: &Node) -> Option<MappedNode> {
    let container_id = latest(node, CONTAINER_ID).or_else(|| parse_container_node_id(id))?;
    let name = latest(node, CONTAINER_NAME).unwrap_or(container_id);
    Some(MappedNode {
        id: container_id.to_string(),
        label_major: name.to_string(),
        label_minor: latest(node, HOST_NAME).unwrap_or_default().to_string(),
        rank: latest(node, IMAGE_NAME).unwrap_or_default().to_string(),
    })
}

/// Groups containers by image.
pub fn container_image(_id: &str, node: &Node) -> Option<MappedNode> {
    let image_id = latest(node, IMAGE_ID)?;
    let name = latest(node, IMAGE_NAME).unwrap_or(image_id);
    Some(MappedNode {
        id: image_id.to_string(),
        label_major: name.to_string(),
        label_minor: String::new(),
        rank: name.to_string(),
    })
}

pub fn pod_identity(id: &str, node: &Node) -> Option<MappedNode> {
    let name = latest(node, POD_NAME)?;
    Some(MappedNode {
        id: id.to_string(),
        label_major: name.to_string(),
        label_minor: latest(node, NAMESPACE).unwrap_or_default().to_string(),
        rank: name.to_string(),
    })
}

pub fn host_identity(id: &str, node: &Node) -> Option<MappedNode> {
    let host = latest(node, HOST_NAME).or_else(|| parse_host_node_id(id))?;
    Some(MappedNode { id: id.to_string(), label_major: host.to_string(), label_minor: String::new(), rank: host.to_string() })
}

/// One placeholder per unknown raw id.
pub fn generic_pseudo_node(raw_id: &str) -> Option<MappedNode> {
    let label = match parse_endpoint_node_id(raw_id) {
        Some((_, addr, port)) => format!("{addr}:{port}"),
        None => raw_id.to_string(),
    };
    Some(MappedNode {
        id: format!("{PSEUDO_PREFIX}{raw_id}"),
        label_major: label,
        label_minor: String::new(),
        rank: String::new(),
    })
}

/// Collapses every unknown public address into a single "the Internet" node.
/// Unknown private or loopback addresses are hidden.
pub fn internet_only_pseudo_node(raw_id: &str) -> Option<MappedNode> {
    let addr = parse_endpoint_node_id(raw_id)
        .map(|(_, addr, _)| addr)
        .or_else(|| parse_address_node_id(raw_id).map(|(_, addr)| addr));
    if let Some(ip) = addr.and_then(|a| a.parse::<IpAddr>().ok()) {
        if is_local(&ip) {
            return None;
        }
    }
    Some(MappedNode {
        id: THE_INTERNET_ID.to_string(),
        label_major: "the Internet".to_string(),
        label_minor: String::new(),
        rank: String::new(),
    })
}

fn is_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

pub fn select_endpoint(r: &Report) -> &Topology {
    &r.endpoint
}

pub fn select_address(r: &Report) -> &Topology {
    &r.address
}

pub fn select_process(r: &Report) -> &Topology {
    &r.process
}

pub fn select_container(r: &Report) -> &Topology {
    &r.container
}

pub fn select_container_image(r: &Report) -> &Topology {
    &r.container_image
}

pub fn select_pod(r: &Report) -> &Topology {
    &r.pod
}

pub fn select_service(r: &Report) -> &Topology {
    &r.service
}

pub fn select_deployment(r: &Report) -> &Topology {
    &r.deployment
}

pub fn select_replica_set(r: &Report) -> &Topology {
    &r.replica_set
}

pub fn select_daemon_set(r: &Report) -> &Topology {
    &r.daemon_set
}

pub fn select_host(r: &Report) -> &Topology {
    &r.host
}

pub fn select_overlay(r: &Report) -> &Topology {
    &r.overlay
}
