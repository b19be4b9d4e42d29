/*!
Rapports de référence partagés par les tests de rendu et du collecteur.
*/

use chrono::{DateTime, TimeZone, Utc};
use symbion_report::ids::{make_adjacency_id, make_endpoint_node_id, make_host_node_id};
use symbion_report::intern::{HOST_NODE_ID, NAME};
use symbion_report::{EdgeMetadata, IdList, Node, Probe, Report, Topology};

pub const CLIENT_HOST: &str = "client";
pub const SERVER_HOST: &str = "server";

/// Fixed instant, `secs` after 2024-01-01T00:00:00Z.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200 + secs, 0).single().unwrap_or_default()
}

pub fn client_endpoint_id() -> String {
    make_endpoint_node_id(CLIENT_HOST, "10.0.0.1", 4242)
}

pub fn server_endpoint_id() -> String {
    make_endpoint_node_id(SERVER_HOST, "10.0.0.2", 215)
}

/// Metadata of the server → client edge.
pub fn server_edge() -> EdgeMetadata {
    EdgeMetadata { egress_byte_count: Some(10), ingress_byte_count: Some(100), ..Default::default() }
}

/// `curl` on the client talking to `apache` on the server, both directions
/// recorded as node adjacency.
pub fn client_server_report() -> Report {
    let client = client_endpoint_id();
    let server = server_endpoint_id();
    let topology = Topology::new()
        .with_node(
            Node::new(client.as_str())
                .with_topology("endpoint")
                .with_latest(NAME, at(0), "curl")
                .with_latest(HOST_NODE_ID, at(0), make_host_node_id(CLIENT_HOST))
                .with_adjacent(&server),
        )
        .with_node(
            Node::new(server.as_str())
                .with_topology("endpoint")
                .with_latest(NAME, at(0), "apache")
                .with_latest(HOST_NODE_ID, at(0), make_host_node_id(SERVER_HOST))
                .with_adjacent(&client)
                .with_edge(&client, server_edge()),
        );
    Report::new().with_topology("endpoint", &topology)
}

/// Two known clients both talking to the same unknown address.
pub fn shared_unknown_destination_report() -> Report {
    let unknown = make_endpoint_node_id("", "203.0.113.9", 443);
    let topology = Topology::new()
        .with_node(Node::new(client_endpoint_id()).with_latest(NAME, at(0), "curl").with_adjacent(&unknown))
        .with_node(Node::new(server_endpoint_id()).with_latest(NAME, at(0), "apache"))
        .with_adjacency(
            &make_adjacency_id(SERVER_HOST, &server_endpoint_id()),
            IdList::from_ids([unknown.as_str()]),
        );
    Report::new().with_topology("endpoint", &topology)
}

/// Legacy adjacency table with a key missing its `|` delimiter.
pub fn malformed_adjacency_report() -> Report {
    let topology = Topology::new()
        .with_node(Node::new(client_endpoint_id()).with_latest(NAME, at(0), "curl"))
        .with_adjacency("no-delimiter-here", IdList::from_ids([server_endpoint_id().as_str()]));
    Report::new().with_topology("endpoint", &topology)
}

pub fn probe(id: &str, last_seen: DateTime<Utc>) -> Probe {
    Probe { id: id.to_string(), hostname: CLIENT_HOST.to_string(), version: "test".to_string(), last_seen }
}
