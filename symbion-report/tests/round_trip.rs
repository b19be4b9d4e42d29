use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use symbion_report::codec::{decode, decode_json, encode, encode_json};
use symbion_report::{
    Control, Controls, EdgeMetadata, IdList, LatestEntry, Metric, Node, NodeControls, Probe,
    Report, Sampling, StringSet, Topology,
};

fn at(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, secs).unwrap()
}

fn full_report() -> Report {
    let observed_zero = EdgeMetadata {
        egress_packet_count: Some(0),
        egress_byte_count: Some(1500),
        max_conn_count_tcp: Some(3),
        ..Default::default()
    };
    let client = Node::new("client;10.0.0.1;4242")
        .with_topology("endpoint")
        .with_latest("name", at(1), "curl")
        .with_latest("pid", at(1), "4242")
        .with_counter("conns", 2)
        .with_set("local_networks", StringSet::from_strs(["10.0.0.0/8"]))
        .with_edge("server;10.0.0.2;80", observed_zero)
        .with_controls(NodeControls::new(at(2), &["docker_stop"]))
        .with_metric("cpu_usage_percent", Metric::new(vec![
            symbion_report::Sample { timestamp: at(1), value: 0.5 },
            symbion_report::Sample { timestamp: at(2), value: 1.25 },
        ]))
        .with_parent("host", "client;<host>");

    let endpoint = Topology::new()
        .with_node(client)
        .with_node(Node::new("server;10.0.0.2;80").with_topology("endpoint"))
        .with_adjacency("client|server;10.0.0.2;80", IdList::from_ids(["client;10.0.0.1;4242"]))
        .with_edge_metadata("server;10.0.0.2;80", "client;10.0.0.1;4242", EdgeMetadata {
            ingress_byte_count: Some(0),
            ..Default::default()
        })
        .with_controls(&Controls::new().add("docker_stop", Control {
            human: "Stop".into(),
            icon: "fa-stop".into(),
            rank: 1,
        }));

    Report {
        window: Duration::from_secs(15),
        sampling: Sampling { count: 200, total: 2345 },
        ..Report::new()
    }
    .with_topology("endpoint", &endpoint)
    .with_topology("host", &Topology::new().with_node(Node::new("client;<host>").with_topology("host")))
    .with_probe(Probe { id: "probe-1".into(), hostname: "client".into(), version: "0.1.0".into(), last_seen: at(3) })
}

#[test]
fn binary_round_trip_keeps_everything() {
    let report = full_report();
    let bytes = encode(&report).unwrap();
    let back: Report = decode(&bytes).unwrap();
    assert_eq!(back, report);
}

#[test]
fn json_round_trip_keeps_everything() {
    let report = full_report();
    let bytes = encode_json(&report).unwrap();
    let back: Report = decode_json(&bytes).unwrap();
    assert_eq!(back, report);
}

#[test]
fn empty_report_round_trips() {
    let empty = Report::new();
    assert_eq!(decode::<Report>(&encode(&empty).unwrap()).unwrap(), empty);
    assert_eq!(encode_json(&empty).unwrap(), b"{}");
}

#[test]
fn zero_and_absent_stay_distinct_on_the_wire() {
    let report = full_report();
    let json: serde_json::Value = serde_json::from_slice(&encode_json(&report).unwrap()).unwrap();
    let edge = &json["endpoint"]["nodes"]["client;10.0.0.1;4242"]["edges"]["server;10.0.0.2;80"];
    assert_eq!(edge["egress_packet_count"], 0);
    assert!(edge.get("ingress_packet_count").is_none());

    let back: Report = decode(&encode(&report).unwrap()).unwrap();
    let md = back.endpoint.edge_metadata("client;10.0.0.1;4242", "server;10.0.0.2;80").unwrap();
    assert_eq!(md.egress_packet_count, Some(0));
    assert_eq!(md.ingress_packet_count, None);
}

#[test]
fn custom_map_encoding_matches_a_plain_map() {
    let report = full_report();
    let node = report.endpoint.node("client;10.0.0.1;4242").unwrap();

    let fast = serde_json::to_value(node.latest()).unwrap();
    let plain: BTreeMap<String, LatestEntry<String>> = serde_json::from_value(fast.clone()).unwrap();
    assert_eq!(serde_json::to_value(&plain).unwrap(), fast);
    assert_eq!(plain["name"].value, "curl");
}
