use serde_json::json;
use symbion_devkit::fixture::{
    at, client_endpoint_id, client_server_report, malformed_adjacency_report, server_edge, server_endpoint_id,
    shared_unknown_destination_report,
};
use symbion_devkit::init_test_logging;
use symbion_render::mapping::{
    endpoint_identity, generic_pseudo_node, internet_only_pseudo_node, process_name, select_endpoint, THE_INTERNET_ID,
};
use symbion_render::renderable::{KEY_EGRESS_BYTES, KEY_INGRESS_BYTES};
use symbion_render::{render, render_edge_metadata, LeafMap, Reduce, Renderer};
use symbion_report::ids::make_endpoint_node_id;
use symbion_report::intern::NAME;
use symbion_report::{InvariantViolation, Node, Report, Topology};

#[test]
fn test_process_names_over_endpoints() {
    init_test_logging();
    let nodes = render(&client_server_report(), select_endpoint, process_name, None).unwrap();

    assert_eq!(nodes.keys().map(String::as_str).collect::<Vec<_>>(), ["apache", "curl"]);
    let curl = &nodes["curl"];
    let apache = &nodes["apache"];
    assert!(curl.adjacency.contains("apache"));
    assert!(apache.adjacency.contains("curl"));
    assert!(!curl.pseudo && !apache.pseudo);

    assert_eq!(apache.metadata.get(KEY_EGRESS_BYTES), Some(10));
    assert_eq!(apache.metadata.get(KEY_INGRESS_BYTES), Some(100));
    assert!(curl.metadata.is_empty());

    assert!(curl.origins.contains(&client_endpoint_id()));
    assert!(curl.origins.contains("client;<host>"));
    assert_eq!(apache.children.len(), 1);
}

#[test]
fn test_unknown_destination_gives_one_pseudo_node() {
    let nodes =
        render(&shared_unknown_destination_report(), select_endpoint, process_name, Some(generic_pseudo_node)).unwrap();

    let pseudo: Vec<_> = nodes.values().filter(|n| n.pseudo).collect();
    assert_eq!(pseudo.len(), 1);
    assert_eq!(pseudo[0].label_major, "203.0.113.9:443");
    assert!(nodes["curl"].adjacency.contains(&pseudo[0].id));
    assert!(nodes["apache"].adjacency.contains(&pseudo[0].id));
    assert!(nodes["apache"].origins.contains("server;<host>"));
}

#[test]
fn test_unknown_destination_hidden_without_pseudo_func() {
    let nodes = render(&shared_unknown_destination_report(), select_endpoint, process_name, None).unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(nodes.values().all(|n| n.adjacency.is_empty()));
}

#[test]
fn test_public_destination_is_the_internet() {
    let nodes = render(
        &shared_unknown_destination_report(),
        select_endpoint,
        process_name,
        Some(internet_only_pseudo_node),
    )
    .unwrap();
    assert!(nodes[THE_INTERNET_ID].pseudo);
    assert!(nodes["curl"].adjacency.contains(THE_INTERNET_ID));
}

#[test]
fn test_malformed_adjacency_fails_fast() {
    let err = render(&malformed_adjacency_report(), select_endpoint, process_name, None).unwrap_err();
    assert_eq!(err, InvariantViolation::MalformedAdjacencyId("no-delimiter-here".to_string()));
}

#[test]
fn test_edge_metadata_of_rendered_edge() {
    let report = client_server_report();
    let md = render_edge_metadata(&report, select_endpoint, process_name, "apache", "curl").unwrap();
    assert_eq!(md.egress_byte_count, Some(10));
    assert_eq!(md.ingress_byte_count, Some(100));

    let none = render_edge_metadata(&report, select_endpoint, process_name, "curl", "apache").unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_reduce_merges_leaf_renderers() {
    let report = client_server_report();
    let reduce = Reduce::new()
        .with(LeafMap::new(select_endpoint, process_name, None))
        .with(LeafMap::new(select_endpoint, endpoint_identity, None));

    let nodes = reduce.render(&report).unwrap();
    assert!(nodes.contains_key("curl"));
    assert!(nodes.contains_key(&server_endpoint_id()));
    assert_eq!(nodes.len(), 4);

    let md = reduce.edge_metadata(&report, "apache", "curl").unwrap();
    assert_eq!(md.egress_byte_count, Some(10));
}

#[test]
fn test_json_output_of_rendered_nodes() {
    let nodes =
        render(&shared_unknown_destination_report(), select_endpoint, process_name, Some(generic_pseudo_node)).unwrap();
    let pseudo_id = "pseudo:;203.0.113.9;443";
    let value = serde_json::to_value(&nodes).unwrap();

    let pseudo = &value[pseudo_id];
    assert_eq!(pseudo["pseudo"], json!(true));
    assert!(pseudo.get("children").is_none());
    assert!(value["curl"]["children"].is_array());
    assert_eq!(value["curl"]["adjacency"], json!([pseudo_id]));

    let rendered = serde_json::to_value(&render(&client_server_report(), select_endpoint, process_name, None).unwrap())
        .unwrap();
    assert_eq!(rendered["apache"]["metadata"], json!({ KEY_EGRESS_BYTES: 10, KEY_INGRESS_BYTES: 100 }));
    assert_eq!(rendered["curl"]["metadata"], json!({}));
}

/// Server endpoint carries no process name, so `process_name` hides it.
fn unnamed_server_report() -> Report {
    let client = client_endpoint_id();
    let topology = Topology::new()
        .with_node(Node::new(client.as_str()).with_latest(NAME, at(0), "curl"))
        .with_node(Node::new(server_endpoint_id()).with_adjacent(&client).with_edge(&client, server_edge()));
    Report::new().with_topology("endpoint", &topology)
}

#[test]
fn test_hidden_node_resolves_to_pseudo_in_render_and_edge_metadata() {
    let report = unnamed_server_report();
    let leaf = LeafMap::new(select_endpoint, process_name, Some(generic_pseudo_node));
    let pseudo_id = format!("pseudo:{}", server_endpoint_id());

    let nodes = leaf.render(&report).unwrap();
    assert!(nodes[&pseudo_id].pseudo);
    assert!(nodes[&pseudo_id].adjacency.contains("curl"));

    let md = leaf.edge_metadata(&report, &pseudo_id, "curl").unwrap();
    assert_eq!(md.egress_byte_count, Some(10));
    assert_eq!(md.ingress_byte_count, Some(100));
}

#[test]
fn test_many_nodes_grouped_under_one_name() {
    let topology = (0..50u16).fold(Topology::new(), |t, port| {
        t.with_node(Node::new(make_endpoint_node_id("h", "10.0.0.1", port)).with_latest(NAME, at(0), "worker"))
    });
    let report = Report::new().with_topology("endpoint", &topology);

    let nodes = render(&report, select_endpoint, process_name, None).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes["worker"].children.len(), 50);
    assert_eq!(nodes["worker"].origins.len(), 50);
}
