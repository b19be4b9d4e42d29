//! Report producers and their fan-in.
//!
//! A failing reporter or tagger is logged and skipped: its contribution for
//! the cycle is empty, the rest of the batch goes through.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use symbion_report::ids::make_host_node_id;
use symbion_report::intern::{HOST_NAME, HOST_NODE_ID, OS};
use symbion_report::{Node, Report, Topology};
use tracing::{debug, warn};

/// Anything able to produce a report.
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;
    fn report(&self) -> Result<Report>;
}

/// Decorates a report after collection (host ids, parents...).
pub trait Tagger: Send + Sync {
    fn name(&self) -> &str;
    fn tag(&self, report: Report) -> Result<Report>;
}

/// Merge of every reporter's output, failures skipped.
pub fn collect_reports(reporters: &[Arc<dyn Reporter>]) -> Report {
    reporters.iter().fold(Report::new(), |acc, reporter| match reporter.report() {
        Ok(r) => {
            debug!("[probe] {} : {} nœud(s)", reporter.name(), r.node_count());
            acc.merge(&r)
        }
        Err(e) => {
            warn!("[probe] reporter {} en échec: {e:#}", reporter.name());
            acc
        }
    })
}

/// Runs every tagger in order; a failing tagger leaves the report as it was.
pub fn apply_taggers(report: Report, taggers: &[Arc<dyn Tagger>]) -> Report {
    taggers.iter().fold(report, |acc, tagger| match tagger.tag(acc.clone()) {
        Ok(tagged) => tagged,
        Err(e) => {
            warn!("[probe] tagger {} en échec: {e:#}", tagger.name());
            acc
        }
    })
}

/// The local host as a single node of the host topology.
pub struct HostReporter {
    hostname: String,
}

impl HostReporter {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self { hostname: hostname.into() }
    }
}

impl Reporter for HostReporter {
    fn name(&self) -> &str {
        "host"
    }

    fn report(&self) -> Result<Report> {
        let now = Utc::now();
        let node = Node::new(make_host_node_id(&self.hostname))
            .with_topology("host")
            .with_latest(HOST_NAME, now, self.hostname.as_str())
            .with_latest(OS, now, std::env::consts::OS);
        Ok(Report::new().with_topology("host", &Topology::new().with_node(node)))
    }
}

/// Stamps every node of every topology with the host it was seen on.
pub struct HostTagger {
    host_node_id: String,
}

impl HostTagger {
    pub fn new(hostname: &str) -> Self {
        Self { host_node_id: make_host_node_id(hostname) }
    }
}

impl Tagger for HostTagger {
    fn name(&self) -> &str {
        "host"
    }

    fn tag(&self, mut report: Report) -> Result<Report> {
        let now = Utc::now();
        for (name, topology) in report.topologies_mut() {
            if name == "host" {
                continue;
            }
            *topology = topology.map_nodes(|n| {
                n.with_latest(HOST_NODE_ID, now, self.host_node_id.as_str())
                    .with_parent("host", &self.host_node_id)
            });
        }
        Ok(report)
    }
}
