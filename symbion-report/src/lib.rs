//! Mergeable topology reports.
//!
//! Every type here is immutable: mutators return a new value and merges are
//! commutative, so partial reports from many probes can be fused in any order
//! without coordination. Containers share structure through
//! [`PersistentMap`], so merging a long-lived report with a fresh one only
//! copies the paths that changed.

pub mod codec;
pub mod controls;
pub mod counters;
pub mod edge_metadata;
pub mod error;
pub mod ids;
pub mod intern;
pub mod latest;
pub mod metrics;
pub mod node;
pub mod persistent;
pub mod report;
mod serde_helpers;
pub mod sets;
pub mod string_set;
pub mod topology;

pub use controls::{Control, ControlRequest, ControlResponse, Controls, NodeControls};
pub use counters::Counters;
pub use edge_metadata::{EdgeMetadata, EdgeMetadatas};
pub use error::{CodecError, InvariantViolation};
pub use latest::{LatestEntry, LatestMap, StringLatestMap};
pub use metrics::{Metric, Metrics, Sample};
pub use node::{Node, NodeSet};
pub use persistent::PersistentMap;
pub use report::{Probe, Probes, Report, Sampling};
pub use sets::Sets;
pub use string_set::{IdList, StringSet};
pub use topology::Topology;
