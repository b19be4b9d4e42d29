//! Symbion collector: probes, packet capture and the rolling report window.
//!
//! Probes run [`probe::ProbeLoop`] cycles that merge their reporters' output
//! and hand it to a [`probe::ProbeSink`]. The [`collector::Collector`] task
//! keeps every report received during the last window and answers snapshot
//! requests with their merge. [`mqtt`] connects both ends through a broker.

pub mod capture;
pub mod collector;
pub mod config;
pub mod controls;
pub mod error;
pub mod mqtt;
pub mod probe;
pub mod producer;
pub mod state;

pub use capture::{Capture, CaptureCounts, CaptureSender, PacketSample};
pub use collector::Collector;
pub use config::{load_config, load_config_from, CollectorConfig};
pub use controls::{ControlHandler, ControlRouter};
pub use error::{CollectorError, ConfigError, ControlError};
pub use mqtt::{dispatch, publish_report, MqttContext, ReportPublisher, ReportSink, Topics};
pub use probe::{ProbeLoop, ProbeSettings, ProbeSink};
pub use producer::{HostReporter, HostTagger, Reporter, Tagger};
