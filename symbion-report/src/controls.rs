//! Actions pilotables depuis l'interface.
//!
//! Le cœur ne fait que transporter ces informations : une topologie déclare
//! ses contrôles, un nœud indique ceux qui s'appliquent à lui, et une
//! requête/réponse opaque fait l'aller-retour jusqu'au handler concerné.

use crate::intern::intern;
use crate::persistent::PersistentMap;
use crate::serde_helpers::{deserialize_map, serialize_map};
use crate::string_set::StringSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Controls currently applicable to one node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeControls {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "StringSet::is_empty")]
    pub controls: StringSet,
}

impl NodeControls {
    pub fn new(timestamp: DateTime<Utc>, ids: &[&str]) -> Self {
        Self { timestamp, controls: StringSet::from_strs(ids.iter().copied()) }
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty() && self.timestamp == DateTime::<Utc>::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.controls.contains(id)
    }

    /// Later timestamp wins, left on a tie.
    pub fn merge(&self, other: &Self) -> Self {
        if other.timestamp > self.timestamp {
            other.clone()
        } else {
            self.clone()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub human: String,
    pub icon: String,
    #[serde(default)]
    pub rank: i32,
}

/// Control id → [`Control`], declared per topology.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Controls(PersistentMap<Arc<str>, Control>);

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: &str, control: Control) -> Self {
        Self(self.0.insert(intern(id), control))
    }

    pub fn lookup(&self, id: &str) -> Option<&Control> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Control)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Union; left wins when both sides declare the same id.
    pub fn merge(&self, other: &Self) -> Self {
        Self(self.0.merge_with(&other.0, |_, left, _| left.clone()))
    }
}

impl Serialize for Controls {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Controls {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_map(deserializer).map(Self)
    }
}

/// Opaque request routed to whoever owns `control`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub probe_id: String,
    pub node_id: String,
    pub control: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn ok(value: serde_json::Value) -> Self {
        Self { value: Some(value), error: None }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self { value: None, error: Some(msg.into()) }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
