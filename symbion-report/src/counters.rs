use crate::intern::intern;
use crate::persistent::PersistentMap;
use crate::serde_helpers::{deserialize_map, serialize_map};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Key → integer accumulator. Merge sums per key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters(PersistentMap<Arc<str>, u64>);

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// New counters with `n` added to `key`.
    pub fn add(&self, key: &str, n: u64) -> Self {
        let current = self.0.get(key).copied().unwrap_or(0);
        Self(self.0.insert(intern(key), current.saturating_add(n)))
    }

    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), *v))
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self(self.0.merge_with(&other.0, |_, a, b| a.saturating_add(*b)))
    }
}

impl Serialize for Counters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Counters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_map(deserializer).map(Self)
    }
}
