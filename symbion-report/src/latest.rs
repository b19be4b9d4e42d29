use crate::intern::intern;
use crate::persistent::PersistentMap;
use crate::serde_helpers::{deserialize_map, serialize_map};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Value stamped with the time it was observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestEntry<V> {
    pub timestamp: DateTime<Utc>,
    pub value: V,
}

/// Key → (timestamp, value). Merge keeps the later timestamp per key and the
/// left operand on an exact tie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatestMap<V>(PersistentMap<Arc<str>, LatestEntry<V>>);

/// The common case: string metadata such as process names or host ids.
pub type StringLatestMap = LatestMap<String>;

impl<V> Default for LatestMap<V> {
    fn default() -> Self {
        Self(PersistentMap::new())
    }
}

impl<V: Clone> LatestMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// New map with `key` bound to `value` at `timestamp`, replacing whatever
    /// was there. Ordering by time only applies on merge.
    pub fn set(&self, key: &str, timestamp: DateTime<Utc>, value: V) -> Self {
        Self(self.0.insert(intern(key), LatestEntry { timestamp, value }))
    }

    pub fn lookup(&self, key: &str) -> Option<&V> {
        self.0.get(key).map(|e| &e.value)
    }

    pub fn lookup_entry(&self, key: &str) -> Option<&LatestEntry<V>> {
        self.0.get(key)
    }

    pub fn delete(&self, key: &str) -> Self {
        Self(self.0.remove(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LatestEntry<V>)> {
        self.0.iter().map(|(k, e)| (k.as_ref(), e))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&self, other: &Self) -> Self {
        if self.0.ptr_eq(&other.0) {
            return self.clone();
        }
        Self(self.0.merge_with(&other.0, |_, left, right| {
            if right.timestamp > left.timestamp {
                right.clone()
            } else {
                left.clone()
            }
        }))
    }
}

impl<V: Serialize> Serialize for LatestMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.0, serializer)
    }
}

impl<'de, V: Deserialize<'de> + Clone> Deserialize<'de> for LatestMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_map(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_later_timestamp_wins() {
        let t1 = t0();
        let t2 = t1 + Duration::seconds(1);
        let a = StringLatestMap::new().set("foo", t1, "bar".into());
        let b = StringLatestMap::new().set("foo", t2, "baz".into());
        assert_eq!(a.merge(&b).lookup("foo").map(String::as_str), Some("baz"));
        assert_eq!(b.merge(&a).lookup("foo").map(String::as_str), Some("baz"));
    }

    #[test]
    fn test_tie_keeps_left() {
        let a = StringLatestMap::new().set("foo", t0(), "left".into());
        let b = StringLatestMap::new().set("foo", t0(), "right".into());
        assert_eq!(a.merge(&b).lookup("foo").map(String::as_str), Some("left"));
        assert_eq!(b.merge(&a).lookup("foo").map(String::as_str), Some("right"));
    }

    #[test]
    fn test_set_does_not_touch_receiver() {
        let a = StringLatestMap::new().set("foo", t0(), "bar".into());
        let b = a.set("foo", t0(), "qux".into()).delete("missing");
        assert_eq!(a.lookup("foo").map(String::as_str), Some("bar"));
        assert_eq!(b.lookup("foo").map(String::as_str), Some("qux"));
        assert!(a.delete("foo").is_empty());
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_json_shape() {
        let a = StringLatestMap::new().set("name", t0(), "curl".into());
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["name"]["value"], "curl");
        let back: StringLatestMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }
}
