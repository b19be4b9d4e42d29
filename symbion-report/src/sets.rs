use crate::intern::intern;
use crate::persistent::PersistentMap;
use crate::serde_helpers::{deserialize_map, serialize_map};
use crate::string_set::StringSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Key → [`StringSet`]. Merge is a per-key union.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sets(PersistentMap<Arc<str>, StringSet>);

impl Sets {
    pub fn new() -> Self {
        Self::default()
    }

    /// New sets with `values` unioned into `key`.
    pub fn add(&self, key: &str, values: StringSet) -> Self {
        let merged = match self.0.get(key) {
            Some(existing) => existing.merge(&values),
            None => values,
        };
        Self(self.0.insert(intern(key), merged))
    }

    pub fn add_string(&self, key: &str, value: &str) -> Self {
        self.add(key, StringSet::new().add(value))
    }

    pub fn delete(&self, key: &str) -> Self {
        Self(self.0.remove(key))
    }

    pub fn lookup(&self, key: &str) -> Option<&StringSet> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StringSet)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
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
        Self(self.0.merge_with(&other.0, |_, a, b| a.merge(b)))
    }
}

impl Serialize for Sets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Sets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_map(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_per_key_union() {
        let a = Sets::new().add("k", StringSet::from_strs(["a"]));
        let b = Sets::new().add("k", StringSet::from_strs(["b"]));
        let merged = a.merge(&b);
        assert_eq!(merged.lookup("k").unwrap().as_slice(), ["a", "b"]);
        assert_eq!(merged, b.merge(&a));
    }

    #[test]
    fn test_add_unions_existing() {
        let s = Sets::new().add_string("ips", "10.0.0.2").add_string("ips", "10.0.0.1");
        assert_eq!(s.lookup("ips").unwrap().as_slice(), ["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_delete() {
        let s = Sets::new().add_string("a", "x").add_string("b", "y");
        let d = s.delete("a");
        assert!(d.lookup("a").is_none());
        assert!(s.lookup("a").is_some());
        assert_eq!(d.keys().collect::<Vec<_>>(), ["b"]);
    }
}
