use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Sorted set of unique strings.
///
/// Backed by a shared vector: clones are cheap and every "mutation" builds a
/// new vector, so a set held inside a persistent map is never changed in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StringSet {
    items: Arc<Vec<String>>,
}

impl StringSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_strs<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<String> = items.into_iter().map(Into::into).collect();
        items.sort_unstable();
        items.dedup();
        Self { items: Arc::new(items) }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, s: &str) -> bool {
        self.items.binary_search_by(|probe| probe.as_str().cmp(s)).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    /// New set with `s` added.
    pub fn add(&self, s: &str) -> Self {
        match self.items.binary_search_by(|probe| probe.as_str().cmp(s)) {
            Ok(_) => self.clone(),
            Err(pos) => {
                let mut items = Vec::with_capacity(self.items.len() + 1);
                items.extend_from_slice(&self.items[..pos]);
                items.push(s.to_string());
                items.extend_from_slice(&self.items[pos..]);
                Self { items: Arc::new(items) }
            }
        }
    }

    /// New set without `s`.
    pub fn remove(&self, s: &str) -> Self {
        match self.items.binary_search_by(|probe| probe.as_str().cmp(s)) {
            Ok(pos) => {
                let mut items = self.items.as_ref().clone();
                items.remove(pos);
                Self { items: Arc::new(items) }
            }
            Err(_) => self.clone(),
        }
    }

    /// Sorted union, O(n+m).
    pub fn merge(&self, other: &Self) -> Self {
        if other.is_empty() || Arc::ptr_eq(&self.items, &other.items) {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        let (a, b) = (self.items.as_slice(), other.items.as_slice());
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => {
                    out.push(a[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push(a[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);

        if out.len() == a.len() {
            return self.clone();
        }
        Self { items: Arc::new(out) }
    }
}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_strs(iter)
    }
}

impl Serialize for StringSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Re-normalised on the way in: a peer that sends an unsorted list
        // must not break binary search.
        let items = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_strs(items))
    }
}

/// Sorted list of unique node ids (adjacency, origins).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdList(StringSet);

impl IdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(StringSet::from_strs(ids))
    }

    pub fn add(&self, id: &str) -> Self {
        Self(self.0.add(id))
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self(self.0.merge(&other.0))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
