use crate::intern::intern;
use crate::persistent::PersistentMap;
use crate::serde_helpers::{deserialize_map, serialize_map};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Time series of samples ordered by timestamp, with running bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    samples: Arc<Vec<Sample>>,
    pub min: f64,
    pub max: f64,
}

impl Default for Metric {
    fn default() -> Self {
        Self { samples: Arc::new(Vec::new()), min: 0.0, max: 0.0 }
    }
}

impl Metric {
    pub fn new(samples: Vec<Sample>) -> Self {
        let mut samples = samples;
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        samples.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);
        let (min, max) = bounds(&samples);
        Self { samples: Arc::new(samples), min, max }
    }

    pub fn single(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self::new(vec![Sample { timestamp, value }])
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples unioned by timestamp (left wins on an equal timestamp), min of
    /// mins and max of maxes.
    pub fn merge(&self, other: &Self) -> Self {
        if other.is_empty() || Arc::ptr_eq(&self.samples, &other.samples) {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }

        let (a, b) = (self.samples.as_slice(), other.samples.as_slice());
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].timestamp.cmp(&b[j].timestamp) {
                std::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);

        Self { samples: Arc::new(out), min: self.min.min(other.min), max: self.max.max(other.max) }
    }
}

fn bounds(samples: &[Sample]) -> (f64, f64) {
    let mut iter = samples.iter().map(|s| s.value);
    match iter.next() {
        Some(first) => iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))),
        None => (0.0, 0.0),
    }
}

/// Metric name → [`Metric`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metrics(PersistentMap<Arc<str>, Metric>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// New metrics with `metric` merged into `key`.
    pub fn add(&self, key: &str, metric: Metric) -> Self {
        let merged = match self.0.get(key) {
            Some(existing) => existing.merge(&metric),
            None => metric,
        };
        Self(self.0.insert(intern(key), merged))
    }

    pub fn lookup(&self, key: &str) -> Option<&Metric> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self(self.0.merge_with(&other.0, |_, a, b| a.merge(b)))
    }
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_map(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Metrics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_map(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_new_sorts_and_bounds() {
        let m = Metric::new(vec![
            Sample { timestamp: at(2), value: 5.0 },
            Sample { timestamp: at(1), value: 1.0 },
            Sample { timestamp: at(3), value: 3.0 },
        ]);
        let ts: Vec<_> = m.samples().iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![at(1), at(2), at(3)]);
        assert_eq!((m.min, m.max), (1.0, 5.0));
        assert_eq!(m.last().map(|s| s.value), Some(3.0));
    }

    #[test]
    fn test_merge_unions_samples() {
        let a = Metric::new(vec![Sample { timestamp: at(1), value: 1.0 }, Sample { timestamp: at(3), value: 3.0 }]);
        let b = Metric::new(vec![Sample { timestamp: at(2), value: 9.0 }, Sample { timestamp: at(3), value: 7.0 }]);
        let merged = a.merge(&b);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.samples()[2].value, 3.0);
        assert_eq!((merged.min, merged.max), (1.0, 9.0));
    }

    #[test]
    fn test_metrics_add_merges() {
        let m = Metrics::new()
            .add("cpu", Metric::single(at(1), 10.0))
            .add("cpu", Metric::single(at(2), 20.0));
        assert_eq!(m.lookup("cpu").map(Metric::len), Some(2));
        assert_eq!(m.len(), 1);
    }
}
