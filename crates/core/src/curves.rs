//! Metric curves: named, ordered sequences of scalar samples.
//!
//! A curve is one metric's history, one element appended per sampling
//! tick. Structured values (objects, arrays) are flattened into dotted
//! keys recursively, so a per-core CPU reading becomes `cpuUsage.0`,
//! `cpuUsage.1`, ... and an I/O counter struct becomes
//! `ioCounters.read_bytes`, `ioCounters.write_bytes`, etc.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel appended when a metric cannot be collected on a tick.
///
/// Appending the sentinel instead of skipping keeps every curve the same
/// length as the shared timestamp sequence. All metrics collected by the
/// sampler are non-negative, so `-1.0` is unambiguous.
pub const MISSED_SAMPLE: f64 = -1.0;

/// A set of named curves, ordered by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurveSet {
    curves: BTreeMap<String, Vec<f64>>,
}

impl CurveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one scalar sample to the named curve, creating it on first use.
    pub fn push(&mut self, key: &str, value: f64) {
        self.curves.entry(key.to_owned()).or_default().push(value);
    }

    /// Append the missed-sample sentinel to the named curve.
    pub fn push_missed(&mut self, key: &str) {
        self.push(key, MISSED_SAMPLE);
    }

    /// Flatten a JSON value into dotted keys and append each scalar leaf.
    ///
    /// Objects recurse as `key.field`, arrays as `key.index`. Non-numeric
    /// leaves (strings, null, booleans) append the sentinel so the curve
    /// still advances by one element.
    pub fn push_value(&mut self, key: &str, value: &serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    self.push_value(&format!("{key}.{k}"), v);
                }
            }
            serde_json::Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    self.push_value(&format!("{key}.{i}"), v);
                }
            }
            serde_json::Value::Number(n) => {
                self.push(key, n.as_f64().unwrap_or(MISSED_SAMPLE));
            }
            serde_json::Value::Bool(b) => {
                self.push(key, if *b { 1.0 } else { 0.0 });
            }
            _ => self.push_missed(key),
        }
    }

    /// The samples recorded for one metric, if any.
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.curves.get(key).map(Vec::as_slice)
    }

    /// Iterate over `(metric name, samples)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.curves.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}
