//! Per-instant telemetry snapshots.

use std::collections::BTreeMap;

use crate::sample::Value;

/// One channel's value inside a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub value: Value,
    /// The value was clamped to a boundary sample.
    pub out_of_range: bool,
}

/// Interpolated values of a set of channels at one telemetry time.
///
/// Produced on demand for a single frame and never stored by the core.
/// Channels that had no data at this instant (empty, or inside a gap) are
/// listed in `missing` rather than given a fabricated value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    telemetry_secs: f64,
    entries: BTreeMap<String, SnapshotEntry>,
    missing: Vec<String>,
}

impl TelemetrySnapshot {
    pub fn new(telemetry_secs: f64) -> Self {
        Self {
            telemetry_secs,
            ..Self::default()
        }
    }

    /// Record a value for `channel`.
    pub fn insert(&mut self, channel: impl Into<String>, value: Value, out_of_range: bool) {
        self.entries.insert(
            channel.into(),
            SnapshotEntry {
                value,
                out_of_range,
            },
        );
    }

    /// Record that `channel` had no data at this instant.
    pub fn mark_missing(&mut self, channel: impl Into<String>) {
        self.missing.push(channel.into());
    }

    /// Telemetry time this snapshot was taken at.
    pub fn telemetry_secs(&self) -> f64 {
        self.telemetry_secs
    }

    pub fn entry(&self, channel: &str) -> Option<&SnapshotEntry> {
        self.entries.get(channel)
    }

    pub fn get(&self, channel: &str) -> Option<&Value> {
        self.entries.get(channel).map(|e| &e.value)
    }

    pub fn scalar(&self, channel: &str) -> Option<f64> {
        self.get(channel)?.as_scalar()
    }

    pub fn xy(&self, channel: &str) -> Option<(f64, f64)> {
        self.get(channel)?.as_xy()
    }

    pub fn component(&self, channel: &str, index: usize) -> Option<f64> {
        self.get(channel)?.component(index)
    }

    pub fn is_out_of_range(&self, channel: &str) -> bool {
        self.entries.get(channel).is_some_and(|e| e.out_of_range)
    }

    /// Channels whose value was clamped to a boundary sample, in name order.
    pub fn out_of_range_channels(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.out_of_range)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Channels with no data at this instant.
    pub fn missing_channels(&self) -> &[String] {
        &self.missing
    }

    /// Whether any channel was clamped or missing.
    pub fn has_coverage_gap(&self) -> bool {
        !self.missing.is_empty() || self.entries.values().any(|e| e.out_of_range)
    }

    /// Iterate `(channel, entry)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
