//! Bounded log of data anomalies and per-layer faults.

use std::collections::BTreeMap;

use serde::Serialize;

/// What went wrong on a frame. None of these abort the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Bound channels that were clamped to their boundary or had no value.
    CoverageGap {
        out_of_range: Vec<String>,
        missing: Vec<String>,
    },
    ValueClamped {
        layer: String,
        channel: String,
        value: f64,
        min: f64,
        max: f64,
    },
    LayerSkipped {
        layer: String,
        reason: String,
    },
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CoverageGap { .. } => "coverage_gap",
            Self::ValueClamped { .. } => "value_clamped",
            Self::LayerSkipped { .. } => "layer_skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub frame_index: u64,
    pub telemetry_secs: f64,
    pub kind: AnomalyKind,
}

/// Anomaly records up to `limit`; later records are only counted.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyLog {
    limit: usize,
    records: Vec<AnomalyRecord>,
    counts: BTreeMap<&'static str, u64>,
    dropped: u64,
}

impl AnomalyLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            records: Vec::new(),
            counts: BTreeMap::new(),
            dropped: 0,
        }
    }

    pub fn record(&mut self, frame_index: u64, telemetry_secs: f64, kind: AnomalyKind) {
        match &kind {
            AnomalyKind::CoverageGap {
                out_of_range,
                missing,
            } => tracing::debug!(
                frame = frame_index,
                telemetry_secs,
                ?out_of_range,
                ?missing,
                "Telemetry coverage gap"
            ),
            AnomalyKind::ValueClamped {
                layer,
                channel,
                value,
                min,
                max,
            } => tracing::warn!(
                frame = frame_index,
                layer = %layer,
                channel = %channel,
                value,
                min,
                max,
                "Value clamped to layer range"
            ),
            AnomalyKind::LayerSkipped { layer, reason } => tracing::warn!(
                frame = frame_index,
                layer = %layer,
                reason = %reason,
                "Layer skipped for frame"
            ),
        }

        *self.counts.entry(kind.label()).or_insert(0) += 1;
        if self.records.len() < self.limit {
            self.records.push(AnomalyRecord {
                frame_index,
                telemetry_secs,
                kind,
            });
        } else {
            self.dropped += 1;
        }
    }

    pub fn records(&self) -> &[AnomalyRecord] {
        &self.records
    }

    /// Total anomalies per kind, including ones past the limit.
    pub fn counts(&self) -> &BTreeMap<&'static str, u64> {
        &self.counts
    }

    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Records counted but not stored.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
