//! Per-frame snapshot resolution and coverage reporting.

use std::sync::Arc;

use pitwall_common::error::PitwallResult;
use pitwall_telemetry_model::{TelemetrySnapshot, TimeSeriesStore};
use serde::Serialize;

use crate::aligner::AlignmentMapping;

/// Interpolates a fixed set of channels at arbitrary telemetry times.
#[derive(Debug, Clone)]
pub struct SnapshotResolver {
    store: Arc<TimeSeriesStore>,
    channels: Vec<String>,
}

impl SnapshotResolver {
    /// Bind `channels`, failing with `ChannelNotFound` for any unknown name.
    pub fn new(store: Arc<TimeSeriesStore>, channels: Vec<String>) -> PitwallResult<Self> {
        for name in &channels {
            store.channel(name)?;
        }
        Ok(Self { store, channels })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }

    /// Snapshot of every bound channel at `telemetry_secs`.
    pub fn snapshot_at(&self, telemetry_secs: f64) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::new(telemetry_secs);
        for name in &self.channels {
            match self
                .store
                .channel(name)
                .ok()
                .and_then(|ch| ch.interpolate(telemetry_secs))
            {
                Some(q) => snapshot.insert(name.as_str(), q.value, q.out_of_range),
                None => snapshot.mark_missing(name.as_str()),
            }
        }
        snapshot
    }

    /// How many mapped frames fall inside each bound channel's span.
    pub fn coverage(&self, mapping: &AlignmentMapping) -> CoverageReport {
        let total_frames = mapping.frame_count();
        let channels = self
            .channels
            .iter()
            .map(|name| {
                let span = self.store.channel(name).ok().and_then(|ch| ch.span());
                let covered_frames = match span {
                    Some((first, last)) => (0..total_frames)
                        .filter_map(|i| mapping.resolve(i))
                        .filter(|t| *t >= first && *t <= last)
                        .count() as u64,
                    None => 0,
                };
                ChannelCoverage {
                    channel: name.clone(),
                    span,
                    covered_frames,
                    uncovered_frames: total_frames - covered_frames,
                }
            })
            .collect();

        CoverageReport {
            total_frames,
            channels,
        }
    }
}

/// Coverage of the mapped frames by each bound channel.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub total_frames: u64,
    pub channels: Vec<ChannelCoverage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelCoverage {
    pub channel: String,
    pub span: Option<(f64, f64)>,
    pub covered_frames: u64,
    pub uncovered_frames: u64,
}

impl CoverageReport {
    /// Whether every bound channel covers every frame.
    pub fn is_complete(&self) -> bool {
        self.channels.iter().all(|c| c.uncovered_frames == 0)
    }

    /// Emit the report through `tracing`.
    pub fn log(&self) {
        for c in &self.channels {
            if c.uncovered_frames > 0 {
                tracing::info!(
                    channel = %c.channel,
                    covered = c.covered_frames,
                    uncovered = c.uncovered_frames,
                    "Channel does not cover every frame; boundary values will be used"
                );
            } else {
                tracing::debug!(channel = %c.channel, frames = c.covered_frames, "Channel covers all frames");
            }
        }
    }
}
