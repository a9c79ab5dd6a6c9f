//! Clock and timing utilities for video/telemetry alignment.
//!
//! Video frames and telemetry samples live on independent clocks. All
//! Pitwall timestamps are `f64` seconds relative to the start of their own
//! stream; this module provides utilities for:
//! - Generating nominal frame timestamps for a constant frame rate
//! - Describing a trim range on the video timeline
//! - Measuring drift between two clocks
//! - Tracking render throughput

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Nominal timestamps for `count` frames at a constant `fps`.
///
/// Frame `i` is stamped `i / fps`, computed by division rather than
/// accumulation so long sequences do not pick up rounding error.
pub fn frame_times(count: u64, fps: f64) -> Vec<f64> {
    if fps <= 0.0 || !fps.is_finite() {
        return Vec::new();
    }
    (0..count).map(|i| i as f64 / fps).collect()
}

/// Inclusive time range on the video timeline used to trim an export.
///
/// Either bound may be left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start_secs: Option<f64>,
    #[serde(default)]
    pub end_secs: Option<f64>,
}

impl TimeRange {
    pub fn new(start_secs: Option<f64>, end_secs: Option<f64>) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// Whether `t` lies inside the range.
    pub fn contains(&self, t: f64) -> bool {
        self.start_secs.map_or(true, |start| t >= start)
            && self.end_secs.map_or(true, |end| t <= end)
    }

    /// A range with `start > end` excludes everything.
    pub fn is_empty(&self) -> bool {
        matches!((self.start_secs, self.end_secs), (Some(s), Some(e)) if s > e)
    }
}

/// Drift measurement between two streams at one matched instant.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Time predicted by the reference model (seconds).
    pub expected_secs: f64,
    /// Time actually observed in the measured stream (seconds).
    pub measured_secs: f64,
}

impl DriftMeasurement {
    /// Drift in seconds (positive = measured is ahead).
    pub fn drift_secs(&self) -> f64 {
        self.measured_secs - self.expected_secs
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_secs() * 1_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

/// Throughput meter for render progress reporting.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    started: Instant,
    frames: u64,
}

impl ThroughputMeter {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            frames: 0,
        }
    }

    /// Record one completed frame.
    pub fn tick(&mut self) {
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Average frames per second since start.
    pub fn fps(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.frames as f64 / elapsed
    }

    /// Estimated seconds remaining to reach `total` frames.
    pub fn eta_secs(&self, total: u64) -> f64 {
        let fps = self.fps();
        if fps <= 0.0 {
            return 0.0;
        }
        total.saturating_sub(self.frames) as f64 / fps
    }
}
