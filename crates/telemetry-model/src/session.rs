//! Composition session configuration (`session.json`).
//!
//! A session names the output geometry, how the video clock maps onto the
//! telemetry clock, which overlay layers to draw, and an optional trim.

use std::path::Path;

use pitwall_common::clock::TimeRange;
use pitwall_common::config::RenderDefaults;
use pitwall_common::error::{PitwallError, PitwallResult};
use serde::{Deserialize, Serialize};

/// Top-level session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Human-readable session name.
    pub name: String,

    /// Output frame geometry and rate.
    pub output: OutputConfig,

    /// Video-to-telemetry synchronization reference.
    pub sync: SyncConfig,

    /// Overlay layers, in declaration order.
    #[serde(default)]
    pub layers: Vec<LayerSpec>,

    /// Optional trim on the video timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TimeRange>,

    /// Per-session overrides of the render defaults.
    #[serde(default)]
    pub pipeline: PipelineOverrides,
}

/// Output frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// How the video clock is related to the telemetry clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SyncConfig {
    /// Constant offset: `telemetry = video + offset_secs`.
    Offset { offset_secs: f64 },

    /// One or more matched instants between the two clocks.
    Events { events: Vec<ReferenceEvent> },
}

/// A single matched instant between video and telemetry time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub video_secs: f64,
    pub telemetry_secs: f64,
}

impl ReferenceEvent {
    pub fn new(video_secs: f64, telemetry_secs: f64) -> Self {
        Self {
            label: None,
            video_secs,
            telemetry_secs,
        }
    }

    pub fn labeled(label: impl Into<String>, video_secs: f64, telemetry_secs: f64) -> Self {
        Self {
            label: Some(label.into()),
            video_secs,
            telemetry_secs,
        }
    }
}

/// One overlay layer declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Layer type tag (e.g. "speedometer").
    pub kind: String,

    /// Unique layer name; defaults to `"{kind}#{index}"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub z_index: i32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Variant-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

impl LayerSpec {
    pub fn new(kind: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            z_index: 0,
            enabled: true,
            opacity: 1.0,
            params,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }
}

/// Session-level pipeline settings. Unset fields fall back to the
/// application's render defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookahead_frames: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_log_limit: Option<usize>,
}

impl PipelineOverrides {
    /// Apply these overrides on top of `defaults`.
    pub fn resolve(&self, defaults: &RenderDefaults) -> RenderDefaults {
        RenderDefaults {
            lookahead_frames: self.lookahead_frames.unwrap_or(defaults.lookahead_frames),
            worker_threads: self.worker_threads.unwrap_or(defaults.worker_threads),
            anomaly_log_limit: self.anomaly_log_limit.unwrap_or(defaults.anomaly_log_limit),
            png_batch: defaults.png_batch,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a session from JSON text.
    pub fn from_json_str(json: &str) -> PitwallResult<Self> {
        let session: Self = serde_json::from_str(json)?;
        session.validate()?;
        Ok(session)
    }

    /// Load a session from a file.
    pub fn load(path: &Path) -> PitwallResult<Self> {
        if !path.exists() {
            return Err(PitwallError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Save the session as pretty JSON.
    pub fn save(&self, path: &Path) -> PitwallResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Structural checks that do not need the telemetry store.
    pub fn validate(&self) -> PitwallResult<()> {
        if self.output.width == 0 || self.output.height == 0 {
            return Err(PitwallError::config("output width and height must be non-zero"));
        }
        if !self.output.fps.is_finite() || self.output.fps <= 0.0 {
            return Err(PitwallError::config(format!(
                "output fps must be positive, got {}",
                self.output.fps
            )));
        }
        if let Some(trim) = &self.trim {
            if trim.is_empty() {
                return Err(PitwallError::config("trim start is after trim end"));
            }
        }
        Ok(())
    }
}
