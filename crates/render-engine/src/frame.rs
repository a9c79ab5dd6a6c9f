//! Frame buffers flowing through the pipeline.

use image::RgbaImage;
use pitwall_telemetry_model::TelemetrySnapshot;

/// A decoded base video frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Position in the source video, strictly increasing across a session.
    pub index: u64,

    /// Presentation time on the video clock (seconds).
    pub timestamp_secs: f64,

    pub pixels: RgbaImage,
}

impl VideoFrame {
    pub fn new(index: u64, timestamp_secs: f64, pixels: RgbaImage) -> Self {
        Self {
            index,
            timestamp_secs,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// A base frame with every enabled overlay blended on top.
#[derive(Debug, Clone)]
pub struct CompositedFrame {
    pub index: u64,
    pub timestamp_secs: f64,

    /// Telemetry time the overlays were drawn for.
    pub telemetry_secs: f64,

    /// The values the overlays were drawn from.
    pub snapshot: TelemetrySnapshot,

    pub pixels: RgbaImage,
}
