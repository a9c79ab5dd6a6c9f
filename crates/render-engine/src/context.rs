//! Per-frame render context.

use image::RgbaImage;
use pitwall_telemetry_model::TelemetrySnapshot;

/// Everything a layer may read while rendering one frame.
///
/// Built fresh for each frame and borrowed by layers for the duration of
/// `render` only; the lifetime keeps layers from holding on to it.
#[derive(Debug)]
pub struct RenderContext<'a> {
    pub frame_index: u64,

    /// Video clock time of the frame.
    pub frame_timestamp_secs: f64,

    /// Telemetry clock time the frame maps to.
    pub telemetry_secs: f64,

    /// Bound channel values at `telemetry_secs`.
    pub snapshot: TelemetrySnapshot,

    /// The undecorated base frame. Read-only.
    pub frame: &'a RgbaImage,
}

impl<'a> RenderContext<'a> {
    pub fn frame_size(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}
