//! Built-in overlay layers.

pub mod chart;
pub mod g_force;
pub mod lap_timer;
pub mod readout;
pub mod speedometer;
pub mod track_map;

pub use chart::Chart;
pub use g_force::GForceMeter;
pub use lap_timer::LapTimer;
pub use readout::TextReadout;
pub use speedometer::Speedometer;
pub use track_map::TrackMap;

use pitwall_common::error::{PitwallError, PitwallResult};

fn require_channel(kind: &str, field: &str, channel: &str) -> PitwallResult<()> {
    if channel.trim().is_empty() {
        return Err(PitwallError::invalid_layer(
            kind,
            format!("'{field}' must name a channel"),
        ));
    }
    Ok(())
}

fn require_finite(kind: &str, field: &str, value: f64) -> PitwallResult<()> {
    if !value.is_finite() {
        return Err(PitwallError::invalid_layer(
            kind,
            format!("'{field}' must be finite, got {value}"),
        ));
    }
    Ok(())
}

/// Format seconds as `m:ss.mmm`.
pub(crate) fn format_lap_time(secs: f64) -> String {
    let millis = (secs.max(0.0) * 1000.0).round() as u64;
    format!(
        "{}:{:02}.{:03}",
        millis / 60_000,
        (millis / 1000) % 60,
        millis % 1000
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{Rgba, RgbaImage};
    use pitwall_telemetry_model::{TelemetrySnapshot, Value};

    use crate::context::RenderContext;

    pub fn frame() -> RgbaImage {
        RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255]))
    }

    pub fn snapshot(t: f64, values: &[(&str, Value)]) -> TelemetrySnapshot {
        let mut snap = TelemetrySnapshot::new(t);
        for (name, value) in values {
            snap.insert(*name, value.clone(), false);
        }
        snap
    }

    pub fn ctx(frame: &RgbaImage, index: u64, snapshot: TelemetrySnapshot) -> RenderContext<'_> {
        RenderContext {
            frame_index: index,
            frame_timestamp_secs: index as f64 / 10.0,
            telemetry_secs: snapshot.telemetry_secs(),
            snapshot,
            frame,
        }
    }

    /// Number of non-transparent pixels.
    pub fn painted(canvas: &RgbaImage) -> usize {
        canvas.pixels().filter(|p| p.0[3] != 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(83.4567), "1:23.457");
        assert_eq!(format_lap_time(5.0), "0:05.000");
        assert_eq!(format_lap_time(-1.0), "0:00.000");
    }
}
