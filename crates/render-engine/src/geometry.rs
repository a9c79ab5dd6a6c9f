//! Layer placement and 2-D helpers.

use pitwall_common::error::{PitwallError, PitwallResult};
use serde::{Deserialize, Serialize};

/// Where a layer draws, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Largest layer canvas edge accepted from configuration.
pub const MAX_LAYER_EDGE: u32 = 8192;

impl Placement {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Reject empty or oversized canvases.
    pub fn validate(&self, layer: &str) -> PitwallResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PitwallError::invalid_layer(
                layer,
                "placement width and height must be non-zero",
            ));
        }
        if self.width > MAX_LAYER_EDGE || self.height > MAX_LAYER_EDGE {
            return Err(PitwallError::invalid_layer(
                layer,
                format!("placement larger than {MAX_LAYER_EDGE}px"),
            ));
        }
        Ok(())
    }

    /// Canvas-local center.
    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    /// Radius of the largest circle that fits, less `margin`.
    pub fn inner_radius(&self, margin: f32) -> f32 {
        (self.width.min(self.height) as f32 / 2.0 - margin).max(1.0)
    }
}

/// Point at `radius` from `center` along `angle_deg`, measured clockwise
/// from 12 o'clock (screen coordinates, y down).
pub fn polar(center: (f32, f32), radius: f32, angle_deg: f32) -> (f32, f32) {
    let rad = angle_deg.to_radians();
    (center.0 + radius * rad.sin(), center.1 - radius * rad.cos())
}

/// Scale `(x, y)` back onto the circle of `radius` if it lies outside.
/// Returns the point and whether it was moved.
pub fn clamp_to_radius(x: f64, y: f64, radius: f64) -> (f64, f64, bool) {
    let norm = (x * x + y * y).sqrt();
    if norm <= radius || norm == 0.0 {
        (x, y, false)
    } else {
        let k = radius / norm;
        (x * k, y * k, true)
    }
}
