//! Layer output.

use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::geometry::Placement;

/// A value a layer had to pull back into its displayable range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueClamp {
    pub channel: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// A bounded RGBA region produced by one layer for one frame.
///
/// Positioned at `(x, y)` in frame coordinates and merged onto the base
/// frame by the compositor; layers never touch the base frame directly.
#[derive(Debug, Clone)]
pub struct Drawing {
    pub x: i32,
    pub y: i32,
    pub canvas: RgbaImage,
    pub clamps: Vec<ValueClamp>,
}

impl Drawing {
    /// Transparent canvas covering `placement`.
    pub fn new(placement: &Placement) -> Self {
        Self {
            x: placement.x,
            y: placement.y,
            canvas: RgbaImage::from_pixel(placement.width, placement.height, Rgba([0, 0, 0, 0])),
            clamps: Vec::new(),
        }
    }

    /// Start from an existing canvas (e.g. a cached background).
    pub fn from_canvas(placement: &Placement, canvas: RgbaImage) -> Self {
        Self {
            x: placement.x,
            y: placement.y,
            canvas,
            clamps: Vec::new(),
        }
    }

    pub fn record_clamp(&mut self, channel: &str, value: f64, min: f64, max: f64) {
        self.clamps.push(ValueClamp {
            channel: channel.to_string(),
            value,
            min,
            max,
        });
    }
}
