//! Analog speedometer dial.

use image::RgbaImage;
use pitwall_common::error::{PitwallError, PitwallResult};
use serde::Deserialize;

use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::font::draw_text_centered;
use crate::geometry::{polar, Placement};
use crate::layer::{parse_params, LayerFault, OverlayLayer};
use crate::raster::{arc, disc, thick_line, Color};

use super::{require_channel, require_finite};

const KIND: &str = "speedometer";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpeedometerParams {
    channel: String,
    placement: Placement,
    #[serde(default)]
    min: f64,
    max: f64,
    /// Unit multiplier applied before display (2.23694 for m/s to mph).
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default = "default_sweep")]
    sweep_degrees: f64,
    #[serde(default = "default_ticks")]
    major_ticks: u32,
    #[serde(default)]
    unit_label: String,
    #[serde(default = "default_dial_color")]
    dial_color: Color,
    #[serde(default = "default_needle_color")]
    needle_color: Color,
}

fn default_scale() -> f64 {
    1.0
}

fn default_sweep() -> f64 {
    270.0
}

fn default_ticks() -> u32 {
    10
}

fn default_dial_color() -> Color {
    Color::WHITE
}

fn default_needle_color() -> Color {
    Color::RED
}

/// Needle dial over a fixed `[min, max]` range.
///
/// Values outside the range pin the needle to the nearest stop and are
/// reported as clamps; the numeric readout still shows the true value.
#[derive(Debug, Clone)]
pub struct Speedometer {
    params: SpeedometerParams,
    dial: RgbaImage,
}

impl Speedometer {
    pub fn configure(params: &serde_json::Value) -> PitwallResult<Self> {
        let params: SpeedometerParams = parse_params(KIND, params)?;
        require_channel(KIND, "channel", &params.channel)?;
        params.placement.validate(KIND)?;
        require_finite(KIND, "min", params.min)?;
        require_finite(KIND, "max", params.max)?;
        require_finite(KIND, "scale", params.scale)?;
        if params.min >= params.max {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!("min ({}) must be below max ({})", params.min, params.max),
            ));
        }
        if params.scale == 0.0 {
            return Err(PitwallError::invalid_layer(KIND, "scale must be non-zero"));
        }
        if !(params.sweep_degrees > 0.0 && params.sweep_degrees <= 360.0) {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!("sweep_degrees must be in (0, 360], got {}", params.sweep_degrees),
            ));
        }
        if params.major_ticks > 100 {
            return Err(PitwallError::invalid_layer(KIND, "major_ticks must be at most 100"));
        }

        let dial = draw_dial(&params);
        Ok(Self { params, dial })
    }

    fn start_deg(&self) -> f32 {
        -(self.params.sweep_degrees as f32) / 2.0
    }

    /// Fraction of the sweep for display value `v`, and whether it was clamped.
    pub fn needle_fraction(&self, v: f64) -> (f64, bool) {
        let raw = (v - self.params.min) / (self.params.max - self.params.min);
        let frac = raw.clamp(0.0, 1.0);
        (frac, frac != raw)
    }
}

fn draw_dial(params: &SpeedometerParams) -> RgbaImage {
    let placement = params.placement;
    let mut canvas = Drawing::new(&placement).canvas;
    let center = placement.center();
    let radius = placement.inner_radius(4.0);
    let sweep = params.sweep_degrees as f32;
    let start = -sweep / 2.0;

    disc(&mut canvas, center, radius, Color::PANEL);
    arc(&mut canvas, center, radius - 2.0, start, start + sweep, 3.0, params.dial_color);

    for i in 0..=params.major_ticks {
        let frac = if params.major_ticks == 0 {
            0.0
        } else {
            i as f32 / params.major_ticks as f32
        };
        let angle = start + sweep * frac;
        let outer = polar(center, radius - 4.0, angle);
        let inner = polar(center, radius * 0.82, angle);
        thick_line(&mut canvas, inner, outer, 2.0, params.dial_color);
    }

    if !params.unit_label.is_empty() {
        let y = (center.1 + radius * 0.55) as i32;
        draw_text_centered(&mut canvas, center.0 as i32, y, &params.unit_label, 1, Color::GREY);
    }
    canvas
}

impl OverlayLayer for Speedometer {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn placement(&self) -> Placement {
        self.params.placement
    }

    fn channels(&self) -> Vec<String> {
        vec![self.params.channel.clone()]
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        let placement = self.params.placement;
        let mut drawing = Drawing::from_canvas(&placement, self.dial.clone());

        // No value: the dial is drawn without a needle.
        let Some(raw) = ctx.snapshot.scalar(&self.params.channel) else {
            return Ok(drawing);
        };
        let value = raw * self.params.scale;
        if !value.is_finite() {
            return Err(LayerFault::non_finite(&self.params.channel));
        }

        let (frac, clamped) = self.needle_fraction(value);
        if clamped {
            drawing.record_clamp(&self.params.channel, value, self.params.min, self.params.max);
        }

        let center = placement.center();
        let radius = placement.inner_radius(4.0);
        let angle = self.start_deg() + self.params.sweep_degrees as f32 * frac as f32;
        let tip = polar(center, radius * 0.78, angle);
        thick_line(&mut drawing.canvas, center, tip, 3.0, self.params.needle_color);
        disc(&mut drawing.canvas, center, 4.0, self.params.needle_color);

        let text = format!("{:.0}", value);
        let scale = if radius >= 60.0 { 2 } else { 1 };
        let y = (center.1 + radius * 0.25) as i32;
        draw_text_centered(&mut drawing.canvas, center.0 as i32, y, &text, scale, Color::WHITE);

        Ok(drawing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::test_support::{ctx, frame, painted, snapshot};
    use pitwall_telemetry_model::Value;
    use serde_json::json;

    fn dial() -> Speedometer {
        Speedometer::configure(&json!({
            "channel": "speed",
            "placement": { "x": 10, "y": 10, "width": 120, "height": 120 },
            "max": 120.0
        }))
        .unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = Speedometer::configure(&json!({
            "channel": "speed",
            "placement": { "width": 100, "height": 100 },
            "min": 50.0,
            "max": 10.0
        }))
        .unwrap_err();
        assert!(matches!(err, PitwallError::InvalidLayerConfig { .. }));
    }

    #[test]
    fn test_rejects_bad_sweep_and_unknown_fields() {
        let base = json!({
            "channel": "speed",
            "placement": { "width": 100, "height": 100 },
            "max": 10.0,
            "sweep_degrees": 400.0
        });
        assert!(Speedometer::configure(&base).is_err());
        let unknown = json!({
            "channel": "speed",
            "placement": { "width": 100, "height": 100 },
            "max": 10.0,
            "colour": "red"
        });
        assert!(Speedometer::configure(&unknown).is_err());
    }

    #[test]
    fn test_needle_fraction_clamps() {
        let dial = dial();
        assert_eq!(dial.needle_fraction(60.0), (0.5, false));
        assert_eq!(dial.needle_fraction(150.0), (1.0, true));
        assert_eq!(dial.needle_fraction(-3.0), (0.0, true));
    }

    #[test]
    fn test_render_reports_clamp() {
        let mut dial = dial();
        let base = frame();
        let drawing = dial
            .render(&ctx(&base, 0, snapshot(0.0, &[("speed", Value::Scalar(200.0))])))
            .unwrap();
        assert_eq!(drawing.clamps.len(), 1);
        assert_eq!(drawing.clamps[0].value, 200.0);
        assert_eq!((drawing.x, drawing.y), (10, 10));
    }

    #[test]
    fn test_absent_value_draws_dial_only() {
        let mut dial = dial();
        let base = frame();
        let empty = dial.render(&ctx(&base, 0, snapshot(0.0, &[]))).unwrap();
        let live = dial
            .render(&ctx(&base, 0, snapshot(0.0, &[("speed", Value::Scalar(60.0))])))
            .unwrap();
        assert!(empty.clamps.is_empty());
        assert_eq!(empty.canvas, dial.dial);
        assert_ne!(live.canvas, empty.canvas);
        assert!(painted(&empty.canvas) > 0);
    }
}
