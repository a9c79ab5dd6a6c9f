//! Text readout of one or more channel values.

use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::TimeSeriesStore;
use serde::Deserialize;

use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::font::{draw_text, text_height};
use crate::geometry::Placement;
use crate::layer::{parse_params, LayerFault, OverlayLayer};
use crate::raster::{fill_rounded_rect, Color};

use super::{require_channel, require_finite};

const KIND: &str = "readout";
const MAX_LINES: usize = 16;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadoutLine {
    label: String,
    channel: String,
    #[serde(default)]
    component: usize,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default = "default_precision")]
    precision: usize,
    #[serde(default)]
    unit: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadoutParams {
    lines: Vec<ReadoutLine>,
    placement: Placement,
    /// Prepend the frame index and telemetry clock.
    #[serde(default)]
    show_clock: bool,
    #[serde(default = "default_text_scale")]
    text_scale: u32,
    #[serde(default = "default_color")]
    color: Color,
}

fn default_scale() -> f64 {
    1.0
}

fn default_precision() -> usize {
    1
}

fn default_text_scale() -> u32 {
    1
}

fn default_color() -> Color {
    Color::WHITE
}

/// Lines of `LABEL: value UNIT` on a panel.
#[derive(Debug, Clone)]
pub struct TextReadout {
    params: ReadoutParams,
}

impl TextReadout {
    pub fn configure(params: &serde_json::Value) -> PitwallResult<Self> {
        let params: ReadoutParams = parse_params(KIND, params)?;
        params.placement.validate(KIND)?;
        if params.lines.is_empty() || params.lines.len() > MAX_LINES {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!("lines must hold between 1 and {MAX_LINES} entries"),
            ));
        }
        for line in &params.lines {
            require_channel(KIND, "channel", &line.channel)?;
            require_finite(KIND, "scale", line.scale)?;
            if line.precision > 6 {
                return Err(PitwallError::invalid_layer(KIND, "precision must be at most 6"));
            }
        }
        if !(1..=8).contains(&params.text_scale) {
            return Err(PitwallError::invalid_layer(KIND, "text_scale must be between 1 and 8"));
        }
        Ok(Self { params })
    }

    fn format_line(line: &ReadoutLine, value: Option<f64>) -> String {
        let body = match value {
            Some(v) => format!("{:.*}", line.precision, v * line.scale),
            None => "--".to_string(),
        };
        let mut text = format!("{}: {body}", line.label);
        if !line.unit.is_empty() {
            text.push(' ');
            text.push_str(&line.unit);
        }
        text
    }
}

impl OverlayLayer for TextReadout {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn placement(&self) -> Placement {
        self.params.placement
    }

    fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.params.lines.iter().map(|l| l.channel.clone()).collect();
        channels.sort();
        channels.dedup();
        channels
    }

    fn prepare(&mut self, store: &TimeSeriesStore) -> PitwallResult<()> {
        for line in &self.params.lines {
            let dimension = store.channel(&line.channel)?.dimension();
            if line.component >= dimension {
                return Err(PitwallError::invalid_layer(
                    KIND,
                    format!(
                        "line '{}' reads component {} of '{}' ({dimension} components)",
                        line.label, line.component, line.channel
                    ),
                ));
            }
        }
        Ok(())
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        let placement = self.params.placement;
        let mut drawing = Drawing::new(&placement);
        fill_rounded_rect(&mut drawing.canvas, 0, 0, placement.width, placement.height, 4, Color::PANEL);

        let scale = self.params.text_scale;
        let step = text_height(scale) as i32 + 2 * scale as i32;
        let pad = 2 * scale as i32;
        let mut y = pad;

        if self.params.show_clock {
            let clock = format!(
                "F{} T+{}",
                ctx.frame_index,
                super::format_lap_time(ctx.telemetry_secs)
            );
            draw_text(&mut drawing.canvas, pad, y, &clock, scale, Color::GREY);
            y += step;
        }

        for line in &self.params.lines {
            let value = ctx.snapshot.component(&line.channel, line.component);
            if value.is_some_and(|v| !(v * line.scale).is_finite()) {
                return Err(LayerFault::non_finite(&line.channel));
            }
            let text = Self::format_line(line, value);
            draw_text(&mut drawing.canvas, pad, y, &text, scale, self.params.color);
            y += step;
        }

        Ok(drawing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::test_support::{ctx, frame, snapshot};
    use pitwall_telemetry_model::Value;
    use serde_json::json;

    fn readout() -> TextReadout {
        TextReadout::configure(&json!({
            "placement": { "width": 160, "height": 40 },
            "lines": [
                { "label": "SPD", "channel": "speed", "scale": 3.6, "precision": 0, "unit": "KMH" },
                { "label": "RPM", "channel": "rpm" },
                { "label": "THR", "channel": "speed" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_format_line() {
        let layer = readout();
        let line = &layer.params.lines[0];
        assert_eq!(TextReadout::format_line(line, Some(10.0)), "SPD: 36 KMH");
        assert_eq!(TextReadout::format_line(line, None), "SPD: -- KMH");
    }

    #[test]
    fn test_channels_are_deduplicated() {
        assert_eq!(readout().channels(), vec!["rpm".to_string(), "speed".to_string()]);
    }

    #[test]
    fn test_rejects_empty_and_oversized_lines() {
        let empty = json!({ "placement": { "width": 10, "height": 10 }, "lines": [] });
        assert!(TextReadout::configure(&empty).is_err());
        let precise = json!({
            "placement": { "width": 10, "height": 10 },
            "lines": [{ "label": "X", "channel": "x", "precision": 9 }]
        });
        assert!(TextReadout::configure(&precise).is_err());
    }

    #[test]
    fn test_non_finite_value_faults() {
        let mut readout = readout();
        let base = frame();
        let result = readout.render(&ctx(&base, 0, snapshot(0.0, &[("rpm", Value::Scalar(f64::NAN))])));
        assert_eq!(result.unwrap_err(), LayerFault::non_finite("rpm"));
    }
}
