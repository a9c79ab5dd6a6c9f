//! Scrolling time-series chart.

use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::TimeSeriesStore;
use serde::Deserialize;

use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::font::{draw_text, text_height, text_width};
use crate::geometry::Placement;
use crate::layer::{parse_params, LayerFault, OverlayLayer};
use crate::raster::{fill_rounded_rect, polyline, Color};
use crate::ring::HistoryRing;

use super::{require_channel, require_finite};

const KIND: &str = "chart";
const MAX_WINDOW_SECS: f64 = 600.0;
const MIN_CAPACITY: usize = 2;
const MAX_CAPACITY: usize = 8192;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChartParams {
    channel: String,
    placement: Placement,
    /// Vector component to plot.
    #[serde(default)]
    component: usize,
    #[serde(default = "default_window")]
    window_secs: f64,
    #[serde(default = "default_capacity")]
    capacity: usize,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default = "default_line_color")]
    line_color: Color,
}

fn default_window() -> f64 {
    10.0
}

fn default_capacity() -> usize {
    512
}

fn default_line_color() -> Color {
    Color::GREEN
}

/// Plots the trailing `window_secs` of one channel.
///
/// History is kept in a fixed-capacity ring of `(telemetry_secs, value)`;
/// entries older than the window are evicted every frame.
#[derive(Debug, Clone)]
pub struct Chart {
    params: ChartParams,
    history: HistoryRing<(f64, f64)>,
}

impl Chart {
    pub fn configure(params: &serde_json::Value) -> PitwallResult<Self> {
        let params: ChartParams = parse_params(KIND, params)?;
        require_channel(KIND, "channel", &params.channel)?;
        params.placement.validate(KIND)?;
        require_finite(KIND, "window_secs", params.window_secs)?;
        if params.window_secs <= 0.0 || params.window_secs > MAX_WINDOW_SECS {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!("window_secs must be in (0, {MAX_WINDOW_SECS}]"),
            ));
        }
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&params.capacity) {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!("capacity must be between {MIN_CAPACITY} and {MAX_CAPACITY}"),
            ));
        }
        match (params.min, params.max) {
            (Some(min), Some(max)) => {
                require_finite(KIND, "min", min)?;
                require_finite(KIND, "max", max)?;
                if min >= max {
                    return Err(PitwallError::invalid_layer(KIND, "min must be below max"));
                }
            }
            (None, None) => {}
            _ => {
                return Err(PitwallError::invalid_layer(
                    KIND,
                    "set both min and max, or neither to autoscale",
                ))
            }
        }

        let history = HistoryRing::new(params.capacity);
        Ok(Self { params, history })
    }

    /// Vertical range for the visible history.
    fn value_range(&self) -> (f64, f64) {
        if let (Some(min), Some(max)) = (self.params.min, self.params.max) {
            return (min, max);
        }
        let (lo, hi) = self
            .history
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| {
                (lo.min(*v), hi.max(*v))
            });
        if !lo.is_finite() {
            (0.0, 1.0)
        } else if hi - lo < 1e-9 {
            (lo - 1.0, hi + 1.0)
        } else {
            (lo, hi)
        }
    }
}

impl OverlayLayer for Chart {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn placement(&self) -> Placement {
        self.params.placement
    }

    fn channels(&self) -> Vec<String> {
        vec![self.params.channel.clone()]
    }

    fn prepare(&mut self, store: &TimeSeriesStore) -> PitwallResult<()> {
        let dimension = store.channel(&self.params.channel)?.dimension();
        if self.params.component >= dimension {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!(
                    "component {} out of range for '{}' ({dimension} components)",
                    self.params.component, self.params.channel
                ),
            ));
        }
        self.history.clear();
        Ok(())
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        let placement = self.params.placement;
        let mut drawing = Drawing::new(&placement);
        let now = ctx.telemetry_secs;

        let current = ctx.snapshot.component(&self.params.channel, self.params.component);
        if let Some(v) = current {
            if !v.is_finite() {
                return Err(LayerFault::non_finite(&self.params.channel));
            }
            self.history.push((now, v));
        }
        let window_start = now - self.params.window_secs;
        self.history.evict_while(|(t, _)| *t < window_start);

        let (lo, hi) = self.value_range();
        if let Some(v) = current {
            if v < lo || v > hi {
                drawing.record_clamp(&self.params.channel, v, lo, hi);
            }
        }

        let (w, h) = (placement.width as f32, placement.height as f32);
        fill_rounded_rect(&mut drawing.canvas, 0, 0, placement.width, placement.height, 4, Color::PANEL);

        let pad = 3.0;
        let top = pad + text_height(1) as f32 + 2.0;
        let plot_h = (h - top - pad).max(1.0);
        let plot_w = (w - 2.0 * pad).max(1.0);
        let window = self.params.window_secs;
        let points: Vec<(f32, f32)> = self
            .history
            .iter()
            .map(|(t, v)| {
                let x = pad + ((t - window_start) / window) as f32 * plot_w;
                let frac = ((v - lo) / (hi - lo)).clamp(0.0, 1.0) as f32;
                (x, top + (1.0 - frac) * plot_h)
            })
            .collect();
        polyline(&mut drawing.canvas, &points, 2.0, self.params.line_color);

        let label = self.params.label.as_deref().unwrap_or(&self.params.channel);
        draw_text(&mut drawing.canvas, pad as i32, pad as i32, label, 1, Color::WHITE);
        let value_text = current.map_or_else(|| "--".to_string(), |v| format!("{v:.1}"));
        let x = placement.width as i32 - text_width(&value_text, 1) as i32 - pad as i32;
        draw_text(&mut drawing.canvas, x, pad as i32, &value_text, 1, Color::WHITE);

        Ok(drawing)
    }
}
