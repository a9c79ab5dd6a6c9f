//! Lap timer with live delta to a reference lap.

use pitwall_common::error::{PitwallError, PitwallResult};
use serde::Deserialize;

use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::font::{draw_text, text_height};
use crate::geometry::Placement;
use crate::layer::{parse_params, LayerFault, OverlayLayer};
use crate::raster::{fill_rounded_rect, Color};

use super::{format_lap_time, require_channel};

const KIND: &str = "lap_timer";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReferenceLap {
    #[serde(default)]
    lap_secs: Option<f64>,
    /// `[progress, elapsed]` pairs with non-decreasing progress.
    #[serde(default)]
    profile: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LapTimerParams {
    /// Current lap number; values `<= 0` mean not in a lap.
    lap_channel: String,
    /// Seconds since the lap started.
    elapsed_channel: String,
    /// Distance into the lap, matched against the reference profile.
    #[serde(default)]
    progress_channel: Option<String>,
    #[serde(default)]
    reference: Option<ReferenceLap>,
    placement: Placement,
    #[serde(default = "default_text_scale")]
    text_scale: u32,
}

fn default_text_scale() -> u32 {
    2
}

/// Shows the lap number, the running lap time, and the delta to a baseline.
#[derive(Debug, Clone)]
pub struct LapTimer {
    params: LapTimerParams,
}

impl LapTimer {
    pub fn configure(params: &serde_json::Value) -> PitwallResult<Self> {
        let params: LapTimerParams = parse_params(KIND, params)?;
        require_channel(KIND, "lap_channel", &params.lap_channel)?;
        require_channel(KIND, "elapsed_channel", &params.elapsed_channel)?;
        if let Some(progress) = &params.progress_channel {
            require_channel(KIND, "progress_channel", progress)?;
        }
        params.placement.validate(KIND)?;
        if !(1..=8).contains(&params.text_scale) {
            return Err(PitwallError::invalid_layer(KIND, "text_scale must be between 1 and 8"));
        }

        if let Some(reference) = &params.reference {
            if let Some(secs) = reference.lap_secs {
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(PitwallError::invalid_layer(
                        KIND,
                        "reference lap_secs must be positive",
                    ));
                }
            }
            let profile = &reference.profile;
            if profile.len() == 1 {
                return Err(PitwallError::invalid_layer(
                    KIND,
                    "reference profile needs at least two points",
                ));
            }
            if profile.iter().flatten().any(|v| !v.is_finite()) {
                return Err(PitwallError::invalid_layer(KIND, "reference profile must be finite"));
            }
            if profile.windows(2).any(|w| w[1][0] < w[0][0]) {
                return Err(PitwallError::invalid_layer(
                    KIND,
                    "reference profile progress must be non-decreasing",
                ));
            }
        }

        Ok(Self { params })
    }

    /// Live delta against the reference profile, when every input is known.
    fn delta(&self, ctx: &RenderContext<'_>, elapsed: f64) -> Option<f64> {
        let profile = &self.params.reference.as_ref()?.profile;
        let progress = ctx.snapshot.scalar(self.params.progress_channel.as_deref()?)?;
        Some(elapsed - profile_elapsed(profile, progress)?)
    }
}

/// Reference elapsed time at `progress`, clamped to the profile ends.
fn profile_elapsed(profile: &[[f64; 2]], progress: f64) -> Option<f64> {
    let first = profile.first()?;
    let last = profile.last()?;
    if progress <= first[0] {
        return Some(first[1]);
    }
    if progress >= last[0] {
        return Some(last[1]);
    }
    let hi = profile.partition_point(|p| p[0] <= progress);
    let (a, b) = (profile[hi - 1], profile[hi]);
    let span = b[0] - a[0];
    if span <= 0.0 {
        return Some(a[1]);
    }
    Some(a[1] + (b[1] - a[1]) * (progress - a[0]) / span)
}

impl OverlayLayer for LapTimer {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn placement(&self) -> Placement {
        self.params.placement
    }

    fn channels(&self) -> Vec<String> {
        let mut channels = vec![
            self.params.lap_channel.clone(),
            self.params.elapsed_channel.clone(),
        ];
        channels.extend(self.params.progress_channel.clone());
        channels
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        let placement = self.params.placement;
        let mut drawing = Drawing::new(&placement);
        let canvas = &mut drawing.canvas;
        fill_rounded_rect(canvas, 0, 0, placement.width, placement.height, 6, Color::PANEL);

        let scale = self.params.text_scale;
        let line = text_height(scale) as i32 + 2 * scale as i32;
        let pad = 2 * scale as i32;

        let lap = ctx.snapshot.scalar(&self.params.lap_channel);
        let elapsed = ctx.snapshot.scalar(&self.params.elapsed_channel);
        for (name, v) in [(&self.params.lap_channel, lap), (&self.params.elapsed_channel, elapsed)] {
            if v.is_some_and(|v| !v.is_finite()) {
                return Err(LayerFault::non_finite(name.as_str()));
            }
        }

        let in_lap = lap.is_some_and(|l| l >= 1.0);
        let (lap_text, time_text) = match (in_lap, lap, elapsed) {
            (true, Some(lap), Some(elapsed)) => (
                format!("LAP {}", lap.round() as i64),
                format_lap_time(elapsed),
            ),
            _ => ("LAP --".to_string(), "-:--.---".to_string()),
        };
        draw_text(canvas, pad, pad, &lap_text, scale, Color::WHITE);
        draw_text(canvas, pad, pad + line, &time_text, scale, Color::WHITE);

        // Neutral when there is no baseline, no progress, or no lap.
        let delta = elapsed.filter(|_| in_lap).and_then(|e| self.delta(ctx, e));
        let (delta_text, delta_color) = match delta {
            Some(d) if d > 0.0 => (format!("+{d:.3}"), Color::RED),
            Some(d) => (format!("{d:.3}"), Color::GREEN),
            None => ("+-.---".to_string(), Color::GREY),
        };
        draw_text(canvas, pad, pad + 2 * line, &delta_text, scale, delta_color);

        if let Some(secs) = self.params.reference.as_ref().and_then(|r| r.lap_secs) {
            let text = format!("REF {}", format_lap_time(secs));
            draw_text(canvas, pad, pad + 3 * line, &text, scale.max(2) - 1, Color::GREY);
        }

        Ok(drawing)
    }
}
