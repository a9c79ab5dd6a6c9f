//! G-force (friction circle) meter.

use image::RgbaImage;
use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::TimeSeriesStore;
use serde::Deserialize;

use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::font::{draw_text_centered, text_height};
use crate::geometry::{clamp_to_radius, Placement};
use crate::layer::{parse_params, LayerFault, OverlayLayer};
use crate::raster::{disc, ring, thick_line, Color};
use crate::ring::HistoryRing;

use super::{require_channel, require_finite};

const KIND: &str = "g_force";
const MAX_TRAIL: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct GForceParams {
    /// Vector channel of (lateral, longitudinal) acceleration in g.
    channel: String,
    placement: Placement,
    #[serde(default = "default_max_g")]
    max_g: f64,
    #[serde(default = "default_trail")]
    trail_length: usize,
    #[serde(default)]
    lateral_component: usize,
    #[serde(default = "default_longitudinal")]
    longitudinal_component: usize,
    #[serde(default = "default_dot_color")]
    dot_color: Color,
    #[serde(default = "default_trail_color")]
    trail_color: Color,
}

fn default_max_g() -> f64 {
    1.5
}

fn default_trail() -> usize {
    60
}

fn default_longitudinal() -> usize {
    1
}

fn default_dot_color() -> Color {
    Color::RED
}

fn default_trail_color() -> Color {
    Color::YELLOW
}

/// Plots combined lateral and longitudinal load with a fading trail.
#[derive(Debug, Clone)]
pub struct GForceMeter {
    params: GForceParams,
    background: RgbaImage,
    trail: HistoryRing<(f64, f64)>,
}

impl GForceMeter {
    pub fn configure(params: &serde_json::Value) -> PitwallResult<Self> {
        let params: GForceParams = parse_params(KIND, params)?;
        require_channel(KIND, "channel", &params.channel)?;
        params.placement.validate(KIND)?;
        require_finite(KIND, "max_g", params.max_g)?;
        if params.max_g <= 0.0 {
            return Err(PitwallError::invalid_layer(KIND, "max_g must be positive"));
        }
        if params.trail_length > MAX_TRAIL {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!("trail_length must be at most {MAX_TRAIL}"),
            ));
        }
        if params.lateral_component == params.longitudinal_component {
            return Err(PitwallError::invalid_layer(
                KIND,
                "lateral and longitudinal components must differ",
            ));
        }

        let background = draw_background(&params);
        let trail = HistoryRing::new(params.trail_length);
        Ok(Self {
            params,
            background,
            trail,
        })
    }

    /// Plot radius in pixels.
    fn radius(&self) -> f32 {
        plot_radius(&self.params.placement)
    }

    fn to_canvas(&self, lat: f64, lon: f64) -> (f32, f32) {
        let (cx, cy) = self.params.placement.center();
        let k = self.radius() as f64 / self.params.max_g;
        // Forward acceleration plots upward.
        (cx + (lat * k) as f32, cy - (lon * k) as f32)
    }
}

fn plot_radius(placement: &Placement) -> f32 {
    placement.inner_radius(4.0 + text_height(1) as f32)
}

fn draw_background(params: &GForceParams) -> RgbaImage {
    let placement = params.placement;
    let mut canvas = Drawing::new(&placement).canvas;
    let center = placement.center();
    let radius = plot_radius(&placement);

    disc(&mut canvas, center, radius, Color::PANEL);
    ring(&mut canvas, center, radius, 2, Color::WHITE);

    // One ring per whole g inside the plot.
    let whole = params.max_g.floor() as u32;
    for g in 1..=whole {
        let r = radius * (g as f64 / params.max_g) as f32;
        if (r - radius).abs() > 1.0 {
            ring(&mut canvas, center, r, 1, Color::GREY);
        }
    }

    thick_line(&mut canvas, (center.0 - radius, center.1), (center.0 + radius, center.1), 1.0, Color::GREY);
    thick_line(&mut canvas, (center.0, center.1 - radius), (center.0, center.1 + radius), 1.0, Color::GREY);
    canvas
}

impl OverlayLayer for GForceMeter {
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
        let needed = self.params.lateral_component.max(self.params.longitudinal_component) + 1;
        if dimension < needed {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!(
                    "channel '{}' has {dimension} components, need {needed}",
                    self.params.channel
                ),
            ));
        }
        self.trail.clear();
        Ok(())
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        let placement = self.params.placement;
        let mut drawing = Drawing::from_canvas(&placement, self.background.clone());

        let current = match (
            ctx.snapshot.component(&self.params.channel, self.params.lateral_component),
            ctx.snapshot.component(&self.params.channel, self.params.longitudinal_component),
        ) {
            (Some(lat), Some(lon)) => {
                if !lat.is_finite() || !lon.is_finite() {
                    return Err(LayerFault::non_finite(&self.params.channel));
                }
                let (x, y, clamped) = clamp_to_radius(lat, lon, self.params.max_g);
                if clamped {
                    let net = (lat * lat + lon * lon).sqrt();
                    drawing.record_clamp(&self.params.channel, net, 0.0, self.params.max_g);
                }
                self.trail.push((x, y));
                Some(((x, y), (lat * lat + lon * lon).sqrt()))
            }
            _ => None,
        };

        // The newest trail point is the current dot when there is one.
        let n = self.trail.len();
        let shown = n.saturating_sub(usize::from(current.is_some()));
        for (i, &(lat, lon)) in self.trail.iter().enumerate().take(shown) {
            let mut color = self.params.trail_color;
            color.0[3] = (40 + 180 * (i + 1) / n.max(1)) as u8;
            disc(&mut drawing.canvas, self.to_canvas(lat, lon), 2.0, color);
        }

        if let Some(((lat, lon), net)) = current {
            disc(&mut drawing.canvas, self.to_canvas(lat, lon), 5.0, self.params.dot_color);
            let (cx, _) = placement.center();
            let y = placement.height as i32 - text_height(1) as i32 - 1;
            draw_text_centered(&mut drawing.canvas, cx as i32, y, &format!("{net:.2}G"), 1, Color::WHITE);
        }

        Ok(drawing)
    }
}
