//! Track map with a live position marker.
//!
//! The full path is projected and rasterized once during priming. Each frame
//! copies that outline and adds the marker, so per-frame cost does not depend
//! on session length.

use image::RgbaImage;
use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::TimeSeriesStore;
use serde::Deserialize;

use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::geometry::Placement;
use crate::layer::{parse_params, LayerFault, OverlayLayer};
use crate::raster::{disc, fill_rounded_rect, polyline, ring, Color};

use super::require_channel;

const KIND: &str = "track_map";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Planar coordinates, y up.
    Xy,
    /// `[latitude, longitude]` in degrees.
    LatLon,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrackMapParams {
    channel: String,
    placement: Placement,
    #[serde(default = "default_projection")]
    projection: Projection,
    #[serde(default = "default_max_points")]
    max_path_points: usize,
    #[serde(default = "default_margin")]
    margin: u32,
    #[serde(default = "default_line_width")]
    line_width: f32,
    #[serde(default = "default_track_color")]
    track_color: Color,
    #[serde(default = "default_marker_color")]
    marker_color: Color,
    #[serde(default = "default_marker_radius")]
    marker_radius: f32,
}

fn default_projection() -> Projection {
    Projection::Xy
}

fn default_max_points() -> usize {
    2000
}

fn default_margin() -> u32 {
    8
}

fn default_line_width() -> f32 {
    2.0
}

fn default_track_color() -> Color {
    Color::WHITE
}

fn default_marker_color() -> Color {
    Color::RED
}

fn default_marker_radius() -> f32 {
    5.0
}

/// Uniform scale from projected coordinates into the canvas.
#[derive(Debug, Clone, Copy)]
struct MapTransform {
    min: (f64, f64),
    scale: f64,
    offset: (f64, f64),
    height: f64,
    /// Longitude compression for lat/lon input.
    lon_factor: f64,
}

impl MapTransform {
    fn project(&self, projection: Projection, a: f64, b: f64) -> (f64, f64) {
        match projection {
            Projection::Xy => (a, b),
            Projection::LatLon => (b * self.lon_factor, a),
        }
    }

    /// Projected point to canvas pixels (y down).
    fn to_canvas(&self, p: (f64, f64)) -> (f32, f32) {
        let x = self.offset.0 + (p.0 - self.min.0) * self.scale;
        let y = self.height - (self.offset.1 + (p.1 - self.min.1) * self.scale);
        (x as f32, y as f32)
    }
}

/// Outline of the driven path with the current position marked.
#[derive(Debug, Clone)]
pub struct TrackMap {
    params: TrackMapParams,
    transform: Option<MapTransform>,
    outline: Option<RgbaImage>,
}

impl TrackMap {
    pub fn configure(params: &serde_json::Value) -> PitwallResult<Self> {
        let params: TrackMapParams = parse_params(KIND, params)?;
        require_channel(KIND, "channel", &params.channel)?;
        params.placement.validate(KIND)?;
        if !(2..=100_000).contains(&params.max_path_points) {
            return Err(PitwallError::invalid_layer(
                KIND,
                "max_path_points must be between 2 and 100000",
            ));
        }
        if params.margin * 2 >= params.placement.width.min(params.placement.height) {
            return Err(PitwallError::invalid_layer(KIND, "margin leaves no drawing area"));
        }
        if !(params.line_width.is_finite() && params.line_width > 0.0)
            || !(params.marker_radius.is_finite() && params.marker_radius > 0.0)
        {
            return Err(PitwallError::invalid_layer(
                KIND,
                "line_width and marker_radius must be positive",
            ));
        }
        Ok(Self {
            params,
            transform: None,
            outline: None,
        })
    }
}

impl OverlayLayer for TrackMap {
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
        let channel = store.channel(&self.params.channel)?;
        if channel.dimension() < 2 {
            return Err(PitwallError::invalid_layer(
                KIND,
                format!("channel '{}' must be a 2-D position", channel.name()),
            ));
        }

        let placement = self.params.placement;
        let mut canvas = Drawing::new(&placement).canvas;
        fill_rounded_rect(&mut canvas, 0, 0, placement.width, placement.height, 6, Color::PANEL);

        if channel.is_empty() {
            self.transform = None;
            self.outline = Some(canvas);
            return Ok(());
        }

        let stride = channel.len().div_ceil(self.params.max_path_points).max(1);
        let mut raw: Vec<(f64, f64)> = (0..channel.len())
            .step_by(stride)
            .map(|i| {
                let c = channel.components_at(i);
                (c[0], c[1])
            })
            .collect();
        if (channel.len() - 1) % stride != 0 {
            let c = channel.components_at(channel.len() - 1);
            raw.push((c[0], c[1]));
        }

        let lon_factor = match self.params.projection {
            Projection::Xy => 1.0,
            Projection::LatLon => {
                let mean_lat = raw.iter().map(|(lat, _)| lat).sum::<f64>() / raw.len() as f64;
                mean_lat.to_radians().cos()
            }
        };
        let mut transform = MapTransform {
            min: (0.0, 0.0),
            scale: 1.0,
            offset: (0.0, 0.0),
            height: placement.height as f64,
            lon_factor,
        };
        let projected: Vec<(f64, f64)> = raw
            .iter()
            .map(|&(a, b)| transform.project(self.params.projection, a, b))
            .collect();

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in &projected {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let margin = self.params.margin as f64;
        let avail_w = placement.width as f64 - 2.0 * margin;
        let avail_h = placement.height as f64 - 2.0 * margin;
        let (span_x, span_y) = (max_x - min_x, max_y - min_y);
        let scale = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (avail_w / span_x).min(avail_h / span_y),
            (true, false) => avail_w / span_x,
            (false, true) => avail_h / span_y,
            (false, false) => 1.0,
        };
        transform.min = (min_x, min_y);
        transform.scale = scale;
        transform.offset = (
            margin + (avail_w - span_x * scale) / 2.0,
            margin + (avail_h - span_y * scale) / 2.0,
        );

        let points: Vec<(f32, f32)> = projected.iter().map(|p| transform.to_canvas(*p)).collect();
        polyline(&mut canvas, &points, self.params.line_width, self.params.track_color);

        tracing::debug!(
            channel = %self.params.channel,
            points = points.len(),
            stride,
            "Track outline prepared"
        );
        self.transform = Some(transform);
        self.outline = Some(canvas);
        Ok(())
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        let placement = self.params.placement;
        let outline = self
            .outline
            .as_ref()
            .ok_or_else(|| LayerFault::geometry("track outline was not prepared"))?;
        let mut drawing = Drawing::from_canvas(&placement, outline.clone());

        let (Some(transform), Some((a, b))) = (self.transform, ctx.snapshot.xy(&self.params.channel))
        else {
            return Ok(drawing);
        };
        if !a.is_finite() || !b.is_finite() {
            return Err(LayerFault::non_finite(&self.params.channel));
        }

        let p = transform.to_canvas(transform.project(self.params.projection, a, b));
        disc(&mut drawing.canvas, p, self.params.marker_radius, self.params.marker_color);
        ring(&mut drawing.canvas, p, self.params.marker_radius + 1.0, 1, Color::WHITE);
        Ok(drawing)
    }
}
