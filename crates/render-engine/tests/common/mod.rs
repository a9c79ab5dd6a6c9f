#![allow(dead_code)]

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use pitwall_common::clock::frame_times;
use pitwall_render_engine::layers::Speedometer;
use pitwall_render_engine::{
    CompositedFrame, CompositorPipeline, Drawing, LayerFault, LayerRegistry, LayerStack,
    MemorySink, OverlayLayer, PipelineOptions, Placement, RenderContext, SessionSummary,
    SolidFrameSource,
};
use pitwall_sync_core::laps::{LapDetector, StartGate};
use pitwall_sync_core::{AlignmentMapping, ClockAligner, SyncReference};
use pitwall_telemetry_model::{LayerSpec, Sample, TimeSeriesStore};
use serde_json::json;

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 180;
pub const FPS: f64 = 10.0;

/// `speed(t) = t` sampled at 1 Hz over `[0, last_secs]`.
pub fn speed_store(last_secs: u32) -> TimeSeriesStore {
    let mut store = TimeSeriesStore::new();
    store
        .add_channel(
            "speed",
            "m/s",
            (0..=last_secs).map(|i| Sample::scalar(i as f64, i as f64)),
        )
        .expect("speed channel should be valid");
    store
}

/// A scalar `speed` channel built from explicit `(t, value)` pairs.
pub fn speed_samples_store(samples: &[(f64, f64)]) -> TimeSeriesStore {
    let mut store = TimeSeriesStore::new();
    store
        .add_channel(
            "speed",
            "km/h",
            samples.iter().map(|&(t, v)| Sample::scalar(t, v)),
        )
        .expect("speed channel should be valid");
    store
}

/// The dial built by [`speedometer_spec`], standalone.
pub fn speedometer() -> Speedometer {
    Speedometer::configure(&speedometer_spec().params).expect("dial params should be valid")
}

/// Twenty seconds of a car lapping a 50 m circle every 10 s.
pub fn session_store() -> TimeSeriesStore {
    let mut store = TimeSeriesStore::new();
    let times: Vec<f64> = (0..=200).map(|i| i as f64 * 0.1).collect();

    store
        .add_channel(
            "speed",
            "m/s",
            times.iter().map(|&t| Sample::scalar(t, 20.0 + 10.0 * (t / 3.0).sin())),
        )
        .expect("speed is valid");
    store
        .add_channel(
            "accel",
            "g",
            times
                .iter()
                .map(|&t| Sample::vector(t, &[1.2 * (t / 2.0).sin(), 0.8 * (t / 2.0).cos()])),
        )
        .expect("accel is valid");
    store
        .add_channel(
            "pos",
            "m",
            times.iter().map(|&t| {
                let angle = std::f64::consts::TAU * t / 10.0 - 1.0;
                Sample::vector(t, &[50.0 * angle.cos(), 50.0 * angle.sin()])
            }),
        )
        .expect("pos is valid");

    let laps = LapDetector::new(StartGate::new([40.0, 0.0], [60.0, 0.0]))
        .detect(store.channel("pos").expect("pos exists"))
        .expect("lap detection succeeds");
    for channel in laps.channels("m").expect("lap channels build") {
        store.insert(channel).expect("lap channel names are unique");
    }
    store
}

pub fn mapping(frames: u64) -> AlignmentMapping {
    ClockAligner::build(frame_times(frames, FPS), &SyncReference::Offset(0.0))
        .expect("offset alignment should build")
}

pub fn source(frames: u64) -> SolidFrameSource {
    SolidFrameSource::new(WIDTH, HEIGHT, FPS, frames, Rgba([20, 40, 60, 255]))
        .expect("solid source should build")
}

pub fn options(worker_threads: usize, lookahead_frames: usize) -> PipelineOptions {
    PipelineOptions {
        trim: None,
        lookahead_frames,
        worker_threads,
        anomaly_log_limit: 10_000,
    }
}

pub fn speedometer_spec() -> LayerSpec {
    LayerSpec::new(
        "speedometer",
        json!({
            "channel": "speed",
            "min": 0.0,
            "max": 120.0,
            "placement": { "x": 10, "y": 10, "width": 120, "height": 120 }
        }),
    )
    .named("dial")
}

/// One of every built-in layer.
pub fn full_specs() -> Vec<LayerSpec> {
    vec![
        speedometer_spec(),
        LayerSpec::new(
            "g_force",
            json!({
                "channel": "accel",
                "max_g": 1.0,
                "trail_length": 20,
                "placement": { "x": 140, "y": 10, "width": 80, "height": 80 }
            }),
        )
        .with_z_index(1),
        LayerSpec::new(
            "track_map",
            json!({
                "channel": "pos",
                "placement": { "x": 230, "y": 10, "width": 80, "height": 80 }
            }),
        ),
        LayerSpec::new(
            "lap_timer",
            json!({
                "lap_channel": "lap",
                "elapsed_channel": "lap_elapsed",
                "progress_channel": "lap_distance",
                "reference": { "lap_secs": 10.0, "profile": [[0.0, 0.0], [314.16, 10.0]] },
                "placement": { "x": 140, "y": 95, "width": 100, "height": 70 }
            }),
        )
        .with_z_index(2),
        LayerSpec::new(
            "chart",
            json!({
                "channel": "speed",
                "window_secs": 5.0,
                "placement": { "x": 10, "y": 135, "width": 120, "height": 40 }
            }),
        ),
        LayerSpec::new(
            "readout",
            json!({
                "show_clock": true,
                "lines": [
                    { "label": "SPD", "channel": "speed", "scale": 3.6, "precision": 0, "unit": "KMH" },
                    { "label": "LON", "channel": "accel", "component": 1, "precision": 2, "unit": "G" }
                ],
                "placement": { "x": 245, "y": 95, "width": 70, "height": 40 }
            }),
        )
        .with_z_index(-1),
    ]
}

pub fn build_pipeline(
    store: TimeSeriesStore,
    specs: &[LayerSpec],
    options: PipelineOptions,
    frames: u64,
) -> CompositorPipeline {
    build_pipeline_with(store, specs, &LayerRegistry::with_builtin(), options, frames)
}

pub fn build_pipeline_with(
    store: TimeSeriesStore,
    specs: &[LayerSpec],
    registry: &LayerRegistry,
    options: PipelineOptions,
    frames: u64,
) -> CompositorPipeline {
    let stack = LayerStack::from_specs(specs, registry).expect("layer specs should build");
    CompositorPipeline::new(Arc::new(store), mapping(frames), stack, options)
}

/// Run to completion into a memory sink.
pub fn render_all(pipeline: &mut CompositorPipeline, frames: u64) -> (SessionSummary, Vec<CompositedFrame>) {
    let mut sink = MemorySink::new();
    let summary = pipeline
        .run(source(frames), &mut sink)
        .expect("render should succeed");
    (summary, sink.into_frames())
}

/// Opaque rectangle of one color; binds no channels.
pub struct SolidLayer {
    pub placement: Placement,
    pub color: [u8; 4],
}

impl OverlayLayer for SolidLayer {
    fn kind(&self) -> &'static str {
        "solid"
    }

    fn placement(&self) -> Placement {
        self.placement
    }

    fn channels(&self) -> Vec<String> {
        Vec::new()
    }

    fn render(&mut self, _ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        let mut drawing = Drawing::new(&self.placement);
        for p in drawing.canvas.pixels_mut() {
            *p = Rgba(self.color);
        }
        Ok(drawing)
    }
}

/// Fails on one frame and panics on another.
pub struct FlakyLayer {
    pub fail_at: u64,
    pub panic_at: u64,
}

impl OverlayLayer for FlakyLayer {
    fn kind(&self) -> &'static str {
        "flaky"
    }

    fn placement(&self) -> Placement {
        Placement::new(0, 0, 4, 4)
    }

    fn channels(&self) -> Vec<String> {
        vec!["speed".to_string()]
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault> {
        if ctx.frame_index == self.fail_at {
            return Err(LayerFault::geometry("forced failure"));
        }
        if ctx.frame_index == self.panic_at {
            panic!("forced panic");
        }
        Ok(Drawing::new(&self.placement()))
    }
}

pub fn pixels_equal(a: &[CompositedFrame], b: &[CompositedFrame]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.index == y.index && x.pixels == y.pixels)
}

pub fn pixel(frame: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
    frame.get_pixel(x, y).0
}
