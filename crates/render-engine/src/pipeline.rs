//! Frame compositing pipeline.
//!
//! Drives a session from priming to the last exported frame:
//!
//! ```text
//! Idle -> Priming -> Rendering -> Draining -> Done
//!            \           \           \
//!             +-----------+-----------+--> Error
//! ```
//!
//! Decoding runs ahead on a scoped thread through a bounded channel. Within a
//! frame, enabled layers render concurrently and are merged on one thread in
//! paint order, so the output never depends on scheduling.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Sender};
use pitwall_common::clock::{ThroughputMeter, TimeRange};
use pitwall_common::config::RenderDefaults;
use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_sync_core::{AlignmentMapping, SnapshotResolver};
use pitwall_telemetry_model::TimeSeriesStore;
use serde::Serialize;

use crate::anomaly::{AnomalyKind, AnomalyLog};
use crate::compositor::blend_drawing;
use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::frame::{CompositedFrame, VideoFrame};
use crate::layer::LayerFault;
use crate::sink::ExportSink;
use crate::source::FrameSource;
use crate::stack::{LayerStack, StackEntry};

/// Pipeline lifecycle. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Priming,
    Rendering,
    Draining,
    Done,
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Priming => "priming",
            Self::Rendering => "rendering",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Resolved pipeline tuning for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Frames outside this video-time range are skipped.
    pub trim: Option<TimeRange>,

    /// Decoded frames queued ahead of rendering; `0` decodes inline.
    pub lookahead_frames: usize,

    /// Layer render threads per frame; `0` uses the available parallelism.
    pub worker_threads: usize,

    pub anomaly_log_limit: usize,
}

impl PipelineOptions {
    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self {
            trim: None,
            lookahead_frames: defaults.lookahead_frames,
            worker_threads: defaults.worker_threads,
            anomaly_log_limit: defaults.anomaly_log_limit,
        }
    }

    pub fn with_trim(mut self, trim: Option<TimeRange>) -> Self {
        self.trim = trim;
        self
    }

    fn resolved_workers(&self) -> usize {
        match self.worker_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_defaults(&RenderDefaults::default())
    }
}

/// Cooperative cancellation, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress information during a render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderProgress {
    pub frames_emitted: u64,

    /// Frames expected after trimming.
    pub total_frames: u64,

    /// Current progress [0.0, 1.0].
    pub progress: f64,

    pub fps: f64,
    pub eta_secs: f64,
    pub stage: PipelineState,
}

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Outcome of a completed or cancelled run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub frames_emitted: u64,
    pub frames_trimmed: u64,
    pub cancelled: bool,

    /// Anomalies per kind, including ones past the log limit.
    pub anomaly_counts: BTreeMap<String, u64>,
    pub anomalies_dropped: u64,

    pub elapsed_secs: f64,
    pub average_fps: f64,
}

/// One layer's result for one frame.
struct LayerOutput {
    position: usize,
    name: String,
    opacity: f32,
    result: Result<Drawing, LayerFault>,
}

/// How the frame loop ended without a fatal error.
enum LoopEnd {
    Exhausted,
    Cancelled,
}

/// Composites telemetry overlays onto decoded video frames.
pub struct CompositorPipeline {
    store: Arc<TimeSeriesStore>,
    mapping: AlignmentMapping,
    stack: LayerStack,
    options: PipelineOptions,
    state: PipelineState,
    resolver: Option<SnapshotResolver>,
    anomalies: AnomalyLog,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
    last_index: Option<u64>,
    frames_trimmed: u64,
}

impl CompositorPipeline {
    pub fn new(
        store: Arc<TimeSeriesStore>,
        mapping: AlignmentMapping,
        stack: LayerStack,
        options: PipelineOptions,
    ) -> Self {
        let anomalies = AnomalyLog::new(options.anomaly_log_limit);
        Self {
            store,
            mapping,
            stack,
            options,
            state: PipelineState::Idle,
            resolver: None,
            anomalies,
            cancel: CancelToken::new(),
            progress: None,
            last_index: None,
            frames_trimmed: 0,
        }
    }

    /// Set a progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn anomalies(&self) -> &AnomalyLog {
        &self.anomalies
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// Toggle layers or change opacity before rendering starts.
    pub fn stack_mut(&mut self) -> &mut LayerStack {
        &mut self.stack
    }

    pub fn mapping(&self) -> &AlignmentMapping {
        &self.mapping
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::info!(from = %self.state, to = %next, "Pipeline state changed");
        self.state = next;
    }

    /// Validate bindings and prepare every layer.
    ///
    /// Nothing is rendered and no sink is touched; any failure leaves the
    /// pipeline in `Error`.
    pub fn prime(&mut self) -> PitwallResult<()> {
        if self.state != PipelineState::Idle {
            return Err(PitwallError::pipeline(
                "priming",
                None,
                format!("cannot prime from state {}", self.state),
            ));
        }
        self.transition(PipelineState::Priming);

        match self.try_prime() {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Priming failed");
                self.transition(PipelineState::Error);
                Err(e)
            }
        }
    }

    fn try_prime(&mut self) -> PitwallResult<()> {
        let frames = self.mapping.frame_count();
        if frames == 0 {
            return Err(PitwallError::pipeline(
                "priming",
                None,
                "alignment mapping covers no frames",
            ));
        }

        // Disabled layers are validated too so they can be enabled later.
        for entry in self.stack.paint_order() {
            for channel in entry.layer().channels() {
                if !self.store.contains(&channel) {
                    return Err(PitwallError::invalid_layer(
                        entry.name(),
                        format!("bound channel '{channel}' is not in the telemetry store"),
                    ));
                }
            }
        }

        let resolver =
            SnapshotResolver::new(Arc::clone(&self.store), self.stack.enabled_bindings())?;

        let store = &self.store;
        for entry in self.stack.entries_mut() {
            let name = entry.name().to_string();
            entry.layer_mut().prepare(store).map_err(|e| match e {
                PitwallError::InvalidLayerConfig { message, .. } => {
                    PitwallError::invalid_layer(name, message)
                }
                other => other,
            })?;
        }

        resolver.coverage(&self.mapping).log();
        tracing::info!(
            frames,
            layers = self.stack.len(),
            enabled = self.stack.enabled_count(),
            channels = resolver.channels().len(),
            offset_secs = self.mapping.offset_secs(),
            drift_ppm = self.mapping.drift_ppm(),
            "Pipeline primed"
        );
        self.resolver = Some(resolver);
        Ok(())
    }

    /// Follow layers toggled through `stack_mut` after priming.
    fn rebind_enabled(&mut self) -> PitwallResult<()> {
        let enabled = self.stack.enabled_bindings();
        if self
            .resolver
            .as_ref()
            .is_some_and(|r| r.channels() == enabled.as_slice())
        {
            return Ok(());
        }
        tracing::debug!(channels = enabled.len(), "Rebinding resolver to enabled layers");
        self.resolver = Some(SnapshotResolver::new(Arc::clone(&self.store), enabled)?);
        Ok(())
    }

    /// Frames the mapping covers that survive the trim.
    pub fn expected_frames(&self) -> u64 {
        match self.options.trim {
            Some(trim) => self
                .mapping
                .frame_times()
                .iter()
                .filter(|t| trim.contains(**t))
                .count() as u64,
            None => self.mapping.frame_count(),
        }
    }

    /// Render every frame from `source` into `sink`.
    ///
    /// Primes first if needed. A source or sink error is fatal and leaves
    /// the pipeline in `Error`; frames accepted before it stay valid.
    pub fn run<S: FrameSource>(
        &mut self,
        source: S,
        sink: &mut dyn ExportSink,
    ) -> PitwallResult<SessionSummary> {
        if self.state == PipelineState::Idle {
            self.prime()?;
        }
        if self.state != PipelineState::Priming {
            return Err(PitwallError::pipeline(
                "rendering",
                None,
                format!("cannot render from state {}", self.state),
            ));
        }
        self.rebind_enabled()?;
        self.transition(PipelineState::Rendering);

        let mut meter = ThroughputMeter::start();
        let lookahead = self.options.lookahead_frames;
        let outcome = if lookahead == 0 {
            let mut source = source;
            self.frame_loop(|| source.next_frame(), sink, &mut meter)
        } else {
            let (tx, rx) = bounded::<PitwallResult<VideoFrame>>(lookahead);
            let stop = AtomicBool::new(false);
            std::thread::scope(|scope| {
                let stop = &stop;
                scope.spawn(move || decode_ahead(source, tx, stop));

                let result = self.frame_loop(
                    || match rx.recv() {
                        Ok(item) => item.map(Some),
                        // Decoder finished and dropped its sender.
                        Err(_) => Ok(None),
                    },
                    sink,
                    &mut meter,
                );
                stop.store(true, Ordering::SeqCst);
                drop(rx);
                result
            })
        };

        match outcome {
            Ok(LoopEnd::Exhausted) => {
                self.transition(PipelineState::Draining);
                self.report_progress(&meter);
                if let Err(e) = sink.flush() {
                    let err = PitwallError::pipeline("draining", None, e.to_string());
                    tracing::error!(error = %err, "Sink flush failed");
                    self.transition(PipelineState::Error);
                    return Err(err);
                }
                self.transition(PipelineState::Done);
                self.report_progress(&meter);
                Ok(self.summary(&meter, false))
            }
            Ok(LoopEnd::Cancelled) => {
                tracing::warn!(frames = meter.frames(), "Render cancelled");
                if let Err(e) = sink.flush() {
                    tracing::warn!(error = %e, "Sink flush after cancel failed");
                }
                self.transition(PipelineState::Done);
                self.report_progress(&meter);
                Ok(self.summary(&meter, true))
            }
            Err(e) => {
                tracing::error!(error = %e, frames = meter.frames(), "Render failed");
                if let Err(flush_err) = sink.flush() {
                    tracing::warn!(error = %flush_err, "Sink flush after failure failed");
                }
                self.transition(PipelineState::Error);
                Err(e)
            }
        }
    }

    fn frame_loop(
        &mut self,
        mut next: impl FnMut() -> PitwallResult<Option<VideoFrame>>,
        sink: &mut dyn ExportSink,
        meter: &mut ThroughputMeter,
    ) -> PitwallResult<LoopEnd> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(LoopEnd::Cancelled);
            }

            let frame = next().map_err(|e| {
                PitwallError::pipeline("decoding", self.last_index.map(|i| i + 1), e.to_string())
            })?;
            let Some(frame) = frame else {
                return Ok(LoopEnd::Exhausted);
            };

            if let Some(last) = self.last_index {
                if frame.index <= last {
                    return Err(PitwallError::pipeline(
                        "rendering",
                        Some(frame.index),
                        format!("frame index {} does not follow {last}", frame.index),
                    ));
                }
            }
            self.last_index = Some(frame.index);

            if self
                .options
                .trim
                .is_some_and(|trim| !trim.contains(frame.timestamp_secs))
            {
                self.frames_trimmed += 1;
                continue;
            }

            let index = frame.index;
            let composited = self.composite(frame)?;
            sink.accept(composited)
                .map_err(|e| PitwallError::pipeline("export", Some(index), e.to_string()))?;

            meter.tick();
            self.report_progress(meter);
        }
    }

    /// Resolve, render, and merge one frame.
    fn composite(&mut self, frame: VideoFrame) -> PitwallResult<CompositedFrame> {
        let index = frame.index;
        let telemetry_secs = self
            .mapping
            .resolve(index)
            .unwrap_or_else(|| self.mapping.telemetry_time_for_video(frame.timestamp_secs));

        let snapshot = self
            .resolver
            .as_ref()
            .ok_or_else(|| PitwallError::pipeline("rendering", Some(index), "pipeline not primed"))?
            .snapshot_at(telemetry_secs);

        if snapshot.has_coverage_gap() {
            self.anomalies.record(
                index,
                telemetry_secs,
                AnomalyKind::CoverageGap {
                    out_of_range: snapshot.out_of_range_channels(),
                    missing: snapshot.missing_channels().to_vec(),
                },
            );
        }

        let ctx = RenderContext {
            frame_index: index,
            frame_timestamp_secs: frame.timestamp_secs,
            telemetry_secs,
            snapshot,
            frame: &frame.pixels,
        };
        let workers = self.options.resolved_workers();
        let outputs = render_layers(self.stack.entries_mut(), &ctx, workers);
        let RenderContext { snapshot, .. } = ctx;

        let mut pixels = frame.pixels;
        for output in outputs {
            match output.result {
                Ok(drawing) => {
                    blend_drawing(&mut pixels, &drawing, output.opacity);
                    for clamp in drawing.clamps {
                        self.anomalies.record(
                            index,
                            telemetry_secs,
                            AnomalyKind::ValueClamped {
                                layer: output.name.clone(),
                                channel: clamp.channel,
                                value: clamp.value,
                                min: clamp.min,
                                max: clamp.max,
                            },
                        );
                    }
                }
                Err(fault) => self.anomalies.record(
                    index,
                    telemetry_secs,
                    AnomalyKind::LayerSkipped {
                        layer: output.name,
                        reason: fault.to_string(),
                    },
                ),
            }
        }

        Ok(CompositedFrame {
            index,
            timestamp_secs: frame.timestamp_secs,
            telemetry_secs,
            snapshot,
            pixels,
        })
    }

    fn report_progress(&self, meter: &ThroughputMeter) {
        let Some(callback) = &self.progress else {
            return;
        };
        let total = self.expected_frames();
        let emitted = meter.frames();
        callback(RenderProgress {
            frames_emitted: emitted,
            total_frames: total,
            progress: if total == 0 {
                1.0
            } else {
                (emitted as f64 / total as f64).min(1.0)
            },
            fps: meter.fps(),
            eta_secs: meter.eta_secs(total),
            stage: self.state,
        });
    }

    fn summary(&self, meter: &ThroughputMeter, cancelled: bool) -> SessionSummary {
        let summary = SessionSummary {
            frames_emitted: meter.frames(),
            frames_trimmed: self.frames_trimmed,
            cancelled,
            anomaly_counts: self
                .anomalies
                .counts()
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            anomalies_dropped: self.anomalies.dropped(),
            elapsed_secs: meter.elapsed_secs(),
            average_fps: meter.fps(),
        };
        tracing::info!(
            frames = summary.frames_emitted,
            trimmed = summary.frames_trimmed,
            anomalies = self.anomalies.total(),
            cancelled,
            elapsed_secs = summary.elapsed_secs,
            fps = summary.average_fps,
            "Render finished"
        );
        summary
    }
}

fn decode_ahead<S: FrameSource>(
    mut source: S,
    tx: Sender<PitwallResult<VideoFrame>>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        match source.next_frame() {
            Ok(Some(frame)) => {
                // Receiver gone: the renderer stopped early.
                if tx.send(Ok(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}

/// Render every enabled entry, returning outputs in paint order.
fn render_layers(
    entries: &mut [StackEntry],
    ctx: &RenderContext<'_>,
    workers: usize,
) -> Vec<LayerOutput> {
    let mut active: Vec<(usize, &mut StackEntry)> = entries
        .iter_mut()
        .enumerate()
        .filter(|(_, e)| e.is_enabled())
        .collect();
    if active.is_empty() {
        return Vec::new();
    }

    let workers = workers.clamp(1, active.len());
    let mut outputs: Vec<LayerOutput> = if workers == 1 {
        active
            .iter_mut()
            .map(|(position, entry)| render_one(*position, entry, ctx))
            .collect()
    } else {
        let chunk = active.len().div_ceil(workers);
        std::thread::scope(|scope| {
            let handles: Vec<_> = active
                .chunks_mut(chunk)
                .map(|chunk| {
                    let members: Vec<(usize, String, f32)> = chunk
                        .iter()
                        .map(|(position, entry)| {
                            (*position, entry.name().to_string(), entry.opacity())
                        })
                        .collect();
                    let handle = scope.spawn(move || {
                        chunk
                            .iter_mut()
                            .map(|(position, entry)| render_one(*position, entry, ctx))
                            .collect::<Vec<_>>()
                    });
                    (members, handle)
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|(members, h)| worker_outputs(members, h.join()))
                .collect()
        })
    };

    outputs.sort_by_key(|o| o.position);
    outputs
}

fn render_one(position: usize, entry: &mut StackEntry, ctx: &RenderContext<'_>) -> LayerOutput {
    let name = entry.name().to_string();
    let opacity = entry.opacity();
    let layer = entry.layer_mut();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| layer.render(ctx))) {
        Ok(result) => result,
        Err(payload) => Err(LayerFault::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    };
    LayerOutput {
        position,
        name,
        opacity,
        result,
    }
}

/// Outputs of one worker chunk; a worker that died faults every layer it held.
fn worker_outputs(
    members: Vec<(usize, String, f32)>,
    joined: std::thread::Result<Vec<LayerOutput>>,
) -> Vec<LayerOutput> {
    match joined {
        Ok(outputs) => outputs,
        Err(payload) => {
            let message = format!("render worker died: {}", panic_message(payload.as_ref()));
            tracing::error!(layers = members.len(), %message, "Render worker panicked");
            members
                .into_iter()
                .map(|(position, name, opacity)| LayerOutput {
                    position,
                    name,
                    opacity,
                    result: Err(LayerFault::Panicked {
                        message: message.clone(),
                    }),
                })
                .collect()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_options_from_defaults() {
        let options = PipelineOptions::default();
        assert_eq!(options.lookahead_frames, 4);
        assert_eq!(options.anomaly_log_limit, 10_000);
        assert!(options.resolved_workers() >= 1);
        let fixed = PipelineOptions {
            worker_threads: 3,
            ..options
        };
        assert_eq!(fixed.resolved_workers(), 3);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_dead_worker_faults_every_layer_it_held() {
        let members = vec![(1, "speed".to_string(), 1.0), (4, "map".to_string(), 0.5)];
        let payload: Box<dyn Any + Send> = Box::new("worker exploded");
        let outputs = worker_outputs(members, Err(payload));

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].position, 1);
        assert_eq!(outputs[1].name, "map");
        assert_eq!(outputs[1].opacity, 0.5);
        for output in &outputs {
            assert!(matches!(
                &output.result,
                Err(LayerFault::Panicked { message }) if message.contains("worker exploded")
            ));
        }
    }

    #[test]
    fn test_live_worker_outputs_pass_through() {
        let outputs = worker_outputs(vec![(0, "dial".to_string(), 1.0)], Ok(Vec::new()));
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Draining.to_string(), "draining");
    }
}
