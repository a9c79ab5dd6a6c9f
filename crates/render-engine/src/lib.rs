//! Pitwall Render Engine
//!
//! Draws telemetry widgets and composites them onto decoded video frames.
//!
//! # Pipeline Architecture
//!
//! ```text
//! FrameSource ──(bounded lookahead)──┐
//!                                    ├── resolve telemetry time (AlignmentMapping)
//! TimeSeriesStore ───────────────────┤
//!                                    ├── TelemetrySnapshot
//!                                    │
//!                                    ├── render enabled layers (parallel)
//!                                    │
//!                                    ├── blend in paint order (z_index, insertion)
//!                                    ▼
//!                               ExportSink
//! ```
//!
//! Layers are configured from JSON through a [`LayerRegistry`], held in a
//! [`LayerStack`], and driven by the [`CompositorPipeline`]. Per-frame data
//! problems and layer faults go to the [`AnomalyLog`] instead of aborting.

pub mod anomaly;
pub mod compositor;
pub mod context;
pub mod drawing;
pub mod font;
pub mod frame;
pub mod geometry;
pub mod layer;
pub mod layers;
pub mod pipeline;
pub mod raster;
pub mod registry;
pub mod ring;
pub mod sink;
pub mod source;
pub mod stack;

pub use anomaly::{AnomalyKind, AnomalyLog, AnomalyRecord};
pub use compositor::blend_drawing;
pub use context::RenderContext;
pub use drawing::{Drawing, ValueClamp};
pub use frame::{CompositedFrame, VideoFrame};
pub use geometry::Placement;
pub use layer::{LayerFault, OverlayLayer};
pub use pipeline::{
    CancelToken, CompositorPipeline, PipelineOptions, PipelineState, ProgressCallback,
    RenderProgress, SessionSummary,
};
pub use raster::Color;
pub use registry::LayerRegistry;
pub use ring::HistoryRing;
pub use sink::{ExportSink, MemorySink, PngSequenceSink};
pub use source::{FrameSource, ImageSequenceSource, SolidFrameSource, VecFrameSource};
pub use stack::{LayerStack, StackEntry};
