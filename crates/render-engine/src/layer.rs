//! The overlay layer contract.

use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::TimeSeriesStore;
use serde::de::DeserializeOwned;

use crate::context::RenderContext;
use crate::drawing::Drawing;
use crate::geometry::Placement;

/// A per-frame rendering failure confined to one layer.
///
/// The pipeline skips the layer for that frame and logs the fault; it never
/// aborts the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerFault {
    #[error("non-finite value on channel '{channel}'")]
    NonFinite { channel: String },

    #[error("geometry error: {message}")]
    Geometry { message: String },

    #[error("layer panicked: {message}")]
    Panicked { message: String },
}

impl LayerFault {
    pub fn non_finite(channel: impl Into<String>) -> Self {
        Self::NonFinite {
            channel: channel.into(),
        }
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry {
            message: msg.into(),
        }
    }
}

/// A telemetry widget drawn on top of the video.
///
/// Implementations are configured once, prepared once during priming, and
/// then asked to render every frame. `render` must be bounded: no I/O, no
/// blocking, and no work that grows with session length beyond the layer's
/// own fixed-capacity history.
pub trait OverlayLayer: Send {
    /// Type tag this layer was registered under.
    fn kind(&self) -> &'static str;

    /// Canvas position and size in frame coordinates.
    fn placement(&self) -> Placement;

    /// Channels this layer reads from the snapshot.
    fn channels(&self) -> Vec<String>;

    /// One-time precomputation against the full store.
    fn prepare(&mut self, _store: &TimeSeriesStore) -> PitwallResult<()> {
        Ok(())
    }

    /// Produce this frame's drawing.
    fn render(&mut self, ctx: &RenderContext<'_>) -> Result<Drawing, LayerFault>;
}

/// Deserialize layer parameters, mapping serde errors to `InvalidLayerConfig`.
pub fn parse_params<T: DeserializeOwned>(kind: &str, params: &serde_json::Value) -> PitwallResult<T> {
    serde_json::from_value(params.clone())
        .map_err(|e| PitwallError::invalid_layer(kind, e.to_string()))
}
