//! Error types shared across Pitwall crates.

use std::path::PathBuf;

/// Top-level error type for Pitwall operations.
#[derive(Debug, thiserror::Error)]
pub enum PitwallError {
    #[error("Channel not found: {name}")]
    ChannelNotFound { name: String },

    #[error("Invalid channel '{name}': {message}")]
    InvalidChannel { name: String, message: String },

    #[error("Invalid layer config for '{layer}': {message}")]
    InvalidLayerConfig { layer: String, message: String },

    #[error("Invalid alignment: {message}")]
    InvalidAlignment { message: String },

    #[error("Pipeline error during {stage}{}: {message}", frame_suffix(.frame_index))]
    Pipeline {
        stage: String,
        frame_index: Option<u64>,
        message: String,
    },

    #[error("Frame source error: {message}")]
    Source { message: String },

    #[error("Export sink error: {message}")]
    Sink { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PitwallError.
pub type PitwallResult<T> = Result<T, PitwallError>;

fn frame_suffix(frame_index: &Option<u64>) -> String {
    match frame_index {
        Some(idx) => format!(" at frame {idx}"),
        None => String::new(),
    }
}

impl PitwallError {
    pub fn channel_not_found(name: impl Into<String>) -> Self {
        Self::ChannelNotFound { name: name.into() }
    }

    pub fn invalid_channel(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidChannel {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_layer(layer: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidLayerConfig {
            layer: layer.into(),
            message: msg.into(),
        }
    }

    pub fn invalid_alignment(msg: impl Into<String>) -> Self {
        Self::InvalidAlignment {
            message: msg.into(),
        }
    }

    pub fn pipeline(
        stage: impl Into<String>,
        frame_index: Option<u64>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            frame_index,
            message: msg.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error belongs to the configuration class (detected before
    /// any frame is rendered).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ChannelNotFound { .. }
                | Self::InvalidChannel { .. }
                | Self::InvalidLayerConfig { .. }
                | Self::InvalidAlignment { .. }
                | Self::Config { .. }
        )
    }
}
