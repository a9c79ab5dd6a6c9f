//! JSON telemetry dump format.
//!
//! The camera's raw telemetry container is decoded upstream; this is the
//! canonical hand-off format those tools write:
//!
//! ```json
//! { "channels": [
//!     { "name": "speed", "unit": "m/s", "samples": [ { "t": 0.0, "v": 0.0 } ] },
//!     { "name": "accel", "unit": "g", "samples": [ { "t": 0.0, "v": [0.1, -0.2] } ] }
//! ] }
//! ```

use std::path::Path;

use pitwall_common::error::{PitwallError, PitwallResult};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::sample::Sample;
use crate::store::TimeSeriesStore;

/// A whole telemetry dump.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryDump {
    pub channels: Vec<ChannelDump>,
}

/// One channel in a dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDump {
    pub name: String,

    #[serde(default)]
    pub unit: String,

    /// Spacing above which samples are treated as a gap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gap_secs: Option<f64>,

    pub samples: Vec<Sample>,
}

impl TelemetryDump {
    /// Parse a dump from JSON text.
    pub fn from_json_str(json: &str) -> PitwallResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a dump from a file.
    pub fn load(path: &Path) -> PitwallResult<Self> {
        if !path.exists() {
            return Err(PitwallError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Save the dump as pretty JSON.
    pub fn save(&self, path: &Path) -> PitwallResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Capture an existing store (e.g. after deriving channels).
    pub fn from_store(store: &TimeSeriesStore) -> Self {
        Self {
            channels: store
                .channels()
                .map(|ch| ChannelDump {
                    name: ch.name().to_string(),
                    unit: ch.unit().to_string(),
                    max_gap_secs: ch.max_gap_secs(),
                    samples: ch.samples().collect(),
                })
                .collect(),
        }
    }

    /// Validate every channel and build the session store.
    pub fn into_store(self) -> PitwallResult<TimeSeriesStore> {
        let mut store = TimeSeriesStore::new();
        for dump in self.channels {
            let channel = Channel::new(dump.name, dump.unit, dump.samples)?
                .with_max_gap(dump.max_gap_secs);
            store.insert(channel)?;
        }
        Ok(store)
    }
}
