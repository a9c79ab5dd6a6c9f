//! The session's time-series store.

use std::collections::BTreeMap;

use pitwall_common::error::{PitwallError, PitwallResult};

use crate::channel::{Channel, ChannelQuery};
use crate::sample::Sample;

/// Read-only collection of named channels for one composition session.
///
/// Built once from upstream input, then shared (behind `Arc`) by the
/// aligner, the snapshot resolver, and every layer without locking.
/// Channels iterate in name order so everything derived from the store
/// is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    channels: BTreeMap<String, Channel>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `samples` into a channel and add it under `name`.
    pub fn add_channel(
        &mut self,
        name: impl Into<String>,
        unit: impl Into<String>,
        samples: impl IntoIterator<Item = Sample>,
    ) -> PitwallResult<()> {
        let channel = Channel::new(name, unit, samples)?;
        self.insert(channel)
    }

    /// Add a pre-built channel (e.g. a derived one).
    pub fn insert(&mut self, channel: Channel) -> PitwallResult<()> {
        if self.channels.contains_key(channel.name()) {
            return Err(PitwallError::invalid_channel(
                channel.name(),
                "a channel with this name already exists",
            ));
        }
        tracing::debug!(
            channel = channel.name(),
            unit = channel.unit(),
            samples = channel.len(),
            dimension = channel.dimension(),
            "Channel added"
        );
        self.channels.insert(channel.name().to_string(), channel);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Look up a channel by name.
    pub fn channel(&self, name: &str) -> PitwallResult<&Channel> {
        self.channels
            .get(name)
            .ok_or_else(|| PitwallError::channel_not_found(name))
    }

    /// All channels in name order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Channel names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Interpolated value of channel `name` at time `t`.
    ///
    /// `Ok(None)` means the channel exists but has no data at `t`.
    pub fn query(&self, name: &str, t: f64) -> PitwallResult<Option<ChannelQuery>> {
        Ok(self.channel(name)?.interpolate(t))
    }

    /// Samples of channel `name` with `t0 <= t <= t1`.
    pub fn range(&self, name: &str, t0: f64, t1: f64) -> PitwallResult<Vec<Sample>> {
        Ok(self.channel(name)?.samples_in(t0, t1).collect())
    }

    /// Union span of all non-empty channels.
    pub fn coverage(&self) -> Option<(f64, f64)> {
        self.channels
            .values()
            .filter_map(Channel::span)
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
    }
}
