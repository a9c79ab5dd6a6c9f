//! Video-to-telemetry clock alignment.
//!
//! The two clocks start at unrelated instants and may run at slightly
//! different rates. Given an explicit synchronization reference, the aligner
//! produces an [`AlignmentMapping`] that turns a video frame index into a
//! telemetry timestamp:
//!
//! ```text
//! telemetry = offset + rate * video_time(frame)
//! ```
//!
//! One reference event pins the offset. Two or more events also fit the rate
//! by least squares, absorbing clock drift across long recordings.

use pitwall_common::clock::DriftMeasurement;
use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::{ReferenceEvent, SyncConfig, TimeSeriesStore};

use crate::regression::LinearFit;

/// Residual above which a reference event is reported as poorly fitting.
const RESIDUAL_WARN_MS: f64 = 50.0;

/// Slowest telemetry-per-video clock rate a fit may produce.
const MIN_CLOCK_RATE: f64 = 1e-3;

/// Explicit synchronization input.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncReference {
    /// `telemetry = video + offset`.
    Offset(f64),

    /// Matched instants between the two clocks.
    Events(Vec<ReferenceEvent>),
}

impl From<&SyncConfig> for SyncReference {
    fn from(config: &SyncConfig) -> Self {
        match config {
            SyncConfig::Offset { offset_secs } => SyncReference::Offset(*offset_secs),
            SyncConfig::Events { events } => SyncReference::Events(events.clone()),
        }
    }
}

/// Frame-index to telemetry-time mapping for one session.
///
/// Frame times are strictly increasing and `rate > 0`, so
/// [`resolve`](Self::resolve) is strictly increasing in the frame index.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentMapping {
    frame_times: Vec<f64>,
    offset_secs: f64,
    rate: f64,
}

impl AlignmentMapping {
    /// Telemetry time of frame `index`, or `None` past the last frame.
    pub fn resolve(&self, index: u64) -> Option<f64> {
        let video = self.video_time(index)?;
        Some(self.telemetry_time_for_video(video))
    }

    /// Video timestamp of frame `index`.
    pub fn video_time(&self, index: u64) -> Option<f64> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.frame_times.get(i))
            .copied()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_times.len() as u64
    }

    pub fn frame_times(&self) -> &[f64] {
        &self.frame_times
    }

    pub fn offset_secs(&self) -> f64 {
        self.offset_secs
    }

    /// Telemetry seconds per video second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Rate correction in parts per million.
    pub fn drift_ppm(&self) -> f64 {
        (self.rate - 1.0) * 1_000_000.0
    }

    /// Map an arbitrary video instant onto the telemetry clock.
    pub fn telemetry_time_for_video(&self, video_secs: f64) -> f64 {
        self.offset_secs + self.rate * video_secs
    }

    /// Map an arbitrary telemetry instant onto the video clock.
    pub fn video_time_for_telemetry(&self, telemetry_secs: f64) -> f64 {
        (telemetry_secs - self.offset_secs) / self.rate
    }

    /// Telemetry span covered by the mapped frames.
    pub fn telemetry_span(&self) -> Option<(f64, f64)> {
        let first = self.frame_times.first()?;
        let last = self.frame_times.last()?;
        Some((
            self.telemetry_time_for_video(*first),
            self.telemetry_time_for_video(*last),
        ))
    }
}

/// Builds alignment mappings.
pub struct ClockAligner;

impl ClockAligner {
    /// Build the mapping for `frame_times` from an explicit reference.
    ///
    /// Fails with `InvalidAlignment` on empty, non-finite, or non-increasing
    /// frame times, an empty or non-finite event list, events that all share
    /// one video time, or a fitted rate that is not finite or below
    /// `MIN_CLOCK_RATE`.
    pub fn build(frame_times: Vec<f64>, reference: &SyncReference) -> PitwallResult<AlignmentMapping> {
        validate_frame_times(&frame_times)?;

        let (offset_secs, rate) = match reference {
            SyncReference::Offset(offset) => {
                if !offset.is_finite() {
                    return Err(PitwallError::invalid_alignment(format!(
                        "offset must be finite, got {offset}"
                    )));
                }
                (*offset, 1.0)
            }
            SyncReference::Events(events) => fit_events(events)?,
        };

        let mapping = AlignmentMapping {
            frame_times,
            offset_secs,
            rate,
        };

        if let SyncReference::Events(events) = reference {
            report_residuals(&mapping, events);
        }

        tracing::info!(
            frames = mapping.frame_count(),
            offset_secs = mapping.offset_secs,
            drift_ppm = mapping.drift_ppm(),
            "Clock alignment built"
        );
        Ok(mapping)
    }
}

fn validate_frame_times(frame_times: &[f64]) -> PitwallResult<()> {
    if frame_times.is_empty() {
        return Err(PitwallError::invalid_alignment("no video frame times"));
    }
    if let Some(i) = frame_times.iter().position(|t| !t.is_finite()) {
        return Err(PitwallError::invalid_alignment(format!(
            "frame {i} has a non-finite timestamp"
        )));
    }
    if let Some(i) = frame_times.windows(2).position(|w| w[1] <= w[0]) {
        return Err(PitwallError::invalid_alignment(format!(
            "frame times must be strictly increasing (frame {})",
            i + 1
        )));
    }
    Ok(())
}

fn fit_events(events: &[ReferenceEvent]) -> PitwallResult<(f64, f64)> {
    if events.is_empty() {
        return Err(PitwallError::invalid_alignment("no reference events"));
    }
    if events
        .iter()
        .any(|e| !e.video_secs.is_finite() || !e.telemetry_secs.is_finite())
    {
        return Err(PitwallError::invalid_alignment(
            "reference event times must be finite",
        ));
    }

    if let [event] = events {
        return Ok((event.telemetry_secs - event.video_secs, 1.0));
    }

    let points: Vec<(f64, f64)> = events
        .iter()
        .map(|e| (e.video_secs, e.telemetry_secs))
        .collect();
    let fit = LinearFit::fit(&points).ok_or_else(|| {
        PitwallError::invalid_alignment(
            "reference events all share one video time; drift cannot be fitted",
        )
    })?;

    if !fit.slope.is_finite() || fit.slope < MIN_CLOCK_RATE {
        return Err(PitwallError::invalid_alignment(format!(
            "fitted clock rate must be at least {MIN_CLOCK_RATE}, got {}",
            fit.slope
        )));
    }
    Ok((fit.intercept, fit.slope))
}

fn report_residuals(mapping: &AlignmentMapping, events: &[ReferenceEvent]) {
    for event in events {
        let drift = DriftMeasurement {
            expected_secs: mapping.telemetry_time_for_video(event.video_secs),
            measured_secs: event.telemetry_secs,
        };
        if drift.exceeds_threshold_ms(RESIDUAL_WARN_MS) {
            tracing::warn!(
                label = event.label.as_deref().unwrap_or(""),
                video_secs = event.video_secs,
                residual_ms = drift.drift_ms(),
                "Reference event deviates from fitted alignment"
            );
        }
    }
}

/// Reference event pinning the first sample of `channel` to `video_secs`,
/// e.g. the first GPS fix seen on screen.
pub fn first_sample_event(
    store: &TimeSeriesStore,
    channel: &str,
    video_secs: f64,
) -> PitwallResult<ReferenceEvent> {
    let (first, _) = store.channel(channel)?.span().ok_or_else(|| {
        PitwallError::invalid_alignment(format!("channel '{channel}' has no samples"))
    })?;
    Ok(ReferenceEvent::labeled(
        format!("first {channel} sample"),
        video_secs,
        first,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_common::clock::frame_times;
    use pitwall_telemetry_model::Sample;

    #[test]
    fn test_constant_offset() {
        let mapping = ClockAligner::build(frame_times(10, 10.0), &SyncReference::Offset(2.5)).unwrap();
        assert_eq!(mapping.frame_count(), 10);
        assert!((mapping.resolve(4).unwrap() - 2.9).abs() < 1e-12);
        assert!(mapping.resolve(10).is_none());
        assert_eq!(mapping.drift_ppm(), 0.0);
    }

    #[test]
    fn test_single_event_is_offset() {
        let events = vec![ReferenceEvent::new(1.0, 11.0)];
        let mapping = ClockAligner::build(frame_times(5, 1.0), &SyncReference::Events(events)).unwrap();
        assert_eq!(mapping.rate(), 1.0);
        assert!((mapping.offset_secs() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_events_fit_drift() {
        let events = vec![ReferenceEvent::new(0.0, 5.0), ReferenceEvent::new(1000.0, 1006.0)];
        let mapping =
            ClockAligner::build(frame_times(100, 10.0), &SyncReference::Events(events)).unwrap();
        assert!((mapping.rate() - 1.001).abs() < 1e-12);
        assert!((mapping.drift_ppm() - 1000.0).abs() < 1e-6);
        assert!((mapping.telemetry_time_for_video(500.0) - 505.5).abs() < 1e-9);
        assert!((mapping.video_time_for_telemetry(505.5) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_events_at_one_video_time() {
        let events = vec![ReferenceEvent::new(3.0, 5.0), ReferenceEvent::new(3.0, 6.0)];
        let err = ClockAligner::build(frame_times(5, 1.0), &SyncReference::Events(events)).unwrap_err();
        assert!(matches!(err, PitwallError::InvalidAlignment { .. }));
    }

    #[test]
    fn test_rejects_negative_rate() {
        let events = vec![ReferenceEvent::new(0.0, 10.0), ReferenceEvent::new(10.0, 0.0)];
        assert!(ClockAligner::build(frame_times(5, 1.0), &SyncReference::Events(events)).is_err());
    }

    #[test]
    fn test_rejects_vanishing_rate() {
        let events = vec![
            ReferenceEvent::new(0.0, 10.0),
            ReferenceEvent::new(10.0, 10.0 + 1e-310),
        ];
        let err = ClockAligner::build(frame_times(5, 1.0), &SyncReference::Events(events)).unwrap_err();
        assert!(matches!(err, PitwallError::InvalidAlignment { .. }));

        let events = vec![ReferenceEvent::new(0.0, 0.0), ReferenceEvent::new(10.0, 0.001)];
        assert!(ClockAligner::build(frame_times(5, 1.0), &SyncReference::Events(events)).is_err());
    }

    #[test]
    fn test_accepts_slow_motion_rate() {
        let events = vec![ReferenceEvent::new(0.0, 0.0), ReferenceEvent::new(8.0, 1.0)];
        let mapping = ClockAligner::build(frame_times(5, 1.0), &SyncReference::Events(events)).unwrap();
        assert!((mapping.rate() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_frame_times() {
        let offset = SyncReference::Offset(0.0);
        assert!(ClockAligner::build(Vec::new(), &offset).is_err());
        assert!(ClockAligner::build(vec![0.0, 0.1, 0.1], &offset).is_err());
        assert!(ClockAligner::build(vec![0.0, f64::NAN], &offset).is_err());
        assert!(ClockAligner::build(vec![0.0], &SyncReference::Events(Vec::new())).is_err());
    }

    #[test]
    fn test_first_sample_event() {
        let mut store = TimeSeriesStore::new();
        store
            .add_channel("gps", "deg", vec![Sample::vector(42.0, &[1.0, 2.0])])
            .unwrap();
        let event = first_sample_event(&store, "gps", 3.0).unwrap();
        assert_eq!(event.telemetry_secs, 42.0);
        assert_eq!(event.video_secs, 3.0);
        assert!(first_sample_event(&store, "speed", 3.0).is_err());
    }
}
