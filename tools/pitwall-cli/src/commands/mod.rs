pub mod info;
pub mod init;
pub mod render;
pub mod validate;

use std::path::Path;

use pitwall_telemetry_model::{SessionConfig, TelemetryDump, TimeSeriesStore};

pub(crate) fn load_session(path: &Path) -> anyhow::Result<SessionConfig> {
    SessionConfig::load(path).map_err(|e| anyhow::anyhow!("Failed to load session: {e}"))
}

pub(crate) fn load_store(path: &Path) -> anyhow::Result<TimeSeriesStore> {
    let dump =
        TelemetryDump::load(path).map_err(|e| anyhow::anyhow!("Failed to load telemetry: {e}"))?;
    dump.into_store()
        .map_err(|e| anyhow::anyhow!("Invalid telemetry: {e}"))
}

/// Video length to assume when no frames are given: the explicit duration,
/// or the telemetry span.
pub(crate) fn video_duration(duration: Option<f64>, store: &TimeSeriesStore) -> anyhow::Result<f64> {
    let secs = match duration {
        Some(secs) => secs,
        None => {
            let (start, end) = store
                .coverage()
                .ok_or_else(|| anyhow::anyhow!("Telemetry has no samples; pass --duration"))?;
            end - start
        }
    };
    if !secs.is_finite() || secs <= 0.0 {
        anyhow::bail!("Video duration must be positive, got {secs}");
    }
    Ok(secs)
}

/// Frames needed to cover `duration_secs` at `fps`.
pub(crate) fn frame_count(duration_secs: f64, fps: f64) -> u64 {
    (duration_secs * fps).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_telemetry_model::Sample;

    #[test]
    fn test_video_duration_defaults_to_telemetry_span() {
        let mut store = TimeSeriesStore::new();
        store
            .add_channel("speed", "m/s", vec![Sample::scalar(2.0, 0.0), Sample::scalar(12.0, 1.0)])
            .unwrap();
        assert_eq!(video_duration(None, &store).unwrap(), 10.0);
        assert_eq!(video_duration(Some(4.0), &store).unwrap(), 4.0);
        assert!(video_duration(Some(0.0), &store).is_err());
        assert!(video_duration(None, &TimeSeriesStore::new()).is_err());
    }

    #[test]
    fn test_frame_count_rounds_up() {
        assert_eq!(frame_count(10.0, 30.0), 300);
        assert_eq!(frame_count(1.01, 10.0), 11);
    }
}
