//! Validate a session against its telemetry without rendering.

use std::path::PathBuf;
use std::sync::Arc;

use pitwall_common::clock::frame_times;
use pitwall_common::config::RenderDefaults;
use pitwall_render_engine::{CompositorPipeline, LayerRegistry, LayerStack, PipelineOptions};
use pitwall_sync_core::{ClockAligner, CoverageReport, SnapshotResolver, SyncReference};

pub fn run(session: PathBuf, telemetry: PathBuf, duration: Option<f64>) -> anyhow::Result<()> {
    println!("Validating session at: {}", session.display());

    let config = super::load_session(&session)?;
    let store = super::load_store(&telemetry)?;

    println!("  Name: {}", config.name);
    println!(
        "  Output: {}x{} @ {}fps",
        config.output.width, config.output.height, config.output.fps
    );
    println!("  Telemetry channels: {}", store.len());

    let seconds = super::video_duration(duration, &store)?;
    let frames = super::frame_count(seconds, config.output.fps);
    let mapping = ClockAligner::build(
        frame_times(frames, config.output.fps),
        &SyncReference::from(&config.sync),
    )
    .map_err(|e| anyhow::anyhow!("Invalid sync reference: {e}"))?;
    println!(
        "  Alignment: offset {:+.3}s, drift {:+.1} ppm over {frames} frames",
        mapping.offset_secs(),
        mapping.drift_ppm()
    );
    if let Some((start, end)) = mapping.telemetry_span() {
        println!("  Telemetry window: {start:.3}s .. {end:.3}s");
    }
    if let Some((first, last)) = store.coverage() {
        println!(
            "  Telemetry on video clock: {:.3}s .. {:.3}s",
            mapping.video_time_for_telemetry(first),
            mapping.video_time_for_telemetry(last)
        );
    }

    let stack = LayerStack::from_specs(&config.layers, &LayerRegistry::with_builtin())
        .map_err(|e| anyhow::anyhow!("Invalid layer stack: {e}"))?;
    println!("\nLayers (paint order):");
    for entry in stack.paint_order() {
        println!(
            "  {:>4}  {:<20} {:<12} opacity {:.2}{}",
            entry.z_index(),
            entry.name(),
            entry.kind(),
            entry.opacity(),
            if entry.is_enabled() { "" } else { "  (disabled)" }
        );
    }

    let store = Arc::new(store);
    let defaults = config.pipeline.resolve(&RenderDefaults::default());
    let options = PipelineOptions::from_defaults(&defaults).with_trim(config.trim);
    let mut pipeline = CompositorPipeline::new(Arc::clone(&store), mapping, stack, options);
    pipeline
        .prime()
        .map_err(|e| anyhow::anyhow!("Session failed to prime: {e}"))?;

    let coverage = SnapshotResolver::new(store, pipeline.stack().enabled_bindings())?
        .coverage(pipeline.mapping());
    print_coverage(&coverage);

    println!("\nSession is valid ({} frames to render).", pipeline.expected_frames());
    Ok(())
}

fn print_coverage(report: &CoverageReport) {
    if report.is_complete() {
        println!("\nCoverage: every bound channel covers all {} frames", report.total_frames);
        return;
    }
    println!("\nCoverage gaps (frames will be logged as anomalies):");
    for channel in report.channels.iter().filter(|c| c.uncovered_frames > 0) {
        println!(
            "  {:<20} {} of {} frames uncovered",
            channel.channel, channel.uncovered_frames, report.total_frames
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_session_validates() {
        let dir = tempfile::tempdir().unwrap();
        super::super::init::run(dir.path().to_path_buf(), 40.0).unwrap();
        run(
            dir.path().join("session.json"),
            dir.path().join("telemetry.json"),
            Some(5.0),
        )
        .unwrap();
    }

    #[test]
    fn test_video_longer_than_telemetry_is_still_valid() {
        let dir = tempfile::tempdir().unwrap();
        super::super::init::run(dir.path().to_path_buf(), 10.0).unwrap();
        run(
            dir.path().join("session.json"),
            dir.path().join("telemetry.json"),
            Some(15.0),
        )
        .unwrap();
    }

    #[test]
    fn test_unknown_channel_fails() {
        let dir = tempfile::tempdir().unwrap();
        super::super::init::run(dir.path().to_path_buf(), 40.0).unwrap();

        let session_path = dir.path().join("session.json");
        let text = std::fs::read_to_string(&session_path).unwrap();
        std::fs::write(&session_path, text.replace("\"pos\"", "\"gnss\"")).unwrap();

        let err = run(session_path, dir.path().join("telemetry.json"), Some(5.0)).unwrap_err();
        assert!(err.to_string().contains("gnss"));
    }
}
