//! Render a session to a PNG sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::Rgba;
use pitwall_common::config::AppConfig;
use pitwall_common::error::PitwallResult;
use pitwall_render_engine::{
    CompositorPipeline, ExportSink, ImageSequenceSource, LayerRegistry, LayerStack,
    PipelineOptions, PngSequenceSink, RenderProgress, SessionSummary, SolidFrameSource,
};
use pitwall_sync_core::{ClockAligner, SyncReference};
use pitwall_telemetry_model::{SessionConfig, TimeSeriesStore};

/// Where frames come from.
enum Input {
    /// Decoded video frames on disk.
    Frames(ImageSequenceSource),
    /// Transparent canvas, for overlay-only output.
    Blank(SolidFrameSource),
}

impl Input {
    fn frame_times(&self) -> Vec<f64> {
        match self {
            Input::Frames(source) => source.frame_times(),
            Input::Blank(source) => source.frame_times(),
        }
    }

    fn run(
        self,
        pipeline: &mut CompositorPipeline,
        sink: &mut dyn ExportSink,
    ) -> PitwallResult<SessionSummary> {
        match self {
            Input::Frames(source) => pipeline.run(source, sink),
            Input::Blank(source) => pipeline.run(source, sink),
        }
    }
}

pub async fn run(
    app: &AppConfig,
    session: PathBuf,
    telemetry: PathBuf,
    output: PathBuf,
    frames: Option<PathBuf>,
    duration: Option<f64>,
) -> anyhow::Result<()> {
    println!("Rendering session at: {}", session.display());

    let config = super::load_session(&session)?;
    let store = super::load_store(&telemetry)?;
    let input = open_input(&config, &store, frames.as_deref(), duration)?;

    let mapping = ClockAligner::build(input.frame_times(), &SyncReference::from(&config.sync))
        .map_err(|e| anyhow::anyhow!("Invalid sync reference: {e}"))?;
    let stack = LayerStack::from_specs(&config.layers, &LayerRegistry::with_builtin())
        .map_err(|e| anyhow::anyhow!("Invalid layer stack: {e}"))?;

    let defaults = config.pipeline.resolve(&app.render);
    let options = PipelineOptions::from_defaults(&defaults).with_trim(config.trim);

    let frames_dir = output.join("frames");
    let mut sink = PngSequenceSink::create(&frames_dir, defaults.png_batch)
        .map_err(|e| anyhow::anyhow!("Failed to create output: {e}"))?;

    let progress_cb = Box::new(|p: RenderProgress| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, {:.1} fps, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_emitted,
            p.total_frames,
            p.fps,
            p.eta_secs,
        );
    });
    let mut pipeline = CompositorPipeline::new(Arc::new(store), mapping, stack, options)
        .with_progress(progress_cb);

    println!("  Output: {}", frames_dir.display());
    println!(
        "  Layers: {} ({} enabled)",
        pipeline.stack().len(),
        pipeline.stack().enabled_count()
    );
    println!("  Frames: {}", pipeline.expected_frames());

    let token = pipeline.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current frame");
            token.cancel();
        }
    });

    let (pipeline, result) = tokio::task::spawn_blocking(move || {
        let result = input.run(&mut pipeline, &mut sink);
        (pipeline, result)
    })
    .await?;
    ctrl_c.abort();

    let report_path = output.join("anomalies.json");
    write_report(&report_path, &config, &pipeline, result.as_ref().ok())?;

    match result {
        Ok(summary) => {
            let verb = if summary.cancelled { "cancelled" } else { "complete" };
            println!("\nRender {verb}: {} frames", summary.frames_emitted);
            println!(
                "  Elapsed: {:.1}s ({:.1} fps)",
                summary.elapsed_secs, summary.average_fps
            );
            if !summary.anomaly_counts.is_empty() {
                println!("  Anomalies:");
                for (kind, count) in &summary.anomaly_counts {
                    println!("    {kind}: {count}");
                }
            }
            println!("  Report: {}", report_path.display());
            Ok(())
        }
        Err(e) => {
            println!("\nRender failed: {e}");
            println!("  Report: {}", report_path.display());
            Err(anyhow::anyhow!("Render failed: {e}"))
        }
    }
}

fn open_input(
    config: &SessionConfig,
    store: &TimeSeriesStore,
    frames: Option<&Path>,
    duration: Option<f64>,
) -> anyhow::Result<Input> {
    match frames {
        Some(dir) => {
            let source = ImageSequenceSource::open(dir, config.output.fps)
                .map_err(|e| anyhow::anyhow!("Failed to open frames: {e}"))?;
            if source.is_empty() {
                anyhow::bail!("No PNG or JPEG frames in {}", dir.display());
            }
            Ok(Input::Frames(source))
        }
        None => {
            let seconds = super::video_duration(duration, store)?;
            let source = SolidFrameSource::new(
                config.output.width,
                config.output.height,
                config.output.fps,
                super::frame_count(seconds, config.output.fps),
                Rgba([0, 0, 0, 0]),
            )
            .map_err(|e| anyhow::anyhow!("Failed to create blank source: {e}"))?;
            Ok(Input::Blank(source))
        }
    }
}

/// Write the session report: summary, final state, and retained anomalies.
fn write_report(
    path: &Path,
    config: &SessionConfig,
    pipeline: &CompositorPipeline,
    summary: Option<&SessionSummary>,
) -> anyhow::Result<()> {
    let report = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "session": config.name,
        "state": pipeline.state(),
        "summary": summary,
        "anomalies_total": pipeline.anomalies().total(),
        "anomalies_dropped": pipeline.anomalies().dropped(),
        "anomalies": pipeline.anomalies().records(),
    });
    std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_sample_session() {
        let dir = tempfile::tempdir().unwrap();
        super::super::init::run(dir.path().to_path_buf(), 20.0).unwrap();

        let out = dir.path().join("render");
        run(
            &AppConfig::default(),
            dir.path().join("session.json"),
            dir.path().join("telemetry.json"),
            out.clone(),
            None,
            Some(1.0),
        )
        .await
        .unwrap();

        assert!(out.join("frames").join("frame_000029.png").exists());
        assert!(!out.join("frames").join("frame_000030.png").exists());

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("anomalies.json")).unwrap())
                .unwrap();
        assert_eq!(report["state"], "done");
        assert_eq!(report["summary"]["frames_emitted"], 30);
        assert_eq!(report["summary"]["cancelled"], false);
    }

    #[tokio::test]
    async fn test_render_from_missing_frames_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        super::super::init::run(dir.path().to_path_buf(), 20.0).unwrap();

        let err = run(
            &AppConfig::default(),
            dir.path().join("session.json"),
            dir.path().join("telemetry.json"),
            dir.path().join("render"),
            Some(dir.path().join("no-such-frames")),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to open frames"));
    }
}
