//! Write a sample session and a synthetic telemetry dump.

use std::f64::consts::TAU;
use std::path::{Path, PathBuf};

use pitwall_sync_core::aligner::first_sample_event;
use pitwall_sync_core::derive;
use pitwall_sync_core::laps::{
    LapDetector, Laps, StartGate, LAP_CHANNEL, LAP_DISTANCE_CHANNEL, LAP_ELAPSED_CHANNEL,
};
use pitwall_telemetry_model::{
    LayerSpec, OutputConfig, PipelineOverrides, Sample, SessionConfig, SyncConfig, TelemetryDump,
    TimeSeriesStore,
};
use serde_json::json;

const TRACK_RADIUS_M: f64 = 80.0;
const LAP_PERIOD_SECS: f64 = 30.0;
const SAMPLE_RATE_HZ: f64 = 10.0;
const GPS_RATE_HZ: f64 = 5.0;
const GRAVITY: f64 = 9.81;

pub fn run(dir: PathBuf, duration: f64) -> anyhow::Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        anyhow::bail!("Duration must be positive, got {duration}");
    }
    println!("Writing sample session to {}", dir.display());
    std::fs::create_dir_all(&dir)?;

    let (store, laps) = synthetic_store(duration)?;
    let session = sample_session(&store, &laps)?;

    let telemetry_path = dir.join("telemetry.json");
    let session_path = dir.join("session.json");
    TelemetryDump::from_store(&store)
        .save(&telemetry_path)
        .map_err(|e| anyhow::anyhow!("Failed to write telemetry: {e}"))?;
    session
        .save(&session_path)
        .map_err(|e| anyhow::anyhow!("Failed to write session: {e}"))?;

    println!("  Telemetry: {} ({} channels)", telemetry_path.display(), store.len());
    println!("  Session: {} ({} layers)", session_path.display(), session.layers.len());
    println!("  Laps completed: {}", laps.completed().len());
    println!();
    println!("Render it with:");
    println!(
        "  pitwall render {} --telemetry {} --output {}",
        session_path.display(),
        telemetry_path.display(),
        display_join(&dir, "render")
    );

    Ok(())
}

fn display_join(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

/// A car circling a round track, with speed, acceleration, position, and
/// lap channels.
///
/// Raw `gps` is logged slower than the other sensors and resampled onto
/// their grid as `pos`.
fn synthetic_store(duration: f64) -> anyhow::Result<(TimeSeriesStore, Laps)> {
    let count = (duration * SAMPLE_RATE_HZ).floor() as u64;
    let times: Vec<f64> = (0..=count).map(|i| i as f64 / SAMPLE_RATE_HZ).collect();
    let omega = TAU / LAP_PERIOD_SECS;

    let mut store = TimeSeriesStore::new();
    let fixes = (duration * GPS_RATE_HZ).floor() as u64;
    store.add_channel(
        "gps",
        "m",
        (0..=fixes).map(|i| {
            let t = i as f64 / GPS_RATE_HZ;
            let angle = omega * t - 1.0;
            Sample::vector(t, &[TRACK_RADIUS_M * angle.cos(), TRACK_RADIUS_M * angle.sin()])
        }),
    )?;
    let pos = derive::resample(store.channel("gps")?, "pos", SAMPLE_RATE_HZ)?;
    store.insert(pos)?;

    let base_speed = omega * TRACK_RADIUS_M;
    store.add_channel(
        "speed_raw",
        "m/s",
        times
            .iter()
            .map(|&t| Sample::scalar(t, base_speed + 3.0 * (omega * 3.0 * t).sin())),
    )?;
    let speed = derive::moving_average(store.channel("speed_raw")?, "speed", 5)?;
    let speed_kmh = derive::scale(&speed, "speed_kmh", 3.6, "km/h")?;
    store.insert(speed)?;
    store.insert(speed_kmh)?;

    store.add_channel(
        "accel",
        "g",
        times.iter().map(|&t| {
            let lateral = base_speed * base_speed / TRACK_RADIUS_M / GRAVITY;
            let longitudinal = 9.0 * omega * (omega * 3.0 * t).cos() / GRAVITY;
            Sample::vector(t, &[lateral, longitudinal])
        }),
    )?;
    let net = derive::magnitude(store.channel("accel")?, "accel_net")?;
    store.insert(net)?;

    let gate = StartGate::new(
        [TRACK_RADIUS_M - 20.0, 0.0],
        [TRACK_RADIUS_M + 20.0, 0.0],
    );
    let laps = LapDetector::new(gate)
        .with_min_lap_secs(5.0)
        .detect(store.channel("pos")?)?;
    for channel in laps.channels("m")? {
        store.insert(channel)?;
    }
    Ok((store, laps))
}

fn sample_session(store: &TimeSeriesStore, laps: &Laps) -> anyhow::Result<SessionConfig> {
    let reference = laps.best_lap().and_then(|best| {
        laps.reference_profile(best.lap)
            .map(|profile| json!({ "lap_secs": best.duration_secs, "profile": profile }))
    });
    let mut lap_timer = json!({
        "lap_channel": LAP_CHANNEL,
        "elapsed_channel": LAP_ELAPSED_CHANNEL,
        "progress_channel": LAP_DISTANCE_CHANNEL,
        "placement": { "x": 1040, "y": 20, "width": 220, "height": 120 }
    });
    if let Some(reference) = reference {
        lap_timer["reference"] = reference;
    }

    Ok(SessionConfig {
        name: "Sample session".to_string(),
        output: OutputConfig {
            width: 1280,
            height: 720,
            fps: 30.0,
        },
        sync: SyncConfig::Events {
            events: vec![first_sample_event(store, "pos", 0.0)?],
        },
        layers: vec![
            LayerSpec::new(
                "speedometer",
                json!({
                    "channel": "speed",
                    "min": 0.0,
                    "max": 40.0,
                    "unit_label": "M/S",
                    "placement": { "x": 20, "y": 500, "width": 200, "height": 200 }
                }),
            )
            .named("speed")
            .with_z_index(1),
            LayerSpec::new(
                "g_force",
                json!({
                    "channel": "accel",
                    "max_g": 1.5,
                    "trail_length": 30,
                    "placement": { "x": 240, "y": 540, "width": 160, "height": 160 }
                }),
            )
            .named("g"),
            LayerSpec::new(
                "track_map",
                json!({
                    "channel": "pos",
                    "placement": { "x": 1060, "y": 500, "width": 200, "height": 200 }
                }),
            )
            .named("map"),
            LayerSpec::new("lap_timer", lap_timer).named("lap").with_z_index(2),
            LayerSpec::new(
                "chart",
                json!({
                    "channel": "speed",
                    "window_secs": 15.0,
                    "label": "SPEED",
                    "placement": { "x": 420, "y": 600, "width": 420, "height": 100 }
                }),
            )
            .named("speed trace"),
            LayerSpec::new(
                "readout",
                json!({
                    "show_clock": true,
                    "text_scale": 2,
                    "lines": [
                        { "label": "SPD", "channel": "speed_kmh", "precision": 0, "unit": "KMH" },
                        { "label": "LAT", "channel": "accel", "component": 0, "precision": 2, "unit": "G" },
                        { "label": "LON", "channel": "accel", "component": 1, "precision": 2, "unit": "G" },
                        { "label": "NET", "channel": "accel_net", "precision": 2, "unit": "G" }
                    ],
                    "placement": { "x": 20, "y": 20, "width": 300, "height": 140 }
                }),
            )
            .named("readout")
            .with_z_index(3),
        ],
        trim: None,
        pipeline: PipelineOverrides::default(),
    })
}
