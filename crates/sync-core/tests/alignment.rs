use std::sync::Arc;

use pitwall_common::clock::frame_times;
use pitwall_sync_core::aligner::first_sample_event;
use pitwall_sync_core::laps::{LapDetector, StartGate, LAP_ELAPSED_CHANNEL};
use pitwall_sync_core::{ClockAligner, SnapshotResolver, SyncReference};
use pitwall_telemetry_model::{ReferenceEvent, Sample, TimeSeriesStore};
use proptest::prelude::*;

fn speed_store() -> TimeSeriesStore {
    let mut store = TimeSeriesStore::new();
    store
        .add_channel(
            "speed",
            "m/s",
            (0..=100).map(|i| Sample::scalar(i as f64, i as f64)),
        )
        .expect("speed channel should be valid");
    store
}

#[test]
fn frames_resolve_to_interpolated_speed() {
    let store = Arc::new(speed_store());
    let mapping = ClockAligner::build(frame_times(100, 10.0), &SyncReference::Offset(0.0))
        .expect("offset alignment should build");
    let resolver = SnapshotResolver::new(store, vec!["speed".into()]).expect("speed is bound");

    for (frame, expected) in [(0, 0.0), (50, 5.0), (99, 9.9)] {
        let t = mapping.resolve(frame).expect("frame is mapped");
        let speed = resolver.snapshot_at(t).scalar("speed").expect("speed present");
        assert!((speed - expected).abs() < 1e-9, "frame {frame}: {speed}");
    }
}

#[test]
fn gps_fix_event_pins_video_to_first_sample() {
    let mut store = TimeSeriesStore::new();
    store
        .add_channel(
            "gps",
            "deg",
            (0..10).map(|i| Sample::vector(100.0 + i as f64, &[45.0, 7.0 + i as f64 * 1e-4])),
        )
        .expect("gps channel should be valid");

    let event = first_sample_event(&store, "gps", 2.0).expect("gps has samples");
    let mapping = ClockAligner::build(frame_times(30, 10.0), &SyncReference::Events(vec![event]))
        .expect("single event alignment should build");

    assert!((mapping.resolve(20).expect("frame 20 mapped") - 100.0).abs() < 1e-9);
}

#[test]
fn drift_fit_reduces_late_error() {
    // Telemetry clock runs 500 ppm fast relative to video.
    let events: Vec<_> = (0..5)
        .map(|i| {
            let video = i as f64 * 600.0;
            ReferenceEvent::new(video, 12.0 + video * 1.0005)
        })
        .collect();
    let mapping = ClockAligner::build(frame_times(36_000, 10.0), &SyncReference::Events(events))
        .expect("drift alignment should build");

    let late = mapping.resolve(35_999).expect("last frame mapped");
    let expected = 12.0 + 3599.9 * 1.0005;
    assert!((late - expected).abs() < 1e-6);
    assert!((mapping.drift_ppm() - 500.0).abs() < 1e-3);
}

#[test]
fn derived_lap_channels_feed_the_store() {
    let samples = (0..=200).map(|i| {
        let t = i as f64 * 0.1;
        let angle = std::f64::consts::TAU * t / 10.0 - 1.0;
        Sample::vector(t, &[angle.cos(), angle.sin()])
    });
    let mut store = TimeSeriesStore::new();
    store.add_channel("pos", "m", samples).expect("position is valid");

    let laps = LapDetector::new(StartGate::new([0.5, 0.0], [1.5, 0.0]))
        .detect(store.channel("pos").expect("pos exists"))
        .expect("detection succeeds");
    for channel in laps.channels("m").expect("lap channels build") {
        store.insert(channel).expect("lap channel names are unique");
    }

    let elapsed = store
        .query(LAP_ELAPSED_CHANNEL, 15.0)
        .expect("lap_elapsed exists")
        .expect("lap_elapsed has data");
    assert!(elapsed.value.as_scalar().expect("scalar") < 10.0);
}

proptest! {
    #[test]
    fn resolve_is_strictly_increasing(
        count in 2u64..500,
        fps in 1.0f64..240.0,
        video_a in 0.0f64..100.0,
        span in 1.0f64..1000.0,
        offset in -1000.0f64..1000.0,
        rate in 0.9f64..1.1,
    ) {
        let events = vec![
            ReferenceEvent::new(video_a, offset + rate * video_a),
            ReferenceEvent::new(video_a + span, offset + rate * (video_a + span)),
        ];
        let mapping = ClockAligner::build(frame_times(count, fps), &SyncReference::Events(events))
            .expect("well-formed events align");

        let resolved: Vec<f64> = (0..count).map(|i| mapping.resolve(i).expect("in range")).collect();
        prop_assert!(resolved.windows(2).all(|w| w[1] > w[0]));
        prop_assert!(mapping.resolve(count).is_none());
    }
}
