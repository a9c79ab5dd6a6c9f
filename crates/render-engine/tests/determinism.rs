mod common;

use common::*;
use pitwall_render_engine::PngSequenceSink;

#[test]
fn rerun_is_byte_identical() {
    let mut first = build_pipeline(session_store(), &full_specs(), options(0, 4), 60);
    let mut second = build_pipeline(session_store(), &full_specs(), options(0, 4), 60);
    let (_, a) = render_all(&mut first, 60);
    let (_, b) = render_all(&mut second, 60);

    assert!(pixels_equal(&a, &b));
    assert_eq!(first.anomalies().records(), second.anomalies().records());
}

#[test]
fn parallel_and_sequential_rendering_agree() {
    let mut sequential = build_pipeline(session_store(), &full_specs(), options(1, 0), 60);
    let mut parallel = build_pipeline(session_store(), &full_specs(), options(4, 8), 60);
    let (_, a) = render_all(&mut sequential, 60);
    let (_, b) = render_all(&mut parallel, 60);

    assert!(pixels_equal(&a, &b));
    assert_eq!(
        sequential.anomalies().records(),
        parallel.anomalies().records()
    );
}

#[test]
fn png_sequence_matches_memory_output() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut pipeline = build_pipeline(session_store(), &full_specs(), options(0, 4), 12);
    let mut sink = PngSequenceSink::create(dir.path(), 5).expect("sink dir");
    let summary = pipeline.run(source(12), &mut sink).expect("render succeeds");
    assert_eq!(summary.frames_emitted, 12);
    assert_eq!(sink.written(), 12);

    let mut reference = build_pipeline(session_store(), &full_specs(), options(0, 4), 12);
    let (_, frames) = render_all(&mut reference, 12);
    for frame in &frames {
        let written = image::open(sink.frame_path(frame.index))
            .expect("frame was written")
            .to_rgba8();
        assert_eq!(written, frame.pixels);
    }
}
