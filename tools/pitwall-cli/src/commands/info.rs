//! Show the channels of a telemetry dump.

use std::path::PathBuf;

use pitwall_telemetry_model::TimeSeriesStore;

pub fn run(telemetry: PathBuf) -> anyhow::Result<()> {
    let store = super::load_store(&telemetry)?;

    println!("Telemetry: {}", telemetry.display());
    match store.coverage() {
        Some((start, end)) => println!("  Coverage: {start:.3}s .. {end:.3}s ({:.1}s)", end - start),
        None => println!("  Coverage: none"),
    }
    println!("  Channels: {}", store.len());
    println!();

    for line in channel_table(&store) {
        println!("{line}");
    }

    Ok(())
}

/// One header line plus one row per channel, in name order.
fn channel_table(store: &TimeSeriesStore) -> Vec<String> {
    let mut lines = vec![format!(
        "  {:<16} {:<8} {:>4} {:>8} {:>20} {:>9}",
        "NAME", "UNIT", "DIM", "SAMPLES", "SPAN (s)", "RATE (Hz)"
    )];
    for channel in store.channels() {
        let span = match channel.span() {
            Some((start, end)) => format!("{start:.2} .. {end:.2}"),
            None => "-".to_string(),
        };
        let gap = channel
            .max_gap_secs()
            .map(|g| format!("  (gap > {g}s)"))
            .unwrap_or_default();
        lines.push(format!(
            "  {:<16} {:<8} {:>4} {:>8} {:>20} {:>9.1}{gap}",
            channel.name(),
            channel.unit(),
            channel.dimension(),
            channel.len(),
            span,
            channel.average_rate_hz(),
        ));
    }
    lines
}
