//! Derived channels.
//!
//! Each function reads an existing channel and returns a new one that can be
//! inserted into the store before the session starts. Timestamps are
//! preserved except by [`resample`].

use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::{Channel, Sample, Value};

/// Centered moving average over `window` samples.
///
/// An even window is widened by one so it stays centered. Near the ends the
/// window shrinks to the samples that exist.
pub fn moving_average(channel: &Channel, name: &str, window: usize) -> PitwallResult<Channel> {
    let window = if window % 2 == 0 { window + 1 } else { window };
    let half = window / 2;
    let dim = channel.dimension();
    let n = channel.len();

    // Per-component prefix sums: prefix[i * dim + c] = sum of samples[..i].
    let mut prefix = vec![0.0; (n + 1) * dim];
    for i in 0..n {
        for (c, v) in channel.components_at(i).iter().enumerate() {
            prefix[(i + 1) * dim + c] = prefix[i * dim + c] + v;
        }
    }

    let samples = (0..n).map(|i| {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n - 1) + 1;
        let count = (hi - lo) as f64;
        let mean: Vec<f64> = (0..dim)
            .map(|c| (prefix[hi * dim + c] - prefix[lo * dim + c]) / count)
            .collect();
        Sample::new(channel.times()[i], Value::from_components(&mean))
    });

    Channel::new(name, channel.unit(), samples).map(|ch| ch.with_max_gap(channel.max_gap_secs()))
}

/// Resample onto a uniform grid at `rate_hz` over the channel's span.
///
/// Grid points that fall inside a gap are left out.
pub fn resample(channel: &Channel, name: &str, rate_hz: f64) -> PitwallResult<Channel> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(PitwallError::invalid_channel(
            name,
            format!("resample rate must be positive, got {rate_hz}"),
        ));
    }
    let Some((first, last)) = channel.span() else {
        return Channel::new(name, channel.unit(), Vec::new());
    };

    let count = ((last - first) * rate_hz).floor() as u64 + 1;
    let samples = (0..count).filter_map(|i| {
        let t = first + i as f64 / rate_hz;
        channel
            .interpolate(t)
            .filter(|q| !q.out_of_range)
            .map(|q| Sample::new(t, q.value))
    });
    Channel::new(name, channel.unit(), samples)
}

/// Multiply every component by `factor` and relabel the unit.
pub fn scale(channel: &Channel, name: &str, factor: f64, unit: &str) -> PitwallResult<Channel> {
    let samples = (0..channel.len()).map(|i| {
        let scaled: Vec<f64> = channel.components_at(i).iter().map(|v| v * factor).collect();
        Sample::new(channel.times()[i], Value::from_components(&scaled))
    });
    Channel::new(name, unit, samples).map(|ch| ch.with_max_gap(channel.max_gap_secs()))
}

/// Euclidean norm of each vector sample, as a scalar channel.
pub fn magnitude(channel: &Channel, name: &str) -> PitwallResult<Channel> {
    let samples = (0..channel.len()).map(|i| {
        let norm = channel
            .components_at(i)
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt();
        Sample::scalar(channel.times()[i], norm)
    });
    Channel::new(name, channel.unit(), samples).map(|ch| ch.with_max_gap(channel.max_gap_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(values: &[f64]) -> Channel {
        Channel::new(
            "x",
            "u",
            values.iter().enumerate().map(|(i, v)| Sample::scalar(i as f64, *v)),
        )
        .unwrap()
    }

    fn scalars(ch: &Channel) -> Vec<f64> {
        ch.samples().map(|s| s.value.as_scalar().unwrap()).collect()
    }

    #[test]
    fn test_moving_average_shrinks_at_edges() {
        let ch = moving_average(&ramp(&[0.0, 3.0, 6.0, 9.0, 12.0]), "x_avg", 3).unwrap();
        assert_eq!(scalars(&ch), vec![1.5, 3.0, 6.0, 9.0, 10.5]);
    }

    #[test]
    fn test_even_window_is_widened() {
        let a = moving_average(&ramp(&[1.0, 5.0, 1.0, 5.0]), "a", 2).unwrap();
        let b = moving_average(&ramp(&[1.0, 5.0, 1.0, 5.0]), "b", 3).unwrap();
        assert_eq!(scalars(&a), scalars(&b));
    }

    #[test]
    fn test_moving_average_vector() {
        let ch = Channel::new(
            "acc",
            "g",
            vec![
                Sample::vector(0.0, &[0.0, 2.0]),
                Sample::vector(1.0, &[2.0, 4.0]),
            ],
        )
        .unwrap();
        let avg = moving_average(&ch, "acc_avg", 3).unwrap();
        assert_eq!(avg.value_at(0), Value::Vector(vec![1.0, 3.0]));
    }

    #[test]
    fn test_resample_uniform_grid() {
        let ch = resample(&ramp(&[0.0, 10.0, 20.0]), "x_10hz", 4.0).unwrap();
        assert_eq!(ch.len(), 9);
        assert!((ch.value_at(1).as_scalar().unwrap() - 2.5).abs() < 1e-9);
        assert!(resample(&ramp(&[0.0]), "bad", 0.0).is_err());
    }

    #[test]
    fn test_scale_and_magnitude() {
        let mph = scale(&ramp(&[0.0, 10.0]), "speed_mph", 2.23694, "mph").unwrap();
        assert_eq!(mph.unit(), "mph");
        assert!((mph.value_at(1).as_scalar().unwrap() - 22.3694).abs() < 1e-9);

        let acc = Channel::new("acc", "g", vec![Sample::vector(0.0, &[3.0, 4.0])]).unwrap();
        assert_eq!(magnitude(&acc, "net_g").unwrap().value_at(0), Value::Scalar(5.0));
    }
}
