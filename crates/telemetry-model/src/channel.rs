//! Named telemetry channels.
//!
//! A channel stores its samples column-wise: one timestamp vector and one
//! flat value vector holding `dimension` components per sample. Timestamps
//! are strictly increasing; gaps are permitted and carry meaning (no sample
//! means no data at that instant, never zero).

use pitwall_common::error::{PitwallError, PitwallResult};

use crate::sample::{lerp, Sample, Value};

/// Result of an interpolation query against a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelQuery {
    /// Interpolated (or boundary-clamped) value.
    pub value: Value,

    /// `true` when the query time fell before the first or after the last
    /// sample and the value was clamped to that boundary sample.
    pub out_of_range: bool,
}

/// An immutable, time-ordered telemetry channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    name: String,
    unit: String,
    dimension: usize,
    times: Vec<f64>,
    values: Vec<f64>,
    max_gap_secs: Option<f64>,
}

impl Channel {
    /// Build a channel from samples, validating ordering and dimension.
    ///
    /// The dimension is taken from the first sample; an empty channel is
    /// scalar. Fails with `InvalidChannel` on non-finite or non-increasing
    /// timestamps, non-finite values, or mixed dimensions.
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        samples: impl IntoIterator<Item = Sample>,
    ) -> PitwallResult<Self> {
        let name = name.into();
        let samples = samples.into_iter();
        let (lower, _) = samples.size_hint();

        let mut dimension = None;
        let mut times = Vec::with_capacity(lower);
        let mut values = Vec::with_capacity(lower);

        for (i, sample) in samples.enumerate() {
            if !sample.t.is_finite() {
                return Err(PitwallError::invalid_channel(
                    &name,
                    format!("sample {i} has non-finite timestamp"),
                ));
            }
            if let Some(&prev) = times.last() {
                if sample.t <= prev {
                    return Err(PitwallError::invalid_channel(
                        &name,
                        format!(
                            "timestamps must be strictly increasing (sample {i}: {} after {prev})",
                            sample.t
                        ),
                    ));
                }
            }
            if !sample.value.is_finite() {
                return Err(PitwallError::invalid_channel(
                    &name,
                    format!("sample {i} has a non-finite value"),
                ));
            }

            let dim = *dimension.get_or_insert(sample.value.dimension());
            if dim == 0 {
                return Err(PitwallError::invalid_channel(
                    &name,
                    "vector samples must have at least one component",
                ));
            }
            if sample.value.dimension() != dim {
                return Err(PitwallError::invalid_channel(
                    &name,
                    format!(
                        "sample {i} has dimension {} but channel dimension is {dim}",
                        sample.value.dimension()
                    ),
                ));
            }

            times.push(sample.t);
            values.extend_from_slice(sample.value.components());
        }

        Ok(Self {
            name,
            unit: unit.into(),
            dimension: dimension.unwrap_or(1),
            times,
            values,
            max_gap_secs: None,
        })
    }

    /// Treat spacing larger than `max_gap_secs` between two samples as a gap
    /// with no data instead of interpolating across it.
    pub fn with_max_gap(mut self, max_gap_secs: Option<f64>) -> Self {
        self.max_gap_secs = max_gap_secs.filter(|g| g.is_finite() && *g > 0.0);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Components per sample (1 for scalar channels).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn max_gap_secs(&self) -> Option<f64> {
        self.max_gap_secs
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sample timestamps.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// First and last sample time.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((*self.times.first()?, *self.times.last()?))
    }

    /// Components of sample `i`.
    pub fn components_at(&self, i: usize) -> &[f64] {
        &self.values[i * self.dimension..(i + 1) * self.dimension]
    }

    /// Value of sample `i`.
    pub fn value_at(&self, i: usize) -> Value {
        Value::from_components(self.components_at(i))
    }

    /// Sample `i`, if it exists.
    pub fn sample(&self, i: usize) -> Option<Sample> {
        (i < self.len()).then(|| Sample::new(self.times[i], self.value_at(i)))
    }

    /// All samples in order.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.len()).map(|i| Sample::new(self.times[i], self.value_at(i)))
    }

    /// Samples with `t0 <= t <= t1`.
    pub fn samples_in(&self, t0: f64, t1: f64) -> impl Iterator<Item = Sample> + '_ {
        let start = self.times.partition_point(|&t| t < t0);
        let end = self.times.partition_point(|&t| t <= t1);
        (start..end.max(start)).map(|i| Sample::new(self.times[i], self.value_at(i)))
    }

    /// Average sample rate over the channel span.
    pub fn average_rate_hz(&self) -> f64 {
        match self.span() {
            Some((first, last)) if last > first => (self.len() - 1) as f64 / (last - first),
            _ => 0.0,
        }
    }

    /// Interpolated value at `t`.
    ///
    /// Returns `None` for an empty channel, a non-finite `t`, or when `t`
    /// falls inside a gap wider than `max_gap_secs`. Outside the sampled span
    /// the value is clamped to the nearest boundary sample and `out_of_range`
    /// is set.
    pub fn interpolate(&self, t: f64) -> Option<ChannelQuery> {
        let (first, last) = self.span()?;
        if !t.is_finite() {
            return None;
        }

        if t < first {
            return Some(ChannelQuery {
                value: self.value_at(0),
                out_of_range: true,
            });
        }
        if t > last {
            return Some(ChannelQuery {
                value: self.value_at(self.len() - 1),
                out_of_range: true,
            });
        }

        // Index of the first sample with time > t; t >= first so hi >= 1.
        let hi = self.times.partition_point(|&st| st <= t);
        let lo = hi - 1;
        if self.times[lo] == t || hi == self.len() {
            return Some(ChannelQuery {
                value: self.value_at(lo),
                out_of_range: false,
            });
        }

        let (t0, t1) = (self.times[lo], self.times[hi]);
        if let Some(max_gap) = self.max_gap_secs {
            if t1 - t0 > max_gap {
                return None;
            }
        }

        let frac = (t - t0) / (t1 - t0);
        let a = self.components_at(lo);
        let b = self.components_at(hi);
        let value = if self.dimension == 1 {
            Value::Scalar(lerp(a[0], b[0], frac))
        } else {
            Value::Vector(a.iter().zip(b).map(|(a, b)| lerp(*a, *b, frac)).collect())
        };

        Some(ChannelQuery {
            value,
            out_of_range: false,
        })
    }
}
