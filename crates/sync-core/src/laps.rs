//! Lap detection from a position channel.
//!
//! A lap starts each time the position trace crosses the start/finish gate,
//! a line segment across the track. Crossing times are interpolated inside
//! the sample interval that straddles the gate, so lap times are not
//! quantized to the position sample rate.

use pitwall_common::error::{PitwallError, PitwallResult};
use pitwall_telemetry_model::{Channel, Sample};
use serde::{Deserialize, Serialize};

/// Name of the derived lap-number channel.
pub const LAP_CHANNEL: &str = "lap";
/// Name of the derived seconds-into-lap channel.
pub const LAP_ELAPSED_CHANNEL: &str = "lap_elapsed";
/// Name of the derived distance-into-lap channel.
pub const LAP_DISTANCE_CHANNEL: &str = "lap_distance";

/// Start/finish line as a segment in the position channel's coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartGate {
    pub a: [f64; 2],
    pub b: [f64; 2],
}

impl StartGate {
    pub fn new(a: [f64; 2], b: [f64; 2]) -> Self {
        Self { a, b }
    }

    /// Fraction along `p -> q` where the path crosses the gate, if it does.
    ///
    /// A crossing exactly at `p` is not reported; one exactly at `q` is, so a
    /// sample lying on the gate is counted once.
    fn crossing(&self, p: [f64; 2], q: [f64; 2]) -> Option<f64> {
        let r = [q[0] - p[0], q[1] - p[1]];
        let g = [self.b[0] - self.a[0], self.b[1] - self.a[1]];
        let denom = cross(r, g);
        if denom == 0.0 {
            return None;
        }
        let ap = [self.a[0] - p[0], self.a[1] - p[1]];
        let s = cross(ap, g) / denom;
        let u = cross(ap, r) / denom;
        (s > 0.0 && s <= 1.0 && (0.0..=1.0).contains(&u)).then_some(s)
    }
}

fn cross(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

/// One completed lap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LapTime {
    /// 1-based lap number.
    pub lap: u32,
    pub start_secs: f64,
    pub duration_secs: f64,
    /// Path length of the lap in position-channel units.
    pub distance: f64,
}

/// Detects gate crossings in a 2-D position channel.
#[derive(Debug, Clone)]
pub struct LapDetector {
    gate: StartGate,
    min_lap_secs: f64,
}

impl LapDetector {
    pub fn new(gate: StartGate) -> Self {
        Self {
            gate,
            min_lap_secs: 0.0,
        }
    }

    /// Ignore crossings closer than `secs` to the previous one (position
    /// jitter around the line).
    pub fn with_min_lap_secs(mut self, secs: f64) -> Self {
        self.min_lap_secs = secs.max(0.0);
        self
    }

    /// Walk the position trace and compute per-sample lap data.
    pub fn detect(&self, position: &Channel) -> PitwallResult<Laps> {
        if position.dimension() < 2 {
            return Err(PitwallError::invalid_channel(
                position.name(),
                "lap detection needs a 2-D position channel",
            ));
        }

        let n = position.len();
        let mut laps = Laps {
            times: position.times().to_vec(),
            lap: Vec::with_capacity(n),
            elapsed: Vec::with_capacity(n),
            distance: Vec::with_capacity(n),
            completed: Vec::new(),
            crossings: Vec::new(),
        };

        let mut lap_start: Option<f64> = None;
        let mut lap_distance = 0.0;
        let mut prev: Option<([f64; 2], f64)> = None;

        for i in 0..n {
            let c = position.components_at(i);
            let point = [c[0], c[1]];
            let t = position.times()[i];

            if let Some((p, tp)) = prev {
                let seg_len = ((point[0] - p[0]).powi(2) + (point[1] - p[1]).powi(2)).sqrt();
                let crossing = self.gate.crossing(p, point).filter(|s| {
                    let tc = tp + s * (t - tp);
                    lap_start.map_or(true, |start| tc - start >= self.min_lap_secs)
                });

                match crossing {
                    Some(s) => {
                        let tc = tp + s * (t - tp);
                        if let Some(start) = lap_start {
                            laps.completed.push(LapTime {
                                lap: laps.crossings.len() as u32,
                                start_secs: start,
                                duration_secs: tc - start,
                                distance: lap_distance + s * seg_len,
                            });
                        }
                        laps.crossings.push(tc);
                        lap_start = Some(tc);
                        lap_distance = (1.0 - s) * seg_len;
                    }
                    None => lap_distance += seg_len,
                }
            }

            match lap_start {
                Some(start) => {
                    laps.lap.push(laps.crossings.len() as u32);
                    laps.elapsed.push(t - start);
                    laps.distance.push(lap_distance);
                }
                None => {
                    laps.lap.push(0);
                    laps.elapsed.push(0.0);
                    laps.distance.push(0.0);
                }
            }
            prev = Some((point, t));
        }

        tracing::info!(
            channel = position.name(),
            crossings = laps.crossings.len(),
            completed = laps.completed.len(),
            "Lap detection finished"
        );
        Ok(laps)
    }
}

/// Per-sample lap data and completed laps.
#[derive(Debug, Clone)]
pub struct Laps {
    times: Vec<f64>,
    lap: Vec<u32>,
    elapsed: Vec<f64>,
    distance: Vec<f64>,
    completed: Vec<LapTime>,
    crossings: Vec<f64>,
}

impl Laps {
    /// Gate crossing times.
    pub fn crossings(&self) -> &[f64] {
        &self.crossings
    }

    /// Completed laps in order.
    pub fn completed(&self) -> &[LapTime] {
        &self.completed
    }

    /// Fastest completed lap.
    pub fn best_lap(&self) -> Option<&LapTime> {
        self.completed
            .iter()
            .min_by(|a, b| a.duration_secs.total_cmp(&b.duration_secs))
    }

    /// `[distance, elapsed]` baseline for a completed lap, starting at
    /// `[0, 0]` and ending at the lap's total distance and duration.
    pub fn reference_profile(&self, lap: u32) -> Option<Vec<[f64; 2]>> {
        let done = self.completed.iter().find(|l| l.lap == lap)?;
        let mut profile = vec![[0.0, 0.0]];
        profile.extend(
            self.lap
                .iter()
                .zip(self.distance.iter().zip(&self.elapsed))
                .filter(|(l, _)| **l == lap)
                .map(|(_, (d, e))| [*d, *e]),
        );
        profile.push([done.distance, done.duration_secs]);
        Some(profile)
    }

    /// The `lap`, `lap_elapsed`, and `lap_distance` channels.
    pub fn channels(&self, distance_unit: &str) -> PitwallResult<Vec<Channel>> {
        Ok(vec![
            scalar_channel(
                LAP_CHANNEL,
                "",
                &self.times,
                self.lap.iter().map(|l| *l as f64),
            )?,
            scalar_channel(
                LAP_ELAPSED_CHANNEL,
                "s",
                &self.times,
                self.elapsed.iter().copied(),
            )?,
            scalar_channel(
                LAP_DISTANCE_CHANNEL,
                distance_unit,
                &self.times,
                self.distance.iter().copied(),
            )?,
        ])
    }
}

fn scalar_channel(
    name: &str,
    unit: &str,
    times: &[f64],
    values: impl Iterator<Item = f64>,
) -> PitwallResult<Channel> {
    Channel::new(
        name,
        unit,
        times.iter().zip(values).map(|(t, v)| Sample::scalar(*t, v)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    /// Three laps of a unit circle at 10 s per lap, sampled at 10 Hz,
    /// starting a quarter lap before the gate on the positive x axis.
    fn circle() -> Channel {
        let samples = (0..=300).map(|i| {
            let t = i as f64 * 0.1;
            let angle = TAU * (t / 10.0) - TAU / 4.0 + 0.01;
            Sample::vector(t, &[angle.cos(), angle.sin()])
        });
        Channel::new("pos", "m", samples).unwrap()
    }

    fn gate() -> StartGate {
        StartGate::new([0.5, 0.0], [1.5, 0.0])
    }

    #[test]
    fn test_one_crossing_per_loop() {
        let laps = LapDetector::new(gate()).detect(&circle()).unwrap();
        assert_eq!(laps.crossings().len(), 3);
        assert_eq!(laps.completed().len(), 2);
        for lap in laps.completed() {
            assert!((lap.duration_secs - 10.0).abs() < 1e-6);
            assert!((lap.distance - TAU).abs() < 0.01);
        }
    }

    #[test]
    fn test_lap_channels() {
        let laps = LapDetector::new(gate()).detect(&circle()).unwrap();
        let channels = laps.channels("m").unwrap();
        let lap = &channels[0];
        assert_eq!(lap.name(), LAP_CHANNEL);
        assert_eq!(lap.value_at(0).as_scalar(), Some(0.0));
        assert_eq!(lap.value_at(150).as_scalar(), Some(2.0));

        let elapsed = channels[1].interpolate(15.0).unwrap().value.as_scalar().unwrap();
        let first_crossing = laps.crossings()[1];
        assert!((elapsed - (15.0 - first_crossing)).abs() < 1e-9);
    }

    #[test]
    fn test_reference_profile() {
        let laps = LapDetector::new(gate()).detect(&circle()).unwrap();
        let best = laps.best_lap().unwrap();
        let profile = laps.reference_profile(best.lap).unwrap();
        assert_eq!(profile[0], [0.0, 0.0]);
        assert!(profile.windows(2).all(|w| w[1][0] >= w[0][0] && w[1][1] >= w[0][1]));
        assert!(laps.reference_profile(99).is_none());
    }

    #[test]
    fn test_rejects_scalar_channel() {
        let ch = Channel::new("speed", "m/s", vec![Sample::scalar(0.0, 1.0)]).unwrap();
        assert!(LapDetector::new(gate()).detect(&ch).is_err());
    }
}
