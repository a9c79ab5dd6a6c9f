//! Pitwall Sync Core
//!
//! Relates the video clock to the telemetry clock and prepares telemetry for
//! rendering:
//! - **Aligner:** Build a frame-index to telemetry-time mapping from an
//!   explicit offset or matched reference events
//! - **Resolver:** Interpolate a set of bound channels into per-frame snapshots
//! - **Derive:** Smoothing, resampling, unit scaling, and vector magnitude
//! - **Laps:** Start/finish gate crossings, lap timing channels, and
//!   reference-lap profiles
//!
//! This crate is pure computation. No I/O, no platform dependencies.

pub mod aligner;
pub mod derive;
pub mod laps;
pub mod regression;
pub mod resolver;

pub use aligner::{AlignmentMapping, ClockAligner, SyncReference};
pub use laps::{LapDetector, LapTime, Laps, StartGate};
pub use resolver::{CoverageReport, SnapshotResolver};
