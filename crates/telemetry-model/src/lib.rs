//! Pitwall Telemetry Model
//!
//! Defines the core data contracts for a composition session:
//! - **Samples:** Timestamped scalar or fixed-dimension vector values
//! - **Channels:** Named, unit-tagged, strictly time-ordered sample sequences
//! - **Store:** The read-only channel collection answering interpolation queries
//! - **Snapshots:** Per-instant interpolated values for a set of channels
//! - **Session:** Layer stack definition, synchronization reference, and trim
//!
//! All timestamps are `f64` seconds relative to the start of their stream.

pub mod channel;
pub mod dump;
pub mod sample;
pub mod session;
pub mod snapshot;
pub mod store;

pub use channel::*;
pub use dump::*;
pub use sample::*;
pub use session::*;
pub use snapshot::*;
pub use store::*;
