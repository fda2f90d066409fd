//! Threaded runtime for the SEC engine.
//!
//! [`Coordinator`] runs the `sec-core` sequencer on a dedicated worker thread
//! per front end, mirrors engine telemetry to `tracing`, and keeps a
//! lock-free [`StatusBoard`] for operator front ends.

pub mod coordinator;
pub mod delay;
pub mod error;
pub mod status;
pub mod telemetry;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use delay::ThreadDelay;
pub use error::CoordinatorError;
pub use status::StatusBoard;
pub use telemetry::{TelemetryHandle, TracingTelemetry};
