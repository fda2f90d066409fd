//! Runtime error type.

use std::io;

use sec_core::engine::SecError;
use thiserror::Error;

/// Failures surfaced by the [`Coordinator`](crate::Coordinator).
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The engine rejected or aborted the request.
    #[error(transparent)]
    Sec(#[from] SecError),
    /// The coordinator was shut down before the request ran.
    #[error("coordinator shut down")]
    ShutDown,
    /// The engine panicked while running the request; the cache was reset.
    #[error("sec worker panicked")]
    WorkerPanicked,
    #[error("failed to spawn sec worker: {0}")]
    Spawn(#[source] io::Error),
}
