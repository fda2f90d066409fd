//! Cooperative cancellation.
//!
//! Long sequences check a [`CancellationPoint`] at fixed places (before the
//! switch block, before the unicable step, before and during a rotor move, and
//! before finalizing). Nothing is rolled back on cancellation.

use portable_atomic::{AtomicBool, Ordering};

/// Marker returned when a checkpoint observed a cancellation request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Cancelled;

/// Source of cancellation requests observed by the engine.
pub trait CancellationPoint {
    fn is_cancelled(&self) -> bool;

    fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Shareable cancellation flag.
#[derive(Debug, Default)]
pub struct CancelFlag {
    requested: AtomicBool,
}

impl CancelFlag {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.requested.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl CancellationPoint for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.is_requested()
    }
}

/// Cancellation point that never fires.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeverCancel;

impl CancellationPoint for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}
