//! Wall-clock delay source for the worker thread.

use std::thread;
use std::time::Duration;

use sec_core::frontend::Delay;

/// Sleeps the calling thread, optionally compressing every delay by a
/// constant divisor.
#[derive(Clone, Copy, Debug)]
pub struct ThreadDelay {
    divisor: u32,
}

impl ThreadDelay {
    /// Real-time delays.
    #[must_use]
    pub const fn new() -> Self {
        Self { divisor: 1 }
    }

    /// Delays divided by `divisor`; zero is treated as one.
    #[must_use]
    pub const fn scaled(divisor: u32) -> Self {
        Self {
            divisor: if divisor == 0 { 1 } else { divisor },
        }
    }

    #[must_use]
    pub const fn divisor(&self) -> u32 {
        self.divisor
    }
}

impl Default for ThreadDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Delay for ThreadDelay {
    fn sleep(&mut self, duration: Duration) {
        let scaled = duration / self.divisor;
        if !scaled.is_zero() {
            thread::sleep(scaled);
        }
    }
}
