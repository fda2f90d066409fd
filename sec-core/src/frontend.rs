//! Abstractions over the tuner front end and the clock.
//!
//! The engine never touches hardware directly. Integrations implement
//! [`Frontend`] on top of their driver and [`Delay`] on top of whatever
//! sleeping primitive the platform offers.

use core::fmt;
use core::time::Duration;

use crate::config::{Khz, Modulation, Polarization};
use crate::diseqc::DiseqcFrame;

/// LNB supply level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Voltage {
    Off,
    V13,
    V18,
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Voltage::Off => "off",
            Voltage::V13 => "13V",
            Voltage::V18 => "18V",
        })
    }
}

/// 22 kHz continuous tone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Tone {
    On,
    Off,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tone::On => "on",
            Tone::Off => "off",
        })
    }
}

/// Mini DiSEqC burst.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Burst {
    A,
    B,
}

/// Tuner lock state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LockStatus {
    Locked,
    Unlocked,
}

impl LockStatus {
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, LockStatus::Locked)
    }
}

/// Parameters handed to the tuner after the SEC sequence ran.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TuneParams {
    /// Intermediate frequency at the tuner input.
    pub frequency: Khz,
    pub symbol_rate: u32,
    pub polarization: Polarization,
    pub modulation: Modulation,
}

/// Driver-level failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrontendError {
    /// The driver rejected the call with an OS error code.
    Io(i32),
    /// The driver does not implement the requested operation.
    Unsupported,
    /// The DiSEqC bus did not accept the frame.
    BusCollision,
}

impl fmt::Display for FrontendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontendError::Io(code) => write!(f, "frontend i/o error {code}"),
            FrontendError::Unsupported => f.write_str("operation not supported by frontend"),
            FrontendError::BusCollision => f.write_str("diseqc bus collision"),
        }
    }
}

/// Tuner front end with an attached SEC (voltage, tone, DiSEqC) output.
pub trait Frontend {
    fn set_tone(&mut self, tone: Tone) -> Result<(), FrontendError>;

    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), FrontendError>;

    /// Selects the 14/19 V supply variant.
    fn enable_high_lnb_voltage(&mut self, increased: bool) -> Result<(), FrontendError>;

    fn send_master_cmd(&mut self, frame: &DiseqcFrame) -> Result<(), FrontendError>;

    fn send_burst(&mut self, burst: Burst) -> Result<(), FrontendError>;

    /// Resets every DiSEqC microcontroller on the bus.
    fn reset_micro(&mut self) -> Result<(), FrontendError> {
        self.send_master_cmd(&DiseqcFrame::reset())
    }

    /// Tunes and blocks until the tuner locks or `timeout` elapses.
    fn lock(&mut self, params: &TuneParams, timeout: Duration) -> Result<LockStatus, FrontendError>;

    /// Tunes without waiting for lock.
    fn set_para(&mut self, params: &TuneParams) -> Result<(), FrontendError>;

    fn status(&mut self) -> Result<LockStatus, FrontendError>;

    /// Enables or suppresses asynchronous status callbacks from the driver.
    fn set_status_callback(&mut self, enabled: bool);
}

/// Blocking delay source.
pub trait Delay {
    fn sleep(&mut self, duration: Duration);
}

/// Front end that accepts everything and never locks.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopFrontend;

impl NoopFrontend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Frontend for NoopFrontend {
    fn set_tone(&mut self, _: Tone) -> Result<(), FrontendError> {
        Ok(())
    }

    fn set_voltage(&mut self, _: Voltage) -> Result<(), FrontendError> {
        Ok(())
    }

    fn enable_high_lnb_voltage(&mut self, _: bool) -> Result<(), FrontendError> {
        Ok(())
    }

    fn send_master_cmd(&mut self, _: &DiseqcFrame) -> Result<(), FrontendError> {
        Ok(())
    }

    fn send_burst(&mut self, _: Burst) -> Result<(), FrontendError> {
        Ok(())
    }

    fn lock(&mut self, _: &TuneParams, _: Duration) -> Result<LockStatus, FrontendError> {
        Ok(LockStatus::Unlocked)
    }

    fn set_para(&mut self, _: &TuneParams) -> Result<(), FrontendError> {
        Ok(())
    }

    fn status(&mut self) -> Result<LockStatus, FrontendError> {
        Ok(LockStatus::Unlocked)
    }

    fn set_status_callback(&mut self, _: bool) {}
}

