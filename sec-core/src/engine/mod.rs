//! SEC sequencing engine.
//!
//! [`Sequencer::prepare`] turns one [`SecRequest`] into the ordered stream of
//! voltage, tone, burst and DiSEqC commands the installation needs, skipping
//! everything the [`DeviceState`] cache says is already in place, and finally
//! hands the intermediate frequency to the tuner.

pub mod rotor;
pub mod switch;
pub mod tune;

use core::fmt;
use core::time::Duration;

use crate::cancel::{CancellationPoint, Cancelled};
use crate::commands::{Condition, SecCommand};
use crate::config::{BlindTarget, ConfigError, SecConfig, Tenths, TransponderParams};
use crate::diseqc::{Direction, DriveUnit};
use crate::frontend::{Delay, Frontend, FrontendError, TuneParams};
use crate::state::DeviceState;
use crate::telemetry::{SecEvent, TelemetrySink};

/// Work the engine is asked to perform.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SecOperation {
    /// Switch, move and tune for the request's target.
    #[default]
    Tune,
    Stop,
    LimitsOn,
    LimitsOff,
    StoreLimit(Direction),
    Nudge {
        direction: Direction,
        unit: DriveUnit,
    },
    GotoStored(u8),
    /// Drive to a satellite longitude with the angular (`0x6E`) command.
    GotoAngular(Tenths),
    StorePosition(u8),
}

impl SecOperation {
    /// Raw positioner commands that bypass the switch sequence.
    #[must_use]
    pub const fn is_positioner(self) -> bool {
        !matches!(self, SecOperation::Tune)
    }
}

impl fmt::Display for SecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecOperation::Tune => f.write_str("tune"),
            SecOperation::Stop => f.write_str("stop"),
            SecOperation::LimitsOn => f.write_str("limits on"),
            SecOperation::LimitsOff => f.write_str("limits off"),
            SecOperation::StoreLimit(direction) => write!(f, "limit {}", direction.label()),
            SecOperation::Nudge { direction, unit } => {
                write!(f, "nudge {}", direction.label())?;
                match unit {
                    DriveUnit::Continuous => Ok(()),
                    DriveUnit::Seconds(seconds) => write!(f, " seconds={seconds}"),
                    DriveUnit::Steps(steps) => write!(f, " steps={steps}"),
                }
            }
            SecOperation::GotoStored(slot) => write!(f, "goto {slot}"),
            SecOperation::GotoAngular(tenths) => write!(f, "gotox {tenths}"),
            SecOperation::StorePosition(slot) => write!(f, "store {slot}"),
        }
    }
}

/// One unit of work handed to the engine.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SecRequest {
    /// Band selector for a blind-scan preparation; takes precedence over
    /// `transponder` and skips the final tune.
    pub blind: Option<BlindTarget>,
    pub transponder: Option<TransponderParams>,
    /// Block in the tuner until lock or `timeout`.
    pub want_status: bool,
    pub timeout: Duration,
    pub operation: SecOperation,
    /// Resend every switch command even when the cache matches.
    pub force_switch: bool,
}

impl SecRequest {
    /// Tune that waits for lock.
    #[must_use]
    pub const fn tune(transponder: TransponderParams, timeout: Duration) -> Self {
        Self {
            blind: None,
            transponder: Some(transponder),
            want_status: true,
            timeout,
            operation: SecOperation::Tune,
            force_switch: false,
        }
    }

    /// Fire-and-forget tune that any later request may preempt.
    #[must_use]
    pub const fn probe(transponder: Option<TransponderParams>) -> Self {
        Self {
            blind: None,
            transponder,
            want_status: false,
            timeout: Duration::ZERO,
            operation: SecOperation::Tune,
            force_switch: false,
        }
    }

    /// Switch and move for a blind scan without tuning.
    #[must_use]
    pub const fn blind(target: BlindTarget) -> Self {
        Self {
            blind: Some(target),
            transponder: None,
            want_status: false,
            timeout: Duration::ZERO,
            operation: SecOperation::Tune,
            force_switch: false,
        }
    }

    /// Raw positioner command, optionally re-tuning to `transponder` after a move.
    #[must_use]
    pub const fn positioner(operation: SecOperation, transponder: Option<TransponderParams>) -> Self {
        Self {
            blind: None,
            transponder,
            want_status: false,
            timeout: Duration::ZERO,
            operation,
            force_switch: false,
        }
    }

    /// Probes are preemptible tunes: no blind target, no status wanted, no
    /// timeout. Positioner commands are never probes.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.blind.is_none()
            && !self.want_status
            && self.timeout.is_zero()
            && !self.operation.is_positioner()
    }
}

/// How a prepare call ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PrepareOutcome {
    Locked,
    UnlockedTimedOut,
    /// Sequence finished without waiting for lock.
    Completed,
    Cancelled,
}

impl fmt::Display for PrepareOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrepareOutcome::Locked => "locked",
            PrepareOutcome::UnlockedTimedOut => "unlocked (timed out)",
            PrepareOutcome::Completed => "completed",
            PrepareOutcome::Cancelled => "cancelled",
        })
    }
}

/// Summary of a finished rotor move.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RotorReport {
    pub budget_ticks: u32,
    pub ticks_used: u32,
    /// The tuner reported lock before the budget ran out.
    pub locked: bool,
}

/// Result of one prepare call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PrepareReport {
    pub outcome: PrepareOutcome,
    /// DiSEqC frames put on the bus, including resets and repeats.
    pub frames_sent: u32,
    pub rotor: Option<RotorReport>,
    /// Parameters handed to the tuner, if it was tuned.
    pub tuned: Option<TuneParams>,
    /// Sum of all delays the sequence waited for.
    pub elapsed: Duration,
}

/// Request shapes the installation cannot serve.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Infeasibility {
    /// Positioner command on a DiSEqC level below 1.2.
    NoPositioner,
    /// Angular goto on a DiSEqC level below 1.3.
    NoAngularPositioner,
    /// Angular positioning needs floating point support that is not built in.
    AngularUnavailable,
    /// Blind scans cannot be routed through a SatCR user band.
    BlindThroughSatcr,
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Infeasibility::NoPositioner => "positioner requires diseqc 1.2",
            Infeasibility::NoAngularPositioner => "angular positioning requires diseqc 1.3",
            Infeasibility::AngularUnavailable => "angular positioning not built in",
            Infeasibility::BlindThroughSatcr => "blind scan not possible through unicable",
        })
    }
}

/// Errors returned by [`Sequencer::prepare`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SecError {
    Config(ConfigError),
    Infeasible(Infeasibility),
    Frontend(FrontendError),
}

impl fmt::Display for SecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecError::Config(error) => write!(f, "configuration error: {error}"),
            SecError::Infeasible(reason) => write!(f, "infeasible request: {reason}"),
            SecError::Frontend(error) => write!(f, "frontend error: {error}"),
        }
    }
}

impl core::error::Error for SecError {}

impl From<ConfigError> for SecError {
    fn from(error: ConfigError) -> Self {
        SecError::Config(error)
    }
}

impl From<Infeasibility> for SecError {
    fn from(reason: Infeasibility) -> Self {
        SecError::Infeasible(reason)
    }
}

impl From<FrontendError> for SecError {
    fn from(error: FrontendError) -> Self {
        SecError::Frontend(error)
    }
}

/// Why a sequence stopped early.
#[derive(Debug)]
enum Abort {
    Cancelled,
    Failed(SecError),
}

impl From<Cancelled> for Abort {
    fn from(_: Cancelled) -> Self {
        Abort::Cancelled
    }
}

impl From<SecError> for Abort {
    fn from(error: SecError) -> Self {
        Abort::Failed(error)
    }
}

impl From<ConfigError> for Abort {
    fn from(error: ConfigError) -> Self {
        Abort::Failed(SecError::Config(error))
    }
}

impl From<Infeasibility> for Abort {
    fn from(reason: Infeasibility) -> Self {
        Abort::Failed(SecError::Infeasible(reason))
    }
}

impl From<FrontendError> for Abort {
    fn from(error: FrontendError) -> Self {
        Abort::Failed(SecError::Frontend(error))
    }
}

type Step<T> = Result<T, Abort>;

/// Rejects request shapes the installation cannot serve.
fn admit(config: &SecConfig, request: &SecRequest) -> Result<(), Infeasibility> {
    let mode = config.diseqc.mode;
    match request.operation {
        SecOperation::Tune => {
            if request.blind.is_some() && config.unicable.is_some() {
                return Err(Infeasibility::BlindThroughSatcr);
            }
        }
        SecOperation::GotoAngular(_) if !mode.has_angular_positioner() => {
            return Err(if mode.has_positioner() {
                Infeasibility::NoAngularPositioner
            } else {
                Infeasibility::NoPositioner
            });
        }
        _ if !mode.has_positioner() => return Err(Infeasibility::NoPositioner),
        _ => {}
    }
    Ok(())
}

/// Runs SEC sequences for one front end.
///
/// The sequencer borrows everything it drives; callers keep ownership of the
/// cache between requests.
pub struct Sequencer<'a, F, D, T, C> {
    state: &'a mut DeviceState,
    frontend: &'a mut F,
    delay: &'a mut D,
    telemetry: &'a mut T,
    cancel: &'a C,
    elapsed: Duration,
    frames_sent: u32,
    rotor: Option<RotorReport>,
    tuned: Option<TuneParams>,
}

impl<'a, F, D, T, C> Sequencer<'a, F, D, T, C>
where
    F: Frontend,
    D: Delay,
    T: TelemetrySink,
    C: CancellationPoint,
{
    pub fn new(
        state: &'a mut DeviceState,
        frontend: &'a mut F,
        delay: &'a mut D,
        telemetry: &'a mut T,
        cancel: &'a C,
    ) -> Self {
        Self {
            state,
            frontend,
            delay,
            telemetry,
            cancel,
            elapsed: Duration::ZERO,
            frames_sent: 0,
            rotor: None,
            tuned: None,
        }
    }

    /// Validates `config`, then runs the sequence for `request`.
    ///
    /// Cancellation is not an error: it yields [`PrepareOutcome::Cancelled`]
    /// with the cache left as far as the sequence got.
    pub fn prepare(
        &mut self,
        config: &SecConfig,
        request: &SecRequest,
    ) -> Result<PrepareReport, SecError> {
        config.validate()?;
        admit(config, request)?;

        self.elapsed = Duration::ZERO;
        self.frames_sent = 0;
        self.rotor = None;
        self.tuned = None;
        self.record(SecEvent::Started(request.operation));

        let result = match request.operation {
            SecOperation::Tune => self.full_tune(config, request),
            operation => self.positioner_op(config, request, operation),
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(Abort::Cancelled) => PrepareOutcome::Cancelled,
            Err(Abort::Failed(error)) => return Err(error),
        };
        self.record(SecEvent::Finished(outcome));

        Ok(PrepareReport {
            outcome,
            frames_sent: self.frames_sent,
            rotor: self.rotor,
            tuned: self.tuned,
            elapsed: self.elapsed,
        })
    }

    fn record(&mut self, event: SecEvent) {
        self.telemetry.record(self.elapsed, event);
    }

    fn apply(&mut self, command: SecCommand) -> Result<(), FrontendError> {
        command.execute(&mut *self.state, &mut *self.frontend)?;
        if matches!(command, SecCommand::SendDiseqc(_)) {
            self.frames_sent += 1;
        }
        self.record(command.event());
        Ok(())
    }

    fn holds(&self, condition: Condition) -> bool {
        condition.holds(&*self.state)
    }

    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.delay.sleep(duration);
            self.elapsed += duration;
        }
    }

    fn checkpoint(&self) -> Result<(), Cancelled> {
        self.cancel.checkpoint()
    }
}
