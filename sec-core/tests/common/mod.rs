#![allow(dead_code)]

use core::cell::Cell;
use core::time::Duration;

use sec_core::cancel::{CancellationPoint, NeverCancel};
use sec_core::config::{Khz, Polarization, SecConfig, TransponderParams};
use sec_core::diseqc::DiseqcFrame;
use sec_core::engine::{PrepareReport, SecError, SecRequest, Sequencer};
use sec_core::frontend::{
    Burst, Delay, Frontend, FrontendError, LockStatus, Tone, TuneParams, Voltage,
};
use sec_core::state::DeviceState;
use sec_core::telemetry::TelemetryRecorder;

pub const SYMBOL_RATE: u32 = 27_500_000;

/// One collaborator call as seen on the recording front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
    Tone(Tone),
    Voltage(Voltage),
    HighVoltage(bool),
    Frame(Vec<u8>),
    Burst(Burst),
    Lock(Khz),
    SetPara(Khz),
}

/// Front end that logs every call and locks after a configurable number of
/// status polls.
#[derive(Debug)]
pub struct RecordingFrontend {
    pub ops: Vec<BusOp>,
    pub lock_result: LockStatus,
    /// Status polls answered with `Unlocked` before reporting lock; `None`
    /// never locks.
    pub lock_after_polls: Option<u32>,
    pub polls: u32,
    pub fail_frames: bool,
}

impl Default for RecordingFrontend {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            lock_result: LockStatus::Locked,
            lock_after_polls: None,
            polls: 0,
            fail_frames: false,
        }
    }
}

impl RecordingFrontend {
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BusOp::Frame(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// Voltage, tone and bus traffic, without the increased-voltage selects.
    pub fn significant(&self) -> Vec<BusOp> {
        self.ops
            .iter()
            .filter(|op| !matches!(op, BusOp::HighVoltage(_)))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Frontend for RecordingFrontend {
    fn set_tone(&mut self, tone: Tone) -> Result<(), FrontendError> {
        self.ops.push(BusOp::Tone(tone));
        Ok(())
    }

    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), FrontendError> {
        self.ops.push(BusOp::Voltage(voltage));
        Ok(())
    }

    fn enable_high_lnb_voltage(&mut self, increased: bool) -> Result<(), FrontendError> {
        self.ops.push(BusOp::HighVoltage(increased));
        Ok(())
    }

    fn send_master_cmd(&mut self, frame: &DiseqcFrame) -> Result<(), FrontendError> {
        if self.fail_frames {
            return Err(FrontendError::BusCollision);
        }
        self.ops.push(BusOp::Frame(frame.as_bytes().to_vec()));
        Ok(())
    }

    fn send_burst(&mut self, burst: Burst) -> Result<(), FrontendError> {
        self.ops.push(BusOp::Burst(burst));
        Ok(())
    }

    fn lock(&mut self, params: &TuneParams, _: Duration) -> Result<LockStatus, FrontendError> {
        self.ops.push(BusOp::Lock(params.frequency));
        Ok(self.lock_result)
    }

    fn set_para(&mut self, params: &TuneParams) -> Result<(), FrontendError> {
        self.ops.push(BusOp::SetPara(params.frequency));
        Ok(())
    }

    fn status(&mut self) -> Result<LockStatus, FrontendError> {
        self.polls += 1;
        Ok(match self.lock_after_polls {
            Some(limit) if self.polls > limit => LockStatus::Locked,
            _ => LockStatus::Unlocked,
        })
    }

    fn set_status_callback(&mut self, _: bool) {}
}

/// Delay that only accumulates the requested time.
#[derive(Debug, Default)]
pub struct VirtualDelay {
    pub total: Duration,
}

impl Delay for VirtualDelay {
    fn sleep(&mut self, duration: Duration) {
        self.total += duration;
    }
}

/// Cancellation point that fires on the `n`th check.
#[derive(Debug)]
pub struct CancelAfter {
    remaining: Cell<u32>,
}

impl CancelAfter {
    pub fn new(checks: u32) -> Self {
        Self {
            remaining: Cell::new(checks),
        }
    }
}

impl CancellationPoint for CancelAfter {
    fn is_cancelled(&self) -> bool {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        remaining == 0
    }
}

/// Everything one engine run needs, owned in one place.
#[derive(Default)]
pub struct Rig {
    pub state: DeviceState,
    pub frontend: RecordingFrontend,
    pub delay: VirtualDelay,
    pub telemetry: TelemetryRecorder,
}

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepare(&mut self, config: &SecConfig, request: &SecRequest) -> Result<PrepareReport, SecError> {
        self.prepare_with(config, request, &NeverCancel)
    }

    pub fn prepare_with<C: CancellationPoint>(
        &mut self,
        config: &SecConfig,
        request: &SecRequest,
        cancel: &C,
    ) -> Result<PrepareReport, SecError> {
        let mut sequencer = Sequencer::new(
            &mut self.state,
            &mut self.frontend,
            &mut self.delay,
            &mut self.telemetry,
            cancel,
        );
        sequencer.prepare(config, request)
    }

    pub fn events(&self) -> Vec<String> {
        self.telemetry
            .oldest_first()
            .map(|record| record.event.to_string())
            .collect()
    }
}

pub fn transponder(frequency: Khz, polarization: Polarization) -> TransponderParams {
    TransponderParams::new(frequency, polarization, SYMBOL_RATE)
}

pub fn tune(frequency: Khz, polarization: Polarization) -> SecRequest {
    SecRequest::tune(transponder(frequency, polarization), Duration::from_secs(5))
}

pub fn frame(bytes: &[u8]) -> BusOp {
    BusOp::Frame(bytes.to_vec())
}
