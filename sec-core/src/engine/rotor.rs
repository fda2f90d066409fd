//! Positioner moves: the rotor step of a tune and raw positioner commands.

use crate::cancel::CancellationPoint;
use crate::commands::{Condition, SecCommand};
use crate::config::{ConfigError, RotorConfig, SecConfig, Tenths};
use crate::diseqc::{DiseqcFrame, DriveUnit};
use crate::frontend::{Delay, Frontend, Voltage};
use crate::state::RotorCommand;
use crate::telemetry::{SecEvent, TelemetrySink};
use crate::timing::{MOTOR_POLLS_PER_SECOND, MOTOR_SETTLE_SECONDS, MOTOR_TENTHS_PER_SECOND};

use super::switch::{BandPlan, Target, derive_band};
use super::{Abort, Infeasibility, PrepareOutcome, RotorReport, SecOperation, SecRequest, Sequencer, Step};

/// Tenths of a degree in a full turn.
const FULL_TURN: u32 = 3_600;

/// Poll ticks allowed for a move from `previous` to `next`.
///
/// An unknown start position budgets for the worst case, half a turn.
#[must_use]
pub fn rotor_tick_budget(previous: Option<Tenths>, next: Tenths) -> u32 {
    let distance = match previous {
        Some(previous) => {
            let delta = (i32::from(next) - i32::from(previous)).unsigned_abs() % FULL_TURN;
            delta.min(FULL_TURN - delta)
        }
        None => FULL_TURN / 2,
    };
    let seconds = distance.div_ceil(MOTOR_TENTHS_PER_SECOND);
    (seconds + MOTOR_SETTLE_SECONDS) * MOTOR_POLLS_PER_SECOND
}

/// Angular goto word for a satellite longitude.
#[cfg(feature = "std")]
pub fn angular_word(rotor: &RotorConfig, sat_longitude: Tenths) -> Result<u16, Infeasibility> {
    Ok(crate::positioner::produce_angular_positioner(
        rotor.site_longitude,
        rotor.site_latitude,
        crate::positioner::tenths_to_degrees(sat_longitude),
    ))
}

/// Angular goto word for a satellite longitude.
#[cfg(not(feature = "std"))]
pub fn angular_word(_: &RotorConfig, _: Tenths) -> Result<u16, Infeasibility> {
    Err(Infeasibility::AngularUnavailable)
}

/// Command a tune sends to the positioner, with the longitude it points at.
pub fn rotor_command(config: &SecConfig) -> Result<Option<(RotorCommand, Tenths)>, Infeasibility> {
    let mode = config.diseqc.mode;
    if !mode.has_positioner() {
        return Ok(None);
    }
    let position = config.rotor.sat_longitude;
    if let Some(slot) = config.switch.rotor_position {
        return Ok(Some((RotorCommand::Stored(slot), position)));
    }
    if mode.has_angular_positioner() {
        let word = angular_word(&config.rotor, position)?;
        return Ok(Some((RotorCommand::Angular(word), position)));
    }
    Ok(None)
}

fn goto_frame(command: RotorCommand) -> DiseqcFrame {
    match command {
        RotorCommand::Stored(slot) => DiseqcFrame::goto_position(slot),
        RotorCommand::Angular(word) => DiseqcFrame::goto_angular(word),
    }
}

fn drive_units(unit: DriveUnit) -> Result<u8, ConfigError> {
    unit.byte().ok_or(match unit {
        DriveUnit::Seconds(value) | DriveUnit::Steps(value) => ConfigError::DriveUnits(value),
        DriveUnit::Continuous => ConfigError::DriveUnits(0),
    })
}

impl<F, D, T, C> Sequencer<'_, F, D, T, C>
where
    F: Frontend,
    D: Delay,
    T: TelemetrySink,
    C: CancellationPoint,
{
    /// Drives the rotor to `position` and waits for it to arrive.
    ///
    /// The move ends early once the tuner locks. On cancellation the rotor is
    /// halted and its cache stays invalid.
    pub(super) fn move_rotor(
        &mut self,
        config: &SecConfig,
        target: &Target,
        plan: &BandPlan,
        (command, position): (RotorCommand, Tenths),
        switched: bool,
    ) -> Step<RotorReport> {
        let timings = config.timings;
        if switched {
            self.sleep(timings.between_switch_and_motor);
        } else {
            self.silence_tone(config)?;
        }

        if self.holds(Condition::RotorPosValid) {
            self.apply(SecCommand::SendDiseqc(DiseqcFrame::halt()))?;
            self.sleep(timings.after_motor_stop);
        }

        let motor_voltage = if config.rotor.input_power.enabled {
            Voltage::V18
        } else {
            Voltage::V13
        };
        if self.holds(Condition::VoltageIs(motor_voltage, plan.increased)) {
            self.sleep(timings.after_voltage_settle_before_motor);
        } else {
            self.ensure_voltage(
                motor_voltage,
                plan.increased,
                timings.after_enable_voltage_before_motor,
                timings.after_voltage_change_before_motor,
            )?;
        }

        let budget_ticks = rotor_tick_budget(self.state.rotor_position.active(), position);
        self.apply(SecCommand::InvalidateRotorParams)?;
        self.apply(SecCommand::SendDiseqc(goto_frame(command)))?;
        self.state.rotor_command.stage(command);
        self.state.rotor_position.stage(position);
        self.state.motor_ticks = Some(budget_ticks);
        self.record(SecEvent::RotorMoving { budget_ticks });
        self.sleep(timings.after_motor_start);

        self.ensure_voltage(
            plan.voltage,
            plan.increased,
            timings.after_voltage_enable,
            timings.after_voltage_change,
        )?;
        if !self.holds(Condition::ToneIs(plan.tone)) {
            self.apply(SecCommand::SetTone(plan.tone))?;
            self.sleep(timings.after_final_change);
        }
        let watch = plan.tune_params(target);
        if let Some(params) = &watch {
            self.frontend.set_para(params)?;
        }

        let mut ticks_used = 0;
        let mut locked = false;
        while ticks_used < budget_ticks {
            self.sleep(timings.motor_poll);
            ticks_used += 1;
            if self.checkpoint().is_err() {
                self.apply(SecCommand::SendDiseqc(DiseqcFrame::halt()))?;
                return Err(Abort::Cancelled);
            }
            if watch.is_some() && self.frontend.status()?.is_locked() {
                locked = true;
                break;
            }
        }

        self.apply(SecCommand::UpdateRotorParams)?;
        self.record(SecEvent::RotorArrived { ticks_used, locked });
        Ok(RotorReport {
            budget_ticks,
            ticks_used,
            locked,
        })
    }

    /// Sends one raw positioner command.
    pub(super) fn positioner_op(
        &mut self,
        config: &SecConfig,
        request: &SecRequest,
        operation: SecOperation,
    ) -> Step<PrepareOutcome> {
        let frame = match operation {
            SecOperation::Stop => DiseqcFrame::halt(),
            SecOperation::LimitsOn => DiseqcFrame::limits_on(),
            SecOperation::LimitsOff => DiseqcFrame::limits_off(),
            SecOperation::StoreLimit(direction) => DiseqcFrame::store_limit(direction),
            SecOperation::Nudge { direction, unit } => {
                DiseqcFrame::drive(direction, drive_units(unit)?)
            }
            SecOperation::GotoStored(slot) => DiseqcFrame::goto_position(slot),
            SecOperation::GotoAngular(longitude) => {
                DiseqcFrame::goto_angular(angular_word(&config.rotor, longitude)?)
            }
            SecOperation::StorePosition(0) => return Err(ConfigError::StorePosition(0).into()),
            SecOperation::StorePosition(slot) => DiseqcFrame::store_position(slot),
            SecOperation::Tune => return self.full_tune(config, request),
        };

        self.apply(SecCommand::SendDiseqc(frame))?;
        self.sleep(config.timings.after_positioner_cmd);

        let moves = matches!(
            operation,
            SecOperation::Nudge { .. } | SecOperation::GotoStored(_) | SecOperation::GotoAngular(_)
        );
        if moves {
            self.apply(SecCommand::InvalidateRotorParams)?;
            if let Some(transponder) = request.transponder {
                let target = Target::Transponder(transponder);
                let plan = derive_band(config, &target);
                if let Some(params) = plan.tune_params(&target) {
                    self.frontend.set_para(&params)?;
                    self.tuned = Some(params);
                    self.record(SecEvent::Tuned {
                        frequency: params.frequency,
                        blocking: false,
                    });
                }
            }
        }
        Ok(PrepareOutcome::Completed)
    }
}
