//! Full tune: switch block, unicable or rotor step, final supply and tune.

use crate::cancel::CancellationPoint;
use crate::commands::{Condition, SecCommand};
use crate::config::{ConfigError, Khz, SecConfig, UnicableConfig, VoltageMode};
use crate::diseqc::DiseqcFrame;
use crate::frontend::{Delay, Frontend, LockStatus, TuneParams, Voltage};
use crate::telemetry::{SecEvent, TelemetrySink};

use super::rotor::rotor_command;
use super::switch::{BandPlan, Target, derive_band, plan_switch};
use super::{PrepareOutcome, SecRequest, Sequencer, Step};

/// Offset subtracted from the SatCR tuning word.
const SATCR_WORD_OFFSET: i64 = 350;
/// SatCR tuning step.
const SATCR_STEP_KHZ: i64 = 4_000;
/// Largest 10-bit tuning word.
const SATCR_WORD_MAX: u16 = 0x3FF;

/// EN50494 tuning word for an intermediate frequency, rounded to the nearest
/// 4 MHz step.
pub fn satcr_tuning_word(if_frequency: Khz, satcr_frequency: Khz) -> Result<u16, ConfigError> {
    let sum = i64::from(if_frequency) + i64::from(satcr_frequency);
    let word = (sum + SATCR_STEP_KHZ / 2) / SATCR_STEP_KHZ - SATCR_WORD_OFFSET;
    match u16::try_from(word) {
        Ok(valid) if valid <= SATCR_WORD_MAX => Ok(valid),
        _ => Err(ConfigError::TuningWord(
            i32::try_from(word).unwrap_or(i32::MAX),
        )),
    }
}

/// Frequency the tuner has to listen on for a tuning word.
#[must_use]
pub fn satcr_tuner_frequency(word: u16, if_frequency: Khz) -> i64 {
    (i64::from(word) + SATCR_WORD_OFFSET) * SATCR_STEP_KHZ - i64::from(if_frequency)
}

/// ODU channel-change frame selecting user band, bank and tuning word.
#[must_use]
pub fn unicable_frame(unicable: &UnicableConfig, word: u16, horizontal: bool, high: bool) -> DiseqcFrame {
    let bank = (unicable.lnb_number << 2) | (u8::from(horizontal) << 1) | u8::from(high);
    let [word_hi, word_lo] = word.to_be_bytes();
    let d1 = (unicable.satcr << 5) | (bank << 2) | (word_hi & 0x03);
    DiseqcFrame::odu_channel_change(d1, word_lo)
}

impl<F, D, T, C> Sequencer<'_, F, D, T, C>
where
    F: Frontend,
    D: Delay,
    T: TelemetrySink,
    C: CancellationPoint,
{
    pub(super) fn full_tune(&mut self, config: &SecConfig, request: &SecRequest) -> Step<PrepareOutcome> {
        let target = match (request.blind, request.transponder) {
            (Some(blind), _) => Target::Blind(blind),
            (None, Some(transponder)) => Target::Transponder(transponder),
            // Nothing to point at: the cache already reflects the hardware.
            (None, None) => return Ok(PrepareOutcome::Completed),
        };
        let plan = derive_band(config, &target);

        if self.state.take_rotor_reset() {
            self.apply(SecCommand::InvalidateRotorParams)?;
        }
        let rotor = rotor_command(config)?;
        let rotor_moves = rotor.is_some_and(|(command, _)| !self.state.rotor_command.is(command));
        let switch = plan_switch(&config.diseqc, plan.band, &*self.state, request.force_switch);

        self.checkpoint()?;
        if switch.send_mask != 0 {
            let sends_at_13v = (rotor_moves && !config.rotor.input_power.enabled)
                || config.switch.voltage_mode == VoltageMode::HV13;
            let provisional = if sends_at_13v {
                Voltage::V13
            } else {
                plan.voltage
            };
            self.run_switch_block(config, &switch, (provisional, plan.increased))?;
        }
        self.state.committed.stage(switch.committed);
        self.state.uncommitted.stage(switch.uncommitted);
        self.state.toneburst.stage(switch.toneburst);

        if let Some(unicable) = &config.unicable {
            self.checkpoint()?;
            return self.unicable_tune(config, request, unicable, &target, &plan);
        }

        if let Some(rotor) = rotor
            && rotor_moves
        {
            self.checkpoint()?;
            let report = self.move_rotor(config, &target, &plan, rotor, switch.send_mask != 0)?;
            self.rotor = Some(report);
        }

        self.checkpoint()?;
        let mut changed = false;
        if !self.holds(Condition::VoltageIs(plan.voltage, plan.increased)) {
            self.apply(SecCommand::SetVoltage {
                voltage: plan.voltage,
                increased: plan.increased,
            })?;
            changed = true;
        }
        if !self.holds(Condition::ToneIs(plan.tone)) {
            self.apply(SecCommand::SetTone(plan.tone))?;
            changed = true;
        }
        if changed {
            self.sleep(config.timings.after_final_change);
        }
        self.apply(SecCommand::UpdateSwitchParams)?;

        self.state.high_band = Some(plan.high);
        match (plan.tune_params(&target), &target) {
            (Some(params), Target::Transponder(transponder)) => {
                self.state.frequency_offset =
                    Some(i64::from(transponder.frequency) - i64::from(params.frequency));
                self.tune(request, params)
            }
            _ => Ok(PrepareOutcome::Completed),
        }
    }

    fn unicable_tune(
        &mut self,
        config: &SecConfig,
        request: &SecRequest,
        unicable: &UnicableConfig,
        target: &Target,
        plan: &BandPlan,
    ) -> Step<PrepareOutcome> {
        let Some(mut params) = plan.tune_params(target) else {
            return Ok(PrepareOutcome::Completed);
        };
        let Target::Transponder(transponder) = target else {
            return Ok(PrepareOutcome::Completed);
        };
        let word = satcr_tuning_word(params.frequency, unicable.satcr_frequency)?;
        let tuner_frequency = satcr_tuner_frequency(word, params.frequency);
        let timings = config.timings;

        self.ensure_voltage(
            Voltage::V13,
            plan.increased,
            timings.after_voltage_enable,
            timings.after_voltage_change,
        )?;
        self.apply(SecCommand::SetVoltage {
            voltage: Voltage::V18,
            increased: plan.increased,
        })?;
        self.sleep(timings.after_voltage_change);
        self.silence_tone(config)?;
        self.apply(SecCommand::SendDiseqc(unicable_frame(
            unicable,
            word,
            plan.horizontal,
            plan.high,
        )))?;
        self.sleep(timings.after_last_diseqc);
        self.apply(SecCommand::SetVoltage {
            voltage: Voltage::V13,
            increased: plan.increased,
        })?;
        self.sleep(timings.after_final_change);
        self.apply(SecCommand::UpdateSwitchParams)?;

        params.frequency = Khz::try_from(tuner_frequency)
            .map_err(|_| ConfigError::TuningWord(i32::from(word)))?;
        self.state.high_band = Some(plan.high);
        self.state.frequency_offset = Some(i64::from(transponder.frequency) - tuner_frequency);
        self.tune(request, params)
    }

    fn tune(&mut self, request: &SecRequest, params: TuneParams) -> Step<PrepareOutcome> {
        self.tuned = Some(params);
        self.state.tuned_frequency = Some(params.frequency);
        self.record(SecEvent::Tuned {
            frequency: params.frequency,
            blocking: request.want_status,
        });
        if request.want_status {
            Ok(match self.frontend.lock(&params, request.timeout)? {
                LockStatus::Locked => PrepareOutcome::Locked,
                LockStatus::Unlocked => PrepareOutcome::UnlockedTimedOut,
            })
        } else {
            self.frontend.set_para(&params)?;
            Ok(PrepareOutcome::Completed)
        }
    }
}
