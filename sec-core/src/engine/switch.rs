//! Band selection and the DiSEqC switch block.

use core::time::Duration;

use crate::cancel::CancellationPoint;
use crate::commands::{Condition, SecCommand};
use crate::config::{
    BlindTarget, DiseqcConfig, Khz, SecConfig, SEND_NO, ToneMode, ToneburstMode,
    TransponderParams, VoltageMode,
};
use crate::diseqc::{CMD_COMMITTED, CMD_UNCOMMITTED, DiseqcFrame, FRAMING_FIRST, FRAMING_REPEAT};
use crate::frontend::{Burst, Delay, Frontend, FrontendError, Tone, TuneParams, Voltage};
use crate::state::DeviceState;
use crate::telemetry::{SecEvent, TelemetrySink};

use super::Sequencer;

/// Committed command goes on the bus.
pub const MASK_COMMITTED: u8 = 1;
/// Uncommitted command goes on the bus.
pub const MASK_UNCOMMITTED: u8 = 2;
/// Toneburst precedes the switch commands.
pub const MASK_BURST_FIRST: u8 = 4;
/// Toneburst follows the switch commands.
pub const MASK_BURST_LAST: u8 = 8;

/// What a request points the installation at.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Target {
    Transponder(TransponderParams),
    Blind(BlindTarget),
}

/// Band, supply and tuner frequency derived from a target.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BandPlan {
    /// Bit 0 selects the high LO, bit 1 horizontal polarization.
    pub band: u8,
    pub high: bool,
    pub horizontal: bool,
    /// Intermediate frequency; blind targets have none.
    pub if_frequency: Option<Khz>,
    pub voltage: Voltage,
    pub increased: bool,
    pub tone: Tone,
}

impl BandPlan {
    /// Tuner parameters at the intermediate frequency.
    #[must_use]
    pub fn tune_params(&self, target: &Target) -> Option<TuneParams> {
        match (target, self.if_frequency) {
            (Target::Transponder(transponder), Some(frequency)) => Some(TuneParams {
                frequency,
                symbol_rate: transponder.symbol_rate,
                polarization: transponder.polarization,
                modulation: transponder.modulation,
            }),
            _ => None,
        }
    }
}

/// Picks the LO band and the supply for `target`.
#[must_use]
pub fn derive_band(config: &SecConfig, target: &Target) -> BandPlan {
    let lnb = &config.lnb;
    let (polarization, high, if_frequency) = match target {
        Target::Transponder(transponder) => {
            let horizontal = transponder.polarization.is_horizontal();
            let high = if lnb.is_dishpro() {
                horizontal
            } else {
                lnb.lof_threshold != 0 && transponder.frequency > lnb.lof_threshold
            };
            let lof = if high { lnb.lof_hi } else { lnb.lof_lo };
            (
                transponder.polarization,
                high,
                Some(transponder.frequency.abs_diff(lof)),
            )
        }
        Target::Blind(blind) => (blind.polarization, blind.band.is_high(), None),
    };
    let horizontal = polarization.is_horizontal();
    // Dishpro always reports the horizontal bit; the LO follows polarisation.
    let band = if lnb.is_dishpro() {
        2 | u8::from(horizontal)
    } else {
        u8::from(high) | (u8::from(horizontal) << 1)
    };

    let (voltage, increased) = if config.unicable.is_some() {
        (Voltage::V13, lnb.increased_voltage)
    } else if lnb.is_dishpro() {
        (Voltage::V18, lnb.increased_voltage)
    } else {
        match config.switch.voltage_mode {
            VoltageMode::V13 => (Voltage::V13, lnb.increased_voltage),
            VoltageMode::V18 => (Voltage::V18, lnb.increased_voltage),
            VoltageMode::V14 => (Voltage::V13, true),
            VoltageMode::HV | VoltageMode::HV13 => {
                let voltage = if horizontal { Voltage::V18 } else { Voltage::V13 };
                (voltage, lnb.increased_voltage)
            }
        }
    };

    let tone = if config.unicable.is_some() {
        Tone::Off
    } else {
        match config.switch.tone_mode {
            ToneMode::On => Tone::On,
            ToneMode::Off => Tone::Off,
            ToneMode::HiLo if band & 1 != 0 => Tone::On,
            ToneMode::HiLo => Tone::Off,
        }
    };

    BandPlan {
        band,
        high,
        horizontal,
        if_frequency,
        voltage,
        increased,
        tone,
    }
}

/// Byte carried by the committed (`0x38`) command for `band`.
#[must_use]
pub fn committed_byte(diseqc: &DiseqcConfig, band: u8) -> u8 {
    if !diseqc.mode.is_enabled() {
        return band;
    }
    let code = diseqc.committed.code();
    let mut csw = code;
    if code < SEND_NO {
        csw = 0xF0 | (code << 2);
    }
    if code <= SEND_NO {
        csw |= band;
    }
    csw
}

/// Which switch commands are wanted and which of those changed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MaskInputs {
    pub send_committed: bool,
    pub send_uncommitted: bool,
    pub send_burst: bool,
    pub committed_changed: bool,
    pub uncommitted_changed: bool,
    pub burst_changed: bool,
    /// Fast mode may drop the committed command.
    pub committed_suppressed: bool,
}

/// Derives the send mask from the changed commands and the order bits.
///
/// A changed command drags along every wanted command that has to be re-sent
/// with it to keep the bus order intact.
#[must_use]
pub fn send_mask(order_bits: u8, inputs: MaskInputs) -> u8 {
    let mut mask = 0;
    if inputs.burst_changed {
        if order_bits & 1 != 0 {
            mask |= MASK_BURST_FIRST;
            if inputs.send_committed {
                mask |= MASK_COMMITTED;
            }
            if inputs.send_uncommitted {
                mask |= MASK_UNCOMMITTED;
            }
        } else {
            mask |= MASK_BURST_LAST;
        }
    }
    if inputs.uncommitted_changed {
        mask |= MASK_UNCOMMITTED;
        if order_bits & 4 != 0 && inputs.send_committed {
            mask |= MASK_COMMITTED;
        }
        if order_bits == 4 && inputs.send_burst {
            mask |= MASK_BURST_LAST;
        }
    }
    if inputs.committed_changed && !inputs.committed_suppressed {
        mask |= MASK_COMMITTED;
        if order_bits & 4 == 0 {
            if inputs.send_uncommitted {
                mask |= MASK_UNCOMMITTED;
            }
            if inputs.send_burst {
                mask |= MASK_BURST_LAST;
            }
        }
    }
    mask
}

/// Switch commands for one request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SwitchPlan {
    pub committed: u8,
    /// `0` when no uncommitted command is configured.
    pub uncommitted: u8,
    pub toneburst: ToneburstMode,
    pub send_mask: u8,
    /// Reset the bus before sending; the cache knows nothing about the switches.
    pub need_reset: bool,
}

/// Compares the wanted switch commands with the cache.
#[must_use]
pub fn plan_switch(diseqc: &DiseqcConfig, band: u8, state: &DeviceState, force: bool) -> SwitchPlan {
    let committed = committed_byte(diseqc, band);
    let code = diseqc.committed.code();

    let send_committed = diseqc.mode.is_enabled() && code != SEND_NO;
    let send_uncommitted = diseqc.mode.supports_repeats() && diseqc.uncommitted.is_some();
    let send_burst = diseqc.toneburst != ToneburstMode::None;
    let uncommitted = diseqc.uncommitted.unwrap_or(0);

    let committed_suppressed = diseqc.use_fast
        && code < SEND_NO
        && state
            .committed
            .active()
            .is_some_and(|last| last & 0xF0 != 0 && last / 4 == committed / 4);

    let inputs = MaskInputs {
        send_committed,
        send_uncommitted,
        send_burst,
        committed_changed: send_committed && (force || !state.committed.is(committed)),
        uncommitted_changed: send_uncommitted && (force || !state.uncommitted.is(uncommitted)),
        burst_changed: send_burst && (force || !state.toneburst.is(diseqc.toneburst)),
        committed_suppressed: committed_suppressed && !force,
    };

    SwitchPlan {
        committed,
        uncommitted,
        toneburst: diseqc.toneburst,
        send_mask: send_mask(diseqc.order.bits(), inputs),
        need_reset: diseqc.mode.is_enabled() && state.switch_cache_cold(),
    }
}

fn burst_of(mode: ToneburstMode) -> Option<Burst> {
    match mode {
        ToneburstMode::None => None,
        ToneburstMode::A => Some(Burst::A),
        ToneburstMode::B => Some(Burst::B),
    }
}

impl<F, D, T, C> Sequencer<'_, F, D, T, C>
where
    F: Frontend,
    D: Delay,
    T: TelemetrySink,
    C: CancellationPoint,
{
    /// Sets the supply unless the cache already has it, waiting the enable or
    /// change delay depending on whether the LNB was powered.
    pub(super) fn ensure_voltage(
        &mut self,
        voltage: Voltage,
        increased: bool,
        enable_delay: Duration,
        change_delay: Duration,
    ) -> Result<bool, FrontendError> {
        if self.holds(Condition::VoltageIs(voltage, increased)) {
            return Ok(false);
        }
        let powered = matches!(self.state.voltage, Some(Voltage::V13 | Voltage::V18));
        self.apply(SecCommand::SetVoltage { voltage, increased })?;
        self.sleep(if powered { change_delay } else { enable_delay });
        Ok(true)
    }

    /// Turns the tone off ahead of bus traffic.
    pub(super) fn silence_tone(&mut self, config: &SecConfig) -> Result<(), FrontendError> {
        if !self.holds(Condition::ToneIs(Tone::Off)) {
            self.apply(SecCommand::SetTone(Tone::Off))?;
            self.sleep(config.timings.tone_off_before_diseqc);
        }
        Ok(())
    }

    /// Prepares the bus and transmits the switch commands selected by the plan.
    pub(super) fn run_switch_block(
        &mut self,
        config: &SecConfig,
        plan: &SwitchPlan,
        provisional: (Voltage, bool),
    ) -> Result<(), FrontendError> {
        let timings = config.timings;
        self.silence_tone(config)?;
        self.ensure_voltage(
            provisional.0,
            provisional.1,
            timings.after_voltage_enable,
            timings.after_voltage_change,
        )?;
        self.apply(SecCommand::InvalidateSwitchParams)?;

        if plan.need_reset {
            self.frontend.reset_micro()?;
            self.frames_sent += 1;
            self.record(SecEvent::FrameSent(DiseqcFrame::reset().snapshot()));
            self.sleep(timings.after_reset);
            self.apply(SecCommand::SendDiseqc(DiseqcFrame::power_on()))?;
            self.sleep(timings.after_poweron);
        }

        self.transmit(config, plan)
    }

    fn transmit(&mut self, config: &SecConfig, plan: &SwitchPlan) -> Result<(), FrontendError> {
        let diseqc = &config.diseqc;
        let timings = config.timings;
        let mask = plan.send_mask;
        let uncommitted_first = diseqc.order.uncommitted_first();
        let repeats = if diseqc.mode.supports_repeats() {
            diseqc.repeats
        } else {
            0
        };
        let frames = u8::from(mask & MASK_COMMITTED != 0) + u8::from(mask & MASK_UNCOMMITTED != 0);
        let loops = u32::from(frames) << repeats;
        let passes = if diseqc.seq_repeat { 2 } else { 1 };
        let burst = burst_of(plan.toneburst);

        for pass in 0..passes {
            if pass > 0 {
                self.sleep(timings.before_sequence_repeat);
            }

            if mask & MASK_BURST_FIRST != 0
                && let Some(burst) = burst
            {
                self.apply(SecCommand::SendToneburst(burst))?;
                self.sleep(timings.after_toneburst);
            }

            let mut sent = 0;
            while sent < loops {
                let framing = if sent == 0 { FRAMING_FIRST } else { FRAMING_REPEAT };
                let (command, value) = if mask & MASK_UNCOMMITTED != 0 && uncommitted_first {
                    (CMD_UNCOMMITTED, plan.uncommitted)
                } else if mask & MASK_COMMITTED != 0 {
                    (CMD_COMMITTED, plan.committed)
                } else {
                    (CMD_UNCOMMITTED, plan.uncommitted)
                };
                self.apply(SecCommand::SendDiseqc(DiseqcFrame::switch(framing, command, value)))?;
                sent += 1;

                if sent < loops {
                    let alternate = match command {
                        CMD_COMMITTED if mask & MASK_UNCOMMITTED != 0 => {
                            Some((CMD_UNCOMMITTED, plan.uncommitted))
                        }
                        CMD_UNCOMMITTED if mask & MASK_COMMITTED != 0 => {
                            Some((CMD_COMMITTED, plan.committed))
                        }
                        _ => None,
                    };
                    if let Some((command, value)) = alternate {
                        let gap = timings.alternation_gap(repeats);
                        self.sleep(gap);
                        self.apply(SecCommand::SendDiseqc(DiseqcFrame::switch(
                            framing, command, value,
                        )))?;
                        sent += 1;
                        self.sleep(if sent < loops {
                            gap
                        } else {
                            timings.after_last_diseqc
                        });
                        continue;
                    }
                    self.sleep(timings.between_repeats);
                } else {
                    self.sleep(timings.after_last_diseqc);
                }
            }

            if mask & MASK_BURST_LAST != 0
                && let Some(burst) = burst
            {
                self.apply(SecCommand::SendToneburst(burst))?;
                self.sleep(timings.after_toneburst);
            }
        }
        Ok(())
    }
}
