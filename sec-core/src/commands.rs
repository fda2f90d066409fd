//! Low-level SEC primitives.
//!
//! Each [`SecCommand`] touches the cache and calls at most one front-end
//! function. [`Condition`]s are side-effect free reads of the active cache
//! that the engine uses to skip redundant commands.

use crate::diseqc::DiseqcFrame;
use crate::frontend::{Burst, Frontend, FrontendError, Tone, Voltage};
use crate::state::DeviceState;
use crate::telemetry::SecEvent;

/// Primitive operation emitted by the engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SecCommand {
    SetTone(Tone),
    SetVoltage { voltage: Voltage, increased: bool },
    SendToneburst(Burst),
    SendDiseqc(DiseqcFrame),
    InvalidateSwitchParams,
    UpdateSwitchParams,
    InvalidateRotorParams,
    UpdateRotorParams,
}

impl SecCommand {
    /// Runs the command against the front end and updates the cache on success.
    pub fn execute<F: Frontend>(
        &self,
        state: &mut DeviceState,
        frontend: &mut F,
    ) -> Result<(), FrontendError> {
        match self {
            SecCommand::SetTone(tone) => {
                frontend.set_tone(*tone)?;
                state.tone = Some(*tone);
            }
            SecCommand::SetVoltage { voltage, increased } => {
                frontend.enable_high_lnb_voltage(*increased)?;
                frontend.set_voltage(*voltage)?;
                state.voltage = Some(*voltage);
                state.voltage_increased = *increased;
                // Unpowered switches lose their port selection.
                if *voltage == Voltage::Off {
                    state.invalidate_switch();
                }
            }
            SecCommand::SendToneburst(burst) => frontend.send_burst(*burst)?,
            SecCommand::SendDiseqc(frame) => frontend.send_master_cmd(frame)?,
            SecCommand::InvalidateSwitchParams => state.invalidate_switch(),
            SecCommand::UpdateSwitchParams => state.commit_switch(),
            SecCommand::InvalidateRotorParams => state.invalidate_rotor(),
            SecCommand::UpdateRotorParams => state.commit_rotor(),
        }
        Ok(())
    }

    /// Telemetry entry describing the command.
    #[must_use]
    pub fn event(&self) -> SecEvent {
        match self {
            SecCommand::SetTone(tone) => SecEvent::ToneSet(*tone),
            SecCommand::SetVoltage { voltage, increased } => SecEvent::VoltageSet {
                voltage: *voltage,
                increased: *increased,
            },
            SecCommand::SendToneburst(burst) => SecEvent::BurstSent(*burst),
            SecCommand::SendDiseqc(frame) => SecEvent::FrameSent(frame.snapshot()),
            SecCommand::InvalidateSwitchParams => SecEvent::SwitchInvalidated,
            SecCommand::UpdateSwitchParams => SecEvent::SwitchCommitted,
            SecCommand::InvalidateRotorParams => SecEvent::RotorInvalidated,
            SecCommand::UpdateRotorParams => SecEvent::RotorCommitted,
        }
    }
}

/// Cache predicate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Condition {
    VoltageIs(Voltage, bool),
    NotVoltageIs(Voltage, bool),
    ToneIs(Tone),
    RotorPosValid,
}

impl Condition {
    #[must_use]
    pub fn holds(self, state: &DeviceState) -> bool {
        match self {
            Condition::VoltageIs(voltage, increased) => state.voltage_is(voltage, increased),
            Condition::NotVoltageIs(voltage, increased) => !state.voltage_is(voltage, increased),
            Condition::ToneIs(tone) => state.tone_is(tone),
            Condition::RotorPosValid => state.rotor_position_valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::NoopFrontend;
    use crate::state::RotorCommand;

    #[test]
    fn voltage_off_invalidates_switch_triplet() {
        let mut state = DeviceState::new();
        state.committed.stage(0xF0);
        state.uncommitted.stage(0xF4);
        state.commit_switch();
        let mut frontend = NoopFrontend::new();

        SecCommand::SetVoltage {
            voltage: Voltage::V13,
            increased: false,
        }
        .execute(&mut state, &mut frontend)
        .unwrap();
        assert!(state.committed.is(0xF0));

        SecCommand::SetVoltage {
            voltage: Voltage::Off,
            increased: false,
        }
        .execute(&mut state, &mut frontend)
        .unwrap();
        assert!(state.switch_cache_cold());
        assert!(Condition::VoltageIs(Voltage::Off, true).holds(&state));
    }

    #[test]
    fn predicates_track_cache_writes() {
        let mut state = DeviceState::new();
        let mut frontend = NoopFrontend::new();
        assert!(Condition::NotVoltageIs(Voltage::V18, false).holds(&state));

        SecCommand::SetVoltage {
            voltage: Voltage::V18,
            increased: true,
        }
        .execute(&mut state, &mut frontend)
        .unwrap();
        SecCommand::SetTone(Tone::On)
            .execute(&mut state, &mut frontend)
            .unwrap();

        assert!(Condition::VoltageIs(Voltage::V18, true).holds(&state));
        assert!(Condition::NotVoltageIs(Voltage::V18, false).holds(&state));
        assert!(Condition::ToneIs(Tone::On).holds(&state));
        assert!(!Condition::ToneIs(Tone::Off).holds(&state));
    }

    #[test]
    fn rotor_params_follow_invalidate_and_update() {
        let mut state = DeviceState::new();
        let mut frontend = NoopFrontend::new();
        state.rotor_command.stage(RotorCommand::Stored(3));
        state.rotor_position.stage(192);

        SecCommand::UpdateRotorParams
            .execute(&mut state, &mut frontend)
            .unwrap();
        assert!(Condition::RotorPosValid.holds(&state));

        SecCommand::InvalidateRotorParams
            .execute(&mut state, &mut frontend)
            .unwrap();
        assert!(!Condition::RotorPosValid.holds(&state));
    }
}
