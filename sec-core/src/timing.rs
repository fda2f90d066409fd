//! Delay table for SEC sequences.
//!
//! The values follow the DiSEqC bus timing recommendations plus the settle
//! times common LNBs and positioners need after a supply change. Every delay
//! can be overridden per installation through [`SecTimings`].

use core::time::Duration;

/// Settle time after switching the 22 kHz tone off before DiSEqC traffic.
pub const TONE_OFF_BEFORE_DISEQC: Duration = Duration::from_millis(25);
/// Settle time after enabling the LNB supply from off.
pub const AFTER_VOLTAGE_ENABLE: Duration = Duration::from_millis(200);
/// Settle time after changing between 13 V and 18 V.
pub const AFTER_VOLTAGE_CHANGE: Duration = Duration::from_millis(50);
/// Wait after resetting the DiSEqC microcontrollers.
pub const AFTER_RESET: Duration = Duration::from_millis(50);
/// Wait after the peripheral power-on command.
pub const AFTER_POWERON: Duration = Duration::from_millis(150);
/// Gap between repeated frames of the same command.
pub const BETWEEN_REPEATS: Duration = Duration::from_millis(120);
/// Transmission time of one DiSEqC frame, subtracted from alternated gaps.
pub const FRAME_AIRTIME: Duration = Duration::from_millis(54);
/// Wait after the final frame of a command block.
pub const AFTER_LAST_DISEQC: Duration = Duration::from_millis(50);
/// Wait after a toneburst.
pub const AFTER_TONEBURST: Duration = Duration::from_millis(50);
/// Gap before the whole command block is sent a second time.
pub const BEFORE_SEQUENCE_REPEAT: Duration = Duration::from_millis(70);
/// Wait between the switch block and positioner commands.
pub const BETWEEN_SWITCH_AND_MOTOR: Duration = Duration::from_millis(700);
/// Wait after halting the positioner.
pub const AFTER_MOTOR_STOP: Duration = Duration::from_millis(500);
/// Motor supply settle time when the LNB supply was off.
pub const AFTER_ENABLE_VOLTAGE_BEFORE_MOTOR: Duration = Duration::from_millis(900);
/// Motor supply settle time after a voltage change.
pub const AFTER_VOLTAGE_CHANGE_BEFORE_MOTOR: Duration = Duration::from_millis(500);
/// Motor supply settle time when the voltage was already correct.
pub const AFTER_VOLTAGE_SETTLE_BEFORE_MOTOR: Duration = Duration::from_millis(150);
/// Wait after the goto command before polling starts.
pub const AFTER_MOTOR_START: Duration = Duration::from_millis(1_000);
/// Interval between rotor lock polls.
pub const MOTOR_POLL: Duration = Duration::from_millis(250);
/// Settle time after the final voltage or tone change.
pub const AFTER_FINAL_CHANGE: Duration = Duration::from_millis(10);
/// Wait after a manual positioner command.
pub const AFTER_POSITIONER_CMD: Duration = Duration::from_millis(15);

/// Polls per second while waiting for the rotor.
pub const MOTOR_POLLS_PER_SECOND: u32 = 4;
/// Extra seconds added to every rotor move for acceleration and lock.
pub const MOTOR_SETTLE_SECONDS: u32 = 3;
/// Positioner speed assumed for the timeout budget, in tenths of a degree per second.
pub const MOTOR_TENTHS_PER_SECOND: u32 = 10;

/// Per-installation delay table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SecTimings {
    pub tone_off_before_diseqc: Duration,
    pub after_voltage_enable: Duration,
    pub after_voltage_change: Duration,
    pub after_reset: Duration,
    pub after_poweron: Duration,
    pub between_repeats: Duration,
    pub after_last_diseqc: Duration,
    pub after_toneburst: Duration,
    pub before_sequence_repeat: Duration,
    pub between_switch_and_motor: Duration,
    pub after_motor_stop: Duration,
    pub after_enable_voltage_before_motor: Duration,
    pub after_voltage_change_before_motor: Duration,
    pub after_voltage_settle_before_motor: Duration,
    pub after_motor_start: Duration,
    pub motor_poll: Duration,
    pub after_final_change: Duration,
    pub after_positioner_cmd: Duration,
}

impl SecTimings {
    /// Standard delay table.
    pub const STANDARD: Self = Self {
        tone_off_before_diseqc: TONE_OFF_BEFORE_DISEQC,
        after_voltage_enable: AFTER_VOLTAGE_ENABLE,
        after_voltage_change: AFTER_VOLTAGE_CHANGE,
        after_reset: AFTER_RESET,
        after_poweron: AFTER_POWERON,
        between_repeats: BETWEEN_REPEATS,
        after_last_diseqc: AFTER_LAST_DISEQC,
        after_toneburst: AFTER_TONEBURST,
        before_sequence_repeat: BEFORE_SEQUENCE_REPEAT,
        between_switch_and_motor: BETWEEN_SWITCH_AND_MOTOR,
        after_motor_stop: AFTER_MOTOR_STOP,
        after_enable_voltage_before_motor: AFTER_ENABLE_VOLTAGE_BEFORE_MOTOR,
        after_voltage_change_before_motor: AFTER_VOLTAGE_CHANGE_BEFORE_MOTOR,
        after_voltage_settle_before_motor: AFTER_VOLTAGE_SETTLE_BEFORE_MOTOR,
        after_motor_start: AFTER_MOTOR_START,
        motor_poll: MOTOR_POLL,
        after_final_change: AFTER_FINAL_CHANGE,
        after_positioner_cmd: AFTER_POSITIONER_CMD,
    };

    /// Gap between the two halves of an alternated committed/uncommitted pair.
    ///
    /// With repeats configured the gap shrinks to fit the repeat window.
    #[must_use]
    pub fn alternation_gap(&self, repeats: u8) -> Duration {
        if repeats > 0 {
            self.between_repeats.saturating_sub(FRAME_AIRTIME) / 2
        } else {
            self.between_repeats
        }
    }
}

impl Default for SecTimings {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_matches_bus_timings() {
        let timings = SecTimings::default();
        assert_eq!(timings.tone_off_before_diseqc, Duration::from_millis(25));
        assert_eq!(timings.after_voltage_enable, Duration::from_millis(200));
        assert_eq!(timings.after_reset, Duration::from_millis(50));
        assert_eq!(timings.after_poweron, Duration::from_millis(150));
        assert_eq!(timings.between_repeats, Duration::from_millis(120));
        assert_eq!(timings.motor_poll, Duration::from_millis(250));
        assert_eq!(timings.after_positioner_cmd, Duration::from_millis(15));
    }

    #[test]
    fn alternation_gap_shrinks_with_repeats() {
        let timings = SecTimings::default();
        assert_eq!(timings.alternation_gap(0), Duration::from_millis(120));
        assert_eq!(timings.alternation_gap(1), Duration::from_millis(33));
        assert_eq!(timings.alternation_gap(3), Duration::from_millis(33));
    }
}
