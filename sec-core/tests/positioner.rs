mod common;

use core::time::Duration;

use common::{BusOp, CancelAfter, Rig, frame, transponder, tune};
use sec_core::cancel::CancelFlag;
use sec_core::config::{
    CommittedPort, ConfigError, DiseqcConfig, DiseqcMode, Polarization, SecConfig, Tenths,
};
use sec_core::diseqc::{Direction, DriveUnit};
use sec_core::engine::{Infeasibility, PrepareOutcome, RotorReport, SecError, SecOperation, SecRequest};
use sec_core::frontend::{Tone, Voltage};
use sec_core::positioner::produce_angular_positioner;
use sec_core::state::RotorCommand;

fn rotor_config(mode: DiseqcMode, slot: Option<u8>, sat_longitude: Tenths) -> SecConfig {
    let mut config = SecConfig {
        diseqc: DiseqcConfig {
            mode,
            ..DiseqcConfig::committed(CommittedPort::AA)
        },
        ..SecConfig::default()
    };
    config.switch.rotor_position = slot;
    config.rotor.sat_longitude = sat_longitude;
    config
}

/// Rig whose rotor already points at 10.0E through stored slot 2.
fn parked_rig() -> Rig {
    let mut rig = Rig::new();
    rig.prepare(
        &rotor_config(DiseqcMode::V1_2, Some(2), 100),
        &tune(12_000_000, Polarization::Vertical),
    )
    .expect("initial move should succeed");
    rig.frontend.clear();
    rig.frontend.polls = 0;
    rig
}

fn positioner(rig: &mut Rig, mode: DiseqcMode, operation: SecOperation) -> Result<PrepareOutcome, SecError> {
    rig.prepare(
        &rotor_config(mode, None, 0),
        &SecRequest::positioner(operation, None),
    )
    .map(|report| report.outcome)
}

#[test]
fn first_move_budgets_for_half_a_turn() {
    let mut rig = Rig::new();
    let report = rig
        .prepare(
            &rotor_config(DiseqcMode::V1_2, Some(2), 100),
            &tune(12_000_000, Polarization::Vertical),
        )
        .expect("move should succeed");

    assert_eq!(
        report.rotor,
        Some(RotorReport {
            budget_ticks: 732,
            ticks_used: 732,
            locked: false,
        })
    );
    // No halt: the previous position is unknown.
    assert_eq!(
        rig.frontend.frames(),
        [
            vec![0xE0, 0x00, 0x00],
            vec![0xE0, 0x00, 0x03],
            vec![0xE0, 0x10, 0x38, 0xF1],
            vec![0xE0, 0x31, 0x6B, 0x02],
        ]
    );
    assert_eq!(rig.state.rotor_command.active(), Some(RotorCommand::Stored(2)));
    assert_eq!(rig.state.rotor_position.active(), Some(100));
    assert_eq!(rig.frontend.ops.last(), Some(&BusOp::Lock(1_400_000)));
}

#[test]
fn twenty_degree_move_polls_ninety_two_ticks() {
    let mut rig = parked_rig();
    let report = rig
        .prepare(
            &rotor_config(DiseqcMode::V1_2, Some(3), -100),
            &tune(12_000_000, Polarization::Vertical),
        )
        .expect("move should succeed");

    assert_eq!(
        report.rotor,
        Some(RotorReport {
            budget_ticks: 92,
            ticks_used: 92,
            locked: false,
        })
    );
    assert_eq!(rig.state.motor_ticks, Some(92));
    assert_eq!(rig.state.rotor_position.active(), Some(-100));
    assert_eq!(
        rig.frontend.significant(),
        [
            BusOp::Tone(Tone::Off),
            frame(&[0xE0, 0x31, 0x60]),
            frame(&[0xE0, 0x31, 0x6B, 0x03]),
            BusOp::Tone(Tone::On),
            BusOp::SetPara(1_400_000),
            BusOp::Lock(1_400_000),
        ]
    );
    // Tone off, halt, settle, motor start, tone back on and 92 polls.
    assert_eq!(
        report.elapsed,
        Duration::from_millis(25 + 500 + 150 + 1_000 + 10 + 92 * 250)
    );
}

#[test]
fn lock_ends_the_move_early() {
    let mut rig = parked_rig();
    rig.frontend.lock_after_polls = Some(9);
    let report = rig
        .prepare(
            &rotor_config(DiseqcMode::V1_2, Some(3), -100),
            &tune(12_000_000, Polarization::Vertical),
        )
        .expect("move should succeed");

    assert_eq!(
        report.rotor,
        Some(RotorReport {
            budget_ticks: 92,
            ticks_used: 10,
            locked: true,
        })
    );
    assert_eq!(rig.state.rotor_command.active(), Some(RotorCommand::Stored(3)));
}

#[test]
fn parked_rotor_is_not_moved_again() {
    let mut rig = parked_rig();
    let report = rig
        .prepare(
            &rotor_config(DiseqcMode::V1_2, Some(2), 100),
            &tune(12_000_000, Polarization::Vertical),
        )
        .expect("tune should succeed");

    assert_eq!(report.rotor, None);
    assert_eq!(rig.frontend.ops, [BusOp::Lock(1_400_000)]);
}

#[test]
fn armed_reset_forgets_the_rotor_once() {
    let mut rig = parked_rig();
    let config = rotor_config(DiseqcMode::V1_2, Some(2), 100);
    let request = tune(12_000_000, Polarization::Vertical);

    rig.state.arm_rotor_reset();
    let report = rig.prepare(&config, &request).expect("move should succeed");
    assert_eq!(report.rotor.map(|rotor| rotor.budget_ticks), Some(732));
    assert!(!rig.frontend.frames().contains(&vec![0xE0, 0x31, 0x60]));

    rig.frontend.clear();
    let report = rig.prepare(&config, &request).expect("tune should succeed");
    assert_eq!(report.rotor, None);
}

#[test]
fn input_power_drives_the_motor_at_eighteen_volts() {
    let mut config = rotor_config(DiseqcMode::V1_2, Some(2), 100);
    config.rotor.input_power.enabled = true;
    let mut rig = Rig::new();
    rig.prepare(&config, &tune(12_000_000, Polarization::Vertical))
        .expect("move should succeed");

    let voltages: Vec<_> = rig
        .frontend
        .ops
        .iter()
        .filter_map(|op| match op {
            BusOp::Voltage(voltage) => Some(*voltage),
            _ => None,
        })
        .collect();
    assert_eq!(voltages, [Voltage::V13, Voltage::V18, Voltage::V13]);
}

#[test]
fn supply_returns_to_the_tune_voltage_with_its_own_settle() {
    let mut rig = parked_rig();
    let mut config = rotor_config(DiseqcMode::V1_2, Some(3), -100);
    config.rotor.input_power.enabled = true;
    let report = rig
        .prepare(&config, &tune(12_000_000, Polarization::Vertical))
        .expect("move should succeed");

    assert_eq!(
        rig.frontend.significant(),
        [
            BusOp::Tone(Tone::Off),
            frame(&[0xE0, 0x31, 0x60]),
            BusOp::Voltage(Voltage::V18),
            frame(&[0xE0, 0x31, 0x6B, 0x03]),
            BusOp::Voltage(Voltage::V13),
            BusOp::Tone(Tone::On),
            BusOp::SetPara(1_400_000),
            BusOp::Lock(1_400_000),
        ]
    );
    // Tone off, halt, motor voltage change, motor start, 13 V change, tone
    // back on and 92 polls.
    assert_eq!(
        report.elapsed,
        Duration::from_millis(25 + 500 + 500 + 1_000 + 50 + 10 + 92 * 250)
    );
}

#[test]
fn cancellation_halts_a_moving_rotor() {
    let mut rig = parked_rig();
    // Before the switch block, before the move, then the third poll tick.
    let cancel = CancelAfter::new(5);
    let report = rig
        .prepare_with(
            &rotor_config(DiseqcMode::V1_2, Some(3), -100),
            &tune(12_000_000, Polarization::Vertical),
            &cancel,
        )
        .expect("cancellation is not an error");

    assert_eq!(report.outcome, PrepareOutcome::Cancelled);
    assert_eq!(report.rotor, None);
    assert_eq!(rig.frontend.frames().last(), Some(&vec![0xE0, 0x31, 0x60]));
    assert!(
        !rig.frontend
            .ops
            .iter()
            .any(|op| matches!(op, BusOp::Lock(_)))
    );
    assert_eq!(rig.state.rotor_position.active(), None);
    assert_eq!(rig.state.rotor_position.pending(), Some(-100));
    assert_eq!(rig.events().last().map(String::as_str), Some("finished cancelled"));
}

#[test]
fn cancellation_before_the_switch_block_touches_nothing() {
    let mut rig = Rig::new();
    let cancel = CancelFlag::new();
    cancel.request();
    let report = rig
        .prepare_with(
            &rotor_config(DiseqcMode::V1_2, Some(3), -100),
            &tune(12_000_000, Polarization::Vertical),
            &cancel,
        )
        .expect("cancellation is not an error");

    assert_eq!(report.outcome, PrepareOutcome::Cancelled);
    assert!(rig.frontend.ops.is_empty());
}

#[test]
fn raw_commands_map_to_single_frames() {
    let cases = [
        (SecOperation::Stop, vec![0xE0, 0x31, 0x60]),
        (SecOperation::LimitsOff, vec![0xE0, 0x31, 0x63]),
        (SecOperation::LimitsOn, vec![0xE0, 0x31, 0x6A, 0x00]),
        (SecOperation::StoreLimit(Direction::East), vec![0xE0, 0x31, 0x66]),
        (SecOperation::StoreLimit(Direction::West), vec![0xE0, 0x31, 0x67]),
        (SecOperation::StorePosition(7), vec![0xE0, 0x31, 0x6A, 0x07]),
        (SecOperation::GotoStored(5), vec![0xE0, 0x31, 0x6B, 0x05]),
        (
            SecOperation::Nudge {
                direction: Direction::West,
                unit: DriveUnit::Seconds(3),
            },
            vec![0xE0, 0x31, 0x69, 0x03],
        ),
    ];
    for (operation, bytes) in cases {
        let mut rig = Rig::new();
        let outcome = positioner(&mut rig, DiseqcMode::V1_2, operation).expect("command should succeed");
        assert_eq!(outcome, PrepareOutcome::Completed);
        assert_eq!(rig.frontend.frames(), [bytes], "{operation}");
        assert_eq!(rig.delay.total, Duration::from_millis(15));
    }
}

#[test]
fn nudge_invalidates_the_rotor_and_retunes() {
    let mut rig = parked_rig();
    let request = SecRequest::positioner(
        SecOperation::Nudge {
            direction: Direction::East,
            unit: DriveUnit::Steps(5),
        },
        Some(transponder(11_000_000, Polarization::Vertical)),
    );
    let report = rig
        .prepare(&rotor_config(DiseqcMode::V1_2, None, 0), &request)
        .expect("nudge should succeed");

    assert_eq!(
        rig.frontend.ops,
        [frame(&[0xE0, 0x31, 0x68, 0xFB]), BusOp::SetPara(1_250_000)]
    );
    assert_eq!(report.tuned.map(|params| params.frequency), Some(1_250_000));
    assert!(!rig.state.rotor_position_valid());
}

#[test]
fn store_does_not_invalidate_the_rotor() {
    let mut rig = parked_rig();
    positioner(&mut rig, DiseqcMode::V1_2, SecOperation::StorePosition(4)).expect("store should succeed");
    assert!(rig.state.rotor_position_valid());
}

#[test]
fn angular_goto_sends_the_usals_word() {
    let mut rig = Rig::new();
    positioner(&mut rig, DiseqcMode::V1_3, SecOperation::GotoAngular(130)).expect("goto should succeed");

    let word = produce_angular_positioner(0.0, 0.0, 13.0);
    let [high, low] = word.to_be_bytes();
    assert_eq!(rig.frontend.frames(), [vec![0xE0, 0x31, 0x6E, high, low]]);
}

#[test]
fn angular_tune_uses_the_site_coordinates() {
    let mut config = rotor_config(DiseqcMode::V1_3, None, 192);
    config.rotor.site_longitude = 13.4;
    config.rotor.site_latitude = 52.5;
    let mut rig = Rig::new();
    rig.prepare(&config, &tune(12_000_000, Polarization::Vertical))
        .expect("move should succeed");

    let word = produce_angular_positioner(13.4, 52.5, 19.2);
    assert_eq!(rig.state.rotor_command.active(), Some(RotorCommand::Angular(word)));
    let [high, low] = word.to_be_bytes();
    assert!(rig.frontend.frames().contains(&vec![0xE0, 0x31, 0x6E, high, low]));
}

#[test]
fn positioner_commands_need_a_positioner() {
    let mut rig = Rig::new();
    assert_eq!(
        positioner(&mut rig, DiseqcMode::V1_1, SecOperation::Stop),
        Err(SecError::Infeasible(Infeasibility::NoPositioner))
    );
    assert_eq!(
        positioner(&mut rig, DiseqcMode::V1_0, SecOperation::GotoAngular(130)),
        Err(SecError::Infeasible(Infeasibility::NoPositioner))
    );
    assert_eq!(
        positioner(&mut rig, DiseqcMode::V1_2, SecOperation::GotoAngular(130)),
        Err(SecError::Infeasible(Infeasibility::NoAngularPositioner))
    );
    assert!(rig.frontend.ops.is_empty());
}

#[test]
fn positioner_arguments_are_checked_before_sending() {
    let mut rig = Rig::new();
    assert_eq!(
        positioner(&mut rig, DiseqcMode::V1_2, SecOperation::StorePosition(0)),
        Err(SecError::Config(ConfigError::StorePosition(0)))
    );
    assert_eq!(
        positioner(
            &mut rig,
            DiseqcMode::V1_2,
            SecOperation::Nudge {
                direction: Direction::East,
                unit: DriveUnit::Seconds(200),
            }
        ),
        Err(SecError::Config(ConfigError::DriveUnits(200)))
    );
    assert!(rig.frontend.ops.is_empty());
}
