//! Configuration model for one satellite front end.
//!
//! Every type in this module is a plain value supplied by the caller per
//! request. [`SecConfig::validate`] performs the range checks that must pass
//! before the engine touches any hardware.

use core::fmt;

use crate::timing::SecTimings;

/// Frequencies are carried in kHz throughout the crate.
pub type Khz = u32;

/// Satellite longitudes are carried in tenths of a degree, east positive.
pub type Tenths = i16;

/// LO threshold value that selects the legacy Dishpro LNB behaviour.
pub const DISHPRO_THRESHOLD: Khz = 1_000;

/// Highest DiSEqC repeat count supported by the bus timing.
pub const MAX_REPEATS: u8 = 3;

/// Number of SatCR user bands addressable by an EN50494 frame.
pub const MAX_SATCR: u8 = 8;

/// Signal polarization of a transponder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Polarization {
    Horizontal,
    Vertical,
    CircularLeft,
    CircularRight,
}

impl Polarization {
    /// Circular left shares the horizontal (18 V) switching leg.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Polarization::Horizontal | Polarization::CircularLeft)
    }

    /// Single-letter label used by the REPL and transcripts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Polarization::Horizontal => "h",
            Polarization::Vertical => "v",
            Polarization::CircularLeft => "l",
            Polarization::CircularRight => "r",
        }
    }
}

/// LNB local-oscillator band.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoBand {
    Low,
    High,
}

impl LoBand {
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, LoBand::High)
    }
}

/// Modulation forwarded untouched to the tuner.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Modulation {
    #[default]
    Auto,
    Qpsk,
    Psk8,
    Apsk16,
    Apsk32,
}

/// LNB oscillator configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LnbConfig {
    pub lof_lo: Khz,
    pub lof_hi: Khz,
    pub lof_threshold: Khz,
    /// Raises 13/18 V to 14/19 V to compensate for long cable runs.
    pub increased_voltage: bool,
    /// `None` keeps the tuner's default priority.
    pub priority: Option<u8>,
}

impl LnbConfig {
    /// Universal Ku-band LNB (9.75 / 10.6 GHz, switching at 11.7 GHz).
    pub const UNIVERSAL: Self = Self::new(9_750_000, 10_600_000, 11_700_000);

    #[must_use]
    pub const fn new(lof_lo: Khz, lof_hi: Khz, lof_threshold: Khz) -> Self {
        Self {
            lof_lo,
            lof_hi,
            lof_threshold,
            increased_voltage: false,
            priority: None,
        }
    }

    /// Returns `true` for the legacy Dishpro dual-LO layout.
    #[must_use]
    pub const fn is_dishpro(&self) -> bool {
        self.lof_threshold == DISHPRO_THRESHOLD
    }
}

impl Default for LnbConfig {
    fn default() -> Self {
        Self::UNIVERSAL
    }
}

/// DiSEqC protocol level spoken by the installation.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub enum DiseqcMode {
    #[default]
    None,
    V1_0,
    V1_1,
    V1_2,
    V1_3,
}

impl DiseqcMode {
    /// Any DiSEqC traffic at all.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self >= DiseqcMode::V1_0
    }

    /// Repeats and uncommitted switches exist from 1.1 on.
    #[must_use]
    pub fn supports_repeats(self) -> bool {
        self >= DiseqcMode::V1_1
    }

    /// Positioner commands exist from 1.2 on.
    #[must_use]
    pub fn has_positioner(self) -> bool {
        self >= DiseqcMode::V1_2
    }

    #[must_use]
    pub fn has_angular_positioner(self) -> bool {
        self == DiseqcMode::V1_3
    }
}

/// Committed switch port selected with the DiSEqC 1.0 command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommittedPort {
    AA,
    AB,
    BA,
    BB,
}

impl CommittedPort {
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            CommittedPort::AA => 0,
            CommittedPort::AB => 1,
            CommittedPort::BA => 2,
            CommittedPort::BB => 3,
        }
    }
}

/// Value sent with the committed (`0x38`) switch command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommittedCommand {
    Port(CommittedPort),
    /// Do not send a committed command.
    SendNo,
    /// Raw committed byte in `0xF0..=0xFF`.
    Raw(u8),
}

impl CommittedCommand {
    /// Numeric encoding where ports occupy `0..=3` and `SendNo` is `4`.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            CommittedCommand::Port(port) => port.index(),
            CommittedCommand::SendNo => SEND_NO,
            CommittedCommand::Raw(byte) => byte,
        }
    }
}

/// Encoded value of [`CommittedCommand::SendNo`].
pub const SEND_NO: u8 = 4;

/// Toneburst (mini DiSEqC) selection.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ToneburstMode {
    #[default]
    None,
    A,
    B,
}

/// Order in which toneburst, committed and uncommitted commands are sent.
///
/// Bit 0 sends the toneburst ahead of the switch commands; bit 2 sends the
/// uncommitted command ahead of the committed one.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CommandOrder {
    #[default]
    CommittedToneburst,
    ToneburstCommitted,
    CommittedUncommittedToneburst,
    ToneburstCommittedUncommitted,
    UncommittedCommittedToneburst,
    ToneburstUncommittedCommitted,
}

impl CommandOrder {
    pub const ALL: [CommandOrder; 6] = [
        CommandOrder::CommittedToneburst,
        CommandOrder::ToneburstCommitted,
        CommandOrder::CommittedUncommittedToneburst,
        CommandOrder::ToneburstCommittedUncommitted,
        CommandOrder::UncommittedCommittedToneburst,
        CommandOrder::ToneburstUncommittedCommitted,
    ];

    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            CommandOrder::CommittedToneburst => 0,
            CommandOrder::ToneburstCommitted => 1,
            CommandOrder::CommittedUncommittedToneburst => 2,
            CommandOrder::ToneburstCommittedUncommitted => 3,
            CommandOrder::UncommittedCommittedToneburst => 4,
            CommandOrder::ToneburstUncommittedCommitted => 5,
        }
    }

    #[must_use]
    pub const fn toneburst_first(self) -> bool {
        self.bits() & 1 != 0
    }

    #[must_use]
    pub const fn uncommitted_first(self) -> bool {
        self.bits() & 4 != 0
    }
}

/// DiSEqC switch configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DiseqcConfig {
    pub mode: DiseqcMode,
    pub repeats: u8,
    pub committed: CommittedCommand,
    /// Uncommitted byte in `0xF0..=0xFF`; `None` sends no uncommitted command.
    pub uncommitted: Option<u8>,
    pub order: CommandOrder,
    /// Skip the committed command when only the band bits changed.
    pub use_fast: bool,
    /// Send the whole command block twice.
    pub seq_repeat: bool,
    pub toneburst: ToneburstMode,
}

impl DiseqcConfig {
    /// No DiSEqC switching at all.
    pub const DISABLED: Self = Self {
        mode: DiseqcMode::None,
        repeats: 0,
        committed: CommittedCommand::SendNo,
        uncommitted: None,
        order: CommandOrder::CommittedToneburst,
        use_fast: false,
        seq_repeat: false,
        toneburst: ToneburstMode::None,
    };

    /// A plain DiSEqC 1.0 switch on the given committed port.
    #[must_use]
    pub const fn committed(port: CommittedPort) -> Self {
        Self {
            mode: DiseqcMode::V1_0,
            committed: CommittedCommand::Port(port),
            ..Self::DISABLED
        }
    }
}

impl Default for DiseqcConfig {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Input-power based motor detection parameters.
///
/// Only the voltage choice while driving is implemented; the detection
/// strategy itself is left to the frontend integration.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct InputPowerConfig {
    pub enabled: bool,
    pub delta: u8,
    pub speed: u8,
}

/// Rotor site and target satellite.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RotorConfig {
    /// Site longitude in degrees, east positive.
    pub site_longitude: f64,
    /// Site latitude in degrees, north positive.
    pub site_latitude: f64,
    pub sat_longitude: Tenths,
    pub input_power: InputPowerConfig,
    /// Forget the cached rotor position once, on the next run.
    pub reset_cache: bool,
}

/// LNB supply voltage policy.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum VoltageMode {
    V13,
    V18,
    /// 13 V with the increased-voltage flag raised.
    V14,
    /// Select by polarization: horizontal 18 V, vertical 13 V.
    #[default]
    HV,
    /// Like `HV`, but switch commands are sent at 13 V.
    HV13,
}

/// 22 kHz tone policy.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ToneMode {
    On,
    Off,
    /// Tone selects the high LO band.
    #[default]
    HiLo,
}

/// Voltage, tone and rotor slot selection for the satellite.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SwitchConfig {
    pub voltage_mode: VoltageMode,
    pub tone_mode: ToneMode,
    /// Stored positioner slot; `None` falls back to angular positioning.
    pub rotor_position: Option<u8>,
}

/// Single-cable (EN50494 SatCR) distribution.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnicableConfig {
    /// SatCR user band, `0..=7`.
    pub satcr: u8,
    /// SatCR centre frequency.
    pub satcr_frequency: Khz,
    /// Number of LNB positions on the distribution, 1 or 2.
    pub positions: u8,
    /// Position this satellite sits on, below `positions`.
    pub lnb_number: u8,
}

/// Transponder a tune request wants to lock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransponderParams {
    pub frequency: Khz,
    pub polarization: Polarization,
    pub symbol_rate: u32,
    pub modulation: Modulation,
}

impl TransponderParams {
    #[must_use]
    pub const fn new(frequency: Khz, polarization: Polarization, symbol_rate: u32) -> Self {
        Self {
            frequency,
            polarization,
            symbol_rate,
            modulation: Modulation::Auto,
        }
    }
}

/// Band selector used when preparing a blind scan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlindTarget {
    pub polarization: Polarization,
    pub band: LoBand,
}

/// Immutable snapshot of everything the engine needs for one request.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SecConfig {
    pub lnb: LnbConfig,
    pub diseqc: DiseqcConfig,
    pub rotor: RotorConfig,
    pub switch: SwitchConfig,
    pub unicable: Option<UnicableConfig>,
    pub timings: SecTimings,
}

impl SecConfig {
    /// Universal LNB wired straight to the tuner.
    #[must_use]
    pub fn direct(lnb: LnbConfig) -> Self {
        Self {
            lnb,
            diseqc: DiseqcConfig::DISABLED,
            rotor: RotorConfig::default(),
            switch: SwitchConfig::default(),
            unicable: None,
            timings: SecTimings::default(),
        }
    }

    /// Runs every range check; no hardware is touched before this passes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let diseqc = &self.diseqc;
        if diseqc.repeats > MAX_REPEATS {
            return Err(ConfigError::RepeatCount(diseqc.repeats));
        }
        if let CommittedCommand::Raw(byte) = diseqc.committed
            && byte < 0xF0
        {
            return Err(ConfigError::CommittedByte(byte));
        }
        if let Some(byte) = diseqc.uncommitted
            && byte < 0xF0
        {
            return Err(ConfigError::UncommittedByte(byte));
        }

        let rotor = &self.rotor;
        if !(-90.0..=90.0).contains(&rotor.site_latitude)
            || !(-180.0..=180.0).contains(&rotor.site_longitude)
        {
            return Err(ConfigError::SiteCoordinates);
        }
        if !(-1_800..=1_800).contains(&rotor.sat_longitude) {
            return Err(ConfigError::SatelliteLongitude(rotor.sat_longitude));
        }

        if let Some(unicable) = &self.unicable {
            if unicable.satcr >= MAX_SATCR {
                return Err(ConfigError::SatcrIndex(unicable.satcr));
            }
            if !(1..=2).contains(&unicable.positions) {
                return Err(ConfigError::PositionCount(unicable.positions));
            }
            if unicable.lnb_number >= unicable.positions {
                return Err(ConfigError::LnbNumber(unicable.lnb_number));
            }
        }

        Ok(())
    }
}

impl Default for SecConfig {
    fn default() -> Self {
        Self::direct(LnbConfig::UNIVERSAL)
    }
}

/// Out-of-range configuration or request arguments.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    RepeatCount(u8),
    CommittedByte(u8),
    UncommittedByte(u8),
    SiteCoordinates,
    SatelliteLongitude(Tenths),
    SatcrIndex(u8),
    PositionCount(u8),
    LnbNumber(u8),
    /// Unicable tuning word outside the 10-bit range.
    TuningWord(i32),
    DriveUnits(u8),
    /// Stored position `0` is reserved for the limits-on command.
    StorePosition(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::RepeatCount(value) => {
                write!(f, "repeat count {value} exceeds {MAX_REPEATS}")
            }
            ConfigError::CommittedByte(value) => write!(f, "committed byte {value:#04x} below 0xf0"),
            ConfigError::UncommittedByte(value) => {
                write!(f, "uncommitted byte {value:#04x} below 0xf0")
            }
            ConfigError::SiteCoordinates => f.write_str("site coordinates out of range"),
            ConfigError::SatelliteLongitude(value) => {
                write!(f, "satellite longitude {value} out of range")
            }
            ConfigError::SatcrIndex(value) => write!(f, "satcr index {value} out of range"),
            ConfigError::PositionCount(value) => write!(f, "position count {value} must be 1 or 2"),
            ConfigError::LnbNumber(value) => write!(f, "lnb number {value} out of range"),
            ConfigError::TuningWord(value) => write!(f, "satcr tuning word {value} out of range"),
            ConfigError::DriveUnits(value) => write!(f, "drive units {value} out of range"),
            ConfigError::StorePosition(value) => write!(f, "cannot store position {value}"),
        }
    }
}
