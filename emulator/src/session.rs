use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant as HostInstant};

use sec_core::config::{
    CommittedPort, DiseqcConfig, DiseqcMode, Khz, RotorConfig, SecConfig, UnicableConfig,
};
use sec_core::diseqc::DiseqcFrame;
use sec_core::engine::{PrepareReport, SecRequest};
use sec_core::frontend::{Burst, Frontend, FrontendError, LockStatus, Tone, TuneParams, Voltage};
use sec_core::positioner::DIGIT_LOOKUP;
use sec_core::repl::catalog;
use sec_core::repl::commands::{
    CommandError, CommandExecutor, CommandOutcome, RequestSink, write_help,
};
use sec_core::repl::status::StatusFormatter;
use sec_runtime::{Coordinator, CoordinatorConfig, CoordinatorError};

/// Tuner input range of the simulated front end.
const IF_RANGE: std::ops::RangeInclusive<Khz> = 950_000..=2_150_000;
/// Rotor speed in hundredths of a degree per second.
const ROTOR_SPEED: i32 = 100;
/// Stored positioner slots the simulated rotor ships with.
const FACTORY_SLOTS: [(u8, i32); 3] = [(1, 0), (2, 1_240), (3, -2_810)];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Switching,
    Rotor,
    Unicable,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Switching => "transcripts/emulator-switching.log",
            TranscriptProfile::Rotor => "transcripts/emulator-rotor.log",
            TranscriptProfile::Unicable => "transcripts/emulator-unicable.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Switching => "SEC Emulator switching transcript",
            TranscriptProfile::Rotor => "SEC Emulator rotor transcript",
            TranscriptProfile::Unicable => "SEC Emulator unicable transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("switching") {
            Ok(Self::Switching)
        } else if tag.eq_ignore_ascii_case("rotor") {
            Ok(Self::Rotor)
        } else if tag.eq_ignore_ascii_case("unicable") {
            Ok(Self::Unicable)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }

    /// Installation simulated for this profile.
    pub fn installation(self) -> SecConfig {
        match self {
            TranscriptProfile::Switching => SecConfig {
                diseqc: DiseqcConfig {
                    mode: DiseqcMode::V1_1,
                    uncommitted: Some(0xF2),
                    ..DiseqcConfig::committed(CommittedPort::AB)
                },
                ..SecConfig::default()
            },
            TranscriptProfile::Rotor => SecConfig {
                diseqc: DiseqcConfig {
                    mode: DiseqcMode::V1_3,
                    ..DiseqcConfig::committed(CommittedPort::AA)
                },
                rotor: RotorConfig {
                    site_longitude: 13.4,
                    site_latitude: 52.5,
                    sat_longitude: 192,
                    ..RotorConfig::default()
                },
                ..SecConfig::default()
            },
            TranscriptProfile::Unicable => SecConfig {
                unicable: Some(UnicableConfig {
                    satcr: 1,
                    satcr_frequency: 1_210_000,
                    positions: 2,
                    lnb_number: 0,
                }),
                ..SecConfig::default()
            },
        }
    }
}

pub struct Session {
    executor: CommandExecutor<InstallationSink>,
    frontend: SimulatedFrontend,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    /// Starts a worker for the profile's installation; `time_scale` divides
    /// every engine delay and speeds the simulated rotor up accordingly.
    pub fn new(profile: TranscriptProfile, time_scale: u32) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let frontend = SimulatedFrontend::new(time_scale);
        let coordinator = Coordinator::spawn(
            CoordinatorConfig::new(0).with_time_scale(time_scale),
            frontend.clone(),
        )
        .map_err(io::Error::other)?;
        let executor = CommandExecutor::new(InstallationSink {
            coordinator,
            config: profile.installation(),
        });
        tracing::info!(?profile, time_scale, "emulator: session started");

        Ok(Self {
            executor,
            frontend,
            transcript,
            started_at: HostInstant::now(),
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut lines = Vec::new();
        match self.executor.execute(trimmed) {
            Ok(CommandOutcome::Submitted { request, report }) => {
                lines.extend(self.bus_lines());
                lines.extend(describe_submission(&request, report.as_ref()));
            }
            Ok(CommandOutcome::Status) => {
                let snapshot = self.executor.sink().coordinator.status();
                let mut text = String::new();
                let _ = StatusFormatter::new(&snapshot).write_all(&mut text);
                lines.extend(text.lines().map(str::to_string));
            }
            Ok(CommandOutcome::Help(spec)) => {
                let mut text = String::new();
                let _ = write_help(&mut text, spec);
                lines.extend(text.lines().map(str::to_string));
            }
            Err(CommandError::Parse(err)) => lines.push(format!("ERR syntax {err}")),
            Err(CommandError::UnknownTopic(topic)) => {
                lines.push(format!("No help available for `{topic}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
            Err(CommandError::Sink(err)) => {
                lines.extend(self.bus_lines());
                lines.push(format!("ERR sec {err}"));
            }
        }

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    /// Waits for background probes and reports the bus traffic they caused.
    pub fn settle(&mut self) -> io::Result<Vec<String>> {
        self.executor.sink().coordinator.wait_idle();
        let lines = self.bus_lines();
        let elapsed = self.started_at.elapsed();
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn bus_lines(&self) -> Vec<String> {
        self.frontend
            .drain_log()
            .into_iter()
            .map(|line| format!("  {line}"))
            .collect()
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

/// Routes REPL requests through the coordinator with a fixed installation.
struct InstallationSink {
    coordinator: Coordinator,
    config: SecConfig,
}

impl RequestSink for InstallationSink {
    type Error = CoordinatorError;

    fn submit(&mut self, request: SecRequest) -> Result<Option<PrepareReport>, Self::Error> {
        self.coordinator.enqueue(&self.config, request)
    }
}

fn describe_submission(request: &SecRequest, report: Option<&PrepareReport>) -> Vec<String> {
    let Some(report) = report else {
        return vec![format!("OK {} queued (probe)", request.operation)];
    };

    let mut lines = vec![format!(
        "OK {} {} frames={} elapsed={}ms",
        request.operation,
        report.outcome,
        report.frames_sent,
        report.elapsed.as_millis()
    )];
    if let Some(rotor) = report.rotor {
        lines.push(format!(
            "   rotor budget={} ticks={} locked={}",
            rotor.budget_ticks, rotor.ticks_used, rotor.locked
        ));
    }
    if let Some(tuned) = report.tuned {
        lines.push(format!(
            "   tuner if={}kHz sr={}ksym/s",
            tuned.frequency,
            tuned.symbol_rate / 1_000
        ));
    }
    lines
}

/// Dish, switch and tuner behind the simulated coax.
#[derive(Debug)]
struct Equipment {
    log: Vec<String>,
    time_scale: i64,
    /// Motor angle in hundredths of a degree, east positive.
    dish: i32,
    target: Option<i32>,
    moved_at: HostInstant,
    slots: BTreeMap<u8, i32>,
    tuned: Option<Khz>,
    voltage: Option<Voltage>,
}

impl Equipment {
    fn advance(&mut self) {
        let now = HostInstant::now();
        let Some(target) = self.target else {
            self.moved_at = now;
            return;
        };
        let micros = i64::try_from(now.duration_since(self.moved_at).as_micros()).unwrap_or(i64::MAX);
        let travel = micros
            .saturating_mul(self.time_scale)
            .saturating_mul(i64::from(ROTOR_SPEED))
            / 1_000_000;
        if travel == 0 {
            return;
        }
        self.moved_at = now;
        let remaining = i64::from(target) - i64::from(self.dish);
        let step = remaining.clamp(-travel, travel);
        self.dish = i32::try_from(i64::from(self.dish) + step).unwrap_or(target);
        if self.dish == target {
            self.target = None;
            self.log.push(format!("rotor arrived at {}", format_angle(self.dish)));
        }
    }

    fn drive_to(&mut self, target: i32) {
        self.advance();
        self.target = Some(target);
        self.log.push(format!(
            "rotor moving {} -> {}",
            format_angle(self.dish),
            format_angle(target)
        ));
    }

    fn positioner(&mut self, frame: &DiseqcFrame) {
        let data = frame.data();
        match frame.command() {
            Some(0x60) => {
                self.advance();
                if self.target.take().is_some() {
                    self.log.push(format!("rotor halted at {}", format_angle(self.dish)));
                }
            }
            Some(0x6B) => {
                let stored = data.first().and_then(|slot| self.slots.get(slot)).copied();
                match stored {
                    Some(target) => self.drive_to(target),
                    None => self.log.push("rotor ignored goto to empty slot".to_string()),
                }
            }
            Some(0x6E) => {
                if let [high, low] = data {
                    self.drive_to(decode_angular(u16::from_be_bytes([*high, *low])));
                }
            }
            Some(command @ (0x68 | 0x69)) => {
                let sign = if command == 0x68 { 1 } else { -1 };
                match data.first().copied().unwrap_or(0) {
                    0 => self.log.push("rotor driving until halted".to_string()),
                    seconds @ 1..=0x7F => {
                        self.drive_to(self.dish + sign * i32::from(seconds) * ROTOR_SPEED);
                    }
                    steps => self.drive_to(self.dish + sign * i32::from(steps.wrapping_neg()) * 10),
                }
            }
            Some(0x6A) => match data.first().copied() {
                Some(0) | None => self.log.push("rotor soft limits enabled".to_string()),
                Some(slot) => {
                    self.advance();
                    self.slots.insert(slot, self.dish);
                    self.log
                        .push(format!("rotor stored slot {slot} at {}", format_angle(self.dish)));
                }
            },
            _ => {}
        }
    }

    fn locked(&mut self) -> bool {
        self.advance();
        self.target.is_none()
            && self.voltage.is_some_and(|voltage| voltage != Voltage::Off)
            && self.tuned.is_some_and(|frequency| IF_RANGE.contains(&frequency))
    }
}

/// Front end that simulates a dish on a USALS rotor and logs the bus.
#[derive(Clone)]
pub struct SimulatedFrontend {
    equipment: Arc<Mutex<Equipment>>,
}

impl SimulatedFrontend {
    pub fn new(time_scale: u32) -> Self {
        Self {
            equipment: Arc::new(Mutex::new(Equipment {
                log: Vec::new(),
                time_scale: i64::from(time_scale.max(1)),
                dish: 0,
                target: None,
                moved_at: HostInstant::now(),
                slots: FACTORY_SLOTS.into_iter().collect(),
                tuned: None,
                voltage: None,
            })),
        }
    }

    fn equipment(&self) -> MutexGuard<'_, Equipment> {
        self.equipment.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn drain_log(&self) -> Vec<String> {
        std::mem::take(&mut self.equipment().log)
    }
}

impl Frontend for SimulatedFrontend {
    fn set_tone(&mut self, tone: Tone) -> Result<(), FrontendError> {
        self.equipment().log.push(format!("bus tone {tone}"));
        Ok(())
    }

    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), FrontendError> {
        let mut equipment = self.equipment();
        equipment.voltage = Some(voltage);
        equipment.log.push(format!("bus voltage {voltage}"));
        Ok(())
    }

    fn enable_high_lnb_voltage(&mut self, increased: bool) -> Result<(), FrontendError> {
        if increased {
            self.equipment().log.push("bus voltage +1V".to_string());
        }
        Ok(())
    }

    fn send_master_cmd(&mut self, frame: &DiseqcFrame) -> Result<(), FrontendError> {
        let mut equipment = self.equipment();
        if equipment.voltage.is_none_or(|voltage| voltage == Voltage::Off) {
            return Err(FrontendError::Io(5));
        }
        equipment.log.push(format!("bus diseqc {frame}"));
        if matches!(frame.address(), Some(0x30 | 0x31)) {
            equipment.positioner(frame);
        }
        Ok(())
    }

    fn send_burst(&mut self, burst: Burst) -> Result<(), FrontendError> {
        self.equipment().log.push(format!("bus toneburst {burst:?}"));
        Ok(())
    }

    fn lock(&mut self, params: &TuneParams, _: Duration) -> Result<LockStatus, FrontendError> {
        let mut equipment = self.equipment();
        equipment.tuned = Some(params.frequency);
        let status = if equipment.locked() {
            LockStatus::Locked
        } else {
            LockStatus::Unlocked
        };
        equipment.log.push(format!(
            "tuner lock {}kHz -> {}",
            params.frequency,
            if status.is_locked() { "locked" } else { "no signal" }
        ));
        Ok(status)
    }

    fn set_para(&mut self, params: &TuneParams) -> Result<(), FrontendError> {
        let mut equipment = self.equipment();
        equipment.tuned = Some(params.frequency);
        equipment.log.push(format!("tuner set {}kHz", params.frequency));
        Ok(())
    }

    fn status(&mut self) -> Result<LockStatus, FrontendError> {
        Ok(if self.equipment().locked() {
            LockStatus::Locked
        } else {
            LockStatus::Unlocked
        })
    }

    fn set_status_callback(&mut self, _: bool) {}
}

/// Inverse of the USALS word encoding, in hundredths of a degree.
fn decode_angular(word: u16) -> i32 {
    let whole = i32::from((word >> 4) & 0xFF);
    let nibble = word & 0xF;
    let tenth = DIGIT_LOOKUP
        .iter()
        .position(|&digit| digit == nibble)
        .and_then(|index| i32::try_from(index).ok())
        .unwrap_or(0);
    let magnitude = whole * 100 + tenth * 10;
    if word >> 12 == 0xE { magnitude } else { -magnitude }
}

fn format_angle(hundredths: i32) -> String {
    let hemisphere = if hundredths < 0 { 'W' } else { 'E' };
    let magnitude = hundredths.unsigned_abs();
    format!("{}.{:02}{hemisphere}", magnitude / 100, magnitude % 100)
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, spec) in catalog::commands().iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(spec.name);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use sec_core::positioner::{ROTOR_TAG_D, ROTOR_TAG_E, encode_angular};

    #[test]
    fn angular_words_decode_to_motor_angles() {
        assert_eq!(decode_angular(encode_angular(ROTOR_TAG_E, 986)), 9_860);
        assert_eq!(decode_angular(encode_angular(ROTOR_TAG_D, 43)), -430);
        assert_eq!(decode_angular(0xD000), 0);
    }

    #[test]
    fn angles_render_with_hemisphere() {
        assert_eq!(format_angle(1_240), "12.40E");
        assert_eq!(format_angle(-5), "0.05W");
    }

    #[test]
    fn diseqc_needs_lnb_power() {
        let mut frontend = SimulatedFrontend::new(1);
        assert_eq!(
            frontend.send_master_cmd(&DiseqcFrame::reset()),
            Err(FrontendError::Io(5))
        );
        frontend.set_voltage(Voltage::V13).expect("voltage accepted");
        frontend
            .send_master_cmd(&DiseqcFrame::reset())
            .expect("frame accepted");
        assert_eq!(
            frontend.drain_log(),
            ["bus voltage 13V", "bus diseqc E0 00 00"]
        );
    }

    #[test]
    fn stored_goto_moves_the_dish_and_locks_on_arrival() {
        let mut frontend = SimulatedFrontend::new(1_000);
        frontend.set_voltage(Voltage::V13).expect("voltage accepted");
        frontend
            .send_master_cmd(&DiseqcFrame::goto_position(2))
            .expect("frame accepted");
        frontend
            .set_para(&TuneParams {
                frequency: 1_400_000,
                symbol_rate: 27_500_000,
                polarization: sec_core::config::Polarization::Vertical,
                modulation: sec_core::config::Modulation::default(),
            })
            .expect("tune accepted");

        let deadline = HostInstant::now() + Duration::from_secs(5);
        while frontend.status() != Ok(LockStatus::Locked) {
            assert!(HostInstant::now() < deadline, "dish never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }
        let log = frontend.drain_log();
        assert!(log.contains(&"rotor moving 0.00E -> 12.40E".to_string()));
        assert!(log.contains(&"rotor arrived at 12.40E".to_string()));
    }
}
