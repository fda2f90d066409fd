//! High-level REPL command dispatcher.
//!
//! This module glues parsed commands to the engine by turning them into
//! [`SecRequest`]s and handing those to a [`RequestSink`]. It stays `no_std`
//! friendly so test doubles and the emulator share the same implementation.

use core::fmt;
use core::time::Duration;

use crate::config::TransponderParams;
use crate::engine::{PrepareReport, SecRequest};

use super::catalog::{self, CommandSpec};
use super::grammar::{self, Command, TuneCommand};

/// Lock timeout used by `tune`.
pub const TUNE_TIMEOUT: Duration = Duration::from_secs(5);

/// Destination for requests built by the dispatcher.
pub trait RequestSink {
    type Error;

    /// Runs or queues `request`. Real requests return their report; probes
    /// return `None` as soon as they are queued.
    fn submit(&mut self, request: SecRequest) -> Result<Option<PrepareReport>, Self::Error>;
}

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Submitted {
        request: SecRequest,
        report: Option<PrepareReport>,
    },
    /// The front end should print its status snapshot.
    Status,
    /// The front end should print help for the given command, or the index.
    Help(Option<&'static CommandSpec>),
}

/// Errors surfaced while executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandError<'a, E> {
    Parse(grammar::ParseError<'a>),
    UnknownTopic(&'a str),
    Sink(E),
}

impl<'a, E> From<grammar::ParseError<'a>> for CommandError<'a, E> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl<E: fmt::Display> fmt::Display for CommandError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => write!(f, "parse error: {error}"),
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
            CommandError::Sink(error) => error.fmt(f),
        }
    }
}

/// Dispatches REPL commands into a request sink.
pub struct CommandExecutor<S> {
    sink: S,
    tune_timeout: Duration,
    /// Last tuned transponder; positioner moves re-tune to it.
    last_transponder: Option<TransponderParams>,
}

impl<S> CommandExecutor<S> {
    /// Creates a new executor around the provided sink.
    pub const fn new(sink: S) -> Self {
        Self {
            sink,
            tune_timeout: TUNE_TIMEOUT,
            last_transponder: None,
        }
    }

    /// Overrides the lock timeout used by `tune`.
    #[must_use]
    pub const fn with_tune_timeout(mut self, timeout: Duration) -> Self {
        self.tune_timeout = timeout;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes the executor and yields the inner sink.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<S> CommandExecutor<S>
where
    S: RequestSink,
{
    /// Parses and executes a REPL command.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a, S::Error>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(
        &mut self,
        command: Command<'a>,
    ) -> Result<CommandOutcome, CommandError<'a, S::Error>> {
        let request = match command {
            Command::Tune(tune) => {
                let target = transponder(tune);
                self.last_transponder = Some(target);
                SecRequest::tune(target, self.tune_timeout)
            }
            Command::Probe(target) => SecRequest::probe(target.map(transponder)),
            Command::Blind(target) => SecRequest::blind(target),
            Command::Positioner(operation) => {
                SecRequest::positioner(operation, self.last_transponder)
            }
            Command::Status => return Ok(CommandOutcome::Status),
            Command::Help(help) => {
                return match help.topic {
                    None => Ok(CommandOutcome::Help(None)),
                    Some(topic) => catalog::find(topic)
                        .map(|spec| CommandOutcome::Help(Some(spec)))
                        .ok_or(CommandError::UnknownTopic(topic)),
                };
            }
        };

        let report = self.sink.submit(request).map_err(CommandError::Sink)?;
        Ok(CommandOutcome::Submitted { request, report })
    }
}

fn transponder(tune: TuneCommand) -> TransponderParams {
    TransponderParams::new(tune.frequency, tune.polarization, tune.symbol_rate)
}

/// Writes the help index, or the usage of a single command.
pub fn write_help<W: fmt::Write>(writer: &mut W, topic: Option<&CommandSpec>) -> fmt::Result {
    match topic {
        Some(spec) => writeln!(writer, "{}\n  {}", spec.usage, spec.summary),
        None => {
            for spec in catalog::commands() {
                writeln!(writer, "{:<44} {}", spec.usage, spec.summary)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::Polarization;
    use crate::diseqc::Direction;
    use crate::engine::{PrepareOutcome, SecOperation};
    use std::string::String;
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingSink {
        requests: Vec<SecRequest>,
        refuse: bool,
    }

    impl RequestSink for RecordingSink {
        type Error = &'static str;

        fn submit(&mut self, request: SecRequest) -> Result<Option<PrepareReport>, Self::Error> {
            if self.refuse {
                return Err("shut down");
            }
            self.requests.push(request);
            Ok((!request.is_probe()).then_some(PrepareReport {
                outcome: PrepareOutcome::Completed,
                frames_sent: 0,
                rotor: None,
                tuned: None,
                elapsed: Duration::ZERO,
            }))
        }
    }

    #[test]
    fn tune_submits_a_blocking_request() {
        let mut executor = CommandExecutor::new(RecordingSink::default());
        let outcome = executor.execute("tune 12000 h").expect("dispatch should succeed");

        let request = executor.sink().requests[0];
        assert!(request.want_status);
        assert_eq!(request.timeout, TUNE_TIMEOUT);
        assert_eq!(
            request.transponder,
            Some(TransponderParams::new(
                12_000_000,
                Polarization::Horizontal,
                grammar::DEFAULT_SYMBOL_RATE
            ))
        );
        assert!(matches!(
            outcome,
            CommandOutcome::Submitted {
                report: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn probe_returns_without_report() {
        let mut executor = CommandExecutor::new(RecordingSink::default());
        let outcome = executor.execute("probe 11000 v").expect("dispatch should succeed");

        assert!(executor.sink().requests[0].is_probe());
        assert!(matches!(outcome, CommandOutcome::Submitted { report: None, .. }));
    }

    #[test]
    fn positioner_commands_carry_their_operation() {
        let mut executor = CommandExecutor::new(RecordingSink::default());
        executor.execute("limit east").expect("dispatch should succeed");
        executor.execute("gotox 13 east").expect("dispatch should succeed");

        let operations: Vec<_> = executor
            .sink()
            .requests
            .iter()
            .map(|request| request.operation)
            .collect();
        assert!(executor.sink().requests.iter().all(|request| !request.is_probe()));
        assert_eq!(
            operations,
            [
                SecOperation::StoreLimit(Direction::East),
                SecOperation::GotoAngular(130)
            ]
        );
    }

    #[test]
    fn positioner_moves_retune_to_the_last_transponder() {
        let mut executor = CommandExecutor::new(RecordingSink::default());
        executor.execute("nudge west").expect("dispatch should succeed");
        executor.execute("tune 11778.5 v").expect("dispatch should succeed");
        executor.execute("goto 3").expect("dispatch should succeed");

        let requests = &executor.sink().requests;
        assert_eq!(requests[0].transponder, None);
        assert_eq!(
            requests[2].transponder.map(|target| target.frequency),
            Some(11_778_500)
        );
    }

    #[test]
    fn status_and_help_stay_local() {
        let mut executor = CommandExecutor::new(RecordingSink::default());
        assert_eq!(executor.execute("status"), Ok(CommandOutcome::Status));
        assert_eq!(
            executor.execute("help goto"),
            Ok(CommandOutcome::Help(catalog::find("goto")))
        );
        assert_eq!(
            executor.execute("help reboot"),
            Err(CommandError::UnknownTopic("reboot"))
        );
        assert!(executor.sink().requests.is_empty());
    }

    #[test]
    fn sink_errors_are_surfaced() {
        let mut executor = CommandExecutor::new(RecordingSink {
            refuse: true,
            ..RecordingSink::default()
        });
        assert_eq!(executor.execute("stop"), Err(CommandError::Sink("shut down")));
    }

    #[test]
    fn parse_error_is_returned() {
        let mut executor = CommandExecutor::new(RecordingSink::default());
        let error = executor
            .execute("tune later please")
            .expect_err("parse should fail");
        assert!(matches!(error, CommandError::Parse(_)));
    }

    #[test]
    fn help_lists_every_command() {
        let mut text = String::new();
        write_help(&mut text, None).unwrap();
        for spec in catalog::commands() {
            assert!(text.contains(spec.usage));
        }
    }
}
