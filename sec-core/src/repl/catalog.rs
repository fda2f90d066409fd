//! Command catalog shared by the parser and the help output.
//!
//! Keywords, usage lines and summaries live in one table so `help` and the
//! parser never disagree about what exists.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Tune,
    Probe,
    Blind,
    Stop,
    Limits,
    Limit,
    Nudge,
    Goto,
    Gotox,
    Store,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

const COMMANDS: [CommandSpec; 12] = [
    CommandSpec {
        name: "tune",
        tag: CommandTag::Tune,
        usage: "tune <MHz> <h|v|l|r> [sr=<ksym/s>]",
        summary: "switch, move and tune; waits for lock",
    },
    CommandSpec {
        name: "probe",
        tag: CommandTag::Probe,
        usage: "probe [<MHz> <h|v|l|r>]",
        summary: "preemptible tune that returns immediately",
    },
    CommandSpec {
        name: "blind",
        tag: CommandTag::Blind,
        usage: "blind <h|v|l|r> <low|high>",
        summary: "prepare switches and rotor for a blind scan",
    },
    CommandSpec {
        name: "stop",
        tag: CommandTag::Stop,
        usage: "stop",
        summary: "halt the positioner",
    },
    CommandSpec {
        name: "limits",
        tag: CommandTag::Limits,
        usage: "limits <on|off>",
        summary: "enable or disable the soft limits",
    },
    CommandSpec {
        name: "limit",
        tag: CommandTag::Limit,
        usage: "limit <east|west>",
        summary: "store the current position as a soft limit",
    },
    CommandSpec {
        name: "nudge",
        tag: CommandTag::Nudge,
        usage: "nudge <east|west> [steps=<n>|seconds=<n>]",
        summary: "drive the positioner",
    },
    CommandSpec {
        name: "goto",
        tag: CommandTag::Goto,
        usage: "goto <position>",
        summary: "drive to a stored position",
    },
    CommandSpec {
        name: "gotox",
        tag: CommandTag::Gotox,
        usage: "gotox <degrees> <east|west>",
        summary: "drive to a satellite longitude (usals)",
    },
    CommandSpec {
        name: "store",
        tag: CommandTag::Store,
        usage: "store <position>",
        summary: "store the current position",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        usage: "status",
        summary: "show the cached equipment state",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [command]",
        summary: "list commands or show usage",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
