mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::{Session, TranscriptProfile};
use tracing_subscriber::EnvFilter;

const DEFAULT_TIME_SCALE: u32 = 10;

fn main() -> io::Result<()> {
    let filter = EnvFilter::try_from_env("SEC_LOG")
        .unwrap_or_else(|_| EnvFilter::new("sec_runtime=info,sec_emulator=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: sec-emulator [--profile <switching|rotor|unicable>] [--time-scale <n>]"
        );
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.profile, options.time_scale)?;
    let mut line = String::new();

    writeln!(
        writer,
        "SEC Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

struct Options {
    profile: TranscriptProfile,
    time_scale: u32,
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        profile: TranscriptProfile::Switching,
        time_scale: DEFAULT_TIME_SCALE,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            options.profile = TranscriptProfile::from_tag(value)?;
        } else if arg == "--profile" {
            let value = args.next().ok_or("Expected value after --profile")?;
            options.profile = TranscriptProfile::from_tag(&value)?;
        } else if let Some(value) = arg.strip_prefix("--time-scale=") {
            options.time_scale = parse_scale(value)?;
        } else if arg == "--time-scale" {
            let value = args.next().ok_or("Expected value after --time-scale")?;
            options.time_scale = parse_scale(&value)?;
        } else {
            options.profile = TranscriptProfile::from_tag(&arg)?;
        }
    }
    Ok(options)
}

fn parse_scale(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(scale) if scale > 0 => Ok(scale),
        _ => Err(format!("Invalid time scale `{value}`")),
    }
}
