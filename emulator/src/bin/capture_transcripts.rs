use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

const CAPTURE_TIME_SCALE: u32 = 100;

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Switching)?;
    record_profile(TranscriptProfile::Rotor)?;
    record_profile(TranscriptProfile::Unicable)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile, CAPTURE_TIME_SCALE)?;
    match profile {
        TranscriptProfile::Switching => record_switching(&mut session),
        TranscriptProfile::Rotor => record_rotor(&mut session),
        TranscriptProfile::Unicable => record_unicable(&mut session),
    }
}

fn record_switching(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("help")?;
    let _ = session.handle_command("tune 11778 v")?;
    let _ = session.handle_command("tune 11778 v")?;
    let _ = session.handle_command("tune 12188 h sr=27500")?;
    let _ = session.handle_command("blind v low")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_rotor(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("tune 12188 h")?;
    let _ = session.handle_command("status")?;
    let _ = session.handle_command("nudge west steps=4")?;
    let _ = session.handle_command("store 5")?;
    let _ = session.handle_command("goto 2")?;
    let _ = session.handle_command("gotox 13 east")?;
    let _ = session.handle_command("probe 11000 v")?;
    let _ = session.settle()?;
    let _ = session.handle_command("stop")?;
    let _ = session.handle_command("store 0")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_unicable(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("tune 12188 h")?;
    let _ = session.handle_command("tune 10994 v")?;
    let _ = session.handle_command("blind h high")?;
    let _ = session.handle_command("help tune")?;
    let _ = session.handle_command("help lnb")?;
    let _ = session.handle_command("status")?;
    Ok(())
}
