//! Live controls.
//! The loop starts paused and re-reads the shared state on every cycle, so pausing, switching
//! sides or switching modes takes effect on the next frame. A background thread reads terminal
//! lines: commands change the state, anything else is offered as a typed move.

use std::io::{self, BufRead};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::{bail, Result};
use log::{info, warn};
use tokio::sync::mpsc;

use crate::interface::pick_move;
use crate::{PlayerSide, ProgramMode};

pub const HELP: &str = "commands: p (pause/run), pause, run, side white|black, \
                        mode auto|detection|manual, status, help; in manual mode type a move like e2e4";

/// What the loop reads at the top of every cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlState {
    pub paused: bool,
    pub side: PlayerSide,
    pub mode: ProgramMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    TogglePause,
    Pause,
    Run,
    Side(PlayerSide),
    Mode(ProgramMode),
    Status,
    Help,
}

/// One terminal line, classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalLine {
    Blank,
    Command(ControlCommand),
    /// Not a command; may hold a move.
    Text(String),
}

/// Splits commands from move text. A known command word with a bad value is an error,
/// unknown words fall through as text.
pub fn parse_line(line: &str) -> Result<TerminalLine> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(TerminalLine::Blank);
    };
    let keyword = first.to_ascii_lowercase();
    let value = words.next();
    if words.next().is_some() {
        return Ok(TerminalLine::Text(line.trim().to_string()));
    }

    let command = match (keyword.as_str(), value) {
        ("p", None) => ControlCommand::TogglePause,
        ("pause", None) => ControlCommand::Pause,
        ("run" | "resume", None) => ControlCommand::Run,
        ("status", None) => ControlCommand::Status,
        ("help" | "?", None) => ControlCommand::Help,
        ("side", Some(side)) => ControlCommand::Side(side.parse()?),
        ("mode", Some(mode)) => ControlCommand::Mode(mode.parse()?),
        ("side" | "mode", None) => bail!("'{}' needs a value ({})", keyword, HELP),
        _ => return Ok(TerminalLine::Text(line.trim().to_string())),
    };
    Ok(TerminalLine::Command(command))
}

/// Shared handle on the control state; clones see the same state.
#[derive(Clone, Debug)]
pub struct Controls {
    state: Arc<Mutex<ControlState>>,
}

impl Controls {
    /// Starts paused, the user resumes once the board is on screen.
    pub fn new(side: PlayerSide, mode: ProgramMode) -> Self {
        let state = ControlState { paused: true, side, mode };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn snapshot(&self) -> ControlState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `command` and returns the resulting state.
    pub fn apply(&self, command: ControlCommand) -> ControlState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match command {
            ControlCommand::TogglePause => state.paused = !state.paused,
            ControlCommand::Pause => state.paused = true,
            ControlCommand::Run => state.paused = false,
            ControlCommand::Side(side) => state.side = side,
            ControlCommand::Mode(mode) => state.mode = mode,
            ControlCommand::Status => {}
            ControlCommand::Help => info!("{}", HELP),
        }
        *state
    }
}

/// Reads stdin on a plain thread and returns the stream of typed moves.
/// Not a runtime blocking task: a pending stdin read must not hold up runtime shutdown.
pub fn spawn_terminal_reader(controls: Controls) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(4);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if !handle_line(&controls, &line, &tx) {
                return;
            }
        }
        info!("Terminal input closed, live controls are off");
    });
    rx
}

/// Handles one terminal line. Returns false once nobody listens for moves any more.
fn handle_line(controls: &Controls, line: &str, moves: &mpsc::Sender<String>) -> bool {
    match parse_line(line) {
        Ok(TerminalLine::Blank) => {}
        Ok(TerminalLine::Command(command)) => {
            let state = controls.apply(command);
            info!(
                "{} | {} | {}",
                if state.paused { "Paused" } else { "Running" },
                state.side,
                state.mode
            );
        }
        Ok(TerminalLine::Text(text)) => {
            let state = controls.snapshot();
            if state.paused || state.mode != ProgramMode::Manual {
                warn!("Moves are only taken while running in manual mode, ignored '{}'", text);
            } else {
                match pick_move(&text) {
                    Some(mv) => return moves.blocking_send(mv).is_ok(),
                    None => warn!("'{}' is not a move like e2e4 ({})", text, HELP),
                }
            }
        }
        Err(e) => warn!("{:#}", e),
    }
    true
}
