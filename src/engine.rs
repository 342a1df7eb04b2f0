//! Engine module.
//! Drives an external UCI engine (Stockfish by default) over stdin/stdout.
//! The process is started once and reused for every position. Its output is drained by a
//! reader thread so every wait on the engine has a deadline.
//! Positions are syntax- and sanity-checked with `shakmaty` before they reach the engine,
//! since a misdetected board (no king, nine pawns on a rank) can crash it.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};

use crate::config::EngineConfig;

pub struct UciEngine {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    lines: Receiver<String>,
    timeout: Duration,
    go_command: String,
}

impl UciEngine {
    /// Spawns the engine binary and runs the UCI handshake.
    pub fn spawn(config: &EngineConfig) -> Result<Self> {
        let mut child = Command::new(&config.program_path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to start chess engine '{}'. Make sure it is installed and in PATH.",
                    config.program_path
                )
            })?;

        let stdin = BufWriter::new(
            child
                .stdin
                .take()
                .context("Failed to get stdin handle for engine process")?,
        );
        let stdout = child
            .stdout
            .take()
            .context("Failed to get stdout handle for engine process")?;
        let lines = spawn_line_reader(stdout);

        let go_command = match config.depth {
            Some(depth) => format!("go depth {}", depth),
            None => format!("go movetime {}", config.movetime_ms),
        };

        let mut engine = Self {
            child,
            stdin,
            lines,
            timeout: Duration::from_secs(config.response_timeout_secs.max(1)),
            go_command,
        };

        engine.send("uci")?;
        engine.read_until(|line| line == "uciok")?;

        if !config.set_default_parameters {
            let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
            let threads = engine_threads(cpus, config.threads_percent);
            let hash = nearest_power_of_two(config.hash_mb);
            engine.send(&format!("setoption name Threads value {}", threads))?;
            engine.send(&format!("setoption name Hash value {}", hash))?;
            if let Some(level) = config.skill_level {
                engine.send(&format!("setoption name Skill Level value {}", level))?;
            }
            info!("Engine options: Threads={} Hash={}MB Skill={:?}", threads, hash, config.skill_level);
        }

        engine.send("isready")?;
        engine.read_until(|line| line == "readyok")?;
        Ok(engine)
    }

    /// Best move for `fen` in UCI long algebraic notation, e.g. `e2e4` or `e7e8q`.
    pub fn best_move(&mut self, fen: &str) -> Result<String> {
        validate_position(fen)?;

        self.send("ucinewgame")?;
        // Also swallows a late `bestmove` left over from a search that timed out.
        self.send("isready")?;
        self.read_until(|line| line == "readyok")?;
        self.send(&format!("position fen {}", fen))?;
        let go = self.go_command.clone();
        self.send(&go)?;

        let line = self.read_until(|line| line.starts_with("bestmove"))?;
        let mv = parse_bestmove(&line)?;
        info!("Best move for {}: {}", side_name(fen), mv);
        Ok(mv)
    }

    fn send(&mut self, command: &str) -> Result<()> {
        debug!("engine <- {}", command);
        writeln!(self.stdin, "{}", command).context("Failed to write to engine")?;
        self.stdin.flush().context("Failed to flush engine stdin")
    }

    /// Reads lines until `done` matches one, returning that line.
    /// Gives up once the response timeout has passed without a match.
    fn read_until(&mut self, done: impl Fn(&str) -> bool) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(left) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if done(trimmed) {
                        debug!("engine -> {}", trimmed);
                        return Ok(trimmed.to_string());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    bail!("Engine did not answer within {}s", self.timeout.as_secs())
                }
                Err(RecvTimeoutError::Disconnected) => {
                    bail!("Engine closed its output unexpectedly")
                }
            }
        }
    }
}

/// Forwards engine output line by line; the thread ends with the pipe.
fn spawn_line_reader(stdout: ChildStdout) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.send("quit");
        // A hung engine must not block shutdown.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Rejects position strings the engine cannot search: bad syntax, missing kings,
/// side not to move in check, pawns on the back ranks.
pub fn validate_position(fen: &str) -> Result<()> {
    let parsed: Fen = fen
        .parse()
        .map_err(|e| anyhow!("Invalid FEN syntax: {} (received: '{}')", e, fen))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| anyhow!("Unplayable position: {} (received: '{}')", e, fen))?;
    Ok(())
}

/// Extracts the move from `bestmove e2e4 ponder e7e5`.
fn parse_bestmove(line: &str) -> Result<String> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("bestmove") {
        bail!("Not a bestmove line: '{}'", line);
    }
    match parts.next() {
        Some("(none)") | None => bail!("Engine found no move (mate or stalemate)"),
        Some(mv) => Ok(mv.to_string()),
    }
}

/// The 4-character squares part of a UCI move; drops a promotion suffix.
/// The board UI picks the promotion piece, the clicks only need the two squares.
pub fn click_token(uci_move: &str) -> &str {
    match uci_move.len() {
        5 => uci_move.get(..4).unwrap_or(uci_move),
        _ => uci_move,
    }
}

/// Largest power of two not above `n` (1 for 0).
pub fn nearest_power_of_two(n: u64) -> u64 {
    if n <= 1 {
        return 1;
    }
    1 << (63 - n.leading_zeros())
}

fn engine_threads(cpus: usize, percent: f64) -> usize {
    ((cpus as f64 * percent) as usize).max(1)
}

fn side_name(fen: &str) -> &'static str {
    match fen.split_whitespace().nth(1) {
        Some("b") => "black",
        _ => "white",
    }
}
