use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use log::{info, warn};
use tokio::sync::mpsc;

use chessbot::capture::{self, Frame};
use chessbot::clicker::MouseClicker;
use chessbot::config::{self, Config, DEFAULT_CONFIG_PATH};
use chessbot::control::{self, ControlCommand, Controls};
use chessbot::detection::filter_batch;
use chessbot::detector::Detector;
use chessbot::engine::{click_token, UciEngine};
use chessbot::pieces::LabelMap;
use chessbot::{interface, ChessBoard, PlayerSide, ProgramMode};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("chessbot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reads a chess board off the screen, asks an engine and plays the move")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to the JSON config file")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("monitor")
                .long("monitor")
                .value_name("N")
                .help("Index of the monitor showing the board")
                .default_value("0")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("side")
                .long("side")
                .value_name("SIDE")
                .help("Color you play; asked interactively when omitted")
                .value_parser(["white", "black"]),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_name("MODE")
                .help("auto plays engine moves, detection only suggests, manual plays typed moves")
                .value_parser(["auto", "detection", "manual"]),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let monitor = matches.get_one::<usize>("monitor").copied().unwrap_or(0);

    let config = config::load_config(config_path)?;
    let labels = config.board.label_map()?;

    let side = match matches.get_one::<String>("side") {
        Some(side) => side.parse()?,
        None => interface::choose_side()?,
    };
    let mode = match matches.get_one::<String>("mode") {
        Some(mode) => mode.parse()?,
        None => interface::choose_mode()?,
    };

    let detector = Detector::new(&config.detection)?;
    let clicker = MouseClicker::new(&config.clicker);
    let controls = Controls::new(side, mode);
    let mut typed_moves = control::spawn_terminal_reader(controls.clone());

    info!("{} in {} on monitor {}. Paused, type 'p' to start.", side, mode, monitor);
    info!("{}", control::HELP);

    let mut engine: Option<UciEngine> = None;
    let mut last_fen = String::new();
    let mut last_state = controls.snapshot();

    loop {
        // Side, mode and pause can change between any two frames.
        let state = controls.snapshot();
        if (state.side, state.mode) != (last_state.side, last_state.mode) {
            last_fen.clear();
        }
        last_state = state;
        if state.paused {
            pause(config.timing.seconds_between_detections).await;
            continue;
        }

        if state.mode != ProgramMode::Manual && engine.is_none() {
            match tokio::task::block_in_place(|| UciEngine::spawn(&config.engine)) {
                Ok(started) => engine = Some(started),
                Err(e) => {
                    warn!("{:#}; switch to manual mode or fix the engine path", e);
                    controls.apply(ControlCommand::Pause);
                    continue;
                }
            }
        }

        // Step 1: capture; a missing monitor is not going to fix itself.
        let frame = capture::capture_monitor(monitor).context("Cannot grab the monitor")?;

        // Steps 2-4: detect, filter, reconstruct
        let board = match read_board(&detector, &frame, &config, &labels, state.side).await {
            Ok(board) => board,
            Err(e) => {
                warn!("Cannot recognize the board, make sure it is fully visible: {:#}", e);
                pause(config.timing.seconds_between_detections).await;
                continue;
            }
        };

        // Step 5: act on it
        let changed = board.fen() != last_fen;
        let outcome = match (state.mode, engine.as_mut()) {
            (ProgramMode::Manual, _) => {
                if changed {
                    info!("Detected FEN: {}\n{}", board.fen(), board.grid());
                    info!("Type your move (e.g. e2e4)");
                }
                play_typed_move(&board, &frame, &clicker, &mut typed_moves, &config).await
            }
            (ProgramMode::Auto, Some(engine)) if changed => {
                play_engine_move(&board, &frame, engine, &clicker, &config).await
            }
            (ProgramMode::Detection, Some(engine)) if changed => {
                info!("Detected FEN: {}\n{}", board.fen(), board.grid());
                tokio::task::block_in_place(|| engine.best_move(board.fen())).map(|mv| {
                    info!("Suggested move: {}", mv);
                })
            }
            _ => Ok(()),
        };

        match outcome {
            Ok(()) => last_fen = board.fen().to_string(),
            Err(e) => warn!("Skipping frame: {:#}", e),
        }

        // Manual mode already waited for a typed move.
        if state.mode != ProgramMode::Manual {
            pause(config.timing.seconds_between_detections).await;
        }
    }
}

async fn read_board(
    detector: &Detector,
    frame: &Frame,
    config: &Config,
    labels: &LabelMap,
    side: PlayerSide,
) -> Result<ChessBoard> {
    let batch = detector.detect(&frame.image).await?;
    let detections = filter_batch(
        batch,
        config.detection.iou_threshold,
        config.detection.score_threshold,
    )?;
    Ok(ChessBoard::from_detections(&detections, labels, side)?)
}

async fn play_engine_move(
    board: &ChessBoard,
    frame: &Frame,
    engine: &mut UciEngine,
    clicker: &MouseClicker,
    config: &Config,
) -> Result<()> {
    info!("Detected FEN: {}", board.fen());
    let best = tokio::task::block_in_place(|| engine.best_move(board.fen()))?;
    let clicks = board.move_to_coordinates(click_token(&best))?;
    tokio::task::block_in_place(|| clicker.make_move(frame.to_screen(clicks)))?;
    pause(config.timing.wait_after_click).await;
    Ok(())
}

/// Plays a typed move if one arrives within a detection interval; otherwise does nothing
/// so the next frame is read.
async fn play_typed_move(
    board: &ChessBoard,
    frame: &Frame,
    clicker: &MouseClicker,
    typed_moves: &mut mpsc::Receiver<String>,
    config: &Config,
) -> Result<()> {
    let wait = Duration::from_secs_f64(config.timing.seconds_between_detections.max(0.0));
    let mv = match tokio::time::timeout(wait, typed_moves.recv()).await {
        Ok(Some(mv)) => mv,
        Ok(None) => {
            // Terminal closed: nothing will ever be typed again.
            pause(config.timing.seconds_between_detections).await;
            return Ok(());
        }
        Err(_) => return Ok(()),
    };
    let clicks = board.move_to_coordinates(&mv)?;
    tokio::task::block_in_place(|| clicker.make_move(frame.to_screen(clicks)))?;
    pause(config.timing.wait_after_click).await;
    Ok(())
}

async fn pause(seconds: f64) {
    tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
}
