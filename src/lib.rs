//! Board reconstruction for an on-screen chess assistant.
//!
//! Pipeline: detector boxes -> [`detection::filter_batch`] -> [`coords::ChessBoard`]
//! (board location, grid assembly, FEN) -> engine move -> [`coords::ChessBoard::move_to_coordinates`]
//! -> two screen clicks.
//!
//! The core modules (`detection`, `pieces`, `board`, `fen`, `coords`) are pure and
//! synchronous. `capture`, `detector`, `engine`, `clicker`, `interface` and `control` wrap
//! the outside world: the screen, the detection service, the UCI engine, the mouse and the
//! terminal.

pub mod board;
pub mod capture;
pub mod clicker;
pub mod config;
pub mod control;
pub mod coords;
pub mod detection;
pub mod detector;
pub mod engine;
pub mod error;
pub mod fen;
pub mod interface;
pub mod pieces;

use std::fmt;
use std::str::FromStr;

pub use coords::{ChessBoard, ClickPair};
pub use detection::{BBox, Detection, DetectionBatch};
pub use error::ReconstructError;

/// Which side the user plays; also the side to move in every encoded position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayerSide {
    #[default]
    White,
    Black,
}

impl PlayerSide {
    pub fn fen_char(&self) -> char {
        match self {
            PlayerSide::White => 'w',
            PlayerSide::Black => 'b',
        }
    }
}

impl fmt::Display for PlayerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerSide::White => write!(f, "White"),
            PlayerSide::Black => write!(f, "Black"),
        }
    }
}

impl FromStr for PlayerSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(PlayerSide::White),
            "black" | "b" => Ok(PlayerSide::Black),
            other => anyhow::bail!("unknown side '{}' (expected white or black)", other),
        }
    }
}

/// What the loop does with each recognized position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgramMode {
    /// Ask the engine and play its move whenever the position changes.
    #[default]
    Auto,
    /// Ask the engine and only report its suggestion.
    Detection,
    /// Play moves typed by the user.
    Manual,
}

impl fmt::Display for ProgramMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramMode::Auto => write!(f, "Auto mode"),
            ProgramMode::Detection => write!(f, "Detection mode"),
            ProgramMode::Manual => write!(f, "Manual moves"),
        }
    }
}

impl FromStr for ProgramMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ProgramMode::Auto),
            "detection" => Ok(ProgramMode::Detection),
            "manual" => Ok(ProgramMode::Manual),
            other => anyhow::bail!("unknown mode '{}' (expected auto, detection or manual)", other),
        }
    }
}
