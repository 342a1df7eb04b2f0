//! Config module.
//! Loads `assets/config.json` (thresholds, detector label table, engine and timing settings)
//! with serde. Every section has defaults, so a partial file or no file at all still works.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::pieces::{default_label_names, LabelMap};

pub const DEFAULT_CONFIG_PATH: &str = "assets/config.json";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub board: BoardConfig,
    pub engine: EngineConfig,
    pub clicker: ClickerConfig,
    pub timing: TimingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Pairs overlapping more than this are treated as duplicates.
    pub iou_threshold: f64,
    /// Detections scoring below this are dropped.
    pub score_threshold: f64,
    /// Detection service URL; receives the frame, answers with a detection batch.
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.5,
            score_threshold: 0.5,
            endpoint: "http://127.0.0.1:8080/predict".to_string(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Detector label id -> class name, e.g. `9: "white-king"`.
    pub labels: BTreeMap<i64, String>,
    /// Class name of the board boundary box.
    pub board_class: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            labels: default_label_names(),
            board_class: "chess-board".to_string(),
        }
    }
}

impl BoardConfig {
    pub fn label_map(&self) -> Result<LabelMap> {
        LabelMap::from_names(&self.labels, &self.board_class)
            .context("Invalid label table in board config")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// UCI engine binary, looked up in PATH when not absolute.
    pub program_path: String,
    /// Extra command-line arguments for the engine binary.
    pub args: Vec<String>,
    /// Longest wait for any single engine reply before the search is abandoned.
    pub response_timeout_secs: u64,
    /// Keep the engine's own Threads/Hash/Skill defaults.
    pub set_default_parameters: bool,
    pub depth: Option<u32>,
    /// Used when `depth` is unset.
    pub movetime_ms: u64,
    pub skill_level: Option<u32>,
    /// Share of logical CPUs handed to the engine.
    pub threads_percent: f64,
    /// Hash budget in MB, rounded down to a power of two.
    pub hash_mb: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program_path: "stockfish".to_string(),
            args: Vec::new(),
            response_timeout_secs: 30,
            set_default_parameters: true,
            depth: Some(15),
            movetime_ms: 1000,
            skill_level: None,
            threads_percent: 0.5,
            hash_mb: 256,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickerConfig {
    /// Pause between clicking the origin and the destination square.
    pub move_time_ms: u64,
}

impl Default for ClickerConfig {
    fn default() -> Self {
        Self { move_time_ms: 150 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub seconds_between_detections: f64,
    pub wait_after_click: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            seconds_between_detections: 0.5,
            wait_after_click: 1.0,
        }
    }
}

/// Reads and parses the config file; a missing file falls back to defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("Config {} not found, using defaults", path.display());
        return Ok(Config::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: Config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;

    // Fail at startup rather than on the first frame.
    config.board.label_map()?;
    Ok(config)
}
