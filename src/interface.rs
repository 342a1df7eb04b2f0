//! Terminal interface.
//! Asks for the side and program mode at startup; both can be changed later from the
//! live controls. A typed move line may hold several candidates ("e2e4 e2e3"); the first
//! well-formed one is used.

use anyhow::{Context, Result};
use dialoguer::Select;

use crate::fen::is_move_valid;
use crate::{PlayerSide, ProgramMode};

pub fn choose_side() -> Result<PlayerSide> {
    let sides = [PlayerSide::White, PlayerSide::Black];
    let index = Select::new()
        .with_prompt("What color do you play?")
        .items(&sides)
        .default(0)
        .interact()
        .context("Failed to read color choice")?;
    Ok(sides[index])
}

pub fn choose_mode() -> Result<ProgramMode> {
    let modes = [ProgramMode::Auto, ProgramMode::Detection, ProgramMode::Manual];
    let index = Select::new()
        .with_prompt("Choose the program mode")
        .items(&modes)
        .default(0)
        .interact()
        .context("Failed to read mode choice")?;
    Ok(modes[index])
}

/// First candidate in `text` that passes the structural move check, lowercased.
pub fn pick_move(text: &str) -> Option<String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .map(|candidate| candidate.to_ascii_lowercase())
        .find(|candidate| is_move_valid(candidate))
}
