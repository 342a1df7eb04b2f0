//! FEN codec (Step 4 in the pipeline).
//! Encodes an assembled grid as a position string for the engine, and decodes the engine's
//! (or the user's) 4-character move tokens back into grid squares.
//! Castling, en passant and the move clocks are not tracked; they are always `- - 0 30`.

use std::fmt;

use crate::board::{BoardGrid, BOARD_SIZE};
use crate::error::ReconstructError;
use crate::PlayerSide;

/// Placeholder game-state fields appended after the side to move.
pub const FEN_TRAILER: &str = "- - 0 30";

/// A lattice square in grid coordinates: `file` 0..8 for 'a'..'h', `row` 0..8 top-to-bottom
/// (rank 8 is row 0, rank 1 is row 7). Always on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Square {
    file: u8,
    row: u8,
}

impl Square {
    /// `None` unless both indices are below 8.
    pub fn new(file: u8, row: u8) -> Option<Self> {
        let size = BOARD_SIZE as u8;
        (file < size && row < size).then_some(Self { file, row })
    }

    pub fn file(&self) -> u8 {
        self.file
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    /// The same square seen from the other side of the board.
    pub fn mirrored(self) -> Self {
        let last = BOARD_SIZE as u8 - 1;
        Self { file: last - self.file, row: last - self.row }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, BOARD_SIZE as u8 - self.row)
    }
}

/// Origin and destination of a decoded move token.
pub type Move = (Square, Square);

/// Run-length encodes one row: letters verbatim, runs of empty squares as a digit.
fn encode_row(row: &[Option<char>; BOARD_SIZE]) -> String {
    let mut out = String::new();
    let mut empty = 0;
    for cell in row {
        match cell {
            Some(piece) => {
                if empty != 0 {
                    out.push_str(&empty.to_string());
                    empty = 0;
                }
                out.push(*piece);
            }
            None => empty += 1,
        }
    }
    if empty != 0 {
        out.push_str(&empty.to_string());
    }
    out
}

/// Serializes the grid as `<row>/<row>/.../<row> <w|b> - - 0 30`.
/// The grid is expected to be oriented already (see `board::assemble`).
pub fn encode(grid: &BoardGrid, side: PlayerSide) -> String {
    let placement = grid
        .rows()
        .iter()
        .map(encode_row)
        .collect::<Vec<_>>()
        .join("/");
    format!("{} {} {}", placement, side.fen_char(), FEN_TRAILER)
}

/// Structural check only: `[a-h][1-8][a-h][1-8]`. Says nothing about legality.
pub fn is_move_valid(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 4
        && [bytes[0], bytes[2]].iter().all(|b| (b'a'..=b'h').contains(b))
        && [bytes[1], bytes[3]].iter().all(|b| (b'1'..=b'8').contains(b))
}

/// Decodes e.g. `e2e4` into squares (file 4, row 6) and (file 4, row 4).
pub fn decode_move(token: &str) -> Result<Move, ReconstructError> {
    if !is_move_valid(token) {
        return Err(ReconstructError::InvalidMove(token.to_string()));
    }
    let b = token.as_bytes();
    let square = |file: u8, rank: u8| Square {
        file: file - b'a',
        row: BOARD_SIZE as u8 - (rank - b'0'),
    };
    Ok((square(b[0], b[1]), square(b[2], b[3])))
}
