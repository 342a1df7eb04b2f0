//! Move-to-screen mapping (Step 5 in the pipeline).
//! Inverts the board projection: a decoded move becomes two click points at square centers,
//! in the pixel space of the captured image.
//! `ChessBoard` ties the whole frame together: it keeps the board box and side found while
//! encoding so the engine's answer can be mapped back onto the same frame.

use log::debug;

use crate::board::{assemble, locate_board, BoardGrid, BOARD_SIZE};
use crate::detection::{BBox, Detection};
use crate::error::ReconstructError;
use crate::fen::{self, Move, Square};
use crate::pieces::LabelMap;
use crate::PlayerSide;

/// Integer pixel coordinate.
pub type Point = (i32, i32);

/// Origin-square center and destination-square center.
pub type ClickPair = (Point, Point);

fn square_center(board: &BBox, square: Square) -> Point {
    let divisions = 2.0 * BOARD_SIZE as f64;
    let x = board.x_min + (2.0 * square.file() as f64 + 1.0) / divisions * board.width();
    let y = board.y_min + (2.0 * square.row() as f64 + 1.0) / divisions * board.height();
    // Truncation toward zero, never rounding.
    (x.trunc() as i32, y.trunc() as i32)
}

/// Maps a move in oriented grid coordinates to raw-image click points.
/// For the black side both squares are mirrored first to undo the rotation done at assembly.
pub fn to_pixels(board: &BBox, mv: Move, side: PlayerSide) -> ClickPair {
    let (from, to) = match side {
        PlayerSide::White => mv,
        PlayerSide::Black => (mv.0.mirrored(), mv.1.mirrored()),
    };
    (square_center(board, from), square_center(board, to))
}

/// One reconstructed frame: the oriented grid, its position string and the geometry needed
/// to click on it.
#[derive(Clone, Debug, PartialEq)]
pub struct ChessBoard {
    board_bbox: BBox,
    side: PlayerSide,
    grid: BoardGrid,
    fen: String,
}

impl ChessBoard {
    /// Locates the board, assembles the grid and encodes it. All-or-nothing.
    pub fn from_detections(
        detections: &[Detection],
        labels: &LabelMap,
        side: PlayerSide,
    ) -> Result<Self, ReconstructError> {
        let (board_index, board_bbox) = locate_board(detections, labels)?;
        let pieces: Vec<Detection> = detections
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != board_index)
            .map(|(_, d)| *d)
            .collect();

        let grid = assemble(&board_bbox, &pieces, labels, side)?;
        let fen = fen::encode(&grid, side);
        debug!("board {:?}: {} pieces -> {}", board_bbox, grid.piece_count(), fen);

        Ok(Self { board_bbox, side, grid, fen })
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn grid(&self) -> &BoardGrid {
        &self.grid
    }

    pub fn board_bbox(&self) -> BBox {
        self.board_bbox
    }

    pub fn side(&self) -> PlayerSide {
        self.side
    }

    /// Validates a move token and maps it to click points on this frame.
    pub fn move_to_coordinates(&self, token: &str) -> Result<ClickPair, ReconstructError> {
        let mv = fen::decode_move(token)?;
        Ok(to_pixels(&self.board_bbox, mv, self.side))
    }
}
