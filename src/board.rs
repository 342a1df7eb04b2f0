//! Board geometry and assembly (Step 3 in the pipeline).
//! Finds the board box among filtered detections, projects every piece box onto the 8x8
//! lattice and fills a grid of FEN letters.
//! Grid rows run top-to-bottom of the captured image; for the black side the grid is
//! rotated 180 degrees so it always reads from the player's own back rank upward.

use std::fmt;

use log::debug;

use crate::detection::{BBox, Detection};
use crate::error::ReconstructError;
use crate::pieces::{LabelMap, PieceClass};
use crate::PlayerSide;

pub const BOARD_SIZE: usize = 8;

/// Index and box of the board detection. The first board-labelled detection wins.
pub fn locate_board(
    detections: &[Detection],
    labels: &LabelMap,
) -> Result<(usize, BBox), ReconstructError> {
    let (index, board) = detections
        .iter()
        .enumerate()
        .find(|(_, d)| d.label == labels.board_label())
        .ok_or(ReconstructError::BoardNotFound)?;

    // A zero-width or zero-height board cannot be divided into squares.
    if board.bbox.width() <= 0.0 || board.bbox.height() <= 0.0 {
        debug!("board box {:?} is degenerate", board.bbox);
        return Err(ReconstructError::BoardNotFound);
    }
    Ok((index, board.bbox))
}

/// Raw lattice cell of a piece box as (file, row), relative to the board's top-left corner.
/// Not clamped: centers left of / above the board give negatives, past the far edge give >= 8.
pub fn square_of(board: &BBox, piece: &BBox) -> (i64, i64) {
    let (cx, cy) = piece.center();
    let file = ((cx - board.x_min) / board.width() * BOARD_SIZE as f64).floor();
    let row = ((cy - board.y_min) / board.height() * BOARD_SIZE as f64).floor();
    (file as i64, row as i64)
}

fn on_board(file: i64, row: i64) -> bool {
    (0..BOARD_SIZE as i64).contains(&file) && (0..BOARD_SIZE as i64).contains(&row)
}

/// 8x8 grid of FEN letters, `cells[row][file]`, row 0 at the top.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardGrid {
    cells: [[Option<char>; BOARD_SIZE]; BOARD_SIZE],
}

impl BoardGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: usize, file: usize) -> Option<char> {
        self.cells[row][file]
    }

    /// Overwrites whatever occupied the square.
    pub fn set(&mut self, row: usize, file: usize, piece: char) {
        self.cells[row][file] = Some(piece);
    }

    pub fn rows(&self) -> &[[Option<char>; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_none)
    }

    pub fn piece_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

/// Text diagram: rank labels on the left, `.` for empty squares, files along the bottom.
impl fmt::Display for BoardGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.cells.iter().enumerate() {
            write!(f, "{} ", BOARD_SIZE - row)?;
            for cell in cells {
                write!(f, " {}", cell.unwrap_or('.'))?;
            }
            writeln!(f)?;
        }
        write!(f, "   a b c d e f g h")
    }
}

/// Places every piece detection on the grid in input order; the last one on a square wins.
/// Boxes whose center projects off the lattice are dropped, as are board/auxiliary/unknown
/// labels. Fails with `EmptyBoard` when nothing was placed.
pub fn assemble(
    board: &BBox,
    pieces: &[Detection],
    labels: &LabelMap,
    side: PlayerSide,
) -> Result<BoardGrid, ReconstructError> {
    let mut grid = BoardGrid::new();

    for detection in pieces {
        let Some(letter) = labels
            .class_of(detection.label)
            .as_ref()
            .and_then(PieceClass::fen_char)
        else {
            debug!("skipping non-piece label {}", detection.label);
            continue;
        };

        let (file, row) = square_of(board, &detection.bbox);
        if !on_board(file, row) {
            debug!("{} at {:?} projects off-board ({}, {})", letter, detection.bbox, file, row);
            continue;
        }

        let (file, row) = (file as usize, row as usize);
        // Rotating the finished grid is the same as mirroring each placement.
        let (file, row) = match side {
            PlayerSide::White => (file, row),
            PlayerSide::Black => (BOARD_SIZE - 1 - file, BOARD_SIZE - 1 - row),
        };

        if let Some(previous) = grid.get(row, file) {
            debug!("{} replaces {} at row {} file {}", letter, previous, row, file);
        }
        grid.set(row, file, letter);
    }

    if grid.is_empty() {
        return Err(ReconstructError::EmptyBoard);
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: BBox = BBox { x_min: 0.0, y_min: 0.0, x_max: 800.0, y_max: 800.0 };

    fn piece(label: i64, cx: f64, cy: f64) -> Detection {
        Detection {
            label,
            bbox: BBox::new(cx - 40.0, cy - 40.0, cx + 40.0, cy + 40.0),
            score: 0.9,
        }
    }

    fn board_det() -> Detection {
        Detection { label: 14, bbox: BOARD, score: 0.99 }
    }

    #[test]
    fn test_locate_board_first_wins() {
        let second = Detection { bbox: BBox::new(10.0, 10.0, 20.0, 20.0), ..board_det() };
        let dets = vec![piece(9, 450.0, 450.0), board_det(), second];
        let (index, bbox) = locate_board(&dets, &LabelMap::default()).unwrap();
        assert_eq!(index, 1);
        assert_eq!(bbox, BOARD);
    }

    #[test]
    fn test_locate_board_missing() {
        let dets = vec![piece(9, 450.0, 450.0)];
        assert_eq!(
            locate_board(&dets, &LabelMap::default()),
            Err(ReconstructError::BoardNotFound)
        );
    }

    #[test]
    fn test_locate_board_rejects_degenerate() {
        let flat = Detection { bbox: BBox::new(0.0, 0.0, 0.0, 800.0), ..board_det() };
        assert_eq!(
            locate_board(&[flat], &LabelMap::default()),
            Err(ReconstructError::BoardNotFound)
        );
    }

    #[test]
    fn test_square_of_center() {
        assert_eq!(square_of(&BOARD, &BBox::new(400.0, 400.0, 500.0, 500.0)), (4, 4));
        assert_eq!(square_of(&BOARD, &BBox::new(0.0, 700.0, 99.0, 800.0)), (0, 7));
    }

    #[test]
    fn test_square_of_is_not_clamped() {
        // center x = -20 -> -0.2 -> floor -1
        assert_eq!(square_of(&BOARD, &BBox::new(-60.0, 0.0, 20.0, 80.0)).0, -1);
        // center exactly on the far edge -> 8
        assert_eq!(square_of(&BOARD, &BBox::new(760.0, 0.0, 840.0, 80.0)).0, 8);
    }

    #[test]
    fn test_square_of_offset_board() {
        let board = BBox::new(100.0, 50.0, 500.0, 450.0);
        // 50px squares; center (175, 125) -> file 1, row 1
        assert_eq!(square_of(&board, &BBox::new(150.0, 100.0, 200.0, 150.0)), (1, 1));
    }

    #[test]
    fn test_assemble_white_and_black() {
        let labels = LabelMap::default();
        let dets = vec![piece(9, 450.0, 450.0)];
        let white = assemble(&BOARD, &dets, &labels, PlayerSide::White).unwrap();
        assert_eq!(white.get(4, 4), Some('K'));
        assert_eq!(white.piece_count(), 1);

        let black = assemble(&BOARD, &dets, &labels, PlayerSide::Black).unwrap();
        assert_eq!(black.get(3, 3), Some('K'));
        assert_eq!(black.piece_count(), 1);
    }

    #[test]
    fn test_assemble_black_is_full_rotation() {
        let labels = LabelMap::default();
        let dets = vec![piece(13, 50.0, 750.0), piece(3, 350.0, 50.0)];
        let black = assemble(&BOARD, &dets, &labels, PlayerSide::Black).unwrap();
        // white rook a1 (row 7, file 0) -> row 0, file 7
        assert_eq!(black.get(0, 7), Some('R'));
        // black king row 0, file 3 -> row 7, file 4
        assert_eq!(black.get(7, 4), Some('k'));
    }

    #[test]
    fn test_assemble_last_wins_on_collision() {
        let labels = LabelMap::default();
        let dets = vec![piece(11, 450.0, 450.0), piece(5, 460.0, 440.0)];
        let grid = assemble(&BOARD, &dets, &labels, PlayerSide::White).unwrap();
        assert_eq!(grid.get(4, 4), Some('p'));
        assert_eq!(grid.piece_count(), 1);
    }

    #[test]
    fn test_assemble_drops_off_board_and_non_pieces() {
        let labels = LabelMap::default();
        let dets = vec![
            piece(11, 850.0, 100.0),
            piece(0, 100.0, 100.0),
            piece(1, 100.0, 100.0),
            piece(77, 100.0, 100.0),
            board_det(),
            piece(12, 100.0, 100.0),
        ];
        let grid = assemble(&BOARD, &dets, &labels, PlayerSide::White).unwrap();
        assert_eq!(grid.piece_count(), 1);
        assert_eq!(grid.get(1, 1), Some('Q'));
    }

    #[test]
    fn test_assemble_empty_board() {
        let labels = LabelMap::default();
        let dets = vec![piece(11, -100.0, 100.0), piece(0, 100.0, 100.0)];
        assert_eq!(
            assemble(&BOARD, &dets, &labels, PlayerSide::White),
            Err(ReconstructError::EmptyBoard)
        );
        assert_eq!(
            assemble(&BOARD, &[], &labels, PlayerSide::Black),
            Err(ReconstructError::EmptyBoard)
        );
    }

    #[test]
    fn test_grid_diagram() {
        let mut grid = BoardGrid::new();
        grid.set(0, 4, 'k');
        grid.set(7, 4, 'K');
        grid.set(6, 0, 'P');
        let diagram = grid.to_string();
        let lines: Vec<&str> = diagram.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "8  . . . . k . . .");
        assert_eq!(lines[1], "7  . . . . . . . .");
        assert_eq!(lines[6], "2  P . . . . . . .");
        assert_eq!(lines[7], "1  . . . . K . . .");
        assert_eq!(lines[8], "   a b c d e f g h");
    }
}
