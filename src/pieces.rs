//! Detector class table.
//! Maps the object detector's integer labels to piece identities.
//! The default table matches the training set of the chess-pieces model; a custom one can be
//! supplied through the config file.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};

use crate::PlayerSide;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// What a detector label stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceClass {
    Piece(PlayerSide, PieceKind),
    /// The board boundary box.
    Board,
    /// Generic "pieces" / colorless "bishop" classes the model was trained with. Never placed.
    Auxiliary,
}

impl PieceClass {
    /// Class name used by the detector's label table, e.g. `white-knight`.
    pub fn from_name(name: &str) -> Option<Self> {
        let class = match name {
            "chess-board" => PieceClass::Board,
            "pieces" | "bishop" => PieceClass::Auxiliary,
            _ => {
                let (side, kind) = name.split_once('-')?;
                let side = match side {
                    "white" => PlayerSide::White,
                    "black" => PlayerSide::Black,
                    _ => return None,
                };
                let kind = match kind {
                    "pawn" => PieceKind::Pawn,
                    "knight" => PieceKind::Knight,
                    "bishop" => PieceKind::Bishop,
                    "rook" => PieceKind::Rook,
                    "queen" => PieceKind::Queen,
                    "king" => PieceKind::King,
                    _ => return None,
                };
                PieceClass::Piece(side, kind)
            }
        };
        Some(class)
    }

    /// FEN letter: uppercase for white, lowercase for black. `None` for non-pieces.
    pub fn fen_char(&self) -> Option<char> {
        let PieceClass::Piece(side, kind) = self else {
            return None;
        };
        let c = match kind {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        Some(match side {
            PlayerSide::White => c.to_ascii_uppercase(),
            PlayerSide::Black => c,
        })
    }
}

impl fmt::Display for PieceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PieceClass::Board => write!(f, "chess-board"),
            PieceClass::Auxiliary => write!(f, "auxiliary"),
            PieceClass::Piece(side, kind) => {
                let side = match side {
                    PlayerSide::White => "white",
                    PlayerSide::Black => "black",
                };
                write!(f, "{}-{}", side, format!("{:?}", kind).to_lowercase())
            }
        }
    }
}

/// Label id -> class lookup with exactly one board label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelMap {
    classes: BTreeMap<i64, PieceClass>,
    board_label: i64,
}

const DEFAULT_LABELS: [(i64, &str); 15] = [
    (0, "pieces"),
    (1, "bishop"),
    (2, "black-bishop"),
    (3, "black-king"),
    (4, "black-knight"),
    (5, "black-pawn"),
    (6, "black-queen"),
    (7, "black-rook"),
    (8, "white-bishop"),
    (9, "white-king"),
    (10, "white-knight"),
    (11, "white-pawn"),
    (12, "white-queen"),
    (13, "white-rook"),
    (14, "chess-board"),
];

/// The default label table as owned names, the shape the config file stores.
pub fn default_label_names() -> BTreeMap<i64, String> {
    DEFAULT_LABELS
        .iter()
        .map(|(id, name)| (*id, name.to_string()))
        .collect()
}

impl LabelMap {
    /// Builds the lookup from `label id -> class name`. Fails on unknown names
    /// or when the table does not name exactly one `board_class` label.
    pub fn from_names(names: &BTreeMap<i64, String>, board_class: &str) -> Result<Self> {
        let mut classes = BTreeMap::new();
        let mut board_labels = Vec::new();

        for (id, name) in names {
            if name == board_class {
                board_labels.push(*id);
                classes.insert(*id, PieceClass::Board);
                continue;
            }
            match PieceClass::from_name(name) {
                Some(PieceClass::Board) => {
                    bail!("label {} is 'chess-board' but the board class is '{}'", id, board_class)
                }
                Some(class) => {
                    classes.insert(*id, class);
                }
                None => bail!("unknown class name '{}' for label {}", name, id),
            }
        }

        match board_labels.as_slice() {
            [board_label] => Ok(Self { classes, board_label: *board_label }),
            [] => bail!("label table has no '{}' entry", board_class),
            many => bail!("label table has {} '{}' entries, expected one", many.len(), board_class),
        }
    }

    pub fn board_label(&self) -> i64 {
        self.board_label
    }

    pub fn class_of(&self, label: i64) -> Option<PieceClass> {
        self.classes.get(&label).copied()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        let classes = DEFAULT_LABELS
            .iter()
            .filter_map(|(id, name)| PieceClass::from_name(name).map(|c| (*id, c)))
            .collect();
        Self { classes, board_label: 14 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let map = LabelMap::default();
        assert_eq!(map.board_label(), 14);
        assert_eq!(map.class_of(14), Some(PieceClass::Board));
        assert_eq!(map.class_of(0), Some(PieceClass::Auxiliary));
        assert_eq!(map.class_of(1), Some(PieceClass::Auxiliary));
        assert_eq!(map.class_of(9).and_then(|c| c.fen_char()), Some('K'));
        assert_eq!(map.class_of(7).and_then(|c| c.fen_char()), Some('r'));
        assert_eq!(map.class_of(99), None);
    }

    #[test]
    fn test_default_matches_named_table() {
        let built = LabelMap::from_names(&default_label_names(), "chess-board").unwrap();
        assert_eq!(built, LabelMap::default());
    }

    #[test]
    fn test_fen_chars() {
        let letters: String = (2..=13)
            .filter_map(|id| LabelMap::default().class_of(id))
            .filter_map(|c| c.fen_char())
            .collect();
        assert_eq!(letters, "bknpqrBKNPQR");
        assert_eq!(PieceClass::Board.fen_char(), None);
        assert_eq!(PieceClass::Auxiliary.fen_char(), None);
    }

    #[test]
    fn test_table_needs_exactly_one_board() {
        let mut names = default_label_names();
        names.remove(&14);
        assert!(LabelMap::from_names(&names, "chess-board").is_err());

        let mut names = default_label_names();
        names.insert(15, "chess-board".to_string());
        let err = LabelMap::from_names(&names, "chess-board").unwrap_err();
        assert!(err.to_string().contains("expected one"));
    }

    #[test]
    fn test_unknown_class_name_rejected() {
        let mut names = default_label_names();
        names.insert(20, "white-dragon".to_string());
        assert!(LabelMap::from_names(&names, "chess-board").is_err());
    }

    #[test]
    fn test_display_round_trips_name() {
        let class = PieceClass::from_name("black-knight").unwrap();
        assert_eq!(class.to_string(), "black-knight");
    }
}
