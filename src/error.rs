//! Frame-local errors of the board reconstruction core.
//! None of these is fatal to the process: the loop drops the frame and tries the next capture.

/// Errors returned while turning one frame's detections into a position or click pair.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructError {
    #[error("malformed detection batch: {reason}")]
    MalformedBatch { reason: String },
    #[error("no chess-board detection in frame")]
    BoardNotFound,
    #[error("board located but no pieces could be placed on it")]
    EmptyBoard,
    #[error("invalid move token '{0}' (expected e.g. 'e2e4')")]
    InvalidMove(String),
}

impl ReconstructError {
    /// True for the two kinds the caller handles the same way: skip the frame, capture again.
    pub fn is_frame_unreadable(&self) -> bool {
        matches!(self, ReconstructError::BoardNotFound | ReconstructError::EmptyBoard)
    }
}
