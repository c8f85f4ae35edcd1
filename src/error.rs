use thiserror::Error;

/// Errors surfaced by the console and its persistence boundary.
///
/// An illegal move is an expected, recoverable event: the controller turns it
/// into an `IllegalMove` notification and the turn does not advance. Nothing
/// here ever propagates as a panic through the turn loop.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("invalid position {0:?}")]
    InvalidPosition(String),

    #[error("illegal move {0:?}")]
    IllegalMove(String),

    #[error("corrupted saved game: {0}")]
    CorruptedSave(String),

    #[error(transparent)]
    Store(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}
