use thiserror::Error;
use uuid::Uuid;

/// Game-level error taxonomy. Every variant except `Storage` is a
/// recoverable precondition failure: the match row is untouched and the
/// caller can refresh state and retry or surface a message.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("puzzle not found: {0}")]
    PuzzleNotFound(Uuid),

    #[error("match not found: {0}")]
    MatchNotFound(Uuid),

    #[error("couple not found for participant {0}")]
    CoupleNotFound(Uuid),

    #[error("participants in a couple must be distinct")]
    SelfPairing,

    #[error("participant {0} already belongs to a couple")]
    AlreadyPaired(Uuid),

    #[error("match {0} is no longer active")]
    MatchNotActive(Uuid),

    #[error("it is not this participant's turn")]
    NotYourTurn,

    #[error("requester is not a participant in this match")]
    NotParticipant,

    #[error("invalid placement at cell {cell}: {reason}")]
    InvalidCell { cell: usize, reason: String },

    #[error("turn {0} has already been recorded for this match")]
    DuplicateTurn(u32),

    #[error("no hints remaining")]
    HintExhausted,

    /// Transient infrastructure failure (storage outage, corrupt row).
    /// Callers apply their own retry/backoff; never conflated with a
    /// game-logic outcome.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl GameError {
    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::PuzzleNotFound(_) => "puzzle_not_found",
            GameError::MatchNotFound(_) => "match_not_found",
            GameError::CoupleNotFound(_) => "couple_not_found",
            GameError::SelfPairing => "self_pairing",
            GameError::AlreadyPaired(_) => "already_paired",
            GameError::MatchNotActive(_) => "match_not_active",
            GameError::NotYourTurn => "not_your_turn",
            GameError::NotParticipant => "not_participant",
            GameError::InvalidCell { .. } => "invalid_cell",
            GameError::DuplicateTurn(_) => "duplicate_turn",
            GameError::HintExhausted => "hint_exhausted",
            GameError::Storage(_) => "storage_unavailable",
        }
    }
}

// anyhow::Error does not implement std::error::Error, so thiserror's
// #[from] cannot be used here.
impl From<anyhow::Error> for GameError {
    fn from(err: anyhow::Error) -> Self {
        GameError::Storage(format!("{err:#}"))
    }
}
