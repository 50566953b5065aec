//! Pure game logic for the shared-puzzle engine: rack generation, turn
//! validation and scoring, hint computation. No storage, no transport —
//! the service layer owns transactions and clocks feed in as arguments.

pub mod hint;
pub mod rack;
pub mod turn;

pub use hint::hint_cells;
pub use rack::{generate_rack, needed_letters, rack_seed};
pub use turn::{apply_turn, CompletedRun, TurnOutcome};
