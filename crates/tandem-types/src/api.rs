use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    CellKind, Clue, Couple, MatchState, MatchStatus, MoveRecord, Placement, Puzzle,
};

// -- Couples --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCoupleRequest {
    pub player1_id: Uuid,
    pub player2_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CoupleResponse {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub couple_id: Uuid,
    pub balance: i64,
}

// -- Puzzle projection --

/// Client-visible slice of a puzzle. This type intentionally has no
/// solution field; constructing it is the only way puzzle data reaches a
/// response.
#[derive(Debug, Clone, Serialize)]
pub struct PuzzleView {
    pub id: Uuid,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<CellKind>,
    pub clues: Vec<Clue>,
}

impl PuzzleView {
    pub fn project(puzzle: &Puzzle) -> Self {
        Self {
            id: puzzle.id,
            rows: puzzle.rows,
            cols: puzzle.cols,
            cells: puzzle.cells.clone(),
            clues: puzzle.clues.clone(),
        }
    }
}

// -- Match lifecycle --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMatchRequest {
    pub requester_id: Uuid,
    pub puzzle_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub requester_id: Uuid,
}

/// The one projection through which match state leaves the core. The rack
/// is present only when the requester is the current-turn participant, and
/// the solution is unreachable from here by construction.
#[derive(Debug, Serialize)]
pub struct MatchStateResponse {
    pub match_id: Uuid,
    pub puzzle: PuzzleView,
    pub status: MatchStatus,
    /// Absent once the match is completed.
    pub current_turn: Option<Uuid>,
    pub turn_number: u32,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_score: u32,
    pub player2_score: u32,
    pub locked: BTreeMap<usize, char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack: Option<Vec<char>>,
    /// Requester's own remaining hints.
    pub hints_remaining: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl MatchStateResponse {
    pub fn project(
        state: &MatchState,
        puzzle: &Puzzle,
        couple: &Couple,
        requester: Uuid,
    ) -> Self {
        let requester_slot = couple.slot_of(requester);
        let is_current = state.status == MatchStatus::Active
            && requester_slot == Some(state.current_slot);

        Self {
            match_id: state.id,
            puzzle: PuzzleView::project(puzzle),
            status: state.status,
            current_turn: (state.status == MatchStatus::Active)
                .then(|| couple.participant(state.current_slot)),
            turn_number: state.turn_number,
            player1_id: couple.player1_id,
            player2_id: couple.player2_id,
            player1_score: state.scores[0],
            player2_score: state.scores[1],
            locked: state.locked.clone(),
            rack: is_current.then(|| state.rack.clone()),
            hints_remaining: requester_slot.map(|s| state.hints[s.idx()]).unwrap_or(0),
            winner: state.winner.map(|s| couple.participant(s)),
            created_at: state.created_at,
            completed_at: state.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateMatchResponse {
    pub is_new: bool,
    #[serde(flatten)]
    pub state: MatchStateResponse,
}

// -- Turns --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitTurnRequest {
    pub requester_id: Uuid,
    pub turn_number: u32,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlacementResult {
    pub cell: usize,
    pub letter: char,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedWord {
    pub clue: String,
    pub cells: Vec<usize>,
    pub bonus: u32,
}

#[derive(Debug, Serialize)]
pub struct TurnResultResponse {
    pub placements: Vec<PlacementResult>,
    pub letter_points: u32,
    pub completed_words: Vec<CompletedWord>,
    pub bonus_points: u32,
    pub turn_points: u32,
    pub new_score: u32,
    pub puzzle_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Uuid>,
    /// Post-turn state projected for the submitter. The next rack belongs
    /// to the other participant and is therefore never included here.
    pub state: MatchStateResponse,
}

// -- Hints --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HintRequest {
    pub requester_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HintResponse {
    /// Unfilled answer cells whose letter is somewhere in the rack.
    pub cells: Vec<usize>,
    pub hints_remaining: u8,
}

// -- Move history --

#[derive(Debug, Serialize)]
pub struct MoveView {
    pub turn_number: u32,
    pub participant_id: Uuid,
    pub placements: Vec<Placement>,
    pub correct_cells: Vec<usize>,
    pub points: u32,
    pub created_at: DateTime<Utc>,
}

impl MoveView {
    pub fn project(rec: &MoveRecord) -> Self {
        Self {
            turn_number: rec.turn_number,
            participant_id: rec.participant_id,
            placements: rec.placements.clone(),
            correct_cells: rec.correct_cells.clone(),
            points: rec.points,
            created_at: rec.created_at,
        }
    }
}

// -- Errors on the wire --

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}
