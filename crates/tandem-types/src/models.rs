use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Letters dealt per turn (fewer when the puzzle needs fewer).
pub const RACK_SIZE: usize = 5;
/// Points per correctly placed letter.
pub const LETTER_POINTS: u32 = 10;
/// Bonus per letter of a word completed this turn.
pub const WORD_BONUS_PER_LETTER: u32 = 10;
/// Hints each participant starts a match with.
pub const HINTS_PER_MATCH: u8 = 2;
/// Shared-balance amount granted once per completed match.
pub const REWARD_PUZZLE_COMPLETE: i64 = 30;
/// Reason code on the completion grant.
pub const REASON_PUZZLE_COMPLETE: &str = "puzzle_complete";

// -- Puzzle --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// Dead space, never holds a letter.
    Void,
    /// Holds printed clue text in the rendered grid.
    Clue,
    /// Holds one solution letter.
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Across,
    Down,
}

/// One clue and the ordered answer-cell run it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    pub text: String,
    pub direction: Direction,
    /// Cell indices of the target word, in reading order.
    pub cells: Vec<usize>,
}

/// Immutable puzzle definition. Deliberately not `Serialize`: the solution
/// must never leave the server, so the only outbound shape is
/// [`crate::api::PuzzleView`].
#[derive(Debug, Clone, Deserialize)]
pub struct Puzzle {
    pub id: Uuid,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<CellKind>,
    pub clues: Vec<Clue>,
    /// One char per cell: the solution letter for answer cells, `.` elsewhere.
    pub solution: String,
}

impl Puzzle {
    pub fn cell(&self, idx: usize) -> Option<CellKind> {
        self.cells.get(idx).copied()
    }

    /// Solution letter at a cell, `None` for void/clue cells.
    pub fn solution_at(&self, idx: usize) -> Option<char> {
        match self.solution.as_bytes().get(idx) {
            Some(b) if b.is_ascii_uppercase() => Some(*b as char),
            _ => None,
        }
    }

    pub fn answer_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == CellKind::Answer)
            .map(|(i, _)| i)
    }

    /// Structural validation, run on every catalog load.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.rows * self.cols;
        if n == 0 {
            return Err("grid has zero cells".into());
        }
        if self.cells.len() != n {
            return Err(format!(
                "cell map has {} entries, grid has {}",
                self.cells.len(),
                n
            ));
        }
        if self.solution.len() != n {
            return Err(format!(
                "solution has {} chars, grid has {} cells",
                self.solution.len(),
                n
            ));
        }
        for (idx, kind) in self.cells.iter().enumerate() {
            let b = self.solution.as_bytes()[idx];
            match kind {
                CellKind::Answer if !b.is_ascii_uppercase() => {
                    return Err(format!("answer cell {idx} has no solution letter"));
                }
                CellKind::Void | CellKind::Clue if b != b'.' => {
                    return Err(format!("non-answer cell {idx} carries solution text"));
                }
                _ => {}
            }
        }
        if self.clues.is_empty() {
            return Err("puzzle has no clues".into());
        }
        for (ci, clue) in self.clues.iter().enumerate() {
            if clue.cells.is_empty() {
                return Err(format!("clue {ci} targets no cells"));
            }
            for &cell in &clue.cells {
                if self.cell(cell) != Some(CellKind::Answer) {
                    return Err(format!("clue {ci} targets non-answer cell {cell}"));
                }
            }
        }
        Ok(())
    }
}

// -- Couple --

/// A registered pairing: the identity resolver maps a requester uuid to
/// the couple row and a player slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Couple {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Couple {
    pub fn slot_of(&self, participant: Uuid) -> Option<PlayerSlot> {
        if participant == self.player1_id {
            Some(PlayerSlot::One)
        } else if participant == self.player2_id {
            Some(PlayerSlot::Two)
        } else {
            None
        }
    }

    pub fn participant(&self, slot: PlayerSlot) -> Uuid {
        match slot {
            PlayerSlot::One => self.player1_id,
            PlayerSlot::Two => self.player2_id,
        }
    }
}

// -- Match --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Active,
    Completed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Active => "active",
            MatchStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MatchStatus::Active),
            "completed" => Some(MatchStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub fn other(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    /// 0-based index into per-slot arrays.
    pub fn idx(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }

    pub fn number(self) -> i64 {
        self.idx() as i64 + 1
    }

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(PlayerSlot::One),
            2 => Some(PlayerSlot::Two),
            _ => None,
        }
    }
}

/// The authoritative mutable state of one couple's run at one puzzle.
/// Mutated only by the turn validator; the locked map is monotonic — a
/// locked cell never changes value or unlocks.
#[derive(Debug, Clone)]
pub struct MatchState {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub puzzle_id: Uuid,
    pub status: MatchStatus,
    /// Whose turn it is. Frozen at its final value once completed.
    pub current_slot: PlayerSlot,
    /// Next expected turn number, 1-based.
    pub turn_number: u32,
    pub scores: [u32; 2],
    pub hints: [u8; 2],
    /// Confirmed cells: index → revealed letter.
    pub locked: BTreeMap<usize, char>,
    /// The current-turn participant's rack. Regenerated at each turn-start.
    pub rack: Vec<char>,
    pub winner: Option<PlayerSlot>,
    pub created_at: DateTime<Utc>,
    pub turn_started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MatchState {
    /// Fresh match: first requester takes the first turn.
    pub fn new(
        id: Uuid,
        couple_id: Uuid,
        puzzle_id: Uuid,
        first: PlayerSlot,
        rack: Vec<char>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            couple_id,
            puzzle_id,
            status: MatchStatus::Active,
            current_slot: first,
            turn_number: 1,
            scores: [0, 0],
            hints: [HINTS_PER_MATCH, HINTS_PER_MATCH],
            locked: BTreeMap::new(),
            rack,
            winner: None,
            created_at: now,
            turn_started_at: now,
            completed_at: None,
        }
    }
}

// -- Move record --

/// Immutable audit entry, one per accepted turn. The (match, turn number)
/// pair is the idempotency key that makes resubmission safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    pub id: Uuid,
    pub match_id: Uuid,
    pub participant_id: Uuid,
    pub turn_number: u32,
    pub placements: Vec<Placement>,
    pub correct_cells: Vec<usize>,
    pub points: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub cell: usize,
    pub letter: char,
}

// -- Reward grant --

/// Append-only ledger row; unique on (couple, reason, related_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardGrant {
    pub id: Uuid,
    pub couple_id: Uuid,
    pub reason: String,
    pub related_id: Uuid,
    pub amount: i64,
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted,
    AlreadyGranted,
}
