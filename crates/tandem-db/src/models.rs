//! Database row types — these map directly to SQLite rows. Conversions to
//! the domain types in tandem-types live here so the query layer stays
//! string-in, string-out.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};

use tandem_types::models::{
    Couple, MatchState, MatchStatus, MoveRecord, Placement, PlayerSlot, Puzzle, RewardGrant,
};

pub struct PuzzleRow {
    pub id: String,
    pub rows: i64,
    pub cols: i64,
    pub cells: String,
    pub clues: String,
    pub solution: String,
}

impl PuzzleRow {
    pub fn to_puzzle(&self) -> Result<Puzzle> {
        Ok(Puzzle {
            id: self.id.parse().context("puzzle id")?,
            rows: self.rows as usize,
            cols: self.cols as usize,
            cells: serde_json::from_str(&self.cells).context("puzzle cell map")?,
            clues: serde_json::from_str(&self.clues).context("puzzle clues")?,
            solution: self.solution.clone(),
        })
    }
}

pub struct CoupleRow {
    pub id: String,
    pub player1_id: String,
    pub player2_id: String,
    pub balance: i64,
    pub created_at: String,
}

impl CoupleRow {
    pub fn to_couple(&self) -> Result<Couple> {
        Ok(Couple {
            id: self.id.parse().context("couple id")?,
            player1_id: self.player1_id.parse().context("player1 id")?,
            player2_id: self.player2_id.parse().context("player2 id")?,
            balance: self.balance,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub struct MatchRow {
    pub id: String,
    pub couple_id: String,
    pub puzzle_id: String,
    pub status: String,
    pub current_slot: i64,
    pub turn_number: i64,
    pub p1_score: i64,
    pub p2_score: i64,
    pub p1_hints: i64,
    pub p2_hints: i64,
    pub locked: String,
    pub rack: String,
    pub winner_slot: Option<i64>,
    pub created_at: String,
    pub turn_started_at: String,
    pub completed_at: Option<String>,
}

impl MatchRow {
    pub fn to_state(&self) -> Result<MatchState> {
        let locked: BTreeMap<usize, char> =
            serde_json::from_str(&self.locked).context("locked cell map")?;
        let rack: Vec<char> = serde_json::from_str(&self.rack).context("rack")?;

        Ok(MatchState {
            id: self.id.parse().context("match id")?,
            couple_id: self.couple_id.parse().context("couple id")?,
            puzzle_id: self.puzzle_id.parse().context("puzzle id")?,
            status: MatchStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("unknown match status '{}'", self.status))?,
            current_slot: PlayerSlot::from_number(self.current_slot)
                .ok_or_else(|| anyhow!("bad current_slot {}", self.current_slot))?,
            turn_number: self.turn_number as u32,
            scores: [self.p1_score as u32, self.p2_score as u32],
            hints: [self.p1_hints as u8, self.p2_hints as u8],
            locked,
            rack,
            winner: self
                .winner_slot
                .map(|n| {
                    PlayerSlot::from_number(n).ok_or_else(|| anyhow!("bad winner_slot {n}"))
                })
                .transpose()?,
            created_at: parse_ts(&self.created_at)?,
            turn_started_at: parse_ts(&self.turn_started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

pub struct MoveRow {
    pub id: String,
    pub match_id: String,
    pub participant: String,
    pub turn_number: i64,
    pub placements: String,
    pub correct: String,
    pub points: i64,
    pub created_at: String,
}

impl MoveRow {
    pub fn to_record(&self) -> Result<MoveRecord> {
        let placements: Vec<Placement> =
            serde_json::from_str(&self.placements).context("move placements")?;
        let correct_cells: Vec<usize> =
            serde_json::from_str(&self.correct).context("move correct cells")?;
        Ok(MoveRecord {
            id: self.id.parse().context("move id")?,
            match_id: self.match_id.parse().context("match id")?,
            participant_id: self.participant.parse().context("participant id")?,
            turn_number: self.turn_number as u32,
            placements,
            correct_cells,
            points: self.points as u32,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub struct GrantRow {
    pub id: String,
    pub couple_id: String,
    pub reason: String,
    pub related_id: String,
    pub amount: i64,
    pub granted_at: String,
}

impl GrantRow {
    pub fn to_grant(&self) -> Result<RewardGrant> {
        Ok(RewardGrant {
            id: self.id.parse().context("grant id")?,
            couple_id: self.couple_id.parse().context("couple id")?,
            reason: self.reason.clone(),
            related_id: self.related_id.parse().context("related id")?,
            amount: self.amount,
            granted_at: parse_ts(&self.granted_at)?,
        })
    }
}

/// Timestamps written from Rust are RFC 3339; SQLite's datetime('now')
/// defaults are "YYYY-MM-DD HH:MM:SS" without timezone. Accept both.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("bad timestamp '{}': {}", s, e))
}
