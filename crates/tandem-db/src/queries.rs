use anyhow::{Result, bail};
use chrono::SecondsFormat;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use tandem_types::models::{Couple, GrantOutcome, MatchState, MoveRecord, Puzzle, RewardGrant};

use crate::Database;
use crate::models::{CoupleRow, GrantRow, MatchRow, MoveRow, PuzzleRow};

// The query layer is split into free functions over &Connection so the
// service layer can compose them inside a single transaction; the Database
// methods below are convenience wrappers for single-statement reads.

// -- Puzzles --

/// Insert or refresh a catalog puzzle. Identical content is a no-op;
/// changed content is rejected while any match references the puzzle
/// (puzzles are versioned, never edited in place under players).
pub fn upsert_puzzle(conn: &Connection, puzzle: &Puzzle) -> Result<()> {
    let cells = serde_json::to_string(&puzzle.cells)?;
    let clues = serde_json::to_string(&puzzle.clues)?;

    let existing = conn
        .query_row(
            "SELECT id, rows, cols, cells, clues, solution FROM puzzles WHERE id = ?1",
            [puzzle.id.to_string()],
            |row| {
                Ok(PuzzleRow {
                    id: row.get(0)?,
                    rows: row.get(1)?,
                    cols: row.get(2)?,
                    cells: row.get(3)?,
                    clues: row.get(4)?,
                    solution: row.get(5)?,
                })
            },
        )
        .optional()?;

    if let Some(row) = existing {
        let unchanged = row.rows as usize == puzzle.rows
            && row.cols as usize == puzzle.cols
            && row.cells == cells
            && row.clues == clues
            && row.solution == puzzle.solution;
        if unchanged {
            return Ok(());
        }
        if puzzle_has_matches(conn, puzzle.id)? {
            bail!(
                "puzzle {} changed but has in-progress matches; publish it under a new id",
                puzzle.id
            );
        }
        conn.execute(
            "UPDATE puzzles SET rows = ?2, cols = ?3, cells = ?4, clues = ?5, solution = ?6
             WHERE id = ?1",
            params![puzzle.id.to_string(), puzzle.rows as i64, puzzle.cols as i64, cells, clues, puzzle.solution],
        )?;
        return Ok(());
    }

    conn.execute(
        "INSERT INTO puzzles (id, rows, cols, cells, clues, solution)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![puzzle.id.to_string(), puzzle.rows as i64, puzzle.cols as i64, cells, clues, puzzle.solution],
    )?;
    Ok(())
}

pub fn get_puzzle(conn: &Connection, id: Uuid) -> Result<Option<Puzzle>> {
    let row = conn
        .query_row(
            "SELECT id, rows, cols, cells, clues, solution FROM puzzles WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok(PuzzleRow {
                    id: row.get(0)?,
                    rows: row.get(1)?,
                    cols: row.get(2)?,
                    cells: row.get(3)?,
                    clues: row.get(4)?,
                    solution: row.get(5)?,
                })
            },
        )
        .optional()?;

    row.map(|r| r.to_puzzle()).transpose()
}

pub fn puzzle_has_matches(conn: &Connection, puzzle_id: Uuid) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM matches WHERE puzzle_id = ?1",
        [puzzle_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

// -- Couples --

pub fn insert_couple(conn: &Connection, couple: &Couple) -> Result<()> {
    conn.execute(
        "INSERT INTO couples (id, player1_id, player2_id, balance, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            couple.id.to_string(),
            couple.player1_id.to_string(),
            couple.player2_id.to_string(),
            couple.balance,
            ts(&couple.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_couple(conn: &Connection, id: Uuid) -> Result<Option<Couple>> {
    query_couple(conn, "SELECT id, player1_id, player2_id, balance, created_at FROM couples WHERE id = ?1", &id.to_string())
}

/// The identity resolver: a requester uuid maps to the couple it belongs to.
pub fn couple_for_participant(conn: &Connection, participant: Uuid) -> Result<Option<Couple>> {
    query_couple(
        conn,
        "SELECT id, player1_id, player2_id, balance, created_at FROM couples
         WHERE player1_id = ?1 OR player2_id = ?1",
        &participant.to_string(),
    )
}

fn query_couple(conn: &Connection, sql: &str, arg: &str) -> Result<Option<Couple>> {
    let row = conn
        .query_row(sql, [arg], |row| {
            Ok(CoupleRow {
                id: row.get(0)?,
                player1_id: row.get(1)?,
                player2_id: row.get(2)?,
                balance: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;
    row.map(|r| r.to_couple()).transpose()
}

pub fn couple_balance(conn: &Connection, couple_id: Uuid) -> Result<Option<i64>> {
    let balance = conn
        .query_row(
            "SELECT balance FROM couples WHERE id = ?1",
            [couple_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(balance)
}

// -- Matches --

const MATCH_COLUMNS: &str = "id, couple_id, puzzle_id, status, current_slot, turn_number,
    p1_score, p2_score, p1_hints, p2_hints, locked, rack, winner_slot,
    created_at, turn_started_at, completed_at";

fn match_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        id: row.get(0)?,
        couple_id: row.get(1)?,
        puzzle_id: row.get(2)?,
        status: row.get(3)?,
        current_slot: row.get(4)?,
        turn_number: row.get(5)?,
        p1_score: row.get(6)?,
        p2_score: row.get(7)?,
        p1_hints: row.get(8)?,
        p2_hints: row.get(9)?,
        locked: row.get(10)?,
        rack: row.get(11)?,
        winner_slot: row.get(12)?,
        created_at: row.get(13)?,
        turn_started_at: row.get(14)?,
        completed_at: row.get(15)?,
    })
}

pub fn insert_match(conn: &Connection, state: &MatchState) -> Result<()> {
    conn.execute(
        "INSERT INTO matches (id, couple_id, puzzle_id, status, current_slot, turn_number,
            p1_score, p2_score, p1_hints, p2_hints, locked, rack, winner_slot,
            created_at, turn_started_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            state.id.to_string(),
            state.couple_id.to_string(),
            state.puzzle_id.to_string(),
            state.status.as_str(),
            state.current_slot.number(),
            state.turn_number as i64,
            state.scores[0] as i64,
            state.scores[1] as i64,
            state.hints[0] as i64,
            state.hints[1] as i64,
            serde_json::to_string(&state.locked)?,
            serde_json::to_string(&state.rack)?,
            state.winner.map(|s| s.number()),
            ts(&state.created_at),
            ts(&state.turn_started_at),
            state.completed_at.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

/// Overwrite the mutable columns of a match row. Always called inside the
/// submit/hint transaction that read the row.
pub fn update_match(conn: &Connection, state: &MatchState) -> Result<()> {
    let n = conn.execute(
        "UPDATE matches SET status = ?2, current_slot = ?3, turn_number = ?4,
            p1_score = ?5, p2_score = ?6, p1_hints = ?7, p2_hints = ?8,
            locked = ?9, rack = ?10, winner_slot = ?11,
            turn_started_at = ?12, completed_at = ?13
         WHERE id = ?1",
        params![
            state.id.to_string(),
            state.status.as_str(),
            state.current_slot.number(),
            state.turn_number as i64,
            state.scores[0] as i64,
            state.scores[1] as i64,
            state.hints[0] as i64,
            state.hints[1] as i64,
            serde_json::to_string(&state.locked)?,
            serde_json::to_string(&state.rack)?,
            state.winner.map(|s| s.number()),
            ts(&state.turn_started_at),
            state.completed_at.as_ref().map(ts),
        ],
    )?;
    if n != 1 {
        bail!("match {} vanished during update", state.id);
    }
    Ok(())
}

pub fn get_match(conn: &Connection, id: Uuid) -> Result<Option<MatchState>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], match_from_row)
        .optional()?;
    row.map(|r| r.to_state()).transpose()
}

pub fn match_for_couple_puzzle(
    conn: &Connection,
    couple_id: Uuid,
    puzzle_id: Uuid,
) -> Result<Option<MatchState>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE couple_id = ?1 AND puzzle_id = ?2");
    let row = conn
        .query_row(&sql, [couple_id.to_string(), puzzle_id.to_string()], match_from_row)
        .optional()?;
    row.map(|r| r.to_state()).transpose()
}

// -- Moves --

pub fn insert_move(conn: &Connection, rec: &MoveRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO moves (id, match_id, participant, turn_number, placements, correct, points, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            rec.id.to_string(),
            rec.match_id.to_string(),
            rec.participant_id.to_string(),
            rec.turn_number as i64,
            serde_json::to_string(&rec.placements)?,
            serde_json::to_string(&rec.correct_cells)?,
            rec.points as i64,
            ts(&rec.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_move(conn: &Connection, match_id: Uuid, turn_number: u32) -> Result<Option<MoveRecord>> {
    let row = conn
        .query_row(
            "SELECT id, match_id, participant, turn_number, placements, correct, points, created_at
             FROM moves WHERE match_id = ?1 AND turn_number = ?2",
            params![match_id.to_string(), turn_number as i64],
            move_from_row,
        )
        .optional()?;
    row.map(|r| r.to_record()).transpose()
}

pub fn list_moves(conn: &Connection, match_id: Uuid) -> Result<Vec<MoveRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, match_id, participant, turn_number, placements, correct, points, created_at
         FROM moves WHERE match_id = ?1 ORDER BY turn_number ASC",
    )?;
    let rows = stmt
        .query_map([match_id.to_string()], move_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.iter().map(|r| r.to_record()).collect()
}

fn move_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MoveRow> {
    Ok(MoveRow {
        id: row.get(0)?,
        match_id: row.get(1)?,
        participant: row.get(2)?,
        turn_number: row.get(3)?,
        placements: row.get(4)?,
        correct: row.get(5)?,
        points: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// -- Reward ledger --

/// Idempotent grant: the UNIQUE(couple_id, reason, related_id) constraint
/// decides, via INSERT OR IGNORE's rows-changed count, whether this call
/// was the first. Only the first increments the shared balance, in the
/// same transaction.
pub fn grant_once(
    conn: &Connection,
    grant: &RewardGrant,
) -> Result<GrantOutcome> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO reward_grants (id, couple_id, reason, related_id, amount, granted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            grant.id.to_string(),
            grant.couple_id.to_string(),
            grant.reason,
            grant.related_id.to_string(),
            grant.amount,
            ts(&grant.granted_at),
        ],
    )?;

    if inserted == 0 {
        return Ok(GrantOutcome::AlreadyGranted);
    }

    let updated = conn.execute(
        "UPDATE couples SET balance = balance + ?2 WHERE id = ?1",
        params![grant.couple_id.to_string(), grant.amount],
    )?;
    if updated != 1 {
        bail!("couple {} missing while applying grant", grant.couple_id);
    }
    Ok(GrantOutcome::Granted)
}

pub fn list_grants(conn: &Connection, couple_id: Uuid) -> Result<Vec<RewardGrant>> {
    let mut stmt = conn.prepare(
        "SELECT id, couple_id, reason, related_id, amount, granted_at
         FROM reward_grants WHERE couple_id = ?1 ORDER BY granted_at ASC",
    )?;
    let rows = stmt
        .query_map([couple_id.to_string()], |row| {
            Ok(GrantRow {
                id: row.get(0)?,
                couple_id: row.get(1)?,
                reason: row.get(2)?,
                related_id: row.get(3)?,
                amount: row.get(4)?,
                granted_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.iter().map(|r| r.to_grant()).collect()
}

fn ts(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// -- Convenience wrappers --

impl Database {
    pub fn get_puzzle(&self, id: Uuid) -> Result<Option<Puzzle>> {
        self.with_conn(|conn| get_puzzle(conn, id))
    }

    pub fn get_couple(&self, id: Uuid) -> Result<Option<Couple>> {
        self.with_conn(|conn| get_couple(conn, id))
    }

    pub fn couple_for_participant(&self, participant: Uuid) -> Result<Option<Couple>> {
        self.with_conn(|conn| couple_for_participant(conn, participant))
    }

    pub fn get_match(&self, id: Uuid) -> Result<Option<MatchState>> {
        self.with_conn(|conn| get_match(conn, id))
    }

    pub fn list_moves(&self, match_id: Uuid) -> Result<Vec<MoveRecord>> {
        self.with_conn(|conn| list_moves(conn, match_id))
    }

    pub fn couple_balance(&self, couple_id: Uuid) -> Result<Option<i64>> {
        self.with_conn(|conn| couple_balance(conn, couple_id))
    }
}
