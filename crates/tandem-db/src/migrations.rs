use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS puzzles (
            id          TEXT PRIMARY KEY,
            rows        INTEGER NOT NULL,
            cols        INTEGER NOT NULL,
            cells       TEXT NOT NULL,
            clues       TEXT NOT NULL,
            -- Server-side secret; no query ever joins this into a response.
            solution    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS couples (
            id          TEXT PRIMARY KEY,
            player1_id  TEXT NOT NULL,
            player2_id  TEXT NOT NULL,
            balance     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_couples_player1 ON couples(player1_id);
        CREATE INDEX IF NOT EXISTS idx_couples_player2 ON couples(player2_id);

        CREATE TABLE IF NOT EXISTS matches (
            id               TEXT PRIMARY KEY,
            couple_id        TEXT NOT NULL REFERENCES couples(id),
            puzzle_id        TEXT NOT NULL REFERENCES puzzles(id),
            status           TEXT NOT NULL DEFAULT 'active',
            current_slot     INTEGER NOT NULL,
            turn_number      INTEGER NOT NULL DEFAULT 1,
            p1_score         INTEGER NOT NULL DEFAULT 0,
            p2_score         INTEGER NOT NULL DEFAULT 0,
            p1_hints         INTEGER NOT NULL DEFAULT 2,
            p2_hints         INTEGER NOT NULL DEFAULT 2,
            locked           TEXT NOT NULL DEFAULT '{}',
            rack             TEXT NOT NULL DEFAULT '[]',
            winner_slot      INTEGER,
            created_at       TEXT NOT NULL,
            turn_started_at  TEXT NOT NULL,
            completed_at     TEXT,
            UNIQUE(couple_id, puzzle_id)
        );

        CREATE INDEX IF NOT EXISTS idx_matches_couple ON matches(couple_id);

        CREATE TABLE IF NOT EXISTS moves (
            id           TEXT PRIMARY KEY,
            match_id     TEXT NOT NULL REFERENCES matches(id),
            participant  TEXT NOT NULL,
            turn_number  INTEGER NOT NULL,
            placements   TEXT NOT NULL,
            correct      TEXT NOT NULL,
            points       INTEGER NOT NULL,
            created_at   TEXT NOT NULL,
            -- Duplicate-submission guard: one record per turn.
            UNIQUE(match_id, turn_number)
        );

        CREATE TABLE IF NOT EXISTS reward_grants (
            id          TEXT PRIMARY KEY,
            couple_id   TEXT NOT NULL REFERENCES couples(id),
            reason      TEXT NOT NULL,
            related_id  TEXT NOT NULL,
            amount      INTEGER NOT NULL,
            granted_at  TEXT NOT NULL DEFAULT (datetime('now')),
            -- The idempotency key: at most one grant per triple. The
            -- constraint, not an application check, is the source of truth.
            UNIQUE(couple_id, reason, related_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
