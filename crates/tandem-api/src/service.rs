//! The service layer: each operation is one transactional read-validate-
//! write unit against the match row (or couple row, for the ledger). The
//! connection mutex serializes concurrent requests, so a `submit_turn`
//! that loses the race re-reads committed state and fails its
//! precondition check instead of corrupting anything.

use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use tandem_db::{Database, queries};
use tandem_engine::{apply_turn, generate_rack, hint_cells};
use tandem_types::GameError;
use tandem_types::models::{
    Couple, GrantOutcome, MatchState, MatchStatus, MoveRecord, Placement, Puzzle,
    REASON_PUZZLE_COMPLETE, REWARD_PUZZLE_COMPLETE, RewardGrant,
};

/// Everything a projection needs about one match.
pub struct MatchBundle {
    pub state: MatchState,
    pub puzzle: Puzzle,
    pub couple: Couple,
}

pub struct TurnApplied {
    pub bundle: MatchBundle,
    pub outcome: tandem_engine::TurnOutcome,
}

/// Game errors travel through the anyhow layer (they implement
/// `std::error::Error`); anything else is a storage-class failure.
fn game_err(err: anyhow::Error) -> GameError {
    match err.downcast::<GameError>() {
        Ok(game) => game,
        Err(other) => GameError::Storage(format!("{other:#}")),
    }
}

/// Create-or-get: the first request from either participant for a given
/// puzzle creates the match and hands that requester the first turn; every
/// later request returns the existing row.
pub fn create_or_get_match(
    db: &Database,
    requester: Uuid,
    puzzle_id: Uuid,
) -> Result<(bool, MatchBundle), GameError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        let couple = queries::couple_for_participant(&tx, requester)?
            .ok_or(GameError::CoupleNotFound(requester))?;
        let puzzle = queries::get_puzzle(&tx, puzzle_id)?
            .ok_or(GameError::PuzzleNotFound(puzzle_id))?;

        if let Some(existing) = queries::match_for_couple_puzzle(&tx, couple.id, puzzle.id)? {
            tx.commit()?;
            return Ok((false, MatchBundle { state: existing, puzzle, couple }));
        }

        let slot = couple
            .slot_of(requester)
            .ok_or(GameError::NotParticipant)?;
        let now = Utc::now();
        let rack = generate_rack(&puzzle, &BTreeMap::new(), &mut rand::rng());
        let state = MatchState::new(Uuid::new_v4(), couple.id, puzzle.id, slot, rack, now);

        queries::insert_match(&tx, &state)?;
        tx.commit()?;

        info!(match_id = %state.id, couple_id = %couple.id, puzzle_id = %puzzle.id, "match created");
        Ok((true, MatchBundle { state, puzzle, couple }))
    })
    .map_err(game_err)
}

/// Poll: a committed turn is visible to every subsequent call, from either
/// participant. Read-only.
pub fn poll_match(db: &Database, match_id: Uuid, requester: Uuid) -> Result<MatchBundle, GameError> {
    db.with_conn(|conn| {
        let bundle = load_bundle(conn, match_id)?;
        if bundle.couple.slot_of(requester).is_none() {
            return Err(GameError::NotParticipant.into());
        }
        Ok(bundle)
    })
    .map_err(game_err)
}

pub fn submit_turn(
    db: &Database,
    match_id: Uuid,
    requester: Uuid,
    turn_number: u32,
    placements: &[Placement],
) -> Result<TurnApplied, GameError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        let MatchBundle { state, puzzle, couple } = load_bundle(&tx, match_id)?;
        let slot = couple
            .slot_of(requester)
            .ok_or(GameError::NotParticipant)?;

        // Dedup before anything else: a retried submission must surface as
        // DuplicateTurn even after control passed on or the match finished.
        if queries::get_move(&tx, match_id, turn_number)?.is_some() {
            return Err(GameError::DuplicateTurn(turn_number).into());
        }
        if state.status != MatchStatus::Active {
            return Err(GameError::MatchNotActive(match_id).into());
        }
        if slot != state.current_slot {
            return Err(GameError::NotYourTurn.into());
        }
        if turn_number != state.turn_number {
            // Not yet recorded and not the expected number: stale client.
            return Err(GameError::NotYourTurn.into());
        }

        let now = Utc::now();
        let (next, outcome) = apply_turn(&puzzle, &state, placements, &mut rand::rng(), now)?;

        queries::insert_move(
            &tx,
            &MoveRecord {
                id: Uuid::new_v4(),
                match_id,
                participant_id: requester,
                turn_number,
                placements: placements.to_vec(),
                correct_cells: outcome.correct_cells(),
                points: outcome.turn_points,
                created_at: now,
            },
        )?;
        queries::update_match(&tx, &next)?;

        if outcome.puzzle_complete {
            let granted = queries::grant_once(
                &tx,
                &RewardGrant {
                    id: Uuid::new_v4(),
                    couple_id: couple.id,
                    reason: REASON_PUZZLE_COMPLETE.into(),
                    related_id: match_id,
                    amount: REWARD_PUZZLE_COMPLETE,
                    granted_at: now,
                },
            )?;
            match granted {
                GrantOutcome::Granted => {
                    info!(match_id = %match_id, couple_id = %couple.id, "completion reward granted");
                }
                GrantOutcome::AlreadyGranted => {
                    debug!(match_id = %match_id, "completion reward was already granted");
                }
            }
        }

        tx.commit()?;
        Ok(TurnApplied {
            bundle: MatchBundle { state: next, puzzle, couple },
            outcome,
        })
    })
    .map_err(game_err)
}

/// Spend one hint: returns every unfilled answer cell placeable from the
/// requester's current rack. Only the current-turn participant holds a
/// rack, so only they can ask.
pub fn use_hint(
    db: &Database,
    match_id: Uuid,
    requester: Uuid,
) -> Result<(Vec<usize>, u8), GameError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;

        let MatchBundle { mut state, puzzle, couple } = load_bundle(&tx, match_id)?;
        let slot = couple
            .slot_of(requester)
            .ok_or(GameError::NotParticipant)?;

        if state.status != MatchStatus::Active {
            return Err(GameError::MatchNotActive(match_id).into());
        }
        if slot != state.current_slot {
            return Err(GameError::NotYourTurn.into());
        }
        if state.hints[slot.idx()] == 0 {
            return Err(GameError::HintExhausted.into());
        }

        let cells = hint_cells(&puzzle, &state.locked, &state.rack);
        state.hints[slot.idx()] -= 1;
        let remaining = state.hints[slot.idx()];
        queries::update_match(&tx, &state)?;
        tx.commit()?;

        debug!(match_id = %match_id, remaining, "hint used");
        Ok((cells, remaining))
    })
    .map_err(game_err)
}

pub fn move_history(db: &Database, match_id: Uuid) -> Result<Vec<MoveRecord>, GameError> {
    db.with_conn(|conn| {
        if queries::get_match(conn, match_id)?.is_none() {
            return Err(GameError::MatchNotFound(match_id).into());
        }
        queries::list_moves(conn, match_id)
    })
    .map_err(game_err)
}

/// Register a couple. The membership check and the insert share one
/// transaction, so two racing registrations naming the same participant
/// cannot both succeed.
pub fn create_couple(
    db: &Database,
    player1_id: Uuid,
    player2_id: Uuid,
) -> Result<Couple, GameError> {
    if player1_id == player2_id {
        return Err(GameError::SelfPairing);
    }
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        for id in [player1_id, player2_id] {
            if queries::couple_for_participant(&tx, id)?.is_some() {
                return Err(GameError::AlreadyPaired(id).into());
            }
        }
        let couple = Couple {
            id: Uuid::new_v4(),
            player1_id,
            player2_id,
            balance: 0,
            created_at: Utc::now(),
        };
        queries::insert_couple(&tx, &couple)?;
        tx.commit()?;
        info!(couple_id = %couple.id, "couple registered");
        Ok(couple)
    })
    .map_err(game_err)
}

pub fn couple_balance(db: &Database, couple_id: Uuid) -> Result<i64, GameError> {
    db.with_conn(|conn| {
        queries::couple_balance(conn, couple_id)?
            .ok_or_else(|| GameError::CoupleNotFound(couple_id).into())
    })
    .map_err(game_err)
}

fn load_bundle(conn: &rusqlite::Connection, match_id: Uuid) -> anyhow::Result<MatchBundle> {
    let state = queries::get_match(conn, match_id)?
        .ok_or(GameError::MatchNotFound(match_id))?;
    let couple = queries::get_couple(conn, state.couple_id)?
        .ok_or_else(|| anyhow!("match {} references missing couple {}", match_id, state.couple_id))?;
    let puzzle = queries::get_puzzle(conn, state.puzzle_id)?
        .with_context(|| format!("match {} references missing puzzle {}", match_id, state.puzzle_id))?;
    Ok(MatchBundle { state, puzzle, couple })
}
