//! End-to-end flow through the service layer against an in-memory
//! database: create-or-get convergence, play to completion, reward
//! idempotency, and the precondition failures two polling clients can
//! actually hit.

use chrono::Utc;
use uuid::Uuid;

use tandem_api::service;
use tandem_db::{Database, queries};
use tandem_types::GameError;
use tandem_types::api::MatchStateResponse;
use tandem_types::models::{
    CellKind, Clue, Couple, Direction, MatchStatus, Placement, Puzzle,
};

struct Fixture {
    db: Database,
    couple: Couple,
    puzzle: Puzzle,
}

fn fixture() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let couple = Couple {
        id: Uuid::new_v4(),
        player1_id: Uuid::new_v4(),
        player2_id: Uuid::new_v4(),
        balance: 0,
        created_at: Utc::now(),
    };
    // 2x5 grid: "DRIP" across (cells 1-4), "DO" down (cells 1, 6).
    let puzzle = Puzzle {
        id: Uuid::new_v4(),
        rows: 2,
        cols: 5,
        cells: vec![
            CellKind::Clue,
            CellKind::Answer,
            CellKind::Answer,
            CellKind::Answer,
            CellKind::Answer,
            CellKind::Void,
            CellKind::Answer,
            CellKind::Void,
            CellKind::Void,
            CellKind::Void,
        ],
        clues: vec![
            Clue {
                text: "leaky faucet sound".into(),
                direction: Direction::Across,
                cells: vec![1, 2, 3, 4],
            },
            Clue {
                text: "opposite of don't".into(),
                direction: Direction::Down,
                cells: vec![1, 6],
            },
        ],
        solution: ".DRIP.O...".into(),
    };

    db.with_conn(|conn| {
        queries::insert_couple(conn, &couple)?;
        queries::upsert_puzzle(conn, &puzzle)?;
        Ok(())
    })
    .unwrap();

    Fixture { db, couple, puzzle }
}

/// Correct placements for every rack letter that still fits somewhere.
fn solve_with_rack(puzzle: &Puzzle, state: &tandem_types::models::MatchState) -> Vec<Placement> {
    let mut taken: Vec<usize> = Vec::new();
    state
        .rack
        .iter()
        .filter_map(|&letter| {
            puzzle
                .answer_cells()
                .find(|c| {
                    !state.locked.contains_key(c)
                        && !taken.contains(c)
                        && puzzle.solution_at(*c) == Some(letter)
                })
                .map(|cell| {
                    taken.push(cell);
                    Placement { cell, letter }
                })
        })
        .collect()
}

#[test]
fn create_or_get_converges_for_both_participants() {
    let f = fixture();

    let (is_new, first) =
        service::create_or_get_match(&f.db, f.couple.player1_id, f.puzzle.id).unwrap();
    assert!(is_new);
    assert_eq!(first.state.turn_number, 1);
    // The creator holds the first turn and a rack drawn from the puzzle.
    assert_eq!(first.couple.participant(first.state.current_slot), f.couple.player1_id);
    assert!(!first.state.rack.is_empty());

    let (is_new, second) =
        service::create_or_get_match(&f.db, f.couple.player2_id, f.puzzle.id).unwrap();
    assert!(!is_new);
    assert_eq!(second.state.id, first.state.id);
}

#[test]
fn unknown_puzzle_and_unpaired_requester_are_rejected() {
    let f = fixture();
    assert!(matches!(
        service::create_or_get_match(&f.db, f.couple.player1_id, Uuid::new_v4()),
        Err(GameError::PuzzleNotFound(_))
    ));
    assert!(matches!(
        service::create_or_get_match(&f.db, Uuid::new_v4(), f.puzzle.id),
        Err(GameError::CoupleNotFound(_))
    ));
    assert!(matches!(
        service::poll_match(&f.db, Uuid::new_v4(), f.couple.player1_id),
        Err(GameError::MatchNotFound(_))
    ));
}

#[test]
fn play_to_completion_grants_reward_exactly_once() {
    let f = fixture();
    let (_, bundle) =
        service::create_or_get_match(&f.db, f.couple.player1_id, f.puzzle.id).unwrap();
    let match_id = bundle.state.id;

    let mut state = bundle.state;
    let mut last_turn = 0;
    let mut guard = 0;
    while state.status == MatchStatus::Active {
        let requester = f.couple.participant(state.current_slot);
        let placements = solve_with_rack(&f.puzzle, &state);
        last_turn = state.turn_number;
        let applied =
            service::submit_turn(&f.db, match_id, requester, state.turn_number, &placements)
                .unwrap();
        state = applied.bundle.state;
        guard += 1;
        assert!(guard < 20, "match failed to converge");
    }

    assert_eq!(state.status, MatchStatus::Completed);
    assert!(state.completed_at.is_some());
    // Every answer cell locked, and the scoring identity holds:
    // letters × 10 plus both run bonuses (4×10 + 2×10).
    assert_eq!(state.locked.len(), 5);
    assert_eq!(state.scores[0] + state.scores[1], 5 * 10 + 40 + 20);

    // Exactly one grant for (couple, puzzle_complete, match), balance +30.
    let grants = f.db.with_conn(|conn| queries::list_grants(conn, f.couple.id)).unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].reason, "puzzle_complete");
    assert_eq!(grants[0].related_id, match_id);
    assert_eq!(service::couple_balance(&f.db, f.couple.id).unwrap(), 30);

    // A retry of the final turn is a duplicate, not a second grant.
    let retrier = f.couple.participant(state.current_slot);
    assert!(matches!(
        service::submit_turn(&f.db, match_id, retrier, last_turn, &[]),
        Err(GameError::DuplicateTurn(_))
    ));
    assert_eq!(service::couple_balance(&f.db, f.couple.id).unwrap(), 30);

    // And a brand-new submission against the finished match is rejected.
    assert!(matches!(
        service::submit_turn(&f.db, match_id, retrier, last_turn + 1, &[]),
        Err(GameError::MatchNotActive(_))
    ));

    // History shows one record per turn, in order.
    let moves = service::move_history(&f.db, match_id).unwrap();
    assert_eq!(moves.len(), last_turn as usize);
    for (i, m) in moves.iter().enumerate() {
        assert_eq!(m.turn_number as usize, i + 1);
    }
}

#[test]
fn out_of_turn_and_duplicate_submissions_leave_state_untouched() {
    let f = fixture();
    let (_, bundle) =
        service::create_or_get_match(&f.db, f.couple.player1_id, f.puzzle.id).unwrap();
    let match_id = bundle.state.id;

    // Scenario C: partner submits while it is still player 1's turn.
    assert!(matches!(
        service::submit_turn(&f.db, match_id, f.couple.player2_id, 1, &[]),
        Err(GameError::NotYourTurn)
    ));

    // A stranger is not a participant at all.
    assert!(matches!(
        service::submit_turn(&f.db, match_id, Uuid::new_v4(), 1, &[]),
        Err(GameError::NotParticipant)
    ));

    // Player 1 yields; the committed turn is visible to both on next poll.
    service::submit_turn(&f.db, match_id, f.couple.player1_id, 1, &[]).unwrap();
    let polled = service::poll_match(&f.db, match_id, f.couple.player2_id).unwrap();
    assert_eq!(polled.state.turn_number, 2);
    assert_eq!(
        polled.couple.participant(polled.state.current_slot),
        f.couple.player2_id
    );

    // Replaying turn 1 reports DuplicateTurn without double-applying.
    assert!(matches!(
        service::submit_turn(&f.db, match_id, f.couple.player1_id, 1, &[]),
        Err(GameError::DuplicateTurn(1))
    ));
    let again = service::poll_match(&f.db, match_id, f.couple.player1_id).unwrap();
    assert_eq!(again.state.turn_number, 2);

    // A turn number from the future is a stale-client error.
    assert!(matches!(
        service::submit_turn(&f.db, match_id, f.couple.player2_id, 7, &[]),
        Err(GameError::NotYourTurn)
    ));
}

#[test]
fn rejected_placement_rolls_back_the_whole_batch() {
    let f = fixture();
    let (_, bundle) =
        service::create_or_get_match(&f.db, f.couple.player1_id, f.puzzle.id).unwrap();
    let match_id = bundle.state.id;

    // A valid placement followed by a void-cell placement: nothing applies.
    let rack = bundle.state.rack.clone();
    let good = solve_with_rack(&f.puzzle, &bundle.state);
    let mut batch = good.clone();
    batch.push(Placement { cell: 5, letter: rack[0] });

    assert!(matches!(
        service::submit_turn(&f.db, match_id, f.couple.player1_id, 1, &batch),
        Err(GameError::InvalidCell { cell: 5, .. })
    ));

    let polled = service::poll_match(&f.db, match_id, f.couple.player1_id).unwrap();
    assert!(polled.state.locked.is_empty());
    assert_eq!(polled.state.scores, [0, 0]);
    assert_eq!(polled.state.turn_number, 1);
    assert_eq!(polled.state.rack, rack);
}

#[test]
fn hints_decrement_and_exhaust() {
    let f = fixture();
    let (_, bundle) =
        service::create_or_get_match(&f.db, f.couple.player1_id, f.puzzle.id).unwrap();
    let match_id = bundle.state.id;

    // Not the waiting partner's to spend: they hold no rack.
    assert!(matches!(
        service::use_hint(&f.db, match_id, f.couple.player2_id),
        Err(GameError::NotYourTurn)
    ));

    let (cells, remaining) = service::use_hint(&f.db, match_id, f.couple.player1_id).unwrap();
    assert_eq!(remaining, 1);
    // Every hinted cell is unfilled and placeable from the rack.
    for cell in &cells {
        let letter = f.puzzle.solution_at(*cell).unwrap();
        assert!(bundle.state.rack.contains(&letter));
    }

    let (_, remaining) = service::use_hint(&f.db, match_id, f.couple.player1_id).unwrap();
    assert_eq!(remaining, 0);

    // Scenario E: the third request is rejected, counter stays at 0.
    assert!(matches!(
        service::use_hint(&f.db, match_id, f.couple.player1_id),
        Err(GameError::HintExhausted)
    ));
    let polled = service::poll_match(&f.db, match_id, f.couple.player1_id).unwrap();
    assert_eq!(polled.state.hints[0], 0);
    assert_eq!(polled.state.hints[1], 2);
}

#[test]
fn couple_registration_holds_one_couple_per_participant() {
    let db = Database::open_in_memory().unwrap();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let first = service::create_couple(&db, a, b).unwrap();

    // Re-registering either member fails under the same transaction the
    // insert runs in, so two racing requests cannot both claim a player.
    assert!(matches!(
        service::create_couple(&db, a, c),
        Err(GameError::AlreadyPaired(id)) if id == a
    ));
    assert!(matches!(
        service::create_couple(&db, c, b),
        Err(GameError::AlreadyPaired(id)) if id == b
    ));

    // The requester → couple resolution stays unambiguous.
    for member in [a, b] {
        let resolved = db
            .with_conn(|conn| queries::couple_for_participant(conn, member))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, first.id);
    }

    // A participant cannot pair with themselves.
    assert!(matches!(
        service::create_couple(&db, c, c),
        Err(GameError::SelfPairing)
    ));
}

#[test]
fn projection_hides_rack_and_solution() {
    let f = fixture();
    let (_, bundle) =
        service::create_or_get_match(&f.db, f.couple.player1_id, f.puzzle.id).unwrap();

    let for_current = MatchStateResponse::project(
        &bundle.state,
        &bundle.puzzle,
        &bundle.couple,
        f.couple.player1_id,
    );
    assert!(for_current.rack.is_some());

    let for_waiting = MatchStateResponse::project(
        &bundle.state,
        &bundle.puzzle,
        &bundle.couple,
        f.couple.player2_id,
    );
    assert!(for_waiting.rack.is_none());

    // No response path carries the solution, under any key.
    for view in [&for_current, &for_waiting] {
        let json = serde_json::to_string(view).unwrap();
        assert!(!json.contains("solution"));
        assert!(!json.contains("DRIP"));
    }
}
