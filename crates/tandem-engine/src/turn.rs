use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

use tandem_types::GameError;
use tandem_types::models::{
    CellKind, LETTER_POINTS, MatchState, MatchStatus, Placement, PlayerSlot, Puzzle,
    WORD_BONUS_PER_LETTER,
};

use crate::rack::generate_rack;

/// A clue run fully locked as a result of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRun {
    pub clue_index: usize,
    pub clue_text: String,
    pub cells: Vec<usize>,
    pub bonus: u32,
}

/// The scored result of one accepted turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// (cell, normalized letter, correct), in submitted order.
    pub placements: Vec<(usize, char, bool)>,
    pub letter_points: u32,
    pub completed_runs: Vec<CompletedRun>,
    pub bonus_points: u32,
    pub turn_points: u32,
    pub puzzle_complete: bool,
}

impl TurnOutcome {
    pub fn correct_cells(&self) -> Vec<usize> {
        self.placements
            .iter()
            .filter(|(_, _, ok)| *ok)
            .map(|(cell, _, _)| *cell)
            .collect()
    }
}

/// Validate and apply one turn for the current participant.
///
/// The whole batch is validated before anything mutates: a precondition
/// failure leaves the match exactly as it was. Incorrect letters are not
/// failures — they score nothing and leave the grid untouched.
///
/// On a non-final turn the returned state has control flipped to the other
/// participant with a fresh rack; on the final turn it is `completed` with
/// the winner resolved (ties yield no winner). The caller persists the
/// returned state atomically alongside the move record.
pub fn apply_turn<R: Rng + ?Sized>(
    puzzle: &Puzzle,
    state: &MatchState,
    placements: &[Placement],
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<(MatchState, TurnOutcome), GameError> {
    if state.status != MatchStatus::Active {
        return Err(GameError::MatchNotActive(state.id));
    }

    let normalized = validate_placements(puzzle, state, placements)?;

    let mut next = state.clone();
    let slot = state.current_slot;
    let mut outcome_placements = Vec::with_capacity(normalized.len());
    let mut newly_locked: Vec<usize> = Vec::new();
    let mut letter_points = 0u32;

    // Apply in submitted order. Correct: lock the cell and consume the rack
    // letter. Incorrect: no lock, no score, letter stays on the rack.
    for Placement { cell, letter } in normalized {
        let correct = puzzle.solution_at(cell) == Some(letter);
        if correct {
            next.locked.insert(cell, letter);
            newly_locked.push(cell);
            letter_points += LETTER_POINTS;
            if let Some(pos) = next.rack.iter().position(|c| *c == letter) {
                next.rack.remove(pos);
            }
        }
        outcome_placements.push((cell, letter, correct));
    }
    next.scores[slot.idx()] += letter_points;

    // Word-completion bonus: every clue run that became fully locked this
    // turn pays run-length × 10.
    let mut completed_runs = Vec::new();
    let mut bonus_points = 0u32;
    for (clue_index, clue) in puzzle.clues.iter().enumerate() {
        let fully_locked = clue.cells.iter().all(|c| next.locked.contains_key(c));
        let touched = clue.cells.iter().any(|c| newly_locked.contains(c));
        if fully_locked && touched {
            let bonus = clue.cells.len() as u32 * WORD_BONUS_PER_LETTER;
            bonus_points += bonus;
            completed_runs.push(CompletedRun {
                clue_index,
                clue_text: clue.text.clone(),
                cells: clue.cells.clone(),
                bonus,
            });
        }
    }
    next.scores[slot.idx()] += bonus_points;

    let puzzle_complete = puzzle.answer_cells().all(|c| next.locked.contains_key(&c));
    if puzzle_complete {
        next.status = MatchStatus::Completed;
        next.winner = winner_of(next.scores);
        next.completed_at = Some(now);
        // current_slot freezes at its final value.
    } else {
        next.current_slot = slot.other();
        next.turn_number += 1;
        next.rack = generate_rack(puzzle, &next.locked, rng);
        next.turn_started_at = now;
    }

    let turn_points = letter_points + bonus_points;
    debug!(
        match_id = %state.id,
        turn = state.turn_number,
        points = turn_points,
        complete = puzzle_complete,
        "turn applied"
    );

    Ok((
        next,
        TurnOutcome {
            placements: outcome_placements,
            letter_points,
            completed_runs,
            bonus_points,
            turn_points,
            puzzle_complete,
        },
    ))
}

/// Higher score wins; equal scores leave the winner unset.
fn winner_of(scores: [u32; 2]) -> Option<PlayerSlot> {
    match scores[0].cmp(&scores[1]) {
        std::cmp::Ordering::Greater => Some(PlayerSlot::One),
        std::cmp::Ordering::Less => Some(PlayerSlot::Two),
        std::cmp::Ordering::Equal => None,
    }
}

/// Check the whole batch against the grid and the rack before any mutation.
/// Returns the placements with letters normalized to uppercase.
fn validate_placements(
    puzzle: &Puzzle,
    state: &MatchState,
    placements: &[Placement],
) -> Result<Vec<Placement>, GameError> {
    if placements.len() > state.rack.len() {
        return Err(GameError::InvalidCell {
            cell: placements.get(state.rack.len()).map(|p| p.cell).unwrap_or(0),
            reason: format!(
                "{} placements submitted but only {} letters on the rack",
                placements.len(),
                state.rack.len()
            ),
        });
    }

    let mut normalized = Vec::with_capacity(placements.len());
    let mut seen_cells: Vec<usize> = Vec::new();
    let mut rack_left = state.rack.clone();

    for p in placements {
        let cell = p.cell;
        match puzzle.cell(cell) {
            Some(CellKind::Answer) => {}
            Some(_) => {
                return Err(GameError::InvalidCell {
                    cell,
                    reason: "not an answer cell".into(),
                });
            }
            None => {
                return Err(GameError::InvalidCell {
                    cell,
                    reason: "outside the grid".into(),
                });
            }
        }
        if state.locked.contains_key(&cell) {
            return Err(GameError::InvalidCell {
                cell,
                reason: "cell is already locked".into(),
            });
        }
        if seen_cells.contains(&cell) {
            return Err(GameError::InvalidCell {
                cell,
                reason: "cell appears twice in this submission".into(),
            });
        }
        seen_cells.push(cell);

        let letter = p.letter.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(GameError::InvalidCell {
                cell,
                reason: format!("'{}' is not a letter", p.letter),
            });
        }
        match rack_left.iter().position(|c| *c == letter) {
            Some(pos) => {
                rack_left.remove(pos);
            }
            None => {
                return Err(GameError::InvalidCell {
                    cell,
                    reason: format!("letter '{letter}' is not on the rack"),
                });
            }
        }
        normalized.push(Placement { cell, letter });
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tandem_types::models::{Clue, Direction};
    use uuid::Uuid;

    // Grid (2 rows x 5 cols):
    //   row 0:  clue  D R I P      ("DRIP" across, cells 1-4)
    //   row 1:  void  O . . .      ("DO" down, cells 1,6 — shares the D)
    fn puzzle() -> Puzzle {
        let c = CellKind::Clue;
        let a = CellKind::Answer;
        let v = CellKind::Void;
        Puzzle {
            id: Uuid::new_v4(),
            rows: 2,
            cols: 5,
            cells: vec![c, a, a, a, a, v, a, v, v, v],
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
            solution: ".DRIP.O...".to_string(),
        }
    }

    fn fresh(puzzle: &Puzzle, rack: Vec<char>) -> MatchState {
        MatchState::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            puzzle.id,
            PlayerSlot::One,
            rack,
            Utc::now(),
        )
    }

    fn place(cells: &[(usize, char)]) -> Vec<Placement> {
        cells.iter().map(|&(cell, letter)| Placement { cell, letter }).collect()
    }

    #[test]
    fn four_letter_word_scores_eighty() {
        let p = puzzle();
        let state = fresh(&p, vec!['D', 'R', 'I', 'P', 'O']);
        let (next, outcome) = apply_turn(
            &p,
            &state,
            &place(&[(1, 'D'), (2, 'R'), (3, 'I'), (4, 'P')]),
            &mut rand::rng(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.correct_cells(), vec![1, 2, 3, 4]);
        assert_eq!(outcome.letter_points, 40);
        assert_eq!(outcome.bonus_points, 40);
        assert_eq!(outcome.turn_points, 80);
        assert!(!outcome.puzzle_complete);
        assert_eq!(next.scores, [80, 0]);
        // Turn passed to the other participant with a fresh rack.
        assert_eq!(next.current_slot, PlayerSlot::Two);
        assert_eq!(next.turn_number, 2);
        assert_eq!(next.rack, vec!['O']);
    }

    #[test]
    fn incorrect_letters_score_nothing_and_stay_on_rack() {
        let p = puzzle();
        let state = fresh(&p, vec!['D', 'O']);
        let (next, outcome) = apply_turn(
            &p,
            &state,
            &place(&[(1, 'O'), (2, 'D')]),
            &mut rand::rng(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.turn_points, 0);
        assert!(outcome.correct_cells().is_empty());
        assert!(next.locked.is_empty());
        assert_eq!(next.scores, [0, 0]);
        assert_eq!(next.current_slot, PlayerSlot::Two);
    }

    #[test]
    fn lowercase_input_is_normalized() {
        let p = puzzle();
        let state = fresh(&p, vec!['D']);
        let (next, outcome) =
            apply_turn(&p, &state, &place(&[(1, 'd')]), &mut rand::rng(), Utc::now()).unwrap();
        assert_eq!(outcome.correct_cells(), vec![1]);
        assert_eq!(next.locked.get(&1), Some(&'D'));
    }

    #[test]
    fn locked_cell_is_rejected_without_state_change() {
        let p = puzzle();
        let mut state = fresh(&p, vec!['R', 'O']);
        state.locked.insert(1, 'D');

        let err = apply_turn(&p, &state, &place(&[(1, 'R')]), &mut rand::rng(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidCell { cell: 1, .. }));
    }

    #[test]
    fn clue_and_out_of_range_cells_are_rejected() {
        let p = puzzle();
        let state = fresh(&p, vec!['D', 'O']);
        assert!(matches!(
            apply_turn(&p, &state, &place(&[(0, 'D')]), &mut rand::rng(), Utc::now()),
            Err(GameError::InvalidCell { cell: 0, .. })
        ));
        assert!(matches!(
            apply_turn(&p, &state, &place(&[(99, 'D')]), &mut rand::rng(), Utc::now()),
            Err(GameError::InvalidCell { cell: 99, .. })
        ));
    }

    #[test]
    fn letter_not_on_rack_is_rejected() {
        let p = puzzle();
        let state = fresh(&p, vec!['D']);
        let err = apply_turn(&p, &state, &place(&[(2, 'R')]), &mut rand::rng(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidCell { cell: 2, .. }));
    }

    #[test]
    fn empty_submission_yields_the_turn() {
        let p = puzzle();
        let state = fresh(&p, vec!['D', 'R']);
        let (next, outcome) =
            apply_turn(&p, &state, &[], &mut rand::rng(), Utc::now()).unwrap();
        assert_eq!(outcome.turn_points, 0);
        assert_eq!(next.current_slot, PlayerSlot::Two);
        assert_eq!(next.turn_number, 2);
        assert!(!next.rack.is_empty());
    }

    #[test]
    fn final_cell_completes_match_and_resolves_winner() {
        let p = puzzle();
        let mut state = fresh(&p, vec!['O']);
        for (cell, letter) in [(1, 'D'), (2, 'R'), (3, 'I'), (4, 'P')] {
            state.locked.insert(cell, letter);
        }
        state.scores = [80, 0];
        state.current_slot = PlayerSlot::Two;

        let (next, outcome) =
            apply_turn(&p, &state, &place(&[(6, 'O')]), &mut rand::rng(), Utc::now()).unwrap();

        assert!(outcome.puzzle_complete);
        // 10 for the letter + 20 for completing the 2-cell down run.
        assert_eq!(outcome.turn_points, 30);
        assert_eq!(next.status, MatchStatus::Completed);
        assert_eq!(next.scores, [80, 30]);
        assert_eq!(next.winner, Some(PlayerSlot::One));
        assert!(next.completed_at.is_some());
        // Frozen, not advanced.
        assert_eq!(next.turn_number, state.turn_number);
        assert_eq!(next.current_slot, PlayerSlot::Two);
    }

    #[test]
    fn tied_scores_produce_no_winner() {
        assert_eq!(winner_of([50, 50]), None);
        assert_eq!(winner_of([60, 50]), Some(PlayerSlot::One));
        assert_eq!(winner_of([50, 60]), Some(PlayerSlot::Two));
    }

    #[test]
    fn completed_match_rejects_turns() {
        let p = puzzle();
        let mut state = fresh(&p, vec![]);
        state.status = MatchStatus::Completed;
        assert!(matches!(
            apply_turn(&p, &state, &[], &mut rand::rng(), Utc::now()),
            Err(GameError::MatchNotActive(_))
        ));
    }

    #[test]
    fn shared_cell_can_complete_two_runs_at_once() {
        let p = puzzle();
        let mut state = fresh(&p, vec!['D']);
        for (cell, letter) in [(2, 'R'), (3, 'I'), (4, 'P'), (6, 'O')] {
            state.locked.insert(cell, letter);
        }

        let (next, outcome) =
            apply_turn(&p, &state, &place(&[(1, 'D')]), &mut rand::rng(), Utc::now()).unwrap();

        assert_eq!(outcome.completed_runs.len(), 2);
        // 10 + (4×10 across) + (2×10 down)
        assert_eq!(outcome.turn_points, 70);
        assert!(outcome.puzzle_complete);
        assert_eq!(next.winner, Some(PlayerSlot::One));
    }

    #[test]
    fn locked_cells_are_monotonic_across_turns() {
        let p = puzzle();
        let state = fresh(&p, vec!['D', 'R']);
        let (after_one, _) =
            apply_turn(&p, &state, &place(&[(1, 'D')]), &mut rand::rng(), Utc::now()).unwrap();
        let (after_two, _) =
            apply_turn(&p, &after_one, &[], &mut rand::rng(), Utc::now()).unwrap();
        assert_eq!(after_two.locked.get(&1), Some(&'D'));
        assert!(after_two.locked.len() >= after_one.locked.len());
    }

    #[test]
    fn final_scores_account_for_every_lock_and_bonus() {
        // Drive a match to completion and check the scoring identity:
        // p1 + p2 == 10 × locked cells + Σ (run length × 10).
        let p = puzzle();
        let mut state = fresh(&p, generate_rack(&p, &Default::default(), &mut rand::rng()));
        let mut guard = 0;
        while state.status == MatchStatus::Active {
            let rack = state.rack.clone();
            let placements: Vec<Placement> = rack
                .iter()
                .filter_map(|&letter| {
                    p.answer_cells()
                        .find(|c| !state.locked.contains_key(c) && p.solution_at(*c) == Some(letter))
                        .map(|cell| Placement { cell, letter })
                })
                // Dedup cells targeted twice within the batch.
                .scan(Vec::new(), |seen: &mut Vec<usize>, pl| {
                    if seen.contains(&pl.cell) {
                        Some(None)
                    } else {
                        seen.push(pl.cell);
                        Some(Some(pl))
                    }
                })
                .flatten()
                .collect();
            let (next, _) =
                apply_turn(&p, &state, &placements, &mut rand::rng(), Utc::now()).unwrap();
            state = next;
            guard += 1;
            assert!(guard < 50, "match failed to converge");
        }
        let total_bonus: u32 = p.clues.iter().map(|c| c.cells.len() as u32 * 10).sum();
        assert_eq!(
            state.scores[0] + state.scores[1],
            state.locked.len() as u32 * 10 + total_bonus
        );
    }
}
