use std::collections::BTreeMap;

use tandem_types::models::Puzzle;

/// Every unfilled answer cell whose solution letter appears somewhere in
/// the rack, in ascending cell order. Pure read-side computation — the
/// hint-counter decrement lives with the caller.
pub fn hint_cells(
    puzzle: &Puzzle,
    locked: &BTreeMap<usize, char>,
    rack: &[char],
) -> Vec<usize> {
    puzzle
        .answer_cells()
        .filter(|idx| !locked.contains_key(idx))
        .filter(|idx| {
            puzzle
                .solution_at(*idx)
                .is_some_and(|letter| rack.contains(&letter))
        })
        .collect()
}
