use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use uuid::Uuid;

use tandem_types::models::{Puzzle, RACK_SIZE};

/// Multiset of letters still required by unfilled answer cells, in cell
/// order. Duplicates are preserved: a puzzle that still needs three E's
/// contributes three E's.
pub fn needed_letters(puzzle: &Puzzle, locked: &BTreeMap<usize, char>) -> Vec<char> {
    puzzle
        .answer_cells()
        .filter(|idx| !locked.contains_key(idx))
        .filter_map(|idx| puzzle.solution_at(idx))
        .collect()
}

/// Deal a rack for the turn that is starting: shuffle the needed multiset
/// and take up to [`RACK_SIZE`] letters. Shorter when fewer remain, never
/// padded. The production path passes `rand::rng()`; audit replay passes a
/// `StdRng` seeded from [`rack_seed`].
pub fn generate_rack<R: Rng + ?Sized>(
    puzzle: &Puzzle,
    locked: &BTreeMap<usize, char>,
    rng: &mut R,
) -> Vec<char> {
    let mut letters = needed_letters(puzzle, locked);
    letters.shuffle(rng);
    letters.truncate(RACK_SIZE);
    letters
}

/// Deterministic seed tying a rack to its match and turn, for replay.
pub fn rack_seed(match_id: Uuid, turn_number: u32) -> u64 {
    let bytes = match_id.into_bytes();
    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&bytes[..8]);
    lo.copy_from_slice(&bytes[8..]);
    u64::from_le_bytes(hi)
        ^ u64::from_le_bytes(lo).rotate_left(17)
        ^ u64::from(turn_number).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
