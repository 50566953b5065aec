use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use tandem_db::{Database, queries};
use tandem_types::models::Puzzle;

/// Load the puzzle catalog from a JSON file (an array of puzzle
/// definitions, solutions included — the file never ships to clients).
///
/// Each puzzle is validated and upserted: unchanged content is a no-op,
/// changed content with live matches aborts startup so an edited puzzle
/// can never shift under players mid-match.
pub fn load(db: &Database, path: &Path) -> Result<()> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("No puzzle catalog at {}; serving existing puzzles only", path.display());
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    let puzzles: Vec<Puzzle> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;

    for puzzle in &puzzles {
        if let Err(reason) = puzzle.validate() {
            bail!("puzzle {} is malformed: {}", puzzle.id, reason);
        }
    }

    let count = puzzles.len();
    db.with_conn(|conn| {
        for puzzle in &puzzles {
            queries::upsert_puzzle(conn, puzzle)?;
        }
        Ok(())
    })?;

    info!("Puzzle catalog loaded: {} puzzles from {}", count, path.display());
    Ok(())
}
