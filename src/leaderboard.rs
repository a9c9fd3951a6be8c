//! Leaderboard loading: `initials,score` lines, best score first.
//!
//! ## Rust concepts
//! - `str::lines()` and `split_once()` for light-weight parsing
//! - `sort_by_key` with `Reverse` (a stable sort, so ties keep file order)

use crate::error::LeaderboardError;
use std::cmp::Reverse;
use std::fmt;
use std::fs;
use std::path::Path;

/// One leaderboard entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreRecord {
    pub initials: String,
    pub score: i64,
}

impl fmt::Display for ScoreRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.score, self.initials)
    }
}

/// Parse leaderboard text into records sorted by descending score.
///
/// Blank lines are skipped and fields are trimmed. Anything after the
/// second comma is ignored.
pub fn parse_leaderboard(text: &str) -> Result<Vec<ScoreRecord>, LeaderboardError> {
    let mut records = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (initials, rest) = line
            .split_once(',')
            .ok_or(LeaderboardError::MissingField { line: line_no })?;
        let score_field = rest.split(',').next().unwrap_or_default().trim();
        if score_field.is_empty() {
            return Err(LeaderboardError::MissingField { line: line_no });
        }

        let score = score_field
            .parse::<i64>()
            .map_err(|_| LeaderboardError::InvalidScore {
                line: line_no,
                value: score_field.to_string(),
            })?;

        records.push(ScoreRecord {
            initials: initials.trim().to_string(),
            score,
        });
    }

    records.sort_by_key(|r| Reverse(r.score));
    Ok(records)
}

/// Read and parse a leaderboard file.
pub fn read_leaderboard(path: &Path) -> Result<Vec<ScoreRecord>, LeaderboardError> {
    let text = fs::read_to_string(path)?;
    parse_leaderboard(&text)
}
