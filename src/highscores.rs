//! High score leaderboard system
//!
//! Persisted as a JSON file, tracks top 10 scores.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

#[derive(Debug, Error)]
pub enum HighScoreError {
    #[error("high score file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("high score file is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Final score of the run
    pub score: u64,
    /// Ticks survived
    pub ticks: u64,
    /// Unix timestamp (ms) when achieved
    pub timestamp_ms: u64,
}

/// High score leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Check if a score qualifies for the leaderboard
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        // Check if score beats the lowest entry
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Get the rank a score would achieve (1-indexed, None if doesn't qualify)
    pub fn potential_rank(&self, score: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score > e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Add a new score to the leaderboard (if it qualifies)
    /// Returns the rank achieved (1-indexed) or None if didn't qualify
    pub fn add_score(&mut self, score: u64, ticks: u64, timestamp_ms: u64) -> Option<usize> {
        let rank = self.potential_rank(score)?;
        self.entries.insert(
            rank - 1,
            HighScoreEntry {
                score,
                ticks,
                timestamp_ms,
            },
        );
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    /// Check if the leaderboard is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    /// Load high scores from a file; a missing file is an empty board
    pub fn load(path: &Path) -> Result<Self, HighScoreError> {
        match fs::read_to_string(path) {
            Ok(json) => {
                let scores: HighScores = serde_json::from_str(&json)?;
                log::info!("Loaded {} high scores", scores.entries.len());
                Ok(scores)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No high scores found, starting fresh");
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), HighScoreError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("High scores saved ({} entries)", self.entries.len());
        Ok(())
    }
}

/// Format a timestamp as a relative age string
pub fn format_age(timestamp_ms: u64, now_ms: u64) -> String {
    let diff_mins = now_ms.saturating_sub(timestamp_ms) / 60_000;
    let diff_hours = diff_mins / 60;
    let diff_days = diff_hours / 24;

    match (diff_days, diff_hours, diff_mins) {
        (1, _, _) => "Yesterday".to_string(),
        (d, _, _) if d > 1 => format!("{} days ago", d),
        (_, 1, _) => "1 hour ago".to_string(),
        (_, h, _) if h > 1 => format!("{} hours ago", h),
        (_, _, 1) => "1 min ago".to_string(),
        (_, _, m) if m > 1 => format!("{} mins ago", m),
        _ => "Just now".to_string(),
    }
}
