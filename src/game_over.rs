//! Game over flow
//!
//! Sits outside the simulation. Takes a finished session's result, records
//! it on the leaderboard, asks a flavor-text provider for a line to show
//! (never waiting longer than a fixed timeout) and lets the player decide
//! whether to run again.

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use thiserror::Error;

use crate::highscores::HighScores;
use crate::sim::SessionResult;

/// Shown whenever the provider fails or is too slow
pub const FALLBACK_FLAVOR_TEXT: &str = "Shake it off and run it back!";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlavorTextError {
    #[error("flavor text provider unavailable")]
    Unavailable,

    #[error("flavor text timed out after {0:?}")]
    Timeout(Duration),

    #[error("flavor text provider failed: {0}")]
    Provider(String),
}

/// Source of decorative end-of-run text
///
/// Implementations may block (a network call, say); callers bound the wait.
pub trait FlavorTextProvider: Send + Sync {
    fn flavor_text(&self, result: &SessionResult) -> Result<String, FlavorTextError>;
}

/// Ask the provider on a worker thread, giving up after `timeout`
pub fn fetch_flavor_text(
    provider: &Arc<dyn FlavorTextProvider>,
    result: SessionResult,
    timeout: Duration,
) -> Result<String, FlavorTextError> {
    let (tx, rx) = mpsc::channel();
    let provider = Arc::clone(provider);
    thread::Builder::new()
        .name("flavor-text".into())
        .spawn(move || {
            // The receiver may have given up already
            let _ = tx.send(provider.flavor_text(&result));
        })
        .map_err(|e| FlavorTextError::Provider(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(text)) if text.trim().is_empty() => Err(FlavorTextError::Unavailable),
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(e),
        Err(RecvTimeoutError::Timeout) => Err(FlavorTextError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(FlavorTextError::Unavailable),
    }
}

/// Like `fetch_flavor_text`, but any failure becomes the fallback line
pub fn flavor_text_or_fallback(
    provider: &Arc<dyn FlavorTextProvider>,
    result: SessionResult,
    timeout: Duration,
) -> String {
    fetch_flavor_text(provider, result, timeout).unwrap_or_else(|e| {
        log::warn!("Using fallback flavor text: {}", e);
        FALLBACK_FLAVOR_TEXT.to_string()
    })
}

const CANNED_LINES: &[&str] = &[
    "The wall won this round. The rematch is yours.",
    "Even the best runners trip. Legs ready? Go again!",
    "That obstacle came out of nowhere. Show it who's boss.",
    "Great hustle! One more lap and you'll smash that score.",
    "Plot twist: the next run is the legendary one.",
];

/// Offline provider picking from a fixed set of lines
pub struct CannedFlavorText {
    lines: Vec<String>,
    rng: Mutex<Pcg32>,
}

impl CannedFlavorText {
    pub fn new(seed: u64) -> Self {
        Self::with_lines(CANNED_LINES.iter().map(|s| s.to_string()).collect(), seed)
    }

    pub fn with_lines(lines: Vec<String>, seed: u64) -> Self {
        Self {
            lines,
            rng: Mutex::new(Pcg32::seed_from_u64(seed)),
        }
    }
}

impl FlavorTextProvider for CannedFlavorText {
    fn flavor_text(&self, result: &SessionResult) -> Result<String, FlavorTextError> {
        if self.lines.is_empty() {
            return Err(FlavorTextError::Unavailable);
        }
        let idx = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..self.lines.len());
        Ok(format!("{} (score {})", self.lines[idx], result.final_score))
    }
}

/// Everything the player sees on the game over screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOverSummary {
    pub result: SessionResult,
    pub flavor_text: String,
    /// Leaderboard rank, if the score made it
    pub rank: Option<usize>,
    /// Best score before this run
    pub previous_best: Option<u64>,
}

impl GameOverSummary {
    pub fn is_new_best(&self) -> bool {
        self.rank == Some(1)
    }
}

/// The player's retry/quit decision
pub trait RetryPrompt {
    fn should_retry(&mut self, summary: &GameOverSummary) -> bool;
}

impl<F: FnMut(&GameOverSummary) -> bool> RetryPrompt for F {
    fn should_retry(&mut self, summary: &GameOverSummary) -> bool {
        self(summary)
    }
}

/// Post-session boundary: flavor text, leaderboard, retry decision
pub struct GameOverFlow {
    provider: Arc<dyn FlavorTextProvider>,
    timeout: Duration,
    high_scores: HighScores,
    scores_path: Option<PathBuf>,
}

impl GameOverFlow {
    pub fn new(provider: Arc<dyn FlavorTextProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            high_scores: HighScores::new(),
            scores_path: None,
        }
    }

    /// Use an existing leaderboard, saving it to `path` after every run
    pub fn with_high_scores(mut self, high_scores: HighScores, path: Option<PathBuf>) -> Self {
        self.high_scores = high_scores;
        self.scores_path = path;
        self
    }

    pub fn high_scores(&self) -> &HighScores {
        &self.high_scores
    }

    /// Record the result and gather what to show the player
    pub fn summarize(&mut self, result: SessionResult, timestamp_ms: u64) -> GameOverSummary {
        let flavor_text = flavor_text_or_fallback(&self.provider, result, self.timeout);
        let previous_best = self.high_scores.top_score();
        let rank = self
            .high_scores
            .add_score(result.final_score, result.ticks, timestamp_ms);

        if let (Some(_), Some(path)) = (rank, &self.scores_path) {
            if let Err(e) = self.high_scores.save(path) {
                log::warn!("Could not save high scores: {}", e);
            }
        }

        GameOverSummary {
            result,
            flavor_text,
            rank,
            previous_best,
        }
    }

    /// Summarize the run and ask whether to play again
    pub fn conclude(&mut self, result: SessionResult, prompt: &mut dyn RetryPrompt) -> bool {
        let summary = self.summarize(result, now_ms());
        log::info!(
            "Game over: score {}, rank {:?}",
            summary.result.final_score,
            summary.rank
        );
        prompt.should_retry(&summary)
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Provider with a scripted answer and delay
    struct ManualFlavorText {
        delay: Duration,
        answer: Result<String, FlavorTextError>,
    }

    impl FlavorTextProvider for ManualFlavorText {
        fn flavor_text(&self, _result: &SessionResult) -> Result<String, FlavorTextError> {
            thread::sleep(self.delay);
            self.answer.clone()
        }
    }

    fn manual(delay_ms: u64, answer: Result<&str, FlavorTextError>) -> Arc<dyn FlavorTextProvider> {
        Arc::new(ManualFlavorText {
            delay: Duration::from_millis(delay_ms),
            answer: answer.map(str::to_string),
        })
    }

    const RESULT: SessionResult = SessionResult {
        final_score: 37,
        ticks: 1200,
    };

    #[test]
    fn test_provider_text_is_used() {
        let provider = manual(0, Ok("  Nice dodge!\n"));
        let text = flavor_text_or_fallback(&provider, RESULT, Duration::from_secs(1));
        assert_eq!(text, "Nice dodge!");
    }

    #[test]
    fn test_provider_error_falls_back() {
        let provider = manual(0, Err(FlavorTextError::Provider("quota exceeded".into())));
        assert_eq!(
            fetch_flavor_text(&provider, RESULT, Duration::from_secs(1)),
            Err(FlavorTextError::Provider("quota exceeded".into()))
        );
        assert_eq!(
            flavor_text_or_fallback(&provider, RESULT, Duration::from_secs(1)),
            FALLBACK_FLAVOR_TEXT
        );
    }

    #[test]
    fn test_empty_text_falls_back() {
        let provider = manual(0, Ok("   "));
        assert_eq!(
            fetch_flavor_text(&provider, RESULT, Duration::from_secs(1)),
            Err(FlavorTextError::Unavailable)
        );
    }

    #[test]
    fn test_slow_provider_times_out() {
        let provider = manual(2_000, Ok("too late"));
        let start = Instant::now();
        let text = flavor_text_or_fallback(&provider, RESULT, Duration::from_millis(50));
        assert_eq!(text, FALLBACK_FLAVOR_TEXT);
        assert!(start.elapsed() < Duration::from_millis(1_000));
    }

    #[test]
    fn test_canned_text_is_seeded() {
        let a = CannedFlavorText::new(5);
        let b = CannedFlavorText::new(5);
        for _ in 0..5 {
            assert_eq!(a.flavor_text(&RESULT), b.flavor_text(&RESULT));
        }
        assert!(a.flavor_text(&RESULT).unwrap().ends_with("(score 37)"));
        assert_eq!(
            CannedFlavorText::with_lines(Vec::new(), 0).flavor_text(&RESULT),
            Err(FlavorTextError::Unavailable)
        );
    }

    #[test]
    fn test_flow_records_scores_and_asks() {
        let mut flow = GameOverFlow::new(manual(0, Ok("hi")), Duration::from_secs(1));

        let mut asked = Vec::new();
        let mut prompt = |summary: &GameOverSummary| {
            asked.push(summary.clone());
            summary.result.final_score < 50
        };

        assert!(flow.conclude(RESULT, &mut prompt));
        assert!(!flow.conclude(SessionResult { final_score: 90, ticks: 3000 }, &mut prompt));

        assert_eq!(asked.len(), 2);
        assert_eq!(asked[0].rank, Some(1));
        assert_eq!(asked[0].previous_best, None);
        assert_eq!(asked[0].flavor_text, "hi");
        assert!(asked[1].is_new_best());
        assert_eq!(asked[1].previous_best, Some(37));
        assert_eq!(flow.high_scores().top_score(), Some(90));
    }

    #[test]
    fn test_zero_score_not_ranked() {
        let mut flow = GameOverFlow::new(manual(0, Ok("hi")), Duration::from_secs(1));
        let summary = flow.summarize(SessionResult { final_score: 0, ticks: 3 }, 0);
        assert_eq!(summary.rank, None);
        assert!(flow.high_scores().is_empty());
    }
}
