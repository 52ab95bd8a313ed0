//! Lane Runner - a motion-sensor driven endless runner
//!
//! Core modules:
//! - `sim`: Deterministic simulation (lanes, obstacles, difficulty, collisions)
//! - `platform`: Motion input sources (serial reader thread, scripted replays)
//! - `game_loop`: Fixed-step driver decoupled from render cadence
//! - `game_over`: Flavor text, high scores and the retry decision
//! - `settings`: Session configuration

pub mod game_loop;
pub mod game_over;
pub mod highscores;
pub mod platform;
pub mod settings;
pub mod sim;

pub use game_loop::{FixedStep, QuitSignal, Renderer, RunOutcome, run_session, watch_terminal};
pub use game_over::{FlavorTextError, FlavorTextProvider, GameOverFlow, GameOverSummary};
pub use highscores::HighScores;
pub use platform::input::{MotionSource, SerialMotionSource};
pub use settings::{ConfigError, DifficultySettings, LaneLayout, Settings};
pub use sim::{GameSession, MotionCommand, SessionPhase, SessionResult, tick};

/// Game configuration constants
pub mod consts {
    /// Default fixed simulation rate (the reference loop ran at 30 Hz)
    pub const DEFAULT_TICK_HZ: u32 = 30;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame delta fed into the accumulator
    pub const MAX_FRAME_DT_MS: u64 = 100;

    /// Playfield height
    pub const SCREEN_HEIGHT: f32 = 600.0;
    /// Runner hitbox edge
    pub const RUNNER_SIZE: f32 = 100.0;
    /// Obstacle edge
    pub const OBSTACLE_SIZE: f32 = 100.0;

    /// Minimum time between applied lane changes
    pub const DEFAULT_COOLDOWN_MS: u64 = 300;

    /// Upper bound on waiting for game-over flavor text
    pub const DEFAULT_FLAVOR_TIMEOUT_MS: u64 = 2000;
}

/// Clamp a lane index into `[0, lane_count)`
///
/// Out-of-range lanes are a programming error: fatal in debug builds,
/// clamped in release builds.
#[inline]
pub fn clamp_lane(lane: usize, lane_count: usize) -> usize {
    debug_assert!(lane_count > 0, "lane count must be positive");
    debug_assert!(lane < lane_count, "lane {lane} out of range for {lane_count} lanes");
    lane.min(lane_count.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_lane_in_range() {
        assert_eq!(clamp_lane(0, 2), 0);
        assert_eq!(clamp_lane(2, 3), 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_clamp_lane_out_of_range_panics_in_debug() {
        clamp_lane(3, 3);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_clamp_lane_out_of_range_clamps_in_release() {
        assert_eq!(clamp_lane(3, 3), 2);
    }
}
