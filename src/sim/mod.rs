//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies beyond the `MotionSource` seam

pub mod collision;
pub mod difficulty;
pub mod obstacles;
pub mod state;
pub mod tick;

pub use collision::{CollisionResult, first_collision, intersects};
pub use difficulty::{DifficultyParameters, difficulty_for, score_for_elapsed};
pub use obstacles::{Obstacle, ObstacleField};
pub use state::{
    GameSession, MotionCommand, MoveOutcome, Rect, RunnerState, SessionEvent, SessionPhase,
    SessionResult,
};
pub use tick::{TickOutcome, tick};
