//! Game state and core simulation types
//!
//! Everything one run owns lives here. A `GameSession` is built fresh per run
//! and discarded once its `SessionResult` has been taken.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::difficulty::{DifficultyParameters, difficulty_for};
use super::obstacles::{Obstacle, ObstacleField};
use crate::clamp_lane;
use crate::settings::{ConfigError, Settings};

/// Axis-aligned rectangle, top-left origin, y grows downward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub pos: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        self.pos
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.pos + self.size
    }

    pub fn center_x(&self) -> f32 {
        self.pos.x + self.size.x / 2.0
    }
}

/// A discrete lane-change command from the motion sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionCommand {
    #[default]
    None,
    MoveLeft,
    MoveRight,
    /// Snap to the middle lane (three-lane layouts only)
    MoveCenter,
}

impl MotionCommand {
    pub fn is_move(&self) -> bool {
        !matches!(self, MotionCommand::None)
    }
}

/// What happened to a command handed to the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// No command, or a command meaningless for this layout
    Ignored,
    /// Arrived inside the cooldown window
    Dropped,
    /// Passed the cooldown gate (lane may be unchanged at a boundary)
    Applied { from: usize, to: usize },
}

/// The player's lane and hitbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerState {
    lane: usize,
    hitbox: Rect,
    lane_centers: Vec<f32>,
    center_lane: Option<usize>,
    /// Simulation time of the last applied move
    last_move_ms: Option<u64>,
}

impl RunnerState {
    pub fn new(settings: &Settings) -> Self {
        let lane_centers = settings.layout.lane_centers(settings.screen_width);
        let lane = clamp_lane(settings.initial_lane, lane_centers.len());
        let mut runner = Self {
            lane,
            hitbox: Rect::new(
                0.0,
                settings.runner_y(),
                settings.runner_width,
                settings.runner_height,
            ),
            lane_centers,
            center_lane: settings.layout.center_lane(),
            last_move_ms: None,
        };
        runner.sync_hitbox();
        runner
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn lane_count(&self) -> usize {
        self.lane_centers.len()
    }

    pub fn hitbox(&self) -> &Rect {
        &self.hitbox
    }

    /// Apply a motion command at simulation time `now_ms`
    ///
    /// Moves are clamped at the edges. With a non-zero `cooldown_ms`, a move
    /// arriving sooner than that after the previous applied move is dropped.
    pub fn apply(&mut self, command: MotionCommand, now_ms: u64, cooldown_ms: u64) -> MoveOutcome {
        let target = match command {
            MotionCommand::None => return MoveOutcome::Ignored,
            MotionCommand::MoveLeft => self.lane.saturating_sub(1),
            MotionCommand::MoveRight => (self.lane + 1).min(self.lane_count() - 1),
            MotionCommand::MoveCenter => match self.center_lane {
                Some(center) => center,
                None => return MoveOutcome::Ignored,
            },
        };

        if let Some(last) = self.last_move_ms {
            if now_ms.saturating_sub(last) < cooldown_ms {
                return MoveOutcome::Dropped;
            }
        }

        let from = self.lane;
        self.last_move_ms = Some(now_ms);
        self.set_lane(target);
        MoveOutcome::Applied { from, to: self.lane }
    }

    fn set_lane(&mut self, lane: usize) {
        self.lane = clamp_lane(lane, self.lane_count());
        self.sync_hitbox();
    }

    fn sync_hitbox(&mut self) {
        self.hitbox.pos.x = self.lane_centers[self.lane] - self.hitbox.size.x / 2.0;
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Running,
    /// Terminal: the runner hit an obstacle
    Ended,
}

/// Terminal value of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub final_score: u64,
    /// Ticks simulated, including the one that ended the run
    pub ticks: u64,
}

/// Things front-ends may want to react to (sounds, effects)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LaneChanged { from: usize, to: usize },
    MoveDropped(MotionCommand),
    ObstacleSpawned { id: u32, lane: usize },
    ObstaclePruned { id: u32 },
    Collision { obstacle_id: u32, lane: usize },
}

/// One play-through from start to collision
#[derive(Debug, Clone)]
pub struct GameSession {
    pub(crate) settings: Settings,
    pub(crate) seed: u64,
    pub(crate) rng: Pcg32,
    pub(crate) phase: SessionPhase,
    pub(crate) runner: RunnerState,
    pub(crate) field: ObstacleField,
    /// Score derived from elapsed ticks
    pub(crate) score: u64,
    /// Simulation tick counter
    pub(crate) time_ticks: u64,
    pub(crate) start_tick: u64,
    /// Simulation time of the last spawn
    pub(crate) last_spawn_ms: u64,
    pub(crate) result: Option<SessionResult>,
    pub(crate) events: Vec<SessionEvent>,
}

impl GameSession {
    /// Create a new session with the given seed
    pub fn new(settings: Settings, seed: u64) -> Result<Self, ConfigError> {
        settings.validate()?;
        let runner = RunnerState::new(&settings);
        let field = ObstacleField::new(&settings);
        Ok(Self {
            settings,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            phase: SessionPhase::Running,
            runner,
            field,
            score: 0,
            time_ticks: 0,
            start_tick: 0,
            last_spawn_ms: 0,
            result: None,
            events: Vec::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    /// Simulation milliseconds since the session started
    pub fn elapsed_ms(&self) -> u64 {
        self.settings.elapsed_ms(self.time_ticks - self.start_tick)
    }

    pub fn runner(&self) -> &RunnerState {
        &self.runner
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.field.iter()
    }

    pub fn obstacle_count(&self) -> usize {
        self.field.len()
    }

    /// Current difficulty for the current score
    pub fn difficulty(&self) -> DifficultyParameters {
        difficulty_for(self.score, &self.settings.difficulty)
    }

    /// Terminal result, once the session has ended
    pub fn result(&self) -> Option<SessionResult> {
        self.result
    }

    /// Take events accumulated since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }
}
