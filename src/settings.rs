//! Session configuration
//!
//! One parameterized description of a run: lane layout, geometry, difficulty
//! constants and input policy. Persisted as JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Number of lanes and their horizontal placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LaneLayout {
    #[default]
    TwoLane,
    ThreeLane,
}

impl LaneLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaneLayout::TwoLane => "two",
            LaneLayout::ThreeLane => "three",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "2" | "two" => Some(LaneLayout::TwoLane),
            "3" | "three" => Some(LaneLayout::ThreeLane),
            _ => None,
        }
    }

    pub fn lane_count(&self) -> usize {
        match self {
            LaneLayout::TwoLane => 2,
            LaneLayout::ThreeLane => 3,
        }
    }

    /// Lane that `MoveCenter` snaps to, if the layout has one
    pub fn center_lane(&self) -> Option<usize> {
        match self {
            LaneLayout::TwoLane => None,
            LaneLayout::ThreeLane => Some(1),
        }
    }

    /// Default playfield width for this layout
    pub fn default_screen_width(&self) -> f32 {
        match self {
            LaneLayout::TwoLane => 400.0,
            LaneLayout::ThreeLane => 800.0,
        }
    }

    /// Horizontal lane centers for a playfield of the given width
    pub fn lane_centers(&self, screen_width: f32) -> Vec<f32> {
        match self {
            // 120 and 280 on the reference 400px field
            LaneLayout::TwoLane => vec![screen_width * 0.3, screen_width * 0.7],
            LaneLayout::ThreeLane => {
                vec![screen_width * 0.25, screen_width * 0.5, screen_width * 0.75]
            }
        }
    }
}

/// Constants for the score → speed / spawn interval mapping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultySettings {
    /// Obstacle speed at score 0 (pixels per tick)
    pub base_speed: f32,
    /// Score points per +1 speed step
    pub speed_divisor: u64,
    /// Spawn interval at score 0
    pub base_interval_ms: u64,
    /// Spawn interval floor
    pub min_interval_ms: u64,
    /// Interval reduction per score point
    pub decay_rate_ms: u64,
    /// Elapsed milliseconds per score point
    pub score_tick_divisor_ms: u64,
}

impl Default for DifficultySettings {
    fn default() -> Self {
        Self {
            base_speed: 5.0,
            speed_divisor: 20,
            base_interval_ms: 1500,
            min_interval_ms: 400,
            decay_rate_ms: 5,
            score_tick_divisor_ms: 100,
        }
    }
}

/// Complete configuration for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub layout: LaneLayout,

    // === Geometry ===
    pub screen_width: f32,
    pub screen_height: f32,
    pub runner_width: f32,
    pub runner_height: f32,
    /// Distance between the runner's top edge and the bottom of the screen
    pub runner_bottom_margin: f32,
    pub obstacle_width: f32,
    pub obstacle_height: f32,

    // === Difficulty ===
    pub difficulty: DifficultySettings,

    // === Simulation ===
    /// Fixed simulation rate
    pub tick_hz: u32,
    /// Minimum time between applied moves (0 disables)
    pub cooldown_ms: u64,
    pub initial_lane: usize,
    /// RNG seed for obstacle lanes (None = seed from the clock)
    pub seed: Option<u64>,

    // === Input ===
    /// Accept the firmware's `1`/`2`/`3` codes in addition to keywords
    pub digit_codes: bool,

    // === Game over ===
    pub flavor_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_layout(LaneLayout::TwoLane)
    }
}

impl Settings {
    /// Reference configuration for a lane layout
    pub fn for_layout(layout: LaneLayout) -> Self {
        Self {
            layout,
            screen_width: layout.default_screen_width(),
            screen_height: SCREEN_HEIGHT,
            runner_width: RUNNER_SIZE,
            runner_height: RUNNER_SIZE,
            runner_bottom_margin: RUNNER_SIZE,
            obstacle_width: OBSTACLE_SIZE,
            obstacle_height: OBSTACLE_SIZE,
            difficulty: DifficultySettings::default(),
            tick_hz: DEFAULT_TICK_HZ,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            initial_lane: 0,
            seed: None,
            digit_codes: true,
            flavor_timeout_ms: DEFAULT_FLAVOR_TIMEOUT_MS,
        }
    }

    /// Switch layout, rescaling the playfield width to the layout default
    pub fn apply_layout(&mut self, layout: LaneLayout) {
        self.layout = layout;
        self.screen_width = layout.default_screen_width();
        self.initial_lane = self.initial_lane.min(layout.lane_count() - 1);
    }

    pub fn lane_count(&self) -> usize {
        self.layout.lane_count()
    }

    /// Horizontal center of a lane
    pub fn lane_x(&self, lane: usize) -> f32 {
        let centers = self.layout.lane_centers(self.screen_width);
        let idx = lane.min(centers.len() - 1);
        centers[idx]
    }

    /// Y coordinate of the runner's top edge
    pub fn runner_y(&self) -> f32 {
        self.screen_height - self.runner_bottom_margin
    }

    /// Duration of a single tick, in milliseconds (fractional)
    pub fn tick_duration_ms(&self) -> f64 {
        1000.0 / self.tick_hz as f64
    }

    /// Simulation time elapsed after `ticks`, floored to whole milliseconds
    pub fn elapsed_ms(&self, ticks: u64) -> u64 {
        ticks * 1000 / self.tick_hz as u64
    }

    /// Reject configurations that would break the simulation invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.difficulty;
        if self.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be positive".into()));
        }
        if d.speed_divisor == 0 || d.score_tick_divisor_ms == 0 {
            return Err(ConfigError::Invalid("difficulty divisors must be positive".into()));
        }
        if d.min_interval_ms == 0 {
            return Err(ConfigError::Invalid("min_interval_ms must be positive".into()));
        }
        if d.min_interval_ms > d.base_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "min_interval_ms ({}) exceeds base_interval_ms ({})",
                d.min_interval_ms, d.base_interval_ms
            )));
        }
        if !(d.base_speed.is_finite() && d.base_speed > 0.0) {
            return Err(ConfigError::Invalid("base_speed must be positive".into()));
        }
        if self.initial_lane >= self.lane_count() {
            return Err(ConfigError::Invalid(format!(
                "initial_lane {} out of range for {} lanes",
                self.initial_lane,
                self.lane_count()
            )));
        }
        let dims = [
            self.screen_width,
            self.screen_height,
            self.runner_width,
            self.runner_height,
            self.obstacle_width,
            self.obstacle_height,
        ];
        if dims.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(ConfigError::Invalid("geometry must be positive".into()));
        }
        Ok(())
    }

    /// Load and validate settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&json)?;
        settings.validate()?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_str() {
        assert_eq!(LaneLayout::from_str("2"), Some(LaneLayout::TwoLane));
        assert_eq!(LaneLayout::from_str("THREE"), Some(LaneLayout::ThreeLane));
        assert_eq!(LaneLayout::from_str("four"), None);
    }

    #[test]
    fn test_reference_lane_centers() {
        let settings = Settings::for_layout(LaneLayout::TwoLane);
        assert!((settings.lane_x(0) - 120.0).abs() < 0.001);
        assert!((settings.lane_x(1) - 280.0).abs() < 0.001);

        let settings = Settings::for_layout(LaneLayout::ThreeLane);
        assert!((settings.lane_x(0) - 200.0).abs() < 0.001);
        assert!((settings.lane_x(1) - 400.0).abs() < 0.001);
        assert!((settings.lane_x(2) - 600.0).abs() < 0.001);
    }

    #[test]
    fn test_default_validates() {
        assert!(Settings::default().validate().is_ok());
        assert!(Settings::for_layout(LaneLayout::ThreeLane).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_interval_floor() {
        let mut settings = Settings::default();
        settings.difficulty.min_interval_ms = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        let mut settings = Settings::default();
        settings.difficulty.min_interval_ms = 2000;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_initial_lane() {
        let mut settings = Settings::default();
        settings.initial_lane = 2;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_elapsed_ms_floors() {
        let settings = Settings::default();
        assert_eq!(settings.tick_hz, 30);
        assert_eq!(settings.elapsed_ms(1), 33);
        assert_eq!(settings.elapsed_ms(3), 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "layout": "ThreeLane", "cooldown_ms": 0 }"#).unwrap();
        assert_eq!(settings.layout, LaneLayout::ThreeLane);
        assert_eq!(settings.cooldown_ms, 0);
        assert_eq!(settings.tick_hz, DEFAULT_TICK_HZ);
    }
}
