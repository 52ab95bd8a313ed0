//! Obstacle spawning, scrolling and cleanup
//!
//! `ObstacleField` is the only owner of obstacles and the only thing that
//! moves them. Callers get copies, never references they could hold across
//! ticks.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::Rect;
use crate::settings::Settings;

/// An obstacle scrolling down a lane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub lane: usize,
    pub rect: Rect,
    /// Tick on which the obstacle appeared
    pub spawn_tick: u64,
}

/// All live obstacles, in spawn order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
    lane_centers: Vec<f32>,
    size: Vec2,
    next_id: u32,
}

impl ObstacleField {
    pub fn new(settings: &Settings) -> Self {
        Self {
            obstacles: Vec::new(),
            lane_centers: settings.layout.lane_centers(settings.screen_width),
            size: Vec2::new(settings.obstacle_width, settings.obstacle_height),
            next_id: 1,
        }
    }

    /// Spawn one obstacle in a random lane if more than `interval_ms` has
    /// passed since `last_spawn_ms`
    ///
    /// The caller resets its spawn timer when this returns `Some`.
    pub fn maybe_spawn<R: Rng>(
        &mut self,
        now_ms: u64,
        last_spawn_ms: u64,
        interval_ms: u64,
        tick: u64,
        rng: &mut R,
    ) -> Option<Obstacle> {
        if now_ms.saturating_sub(last_spawn_ms) <= interval_ms {
            return None;
        }
        let lane = rng.random_range(0..self.lane_centers.len());
        Some(self.spawn_in_lane(lane, tick))
    }

    /// Spawn an obstacle just above the top edge of a lane
    pub fn spawn_in_lane(&mut self, lane: usize, tick: u64) -> Obstacle {
        let lane = crate::clamp_lane(lane, self.lane_centers.len());
        let x = self.lane_centers[lane] - self.size.x / 2.0;
        let obstacle = Obstacle {
            id: self.next_id,
            lane,
            rect: Rect::new(x, -self.size.y, self.size.x, self.size.y),
            spawn_tick: tick,
        };
        self.next_id += 1;
        self.obstacles.push(obstacle);
        log::debug!("Spawned obstacle {} in lane {} at tick {}", obstacle.id, lane, tick);
        obstacle
    }

    /// Move every obstacle down by a constant per-tick step
    pub fn advance(&mut self, speed: f32) {
        for obstacle in &mut self.obstacles {
            obstacle.rect.pos.y += speed;
        }
    }

    /// Drop obstacles that have scrolled past the bottom, returning their ids
    pub fn prune(&mut self, screen_height: f32) -> Vec<u32> {
        let mut pruned = Vec::new();
        self.obstacles.retain(|o| {
            let keep = o.rect.pos.y < screen_height;
            if !keep {
                pruned.push(o.id);
            }
            keep
        });
        pruned
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}
