//! Collision detection between the runner and obstacles
//!
//! Plain axis-aligned boxes. Overlap must be strict on both axes: boxes that
//! only share an edge or a corner do not collide.

use glam::Vec2;

use super::obstacles::Obstacle;
use super::state::Rect;

/// A runner/obstacle hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    pub obstacle_id: u32,
    pub lane: usize,
    /// Overlap extent on each axis (both strictly positive)
    pub overlap: Vec2,
}

/// Strict AABB overlap test
#[inline]
pub fn intersects(a: &Rect, b: &Rect) -> bool {
    let (a_min, a_max) = (a.min(), a.max());
    let (b_min, b_max) = (b.min(), b.max());
    a_min.x < b_max.x && b_min.x < a_max.x && a_min.y < b_max.y && b_min.y < a_max.y
}

/// Overlap extent of two boxes, zero on an axis where they do not overlap
pub fn overlap(a: &Rect, b: &Rect) -> Vec2 {
    let min = a.min().max(b.min());
    let max = a.max().min(b.max());
    (max - min).max(Vec2::ZERO)
}

/// First obstacle, in spawn order, that the hitbox overlaps
pub fn first_collision<'a>(
    hitbox: &Rect,
    obstacles: impl IntoIterator<Item = &'a Obstacle>,
) -> Option<CollisionResult> {
    obstacles
        .into_iter()
        .find(|o| intersects(hitbox, &o.rect))
        .map(|o| CollisionResult {
            obstacle_id: o.id,
            lane: o.lane,
            overlap: overlap(hitbox, &o.rect),
        })
}
