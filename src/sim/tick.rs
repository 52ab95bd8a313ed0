//! Fixed timestep simulation tick
//!
//! Advances a session by exactly one step: input, difficulty, obstacles,
//! collision, score. Nothing else mutates a running session.

use super::collision::first_collision;
use super::difficulty::{difficulty_for, score_for_elapsed};
use super::state::{
    GameSession, MotionCommand, MoveOutcome, SessionEvent, SessionPhase, SessionResult,
};
use crate::platform::input::MotionSource;

/// What a single tick did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still running
    Continue,
    /// This tick ended the session
    Ended(SessionResult),
    /// Session had already ended; nothing happened
    Halted,
}

/// Advance the session by one fixed timestep using the given command
pub fn tick(session: &mut GameSession, command: MotionCommand) -> TickOutcome {
    if session.phase == SessionPhase::Ended {
        return TickOutcome::Halted;
    }

    session.time_ticks += 1;
    let now_ms = session.elapsed_ms();

    // Runner
    match session
        .runner
        .apply(command, now_ms, session.settings.cooldown_ms)
    {
        MoveOutcome::Applied { from, to } if from != to => {
            session.events.push(SessionEvent::LaneChanged { from, to });
        }
        MoveOutcome::Dropped => {
            log::debug!("Dropped {:?} inside cooldown at {}ms", command, now_ms);
            session.events.push(SessionEvent::MoveDropped(command));
        }
        _ => {}
    }

    // Obstacles
    let params = difficulty_for(session.score, &session.settings.difficulty);
    if let Some(obstacle) = session.field.maybe_spawn(
        now_ms,
        session.last_spawn_ms,
        params.spawn_interval_ms,
        session.time_ticks,
        &mut session.rng,
    ) {
        session.last_spawn_ms = now_ms;
        session.events.push(SessionEvent::ObstacleSpawned {
            id: obstacle.id,
            lane: obstacle.lane,
        });
    }
    session.field.advance(params.speed);
    for id in session.field.prune(session.settings.screen_height) {
        session.events.push(SessionEvent::ObstaclePruned { id });
    }

    // Collision
    if let Some(hit) = first_collision(session.runner.hitbox(), session.field.iter()) {
        let result = SessionResult {
            final_score: session.score,
            ticks: session.time_ticks,
        };
        session.phase = SessionPhase::Ended;
        session.result = Some(result);
        session.events.push(SessionEvent::Collision {
            obstacle_id: hit.obstacle_id,
            lane: hit.lane,
        });
        log::info!(
            "Session ended at tick {} (obstacle {} in lane {}), score {}",
            session.time_ticks,
            hit.obstacle_id,
            hit.lane,
            result.final_score
        );
        return TickOutcome::Ended(result);
    }

    session.score = score_for_elapsed(now_ms, &session.settings.difficulty);
    TickOutcome::Continue
}

impl GameSession {
    /// Poll the motion source once and advance one tick
    ///
    /// An ended session is not polled.
    pub fn step<S: MotionSource + ?Sized>(&mut self, source: &mut S) -> TickOutcome {
        if self.phase == SessionPhase::Ended {
            return TickOutcome::Halted;
        }
        let command = source.poll();
        tick(self, command)
    }
}
