//! Score → difficulty mapping
//!
//! Pure functions. Speed only goes up with score, the spawn interval only goes
//! down, and the interval never drops below its configured floor.

use serde::{Deserialize, Serialize};

use crate::settings::DifficultySettings;

/// Obstacle speed and spawn cadence for a given score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyParameters {
    /// Pixels per tick
    pub speed: f32,
    pub spawn_interval_ms: u64,
}

/// Difficulty for a score
pub fn difficulty_for(score: u64, settings: &DifficultySettings) -> DifficultyParameters {
    let steps = score / settings.speed_divisor.max(1);
    let speed = settings.base_speed + steps as f32;

    let decay = score.saturating_mul(settings.decay_rate_ms);
    let floor = settings.min_interval_ms.max(1);
    let spawn_interval_ms = settings.base_interval_ms.saturating_sub(decay).max(floor);

    DifficultyParameters {
        speed,
        spawn_interval_ms,
    }
}

/// Score earned after `elapsed_ms` of simulation time
pub fn score_for_elapsed(elapsed_ms: u64, settings: &DifficultySettings) -> u64 {
    elapsed_ms / settings.score_tick_divisor_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_curve() {
        let d = DifficultySettings::default();

        let p = difficulty_for(0, &d);
        assert_eq!(p.speed, 5.0);
        assert_eq!(p.spawn_interval_ms, 1500);

        let p = difficulty_for(40, &d);
        assert_eq!(p.speed, 7.0);
        assert_eq!(p.spawn_interval_ms, 1300);

        // 1500 - 220 * 5 = 400, the floor
        assert_eq!(difficulty_for(220, &d).spawn_interval_ms, 400);
        assert_eq!(difficulty_for(10_000, &d).spawn_interval_ms, 400);
    }

    #[test]
    fn test_huge_scores_do_not_overflow() {
        let d = DifficultySettings::default();
        let p = difficulty_for(u64::MAX, &d);
        assert_eq!(p.spawn_interval_ms, d.min_interval_ms);
        assert!(p.speed.is_finite());
    }

    #[test]
    fn test_score_for_elapsed() {
        let d = DifficultySettings::default();
        assert_eq!(score_for_elapsed(0, &d), 0);
        assert_eq!(score_for_elapsed(99, &d), 0);
        assert_eq!(score_for_elapsed(100, &d), 1);
        assert_eq!(score_for_elapsed(2050, &d), 20);
    }

    fn settings() -> impl Strategy<Value = DifficultySettings> {
        (1.0f32..10.0, 1u64..100, 400u64..5000, 1u64..400, 0u64..50, 1u64..500).prop_map(
            |(base_speed, speed_divisor, base_interval_ms, min_interval_ms, decay_rate_ms, div)| {
                DifficultySettings {
                    base_speed,
                    speed_divisor,
                    base_interval_ms,
                    min_interval_ms,
                    decay_rate_ms,
                    score_tick_divisor_ms: div,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_monotonic_and_floored(d in settings(), score in 0u64..1_000_000, delta in 0u64..10_000) {
            let a = difficulty_for(score, &d);
            let b = difficulty_for(score + delta, &d);
            prop_assert!(b.speed >= a.speed);
            prop_assert!(b.spawn_interval_ms <= a.spawn_interval_ms);
            prop_assert!(a.spawn_interval_ms >= d.min_interval_ms);
            prop_assert!(b.spawn_interval_ms >= d.min_interval_ms);
            prop_assert!(b.spawn_interval_ms > 0);
        }

        #[test]
        fn prop_score_never_decreases(d in settings(), ms in 0u64..10_000_000, more in 0u64..100_000) {
            prop_assert!(score_for_elapsed(ms + more, &d) >= score_for_elapsed(ms, &d));
        }
    }
}
