//! Points computation for answers. Deliberately a pure function of its
//! inputs: identical (correctness, elapsed, streak) triples always produce
//! identical outcomes, which is what makes the transactional scoring path
//! replayable under contention.

use std::time::Duration;

/// Tunable scoring constants, loaded through the application config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringTuning {
    /// Flat award for any correct answer.
    pub base_points: u32,
    /// Maximum time bonus, granted at zero elapsed time.
    pub time_bonus_cap: u32,
    /// Milliseconds of elapsed time that erode one point of time bonus.
    pub time_bonus_divisor_ms: u32,
    /// Points per unit of streak. A streak of one already earns one unit.
    pub streak_multiplier: u32,
}

impl Default for ScoringTuning {
    fn default() -> Self {
        Self {
            base_points: 1000,
            time_bonus_cap: 500,
            time_bonus_divisor_ms: 40,
            streak_multiplier: 100,
        }
    }
}

/// Result of scoring one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// Points to add to the player's cumulative score.
    pub points: u32,
    /// The player's streak after this answer.
    pub streak: u32,
}

/// Score a single answer.
///
/// Incorrect answers award nothing and reset the streak. Correct answers earn
/// `base + time_bonus + streak_bonus`, where the time bonus decays linearly
/// from the cap down to zero as elapsed time grows, and the streak bonus is
/// the new streak length times the multiplier, counting from the first
/// correct answer.
pub fn score(
    tuning: &ScoringTuning,
    correct: bool,
    elapsed: Duration,
    prior_streak: u32,
) -> ScoreOutcome {
    if !correct {
        return ScoreOutcome {
            points: 0,
            streak: 0,
        };
    }

    let streak = prior_streak.saturating_add(1);

    let decay = elapsed.as_millis() / u128::from(tuning.time_bonus_divisor_ms.max(1));
    // saturating_sub pins the result inside 0..=cap, so the cast is exact.
    let time_bonus = u128::from(tuning.time_bonus_cap).saturating_sub(decay) as u32;

    let points = tuning
        .base_points
        .saturating_add(time_bonus)
        .saturating_add(streak.saturating_mul(tuning.streak_multiplier));

    ScoreOutcome { points, streak }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> ScoringTuning {
        ScoringTuning::default()
    }

    #[test]
    fn incorrect_answers_score_nothing_and_reset_the_streak() {
        for prior in [0, 1, 7, u32::MAX] {
            for elapsed_ms in [0, 1, 20_000] {
                let outcome = score(
                    &tuning(),
                    false,
                    Duration::from_millis(elapsed_ms),
                    prior,
                );
                assert_eq!(outcome, ScoreOutcome { points: 0, streak: 0 });
            }
        }
    }

    #[test]
    fn instant_first_correct_answer_earns_full_bonus() {
        let outcome = score(&tuning(), true, Duration::ZERO, 0);
        assert_eq!(outcome.points, 1000 + 500 + 100);
        assert_eq!(outcome.streak, 1);
    }

    #[test]
    fn time_bonus_floors_at_zero() {
        // 20 s is past cap * divisor = 500 * 40 ms.
        let outcome = score(&tuning(), true, Duration::from_millis(20_000), 0);
        assert_eq!(outcome.points, 1000 + 0 + 100);
        assert_eq!(outcome.streak, 1);
    }

    #[test]
    fn time_bonus_is_monotonically_non_increasing() {
        let mut last = u32::MAX;
        for elapsed_ms in (0..25_000).step_by(250) {
            let outcome = score(&tuning(), true, Duration::from_millis(elapsed_ms), 0);
            assert!(outcome.points <= last);
            last = outcome.points;
        }
    }

    #[test]
    fn streak_bonus_grows_with_each_consecutive_hit() {
        let first = score(&tuning(), true, Duration::from_millis(20_000), 0);
        let second = score(&tuning(), true, Duration::from_millis(20_000), first.streak);
        let third = score(&tuning(), true, Duration::from_millis(20_000), second.streak);

        assert_eq!(first.points, 1100);
        assert_eq!(second.points, 1200);
        assert_eq!(third.points, 1300);
        assert_eq!(third.streak, 3);
    }

    #[test]
    fn identical_inputs_yield_identical_outcomes() {
        let a = score(&tuning(), true, Duration::from_millis(1234), 4);
        let b = score(&tuning(), true, Duration::from_millis(1234), 4);
        assert_eq!(a, b);
    }
}
