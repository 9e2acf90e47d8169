//! crates/grading_core/src/rating.rs
//!
//! Elo-style rating arithmetic. Pure functions only: no I/O and no shared state.

use serde::Serialize;

use crate::domain::RatingChange;

/// Fraction of the adjustment kept when the user saw the official solution first.
pub const VIEWED_SOLUTION_FACTOR: f64 = 0.3;

/// Probability that a user of `user_rating` solves a problem of `problem_rating`.
///
/// `1 / (1 + 10^((problem - user) / 400))`, always strictly inside `(0, 1)` for
/// realistic rating gaps.
pub fn expected_performance(user_rating: i32, problem_rating: i32) -> f64 {
    let exponent = (f64::from(problem_rating) - f64::from(user_rating)) / 400.0;
    1.0 / (1.0 + 10f64.powf(exponent))
}

/// Sensitivity of the rating to a single result. Non-increasing in rating.
pub fn k_factor(user_rating: i32) -> u32 {
    if user_rating < 1500 {
        60
    } else if user_rating < 2000 {
        40
    } else {
        20
    }
}

/// Computes the adjustment for one graded attempt.
///
/// `performance` is the achieved score in `[0, 1]`: 1.0 for a full solve,
/// 0.5 for partial credit.
pub fn rating_delta(
    user_rating: i32,
    problem_rating: i32,
    viewed_reference_solution: bool,
    performance: f64,
) -> RatingChange {
    let expected = expected_performance(user_rating, problem_rating);
    let k = k_factor(user_rating);

    let mut raw = f64::from(k) * (performance - expected);
    if viewed_reference_solution {
        raw *= VIEWED_SOLUTION_FACTOR;
    }

    let delta = raw.round() as i32;

    RatingChange {
        old_rating: user_rating,
        new_rating: user_rating.saturating_add(delta),
        delta,
        expected_performance: expected,
        k_factor: k,
    }
}

/// A display band for a rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatingTier {
    pub name: &'static str,
    pub color: &'static str,
    pub color_code: &'static str,
}

pub fn rating_tier(rating: i32) -> RatingTier {
    let (name, color, color_code) = match rating {
        r if r >= 2500 => ("Grandmaster", "black", "#000000"),
        r if r >= 2200 => ("Master", "red", "#dc2626"),
        r if r >= 1900 => ("Candidate Master", "orange", "#ea580c"),
        r if r >= 1600 => ("Expert", "yellow", "#eab308"),
        r if r >= 1400 => ("Specialist", "purple", "#9333ea"),
        r if r >= 1200 => ("Pupil", "blue", "#2563eb"),
        _ => ("Newbie", "green", "#16a34a"),
    };
    RatingTier {
        name,
        color,
        color_code,
    }
}
