//! crates/grading_core/src/evaluation/parse.rs
//!
//! Turns the oracle's free-form reply into a bounded [`EvaluationResult`].
//!
//! The oracle is not trusted: every field is checked for presence and type,
//! sub-scores are clamped into their criterion's range, and missing values fall
//! back to safe defaults. Only a reply that is not a JSON object at all is an
//! error.

use serde_json::{Map, Value};
use tracing::warn;

use super::cost::evaluation_cost;
use super::wire::TokenUsage;
use super::EvaluationError;
use crate::domain::{Confidence, Criterion, EvaluationResult, RubricScores};

/// Below this total a high-confidence grade is treated as a likely oracle error.
pub const SAFETY_DOWNGRADE_BELOW: u32 = 40;

/// Provenance of a reply, used for cost accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseMeta<'a> {
    pub model_used: &'a str,
    pub usage: TokenUsage,
}

/// Removes markdown code fences around (or inside) the payload, together with
/// at most one newline directly after each fence.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

pub fn parse_evaluation(
    raw: &str,
    meta: ResponseMeta<'_>,
) -> Result<EvaluationResult, EvaluationError> {
    let cleaned = strip_code_fences(raw);
    let parsed: Value = serde_json::from_str(&cleaned)
        .map_err(|e| EvaluationError::MalformedOracleResponse(e.to_string()))?;
    let Value::Object(record) = parsed else {
        return Err(EvaluationError::MalformedOracleResponse(
            "evaluation payload is not a JSON object".to_string(),
        ));
    };

    let (scores, clamped) = clamp_scores(record.get("scores"));
    if !clamped.is_empty() {
        warn!(?clamped, "Oracle returned out-of-range sub-scores; clamped.");
    }
    let total_score = scores.total();

    let confidence = record
        .get("confidence")
        .and_then(Value::as_str)
        .and_then(Confidence::parse)
        .unwrap_or(Confidence::Medium);

    let feedback = record
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_feedback(total_score).to_string());

    let mut result = EvaluationResult {
        scores,
        total_score,
        confidence,
        feedback,
        errors: string_list(&record, "errors"),
        strengths: string_list(&record, "strengths"),
        suggestions: string_list(&record, "suggestions"),
        model_used: meta.model_used.to_string(),
        tokens_used: meta.usage.total(),
        cost_usd: evaluation_cost(
            meta.usage.prompt_tokens,
            meta.usage.completion_tokens,
            meta.model_used,
        ),
        clamped,
        confidence_downgraded: false,
    };
    apply_safety_downgrade(&mut result);
    Ok(result)
}

/// Clamps each criterion independently. Missing or non-numeric values count as 0.
fn clamp_scores(raw: Option<&Value>) -> (RubricScores, Vec<Criterion>) {
    let mut scores = RubricScores::default();
    let mut clamped = Vec::new();

    for criterion in Criterion::ALL {
        let value = raw
            .and_then(|scores| scores.get(criterion.key()))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let max = f64::from(criterion.max_points());
        if !(0.0..=max).contains(&value) {
            clamped.push(criterion);
        }
        scores.set(criterion, value.clamp(0.0, max).round() as u32);
    }

    (scores, clamped)
}

fn string_list(record: &Map<String, Value>, key: &str) -> Vec<String> {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Feedback used when the oracle supplies none, banded by total score.
pub fn fallback_feedback(total_score: u32) -> &'static str {
    match total_score {
        s if s >= 80 => "Excellent work! Your solution is correct and well reasoned.",
        s if s >= 60 => "Good work. Your solution is on the right track, with a few gaps to close.",
        s if s >= 40 => {
            "Your solution needs improvement. Compare your reasoning with the official solution."
        }
        _ => "Please revise your solution. Re-read the problem carefully and try again.",
    }
}

/// A failing grade reported with high confidence is lowered to medium so it
/// goes to human review instead of failing outright.
pub fn apply_safety_downgrade(result: &mut EvaluationResult) {
    if result.total_score < SAFETY_DOWNGRADE_BELOW && result.confidence == Confidence::High {
        warn!(
            total_score = result.total_score,
            "Low score reported with high confidence; downgrading to medium."
        );
        result.confidence = Confidence::Medium;
        result.confidence_downgraded = true;
    }
}
