//! crates/grading_core/src/domain.rs
//!
//! Defines the pure, core data structures for the evaluation engine.
//! These structs are independent of any database or transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type ProblemId = Uuid;
pub type SubmissionId = Uuid;

//=========================================================================================
// Submissions
//=========================================================================================

/// The kind of media an attachment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
}

/// A file uploaded alongside a submission. Storage itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub media_kind: MediaKind,
    pub filename: String,
    pub size_bytes: u64,
}

/// A user's attempt at a problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub problem_id: ProblemId,
    pub user_id: UserId,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    /// Set once the single permitted edit has been applied.
    #[serde(default)]
    pub edited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionEditError {
    #[error("Submission {0} has already been edited once")]
    AlreadyEdited(SubmissionId),
}

impl Submission {
    pub fn new(problem_id: ProblemId, user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            problem_id,
            user_id,
            content: content.into(),
            attachments: Vec::new(),
            created_at: Utc::now(),
            edited: false,
        }
    }

    /// Replaces the answer. Only one edit is allowed per submission; the caller
    /// is expected to re-run evaluation afterwards.
    pub fn apply_edit(
        &mut self,
        content: String,
        attachments: Option<Vec<Attachment>>,
    ) -> Result<(), SubmissionEditError> {
        if self.edited {
            return Err(SubmissionEditError::AlreadyEdited(self.id));
        }
        self.content = content;
        if let Some(attachments) = attachments {
            self.attachments = attachments;
        }
        self.edited = true;
        Ok(())
    }
}

/// The slice of a user record the engine needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: UserId,
    pub rating: i32,
}

/// The slice of a problem record the engine needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemContext {
    pub id: ProblemId,
    pub statement: String,
    /// Evaluation is skipped entirely when there is no official solution.
    pub reference_solution: Option<String>,
    pub rating: i32,
    #[serde(default)]
    pub problem_media_url: Option<String>,
    #[serde(default)]
    pub solution_media_url: Option<String>,
}

//=========================================================================================
// Evaluation
//=========================================================================================

/// The oracle's self-reported certainty in its own score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Parses a confidence tier, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One weighted rubric criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Correctness,
    Reasoning,
    Coverage,
    Clarity,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Correctness,
        Criterion::Reasoning,
        Criterion::Coverage,
        Criterion::Clarity,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Correctness => "correctness",
            Self::Reasoning => "reasoning",
            Self::Coverage => "coverage",
            Self::Clarity => "clarity",
        }
    }

    pub fn max_points(&self) -> u32 {
        match self {
            Self::Correctness => 40,
            Self::Reasoning => 30,
            Self::Coverage => 20,
            Self::Clarity => 10,
        }
    }
}

/// Per-criterion points. Every field is kept within its criterion's range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricScores {
    pub correctness: u32,
    pub reasoning: u32,
    pub coverage: u32,
    pub clarity: u32,
}

impl RubricScores {
    pub fn get(&self, criterion: Criterion) -> u32 {
        match criterion {
            Criterion::Correctness => self.correctness,
            Criterion::Reasoning => self.reasoning,
            Criterion::Coverage => self.coverage,
            Criterion::Clarity => self.clarity,
        }
    }

    pub fn set(&mut self, criterion: Criterion, points: u32) {
        match criterion {
            Criterion::Correctness => self.correctness = points,
            Criterion::Reasoning => self.reasoning = points,
            Criterion::Coverage => self.coverage = points,
            Criterion::Clarity => self.clarity = points,
        }
    }

    pub fn total(&self) -> u32 {
        self.correctness + self.reasoning + self.coverage + self.clarity
    }

    pub fn is_within_bounds(&self) -> bool {
        Criterion::ALL
            .iter()
            .all(|criterion| self.get(*criterion) <= criterion.max_points())
    }
}

/// The validated outcome of one oracle evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub scores: RubricScores,
    /// Always equal to `scores.total()`, within `[0, 100]`.
    pub total_score: u32,
    pub confidence: Confidence,
    /// Never empty.
    pub feedback: String,
    pub errors: Vec<String>,
    pub strengths: Vec<String>,
    pub suggestions: Vec<String>,
    pub model_used: String,
    pub tokens_used: u64,
    pub cost_usd: f64,
    /// Criteria whose raw value from the oracle was outside the allowed range.
    #[serde(default)]
    pub clamped: Vec<Criterion>,
    /// True when a high-confidence failing grade was lowered to medium.
    #[serde(default)]
    pub confidence_downgraded: bool,
}

//=========================================================================================
// Triage and Rating
//=========================================================================================

/// The approval state of an evaluated submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageState {
    AutoApproved,
    PartialCredit,
    NeedsReview,
    /// Nothing flagged it: a passing grade the oracle was not fully sure of.
    StandardPass,
}

/// A rating adjustment, derived and applied to the user record by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
    pub expected_performance: f64,
    pub k_factor: u32,
}

//=========================================================================================
// Admission
//=========================================================================================

/// The rate-limited actions a user can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Submission,
    OracleEvaluation,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::OracleEvaluation => "llm_eval",
        }
    }
}

/// A single admission event, written to the audit log off the hot path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub user_id: UserId,
    pub action_type: ActionType,
    pub rate_limit_hit: bool,
    pub timestamp: DateTime<Utc>,
}
