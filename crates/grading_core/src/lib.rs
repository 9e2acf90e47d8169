pub mod admission;
pub mod domain;
pub mod evaluation;
pub mod ports;
pub mod rating;
pub mod triage;

pub use admission::{
    ActionLimits, AdmissionController, AdmissionDecision, AdmissionError, AdmissionState,
    LimitTable, LimitTier,
};
pub use domain::{
    ActionType, Attachment, AuditEvent, Confidence, Criterion, EvaluationResult, MediaKind,
    ProblemContext, ProblemId, RatingChange, RubricScores, Submission, SubmissionEditError,
    SubmissionId, TriageState, UserId, UserSnapshot,
};
pub use evaluation::{EvaluationError, EvaluationInput, EvaluationOrchestrator};
pub use ports::{
    AuditSink, AuditStore, BudgetStatus, Clock, GradingOracle, ManualClock, OracleBudget,
    PortError, PortResult, SystemClock,
};
pub use rating::{expected_performance, k_factor, rating_delta, rating_tier, RatingTier};
pub use triage::{auto_approve, is_partial_credit, needs_review, triage};
