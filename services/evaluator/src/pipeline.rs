//! services/evaluator/src/pipeline.rs
//!
//! The submission flow: admission, then evaluation, then triage and rating.
//!
//! Oracle trouble of any kind leaves an accepted submission in the pending
//! state; only the submission gate can reject a submission outright.

use grading_core::{
    admission::{AdmissionController, AdmissionDecision},
    domain::{
        EvaluationResult, ProblemContext, RatingChange, Submission, SubmissionId, TriageState,
        UserSnapshot,
    },
    evaluation::{EvaluationError, EvaluationInput, EvaluationOrchestrator},
    ports::OracleBudget,
    rating::rating_delta,
    triage::triage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::EvaluatorError;

//=========================================================================================
// Requests and Outcomes
//=========================================================================================

/// Everything the engine needs to process one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub submission: Submission,
    pub user: UserSnapshot,
    pub problem: ProblemContext,
    #[serde(default)]
    pub viewed_reference_solution: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Blocked by the submission gate. Nothing was persisted or evaluated.
    Rejected {
        decision: AdmissionDecision,
        message: String,
    },
    Accepted(AcceptedSubmission),
}

impl SubmissionOutcome {
    /// Turns a rejection into [`EvaluatorError::AdmissionRejected`].
    pub fn into_accepted(self) -> Result<AcceptedSubmission, EvaluatorError> {
        match self {
            SubmissionOutcome::Accepted(accepted) => Ok(accepted),
            SubmissionOutcome::Rejected { decision, message } => {
                Err(EvaluatorError::AdmissionRejected {
                    retry_after_seconds: decision.retry_after_seconds,
                    reason: message,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedSubmission {
    pub submission_id: SubmissionId,
    /// The submission-gate decision, or `None` for a re-evaluation.
    pub admission: Option<AdmissionDecision>,
    pub evaluation: EvaluationStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum EvaluationStatus {
    /// The problem has no reference solution to grade against.
    Skipped,
    Pending(PendingReason),
    Completed(Box<EvaluatedSubmission>),
}

impl EvaluationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, EvaluationStatus::Pending(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PendingReason {
    BudgetExceeded { used_usd: f64, limit_usd: f64 },
    OracleRateLimited { retry_after_seconds: Option<u64> },
    OracleUnavailable { detail: String },
    OracleTimeout,
    MalformedResponse { detail: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedSubmission {
    pub evaluation: EvaluationResult,
    pub triage: TriageState,
    /// `None` while the submission waits for human review.
    pub rating_change: Option<RatingChange>,
}

//=========================================================================================
// The Pipeline
//=========================================================================================

pub struct SubmissionPipeline {
    submission_gate: Arc<AdmissionController>,
    oracle_gate: Arc<AdmissionController>,
    orchestrator: EvaluationOrchestrator,
    budget: Option<Arc<dyn OracleBudget>>,
    oracle_timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        submission_gate: Arc<AdmissionController>,
        oracle_gate: Arc<AdmissionController>,
        orchestrator: EvaluationOrchestrator,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            submission_gate,
            oracle_gate,
            orchestrator,
            budget: None,
            oracle_timeout,
        }
    }

    pub fn with_budget(mut self, budget: Arc<dyn OracleBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn submission_gate(&self) -> &Arc<AdmissionController> {
        &self.submission_gate
    }

    pub fn oracle_gate(&self) -> &Arc<AdmissionController> {
        &self.oracle_gate
    }

    /// Admits a new submission and, if admitted, evaluates it.
    #[instrument(
        skip_all,
        fields(submission_id = %request.submission.id, user_id = %request.user.id)
    )]
    pub async fn process(&self, request: &SubmissionRequest) -> SubmissionOutcome {
        let decision = self
            .submission_gate
            .admit(request.user.id, request.user.rating);
        if !decision.allowed {
            let message = decision.message();
            info!(
                state = ?decision.state,
                retry_after = ?decision.retry_after_seconds,
                "Submission rejected."
            );
            return SubmissionOutcome::Rejected { decision, message };
        }

        let evaluation = self.evaluate(request).await;
        SubmissionOutcome::Accepted(AcceptedSubmission {
            submission_id: request.submission.id,
            admission: Some(decision),
            evaluation,
        })
    }

    /// Re-runs evaluation after the single permitted edit. The submission gate
    /// is not consulted again; the oracle gate and budget still apply.
    #[instrument(
        skip_all,
        fields(submission_id = %request.submission.id, user_id = %request.user.id)
    )]
    pub async fn reevaluate(&self, request: &SubmissionRequest) -> AcceptedSubmission {
        AcceptedSubmission {
            submission_id: request.submission.id,
            admission: None,
            evaluation: self.evaluate(request).await,
        }
    }

    async fn evaluate(&self, request: &SubmissionRequest) -> EvaluationStatus {
        let Some(reference_solution) = request.problem.reference_solution.as_deref() else {
            info!("Problem has no reference solution; skipping evaluation.");
            return EvaluationStatus::Skipped;
        };

        if let Some(budget) = &self.budget {
            let status = budget.check_daily_budget().await;
            if status.exceeded {
                warn!(
                    used_usd = status.used_usd,
                    limit_usd = status.limit_usd,
                    "Daily oracle budget exceeded."
                );
                return EvaluationStatus::Pending(PendingReason::BudgetExceeded {
                    used_usd: status.used_usd,
                    limit_usd: status.limit_usd,
                });
            }
        }

        let oracle_decision = self.oracle_gate.admit(request.user.id, request.user.rating);
        if !oracle_decision.allowed {
            info!(
                state = ?oracle_decision.state,
                "Oracle evaluation limit reached; leaving submission pending."
            );
            return EvaluationStatus::Pending(PendingReason::OracleRateLimited {
                retry_after_seconds: oracle_decision.retry_after_seconds,
            });
        }

        let input = EvaluationInput {
            problem_text: request.problem.statement.clone(),
            reference_solution: reference_solution.to_string(),
            user_answer: request.submission.content.clone(),
            problem_media_url: request.problem.problem_media_url.clone(),
            solution_media_url: request.problem.solution_media_url.clone(),
        };

        let evaluation = self.orchestrator.evaluate(&input);
        let result = match tokio::time::timeout(self.oracle_timeout, evaluation).await {
            Err(_) => Err(EvaluationError::OracleTimeout),
            Ok(result) => result,
        };

        match result {
            Ok(evaluation) => {
                EvaluationStatus::Completed(Box::new(self.grade(request, evaluation)))
            }
            Err(err) => {
                warn!(error = %err, "Evaluation failed; leaving submission pending.");
                EvaluationStatus::Pending(pending_reason(err))
            }
        }
    }

    fn grade(
        &self,
        request: &SubmissionRequest,
        evaluation: EvaluationResult,
    ) -> EvaluatedSubmission {
        let state = triage(evaluation.total_score, evaluation.confidence);
        let rating_change = state.performance().map(|performance| {
            rating_delta(
                request.user.rating,
                request.problem.rating,
                request.viewed_reference_solution,
                performance,
            )
        });
        info!(
            total_score = evaluation.total_score,
            triage = ?state,
            delta = rating_change.map(|change| change.delta),
            "Submission graded."
        );
        EvaluatedSubmission {
            evaluation,
            triage: state,
            rating_change,
        }
    }
}

fn pending_reason(err: EvaluationError) -> PendingReason {
    match err {
        EvaluationError::OracleTimeout => PendingReason::OracleTimeout,
        EvaluationError::OracleUnavailable(detail) => PendingReason::OracleUnavailable { detail },
        EvaluationError::MalformedOracleResponse(detail) => {
            PendingReason::MalformedResponse { detail }
        }
    }
}
