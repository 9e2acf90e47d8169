//! crates/grading_core/src/evaluation/mod.rs
//!
//! The evaluation orchestrator: builds a scoring request, sends it through the
//! [`GradingOracle`] port and validates what comes back.

pub mod cost;
pub mod parse;
pub mod prompt;
pub mod wire;

use std::sync::Arc;
use tracing::info;

use crate::domain::EvaluationResult;
use crate::ports::{GradingOracle, PortError};

pub use cost::{evaluation_cost, pricing_for, ModelPricing};
pub use parse::{apply_safety_downgrade, fallback_feedback, parse_evaluation, ResponseMeta};
pub use prompt::{build_request, supports_images, EvaluationInput, MULTIMODAL_MODELS};
pub use wire::{
    ContentPart, ImageUrl, MessageContent, OracleMessage, OracleRequest, OracleResponse,
    TokenUsage,
};

/// Default grading model: cheap, and accepts rendered images.
pub const DEFAULT_MODEL: &str = "google/gemini-flash-1.5";

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// The oracle could not be reached or answered with a non-success status.
    #[error("Grading oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("Grading oracle timed out")]
    OracleTimeout,
    /// The reply could not be read as a structured record.
    #[error("Malformed oracle response: {0}")]
    MalformedOracleResponse(String),
}

impl From<PortError> for EvaluationError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Timeout => EvaluationError::OracleTimeout,
            PortError::Malformed(detail) => EvaluationError::MalformedOracleResponse(detail),
            other => EvaluationError::OracleUnavailable(other.to_string()),
        }
    }
}

/// Drives one evaluation against a fixed model.
#[derive(Clone)]
pub struct EvaluationOrchestrator {
    oracle: Arc<dyn GradingOracle>,
    model: String,
}

impl EvaluationOrchestrator {
    pub fn new(oracle: Arc<dyn GradingOracle>, model: impl Into<String>) -> Self {
        Self {
            oracle,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_request(&self, input: &EvaluationInput) -> OracleRequest {
        build_request(input, &self.model)
    }

    /// A single call to the oracle. Failures are returned, never retried here.
    pub async fn invoke(&self, request: &OracleRequest) -> Result<OracleResponse, EvaluationError> {
        Ok(self.oracle.invoke(request).await?)
    }

    /// Validates a raw envelope into an [`EvaluationResult`].
    pub fn parse_response(
        &self,
        response: &OracleResponse,
    ) -> Result<EvaluationResult, EvaluationError> {
        let content = response.first_content().ok_or_else(|| {
            EvaluationError::MalformedOracleResponse(
                "response contained no message content".to_string(),
            )
        })?;
        let model_used = response.model.as_deref().unwrap_or(&self.model);
        parse_evaluation(
            content,
            ResponseMeta {
                model_used,
                usage: response.usage.unwrap_or_default(),
            },
        )
    }

    /// Build, invoke and parse in sequence.
    pub async fn evaluate(
        &self,
        input: &EvaluationInput,
    ) -> Result<EvaluationResult, EvaluationError> {
        let request = self.build_request(input);
        info!(
            model = %self.model,
            images = request.image_count(),
            "Dispatching evaluation request."
        );
        let response = self.invoke(&request).await?;
        let result = self.parse_response(&response)?;
        info!(
            total_score = result.total_score,
            confidence = result.confidence.as_str(),
            cost_usd = result.cost_usd,
            "Evaluation parsed."
        );
        Ok(result)
    }
}
