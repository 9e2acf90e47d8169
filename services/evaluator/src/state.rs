//! services/evaluator/src/state.rs
//!
//! Defines the engine's shared state, built once at startup.

use crate::{
    adapters::OpenRouterOracle, config::Config, error::EvaluatorError, pipeline::SubmissionPipeline,
};
use grading_core::{
    admission::{ActionLimits, AdmissionController, LimitTable},
    domain::ActionType,
    evaluation::EvaluationOrchestrator,
    ports::{AuditSink, Clock},
};
use std::sync::Arc;

/// The shared engine state. Everything behind a port is held as a trait object.
#[derive(Clone)]
pub struct EngineState {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub submission_gate: Arc<AdmissionController>,
    pub oracle_gate: Arc<AdmissionController>,
    pub pipeline: Arc<SubmissionPipeline>,
}

impl EngineState {
    /// Wires the OpenRouter adapter, both admission gates and the pipeline.
    pub fn from_config(
        config: Arc<Config>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, EvaluatorError> {
        let oracle = Arc::new(OpenRouterOracle::from_config(&config)?);

        let submission_gate = Arc::new(AdmissionController::new(
            ActionType::Submission,
            LimitTable::submissions(),
            clock.clone(),
            audit.clone(),
        ));
        let oracle_gate = Arc::new(AdmissionController::new(
            ActionType::OracleEvaluation,
            LimitTable::flat(ActionLimits {
                hourly: config.oracle_hourly_limit,
                daily: config.oracle_daily_limit,
                cooldown_ms: 0,
            }),
            clock.clone(),
            audit,
        ));

        let orchestrator =
            EvaluationOrchestrator::new(oracle.clone(), config.grading_model.clone());
        let pipeline = SubmissionPipeline::new(
            submission_gate.clone(),
            oracle_gate.clone(),
            orchestrator,
            config.oracle_timeout,
        )
        .with_budget(oracle);

        Ok(Self {
            config,
            clock,
            submission_gate,
            oracle_gate,
            pipeline: Arc::new(pipeline),
        })
    }

    /// The controllers the prune task should sweep.
    pub fn admission_controllers(&self) -> Vec<Arc<AdmissionController>> {
        vec![self.submission_gate.clone(), self.oracle_gate.clone()]
    }
}
