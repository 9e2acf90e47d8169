//! services/evaluator/src/bin/evaluate.rs
//!
//! Runs one submission bundle (a JSON `SubmissionRequest`) through the engine
//! and prints the outcome as JSON.

use clap::Parser;
use evaluator_lib::{
    adapters::{QueuedAuditLog, TracingAuditStore},
    cli::Args,
    config::Config,
    error::EvaluatorError,
    maintenance::spawn_prune_task,
    pipeline::SubmissionRequest,
    state::EngineState,
};
use grading_core::ports::SystemClock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), EvaluatorError> {
    let args = Args::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(model = %config.grading_model, "Configuration loaded.");

    // --- 2. Read the Submission Bundle ---
    let raw = tokio::fs::read_to_string(&args.submission).await?;
    let request: SubmissionRequest = serde_json::from_str(&raw)?;

    // --- 3. Start Background Workers & Build the Engine ---
    let (audit_log, audit_worker) = QueuedAuditLog::spawn(Arc::new(TracingAuditStore));
    let clock = Arc::new(SystemClock);
    let engine = EngineState::from_config(config.clone(), clock.clone(), Arc::new(audit_log))?;

    let shutdown = CancellationToken::new();
    let prune_task = spawn_prune_task(
        engine.admission_controllers(),
        clock,
        config.prune_interval,
        shutdown.clone(),
    );

    // --- 4. Run the Pipeline ---
    let output = if args.reevaluate {
        serde_json::to_string_pretty(&engine.pipeline.reevaluate(&request).await)?
    } else {
        serde_json::to_string_pretty(&engine.pipeline.process(&request).await)?
    };
    println!("{output}");

    // --- 5. Shut Down ---
    shutdown.cancel();
    prune_task
        .await
        .map_err(|e| EvaluatorError::Internal(format!("Prune task failed: {e}")))?;
    // Dropping the engine releases the last audit sender so the worker can drain and exit.
    drop(engine);
    audit_worker
        .await
        .map_err(|e| EvaluatorError::Internal(format!("Audit worker failed: {e}")))?;

    Ok(())
}
