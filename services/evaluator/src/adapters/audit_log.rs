//! services/evaluator/src/adapters/audit_log.rs
//!
//! Fire-and-forget audit logging. Admission decisions hand their events to an
//! unbounded channel; a background worker drains it into an `AuditStore`, so a
//! slow or failing store never delays a decision.

use async_trait::async_trait;
use grading_core::{
    domain::AuditEvent,
    ports::{AuditSink, AuditStore, PortError, PortResult},
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info};

//=========================================================================================
// The Queued Sink
//=========================================================================================

#[derive(Clone)]
pub struct QueuedAuditLog {
    sender: mpsc::UnboundedSender<AuditEvent>,
}

impl QueuedAuditLog {
    /// Starts the background writer. The worker exits once every clone of the
    /// returned sink has been dropped and the queue is drained.
    pub fn spawn(store: Arc<dyn AuditStore>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditEvent>();
        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(e) = store.append(&event).await {
                    error!(
                        error = %e,
                        user_id = %event.user_id,
                        action = event.action_type.as_str(),
                        "Failed to persist audit event."
                    );
                }
            }
            info!("Audit log worker stopped.");
        });
        (Self { sender }, handle)
    }
}

impl AuditSink for QueuedAuditLog {
    fn enqueue(&self, event: AuditEvent) -> PortResult<()> {
        self.sender
            .send(event)
            .map_err(|_| PortError::Unexpected("Audit log worker has shut down.".to_string()))
    }
}

//=========================================================================================
// A Store That Writes To The Log
//=========================================================================================

/// Records audit events as structured log lines. Used when no database is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditStore;

#[async_trait]
impl AuditStore for TracingAuditStore {
    async fn append(&self, event: &AuditEvent) -> PortResult<()> {
        info!(
            target: "audit",
            user_id = %event.user_id,
            action = event.action_type.as_str(),
            rate_limit_hit = event.rate_limit_hit,
            timestamp = %event.timestamp,
            "Admission event."
        );
        Ok(())
    }
}
