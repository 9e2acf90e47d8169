//! crates/grading_core/src/ports.rs
//!
//! Defines the service contracts (traits) at the edge of the evaluation engine.
//! These traits keep the core independent of the HTTP client, the audit store
//! and the wall clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use crate::domain::AuditEvent;
use crate::evaluation::{OracleRequest, OracleResponse};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, storage).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The remote service answered with a non-success status or could not be reached.
    #[error("Service unavailable (status {status:?}): {body}")]
    Unavailable { status: Option<u16>, body: String },
    /// The remote service answered, but not with the expected envelope.
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Request timed out")]
    Timeout,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait GradingOracle: Send + Sync {
    /// Sends one scoring request and returns the provider's raw envelope.
    async fn invoke(&self, request: &OracleRequest) -> PortResult<OracleResponse>;
}

/// Spend so far today against the configured ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetStatus {
    pub exceeded: bool,
    pub used_usd: f64,
    pub limit_usd: f64,
}

#[async_trait]
pub trait OracleBudget: Send + Sync {
    /// Never fails: an unreachable usage endpoint reports "not exceeded".
    async fn check_daily_budget(&self) -> BudgetStatus;
}

/// Accepts audit events without waiting for them to be stored.
pub trait AuditSink: Send + Sync {
    fn enqueue(&self, event: AuditEvent) -> PortResult<()>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persists a single admission event.
    async fn append(&self, event: &AuditEvent) -> PortResult<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

//=========================================================================================
// Clocks
//=========================================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used for deterministic scheduling and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = instant;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
