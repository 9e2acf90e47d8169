pub mod audit_log;
pub mod openrouter;

pub use audit_log::{QueuedAuditLog, TracingAuditStore};
pub use openrouter::OpenRouterOracle;
