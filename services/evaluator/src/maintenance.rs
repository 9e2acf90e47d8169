//! services/evaluator/src/maintenance.rs
//!
//! Periodic housekeeping for the in-memory admission windows.

use grading_core::{admission::AdmissionController, ports::Clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Prunes every controller on a fixed period until `cancellation_token` fires.
///
/// The first tick completes immediately, so stale windows restored at startup
/// are dropped right away.
pub fn spawn_prune_task(
    controllers: Vec<Arc<AdmissionController>>,
    clock: Arc<dyn Clock>,
    period: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Prune task cancelled.");
                    return;
                }
                _ = interval.tick() => {
                    let now = clock.now();
                    for controller in &controllers {
                        let removed = controller.prune(now);
                        if removed > 0 {
                            debug!(
                                action = controller.action_type().as_str(),
                                removed,
                                remaining = controller.tracked_keys(),
                                "Pruned idle rate-limit windows."
                            );
                        }
                    }
                }
            }
        }
    })
}
