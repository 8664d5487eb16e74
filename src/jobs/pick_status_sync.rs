//! Pick Status Sync Job
//!
//! Periodically folds the execution system's history feed into order lines.
//! Runs one batch per tick; a slow batch delays the next tick instead of
//! overlapping it. Supports graceful shutdown via SIGINT.

use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::services::pick_reconciler::PickReconciler;

/// Start the pick status sync job
///
/// Spawns a background task that runs [`PickReconciler::reconcile_batch`]
/// every `every` until the process is asked to stop.
pub async fn start_pick_status_job(reconciler: PickReconciler, every: Duration) {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "Pick status sync job started");

        let mut interval = interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping pick status sync job");
                    break;
                }
                _ = interval.tick() => {
                    info!("Starting pick status check");

                    match reconciler.reconcile_batch().await {
                        Ok(summary) => info!(summary = %summary, "Pick status check completed"),
                        Err(e) => {
                            // Next tick starts over from the store
                            error!(error = %e, "Pick status check aborted");
                        }
                    }
                }
            }
        }

        info!("Pick status sync job stopped");
    });
}
