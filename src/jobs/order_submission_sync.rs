//! Order Submission Sync Job
//!
//! Periodically pushes Pending order lines to the execution system.

use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::services::order_submitter::OrderSubmitter;

/// Start the order submission job
pub async fn start_order_submission_job(submitter: OrderSubmitter, every: Duration) {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "Order submission job started");

        let mut interval = interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping order submission job");
                    break;
                }
                _ = interval.tick() => {
                    match submitter.submit_pending().await {
                        Ok(summary) => info!(summary = %summary, "Order submission completed"),
                        Err(e) => error!(error = %e, "Critical error in order submission"),
                    }
                }
            }
        }

        info!("Order submission job stopped");
    });
}
