//! Pick status reconciliation
//!
//! One batch:
//! 1. Timeout sweep: Processing lines older than the timeout window are
//!    force-completed, whatever their quantities. This is the escape valve for
//!    lines the execution system never terminates, including orders whose
//!    submission failed for good.
//! 2. Candidates: distinct (order, transaction type) pairs with Sent or
//!    Processing lines inside the window.
//! 3. Each candidate's history feed is fetched (bounded concurrency, per-call
//!    timeout). A failed fetch skips the order until the next batch.
//! 4. The feed is aggregated per line and each matching line is resolved with
//!    a conditional update.
//!
//! Nothing is carried between batches; an aborted batch is simply redone by
//! the next one.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::FulfillmentConfig;
use crate::models::order_line::{Resolution, TransactionType, Transition};
use crate::services::execution_api::ExecutionApi;
use crate::services::order_store::{self, FulfillmentUpdate};
use crate::services::pick_aggregation::aggregate_history;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    Store(#[from] DbErr),
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Lines older than this are no longer reconciled; Processing ones are swept
    pub timeout_window: chrono::Duration,
    /// Upper bound on a single history fetch
    pub call_timeout: Duration,
    /// History fetches in flight at once
    pub concurrency: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            timeout_window: chrono::Duration::days(1),
            call_timeout: Duration::from_secs(30),
            concurrency: 4,
        }
    }
}

impl From<&FulfillmentConfig> for ReconcilerSettings {
    fn from(config: &FulfillmentConfig) -> Self {
        Self {
            timeout_window: chrono::Duration::days(config.timeout_days),
            call_timeout: config.api_timeout,
            concurrency: config.reconcile_concurrency,
        }
    }
}

/// Counts from one batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub timed_out: u64,
    /// Sent lines past the window; never fetched or swept again
    pub stale_sent: u64,
    pub orders_checked: usize,
    pub orders_failed: usize,
    pub lines_completed: usize,
    pub lines_processing: usize,
    pub lines_unmatched: usize,
    /// Lines that left Sent/Processing between lookup and update
    pub lines_raced: usize,
}

impl ReconcileSummary {
    fn absorb(&mut self, order: OrderOutcome) {
        if order.fetch_failed {
            self.orders_failed += 1;
        } else {
            self.orders_checked += 1;
        }
        self.lines_completed += order.completed;
        self.lines_processing += order.processing;
        self.lines_unmatched += order.unmatched;
        self.lines_raced += order.raced;
    }
}

impl std::fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.timed_out == 0 && self.orders_checked == 0 && self.orders_failed == 0 {
            return write!(f, "No sent orders found to check");
        }
        write!(
            f,
            "Checked {} orders ({} failed): {} lines complete, {} processing, {} unmatched, {} already moved; {} lines timed out",
            self.orders_checked,
            self.orders_failed,
            self.lines_completed,
            self.lines_processing,
            self.lines_unmatched,
            self.lines_raced,
            self.timed_out
        )
    }
}

#[derive(Debug, Default)]
struct OrderOutcome {
    fetch_failed: bool,
    completed: usize,
    processing: usize,
    unmatched: usize,
    raced: usize,
}

#[derive(Clone)]
pub struct PickReconciler {
    db: DatabaseConnection,
    api: Arc<dyn ExecutionApi>,
    settings: ReconcilerSettings,
}

impl PickReconciler {
    pub fn new(
        db: DatabaseConnection,
        api: Arc<dyn ExecutionApi>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self { db, api, settings }
    }

    pub async fn reconcile_batch(&self) -> Result<ReconcileSummary, ReconcileError> {
        self.reconcile_batch_at(Utc::now()).await
    }

    /// Run one batch as of `now`
    pub async fn reconcile_batch_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ReconcileSummary, ReconcileError> {
        let cutoff = (now - self.settings.timeout_window).fixed_offset();

        let timed_out = order_store::sweep_timed_out(&self.db, cutoff).await?;
        if timed_out > 0 {
            warn!(
                count = timed_out,
                cutoff = %cutoff,
                "Force-completed Processing lines past the timeout window"
            );
        }

        let stale_sent = order_store::count_stale_sent(&self.db, cutoff).await?;
        if stale_sent > 0 {
            warn!(
                count = stale_sent,
                cutoff = %cutoff,
                "Sent lines past the timeout window need a manual reset"
            );
        }

        let candidates = order_store::reconciliation_candidates(&self.db, cutoff).await?;
        let summary = ReconcileSummary {
            timed_out,
            stale_sent,
            ..Default::default()
        };

        if candidates.is_empty() {
            debug!("No sent orders found to check");
            return Ok(summary);
        }

        info!(count = candidates.len(), "Checking pick status for orders");

        stream::iter(candidates)
            .map(|(order_number, transaction_type)| {
                self.reconcile_order(order_number, transaction_type)
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .try_fold(summary, |mut summary, outcome| async move {
                summary.absorb(outcome);
                Ok(summary)
            })
            .await
    }

    async fn reconcile_order(
        &self,
        order_number: String,
        transaction_type: TransactionType,
    ) -> Result<OrderOutcome, ReconcileError> {
        let mut outcome = OrderOutcome::default();

        let fetch = tokio::time::timeout(
            self.settings.call_timeout,
            self.api.history(&order_number),
        )
        .await;

        let events = match fetch {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                if e.is_transport() {
                    error!(order_number = %order_number, error = %e, "API error checking pick status");
                } else {
                    error!(order_number = %order_number, error = %e, "Unreadable history feed");
                }
                outcome.fetch_failed = true;
                return Ok(outcome);
            }
            Err(_) => {
                error!(
                    order_number = %order_number,
                    timeout_secs = self.settings.call_timeout.as_secs(),
                    "History request timed out"
                );
                outcome.fetch_failed = true;
                return Ok(outcome);
            }
        };

        if events.is_empty() {
            debug!(order_number = %order_number, "No history data found");
            return Ok(outcome);
        }

        for fulfillment in aggregate_history(&events, transaction_type) {
            let Some(line) = order_store::find_active_line(
                &self.db,
                &order_number,
                &fulfillment.item,
                fulfillment.order_line,
                transaction_type,
            )
            .await?
            else {
                warn!(
                    order_number = %order_number,
                    item = %fulfillment.item,
                    order_line = fulfillment.order_line,
                    "No matching order line awaiting confirmation"
                );
                outcome.unmatched += 1;
                continue;
            };

            let resolution = fulfillment.resolve(line.requested_qty);
            let next = match line.state().apply(&Transition::Confirmed(resolution)) {
                Ok(next) => next,
                Err(e) => {
                    warn!(line_id = line.id, error = %e, "Line cannot take confirmation");
                    outcome.raced += 1;
                    continue;
                }
            };

            let update = FulfillmentUpdate {
                actual_qty: fulfillment.confirmed_total,
                shortage_qty: fulfillment.latest_shortage,
                picked_by: fulfillment.picked_by.clone(),
                resolution,
            };

            if !order_store::record_fulfillment(&self.db, line.id, &update).await? {
                info!(
                    line_id = line.id,
                    order_number = %order_number,
                    "Line already moved by another pass, skipping"
                );
                outcome.raced += 1;
                continue;
            }

            match resolution {
                Resolution::Complete => outcome.completed += 1,
                Resolution::AwaitingConfirmation => outcome.processing += 1,
            }

            info!(
                order_number = %order_number,
                item = %fulfillment.item,
                order_line = fulfillment.order_line,
                actual_qty = %fulfillment.confirmed_total,
                shortage_qty = %fulfillment.shortage_amount(),
                requested_qty = %line.requested_qty,
                status = %next.status(),
                "Updated order line"
            );
        }

        Ok(outcome)
    }
}
