//! Order submission
//!
//! Pushes Pending lines to the execution system one order at a time. Lines
//! are renumbered 1..N in insertion order for the payload. The whole order
//! moves together: Sent on success, Processing with the error recorded on
//! failure. A failed order stays in Processing until it is reset by hand or
//! the reconciler's timeout sweep completes it.

use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::entities::order_lines;
use crate::models::order_line::Transition;
use crate::models::submission::{OrderSubmission, SubmissionLine};
use crate::services::execution_api::{ExecutionApi, ExecutionApiError};
use crate::services::order_store;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Database error: {0}")]
    Store(#[from] DbErr),
}

/// Counts from one submission run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub orders_sent: usize,
    pub orders_failed: usize,
    pub lines_sent: u64,
    pub lines_failed: u64,
}

impl std::fmt::Display for SubmissionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.orders_sent == 0 && self.orders_failed == 0 {
            return write!(f, "No orders to process");
        }
        write!(
            f,
            "Sent {} orders ({} lines), {} failed ({} lines)",
            self.orders_sent, self.lines_sent, self.orders_failed, self.lines_failed
        )
    }
}

/// Message stored in `api_error` when an order could not be submitted
pub fn submission_error_message(order_number: &str, err: &ExecutionApiError) -> String {
    match err {
        ExecutionApiError::Timeout(_) => {
            format!("Timeout while connecting to API for order {}", order_number)
        }
        ExecutionApiError::Connection(detail) => {
            format!("Connection error for order {}: {}", order_number, detail)
        }
        other => format!("API error for order {}: {}", order_number, other),
    }
}

/// Build the execution payload for one order's Pending lines
pub fn build_submission(
    order_number: &str,
    warehouse: &str,
    lines: &[order_lines::Model],
) -> Option<OrderSubmission> {
    let first = lines.first()?;

    if lines
        .iter()
        .any(|l| l.transaction_type != first.transaction_type)
    {
        warn!(
            order_number,
            transaction_type = %first.transaction_type,
            "Order mixes transaction types, submitting with the first line's type"
        );
    }

    let order_lines = lines
        .iter()
        .enumerate()
        .map(|(index, line)| SubmissionLine {
            line_number: index as i32 + 1,
            item: line.item.clone(),
            quantity: line.requested_qty,
            suggested_bin: line.bin_location.clone(),
        })
        .collect();

    Some(OrderSubmission {
        name: order_number.to_string(),
        warehouse: warehouse.to_string(),
        order_type: first.transaction_type.order_type_code(),
        order_lines,
    })
}

#[derive(Clone)]
pub struct OrderSubmitter {
    db: DatabaseConnection,
    api: Arc<dyn ExecutionApi>,
    warehouse: String,
}

impl OrderSubmitter {
    pub fn new(db: DatabaseConnection, api: Arc<dyn ExecutionApi>, warehouse: String) -> Self {
        Self { db, api, warehouse }
    }

    /// Submit every order that has Pending lines
    pub async fn submit_pending(&self) -> Result<SubmissionSummary, SubmitError> {
        let order_numbers = order_store::pending_order_numbers(&self.db).await?;
        let mut summary = SubmissionSummary::default();

        if order_numbers.is_empty() {
            info!("No pending orders found");
            return Ok(summary);
        }

        info!(count = order_numbers.len(), warehouse = %self.warehouse, "Found pending orders to process");

        for order_number in order_numbers {
            let lines = order_store::pending_lines(&self.db, &order_number).await?;
            let Some(submission) = build_submission(&order_number, &self.warehouse, &lines) else {
                warn!(order_number = %order_number, "No lines found for order");
                continue;
            };
            let ids: Vec<i32> = lines.iter().map(|l| l.id).collect();

            match self.api.submit_order(&submission).await {
                Ok(()) => {
                    let moved =
                        order_store::apply_transition(&self.db, &ids, &Transition::Submitted)
                            .await?;
                    summary.orders_sent += 1;
                    summary.lines_sent += moved;
                    info!(order_number = %order_number, lines = moved, "Successfully processed order");
                }
                Err(e) => {
                    let message = submission_error_message(&order_number, &e);
                    error!(order_number = %order_number, error = %e, "{}", message);
                    let moved = order_store::apply_transition(
                        &self.db,
                        &ids,
                        &Transition::SubmissionFailed(message),
                    )
                    .await?;
                    summary.orders_failed += 1;
                    summary.lines_failed += moved;
                }
            }
        }

        Ok(summary)
    }
}
