//! Order line store
//!
//! All status changes go through single-statement conditional updates guarded
//! by [`Transition::sources`]: a row only moves when it is still in a status
//! the transition accepts. Zero rows affected means another pass (or another
//! process) already moved the line.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveEnum, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::{order_lines, prelude::OrderLines};
use crate::models::order_line::{
    InvalidTransition, LineStatus, Resolution, TransactionType, Transition,
};

/// Values written when the history feed is folded into a line
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentUpdate {
    pub actual_qty: Decimal,
    pub shortage_qty: Option<Decimal>,
    pub picked_by: Option<String>,
    pub resolution: Resolution,
}

/// Result of a manual reset request
#[derive(Debug)]
pub enum ResetOutcome {
    Reset(order_lines::Model),
    NotFound,
    Rejected(InvalidTransition),
}

fn status_filter(transition: &Transition) -> SimpleExpr {
    order_lines::Column::Status.is_in(transition.sources().iter().copied())
}

/// Distinct order numbers that still have Pending lines
pub async fn pending_order_numbers(db: &DatabaseConnection) -> Result<Vec<String>, DbErr> {
    OrderLines::find()
        .select_only()
        .column(order_lines::Column::OrderNumber)
        .filter(order_lines::Column::Status.eq(LineStatus::Pending))
        .distinct()
        .order_by_asc(order_lines::Column::OrderNumber)
        .into_tuple::<String>()
        .all(db)
        .await
}

/// Pending lines of one order in insertion order
pub async fn pending_lines(
    db: &DatabaseConnection,
    order_number: &str,
) -> Result<Vec<order_lines::Model>, DbErr> {
    OrderLines::find()
        .filter(order_lines::Column::OrderNumber.eq(order_number))
        .filter(order_lines::Column::Status.eq(LineStatus::Pending))
        .order_by_asc(order_lines::Column::Id)
        .all(db)
        .await
}

/// Move the given lines through `transition`, skipping any no longer in a
/// source status. Returns the number of lines moved.
///
/// Works line by line. Exports go through [`export_order`], which gates on
/// the whole order.
pub async fn apply_transition(
    db: &DatabaseConnection,
    ids: &[i32],
    transition: &Transition,
) -> Result<u64, DbErr> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut changes = order_lines::ActiveModel {
        status: Set(transition.target_status()),
        ..Default::default()
    };
    if let Some(api_error) = transition.api_error_update() {
        changes.api_error = Set(api_error);
    }

    let result = OrderLines::update_many()
        .set(changes)
        .filter(order_lines::Column::Id.is_in(ids.iter().copied()))
        .filter(status_filter(transition))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Force-complete Processing lines inserted before `cutoff`
pub async fn sweep_timed_out(
    db: &DatabaseConnection,
    cutoff: DateTime<FixedOffset>,
) -> Result<u64, DbErr> {
    let transition = Transition::TimedOut;

    let result = OrderLines::update_many()
        .set(order_lines::ActiveModel {
            status: Set(transition.target_status()),
            ..Default::default()
        })
        .filter(status_filter(&transition))
        .filter(order_lines::Column::InsertedAt.lt(cutoff))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Sent lines inserted before `cutoff`. They are outside both the sweep and
/// the candidate scan, so only a manual reset moves them again.
pub async fn count_stale_sent(
    db: &DatabaseConnection,
    cutoff: DateTime<FixedOffset>,
) -> Result<u64, DbErr> {
    OrderLines::find()
        .filter(order_lines::Column::Status.eq(LineStatus::Sent))
        .filter(order_lines::Column::InsertedAt.lt(cutoff))
        .count(db)
        .await
}

/// Distinct `(order_number, transaction_type)` pairs with lines awaiting
/// confirmation that were inserted at or after `cutoff`
pub async fn reconciliation_candidates(
    db: &DatabaseConnection,
    cutoff: DateTime<FixedOffset>,
) -> Result<Vec<(String, TransactionType)>, DbErr> {
    let rows = OrderLines::find()
        .select_only()
        .column(order_lines::Column::OrderNumber)
        .column(order_lines::Column::TransactionType)
        .filter(status_filter(&Transition::Confirmed(
            Resolution::AwaitingConfirmation,
        )))
        .filter(order_lines::Column::InsertedAt.gte(cutoff))
        .distinct()
        .order_by_asc(order_lines::Column::OrderNumber)
        .order_by_asc(order_lines::Column::TransactionType)
        .into_tuple::<(String, String)>()
        .all(db)
        .await?;

    let mut candidates = Vec::with_capacity(rows.len());
    for (order_number, raw_type) in rows {
        match TransactionType::try_from_value(&raw_type) {
            Ok(transaction_type) => candidates.push((order_number, transaction_type)),
            Err(e) => {
                tracing::warn!(order_number = %order_number, transaction_type = %raw_type, error = %e, "Skipping order with unknown transaction type");
            }
        }
    }

    Ok(candidates)
}

/// Line awaiting confirmation matching a history key
pub async fn find_active_line(
    db: &DatabaseConnection,
    order_number: &str,
    item: &str,
    order_line: i32,
    transaction_type: TransactionType,
) -> Result<Option<order_lines::Model>, DbErr> {
    OrderLines::find()
        .filter(order_lines::Column::OrderNumber.eq(order_number))
        .filter(order_lines::Column::Item.eq(item))
        .filter(order_lines::Column::OrderLine.eq(order_line))
        .filter(order_lines::Column::TransactionType.eq(transaction_type))
        .filter(status_filter(&Transition::Confirmed(
            Resolution::AwaitingConfirmation,
        )))
        .one(db)
        .await
}

/// Write aggregated quantities and the resolved status to one line.
///
/// Returns false when the line had already left Sent/Processing.
pub async fn record_fulfillment(
    db: &DatabaseConnection,
    line_id: i32,
    update: &FulfillmentUpdate,
) -> Result<bool, DbErr> {
    let transition = Transition::Confirmed(update.resolution);

    let mut changes = order_lines::ActiveModel {
        status: Set(transition.target_status()),
        actual_qty: Set(Some(update.actual_qty)),
        shortage_qty: Set(update.shortage_qty),
        ..Default::default()
    };
    if let Some(user) = update.picked_by.as_ref() {
        changes.picked_by = Set(Some(user.clone()));
    }

    let result = OrderLines::update_many()
        .set(changes)
        .filter(order_lines::Column::Id.eq(line_id))
        .filter(status_filter(&transition))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

pub async fn find_line(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<order_lines::Model>, DbErr> {
    OrderLines::find_by_id(id).one(db).await
}

/// Manual recovery: put a Sent/Processing line back to Pending so the next
/// submission run picks it up again
pub async fn reset_line(db: &DatabaseConnection, id: i32) -> Result<ResetOutcome, DbErr> {
    let Some(line) = find_line(db, id).await? else {
        return Ok(ResetOutcome::NotFound);
    };

    let transition = Transition::Reset;
    if let Err(e) = line.state().apply(&transition) {
        return Ok(ResetOutcome::Rejected(e));
    }

    if apply_transition(db, &[id], &transition).await? == 0 {
        // Moved between the read and the write; report what it is now
        let current = find_line(db, id).await?;
        return Ok(match current {
            Some(line) => ResetOutcome::Rejected(InvalidTransition {
                from: line.status,
                transition: transition.name(),
            }),
            None => ResetOutcome::NotFound,
        });
    }

    Ok(match find_line(db, id).await? {
        Some(line) => ResetOutcome::Reset(line),
        None => ResetOutcome::NotFound,
    })
}

/// Number of lines per status
pub async fn status_counts(db: &DatabaseConnection) -> Result<Vec<(LineStatus, i64)>, DbErr> {
    let rows = OrderLines::find()
        .select_only()
        .column(order_lines::Column::Status)
        .column_as(Expr::col(order_lines::Column::Id).count(), "count")
        .group_by(order_lines::Column::Status)
        .into_tuple::<(i32, i64)>()
        .all(db)
        .await?;

    rows.into_iter()
        .map(|(code, count)| Ok((LineStatus::try_from_value(&code)?, count)))
        .collect()
}

/// Mark an order Exported once it is fully fulfilled.
///
/// Nothing moves while any line is still Pending, Sent or Processing; lines
/// already Exported are left as they are. Returns the number of lines moved.
pub async fn export_order(db: &DatabaseConnection, order_number: &str) -> Result<u64, DbErr> {
    let lines = OrderLines::find()
        .filter(order_lines::Column::OrderNumber.eq(order_number))
        .all(db)
        .await?;

    let unfinished = lines
        .iter()
        .filter(|l| !matches!(l.status, LineStatus::Complete | LineStatus::Exported))
        .count();
    if unfinished > 0 {
        tracing::debug!(order_number, unfinished, "Order not ready for export");
        return Ok(0);
    }

    let ids: Vec<i32> = lines
        .iter()
        .filter(|l| l.status == LineStatus::Complete)
        .map(|l| l.id)
        .collect();

    apply_transition(db, &ids, &Transition::Exported).await
}
