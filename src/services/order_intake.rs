//! Order intake
//!
//! Validates an incoming order and stores its lines as Pending. Orders are
//! accepted whole or not at all: line numbers must run 1..=N without gaps or
//! repeats, and an order number can only be taken in once.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::entities::{order_lines, prelude::OrderLines};
use crate::models::order_line::{LineStatus, TransactionType};
use crate::services::location_index::WarehouseLocationIndex;

/// Source recorded for orders that come in through the HTTP API
pub const API_SOURCE: &str = "API";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    #[serde(default = "default_source")]
    pub source: String,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub order_line: i32,
    pub transaction_type: String,
    pub item: String,
    pub quantity: Decimal,
    /// WMS location, translated to a bin via the location index
    #[serde(default)]
    pub location: Option<String>,
}

fn default_source() -> String {
    API_SOURCE.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Order number must not be empty")]
    MissingOrderNumber,
    #[error("Order {0} has no lines")]
    NoLines(String),
    #[error("Order {0} already exists")]
    Duplicate(String),
    #[error("Order {order_number} has missing lines: {missing:?}")]
    MissingLines {
        order_number: String,
        missing: Vec<i32>,
    },
    #[error("Order {order_number} line {order_line}: {reason}")]
    InvalidLine {
        order_number: String,
        order_line: i32,
        reason: String,
    },
    #[error("Database error: {0}")]
    Store(#[from] DbErr),
}

/// Line after validation, ready to insert
#[derive(Debug, Clone, PartialEq)]
struct ValidatedLine {
    order_line: i32,
    transaction_type: TransactionType,
    item: String,
    quantity: Decimal,
    location: Option<String>,
}

fn validate(order: &NewOrder) -> Result<Vec<ValidatedLine>, IntakeError> {
    let order_number = order.order_number.trim();
    if order_number.is_empty() {
        return Err(IntakeError::MissingOrderNumber);
    }
    if order.lines.is_empty() {
        return Err(IntakeError::NoLines(order_number.to_string()));
    }

    let invalid = |order_line: i32, reason: &str| IntakeError::InvalidLine {
        order_number: order_number.to_string(),
        order_line,
        reason: reason.to_string(),
    };

    let mut seen = BTreeSet::new();
    let mut validated = Vec::with_capacity(order.lines.len());

    for line in &order.lines {
        if line.order_line < 1 {
            return Err(invalid(line.order_line, "line numbers start at 1"));
        }
        if !seen.insert(line.order_line) {
            return Err(invalid(line.order_line, "line number repeated"));
        }
        if line.item.trim().is_empty() {
            return Err(invalid(line.order_line, "item is empty"));
        }
        if line.quantity <= Decimal::ZERO {
            return Err(invalid(line.order_line, "quantity must be positive"));
        }
        let transaction_type: TransactionType = line
            .transaction_type
            .parse()
            .map_err(|e: String| invalid(line.order_line, &e))?;

        validated.push(ValidatedLine {
            order_line: line.order_line,
            transaction_type,
            item: line.item.trim().to_string(),
            quantity: line.quantity,
            location: line
                .location
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned),
        });
    }

    let max_line = seen.iter().next_back().copied().unwrap_or(0);
    let missing: Vec<i32> = (1..=max_line).filter(|n| !seen.contains(n)).collect();
    if !missing.is_empty() {
        return Err(IntakeError::MissingLines {
            order_number: order_number.to_string(),
            missing,
        });
    }

    validated.sort_by_key(|l| l.order_line);
    Ok(validated)
}

#[derive(Clone)]
pub struct OrderIntakeService {
    db: DatabaseConnection,
}

impl OrderIntakeService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Validate and store an order, returning the inserted lines
    pub async fn create_order(
        &self,
        order: NewOrder,
    ) -> Result<Vec<order_lines::Model>, IntakeError> {
        let lines = validate(&order)?;
        let order_number = order.order_number.trim().to_string();

        let existing = OrderLines::find()
            .filter(order_lines::Column::OrderNumber.eq(order_number.as_str()))
            .count(&self.db)
            .await?;
        if existing > 0 {
            tracing::info!(order_number = %order_number, "Order already exists in the system, skipping");
            return Err(IntakeError::Duplicate(order_number));
        }

        let locations = WarehouseLocationIndex::load(&self.db).await?;
        let inserted_at = Utc::now().fixed_offset();

        let txn = self.db.begin().await?;
        let mut created = Vec::with_capacity(lines.len());

        for line in lines {
            let bin_location = line
                .location
                .as_deref()
                .and_then(|location| locations.resolve(location))
                .map(str::to_owned);

            let model = order_lines::ActiveModel {
                order_number: Set(order_number.clone()),
                transaction_type: Set(line.transaction_type),
                item: Set(line.item),
                requested_qty: Set(line.quantity),
                order_line: Set(line.order_line),
                status: Set(LineStatus::Pending),
                actual_qty: Set(None),
                shortage_qty: Set(None),
                picked_by: Set(None),
                api_error: Set(None),
                source: Set(order.source.clone()),
                wms_location: Set(line.location),
                bin_location: Set(bin_location),
                inserted_at: Set(inserted_at),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            tracing::debug!(
                order_number = %model.order_number,
                order_line = model.order_line,
                item = %model.item,
                quantity = %model.requested_qty,
                bin = ?model.bin_location,
                "Created order line"
            );
            created.push(model);
        }

        txn.commit().await?;

        tracing::info!(order_number = %order_number, lines = created.len(), "Order taken in");
        Ok(created)
    }
}
