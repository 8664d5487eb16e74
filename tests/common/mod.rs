#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment_backend::entities::order_lines;
use fulfillment_backend::models::history::{HistoryEvent, HistoryKind};
use fulfillment_backend::models::order_line::{LineStatus, TransactionType};
use fulfillment_backend::models::submission::OrderSubmission;
use fulfillment_backend::services::execution_api::{ExecutionApi, ExecutionApiError};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

/// Fresh in-memory SQLite database with all migrations applied.
///
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// Order line to seed directly into the store
pub struct LineSeed {
    pub order_number: &'static str,
    pub order_line: i32,
    pub item: &'static str,
    pub requested_qty: Decimal,
    pub transaction_type: TransactionType,
    pub status: LineStatus,
    pub api_error: Option<&'static str>,
    pub bin_location: Option<&'static str>,
    pub inserted_at: DateTime<Utc>,
}

impl LineSeed {
    pub fn pick(order_number: &'static str, order_line: i32, item: &'static str, qty: Decimal) -> Self {
        Self {
            order_number,
            order_line,
            item,
            requested_qty: qty,
            transaction_type: TransactionType::Pick,
            status: LineStatus::Sent,
            api_error: None,
            bin_location: None,
            inserted_at: Utc::now(),
        }
    }

    pub fn status(mut self, status: LineStatus) -> Self {
        self.status = status;
        self
    }

    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn api_error(mut self, message: &'static str) -> Self {
        self.api_error = Some(message);
        self
    }

    pub fn bin(mut self, bin: &'static str) -> Self {
        self.bin_location = Some(bin);
        self
    }

    pub fn inserted_at(mut self, at: DateTime<Utc>) -> Self {
        self.inserted_at = at;
        self
    }
}

pub async fn insert_line(db: &DatabaseConnection, seed: LineSeed) -> order_lines::Model {
    order_lines::ActiveModel {
        order_number: Set(seed.order_number.to_string()),
        transaction_type: Set(seed.transaction_type),
        item: Set(seed.item.to_string()),
        requested_qty: Set(seed.requested_qty),
        order_line: Set(seed.order_line),
        status: Set(seed.status),
        actual_qty: Set(None),
        shortage_qty: Set(None),
        picked_by: Set(None),
        api_error: Set(seed.api_error.map(str::to_owned)),
        source: Set("TEST".to_string()),
        wms_location: Set(None),
        bin_location: Set(seed.bin_location.map(str::to_owned)),
        inserted_at: Set(seed.inserted_at.fixed_offset()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert order line")
}

pub async fn reload(db: &DatabaseConnection, id: i32) -> order_lines::Model {
    order_lines::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("Failed to load order line")
        .expect("Order line missing")
}

pub fn confirmed(id: i64, order_type: i32, item: &str, line: i32, qty: Decimal) -> HistoryEvent {
    HistoryEvent {
        id,
        order_type,
        history_type: HistoryKind::CONFIRMED_CODE,
        item_name: Some(item.to_string()),
        order_line_number: Some(line),
        quantity_confirmed: Some(qty),
        quantity_requested: None,
        user: Some("picker01".to_string()),
    }
}

pub fn shortage(id: i64, order_type: i32, item: &str, line: i32, qty: Decimal) -> HistoryEvent {
    HistoryEvent {
        id,
        order_type,
        history_type: HistoryKind::SHORTAGE_CODE,
        item_name: Some(item.to_string()),
        order_line_number: Some(line),
        quantity_confirmed: Some(Decimal::ZERO),
        quantity_requested: Some(qty),
        user: None,
    }
}

/// In-process execution system with scripted answers
#[derive(Default)]
pub struct ScriptedExecutionApi {
    histories: Mutex<HashMap<String, Vec<HistoryEvent>>>,
    broken_histories: Mutex<HashSet<String>>,
    hanging_histories: Mutex<HashSet<String>>,
    rejected_orders: Mutex<HashSet<String>>,
    submissions: Mutex<Vec<OrderSubmission>>,
    history_gate: Mutex<Option<Arc<Barrier>>>,
    history_calls: AtomicUsize,
}

impl ScriptedExecutionApi {
    pub fn set_history(&self, order_number: &str, events: Vec<HistoryEvent>) {
        self.histories
            .lock()
            .unwrap()
            .insert(order_number.to_string(), events);
    }

    /// History calls for this order fail with a connection error
    pub fn break_history(&self, order_number: &str) {
        self.broken_histories
            .lock()
            .unwrap()
            .insert(order_number.to_string());
    }

    /// History calls for this order never answer
    pub fn hang_history(&self, order_number: &str) {
        self.hanging_histories
            .lock()
            .unwrap()
            .insert(order_number.to_string());
    }

    /// Every history call waits on `barrier` before answering
    pub fn gate_history(&self, barrier: Arc<Barrier>) {
        *self.history_gate.lock().unwrap() = Some(barrier);
    }

    pub fn reject_order(&self, order_number: &str) {
        self.rejected_orders
            .lock()
            .unwrap()
            .insert(order_number.to_string());
    }

    pub fn accept_order(&self, order_number: &str) {
        self.rejected_orders.lock().unwrap().remove(order_number);
    }

    pub fn submissions(&self) -> Vec<OrderSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionApi for ScriptedExecutionApi {
    async fn submit_order(&self, order: &OrderSubmission) -> Result<(), ExecutionApiError> {
        if self.rejected_orders.lock().unwrap().contains(&order.name) {
            return Err(ExecutionApiError::Connection("connection refused".to_string()));
        }
        self.submissions.lock().unwrap().push(order.clone());
        Ok(())
    }

    async fn history(&self, order_number: &str) -> Result<Vec<HistoryEvent>, ExecutionApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.history_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let hanging = self.hanging_histories.lock().unwrap().contains(order_number);
        if hanging {
            std::future::pending::<()>().await;
        }

        if self.broken_histories.lock().unwrap().contains(order_number) {
            return Err(ExecutionApiError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(order_number)
            .cloned()
            .unwrap_or_default())
    }
}
