// src/lib.rs

use sea_orm::DatabaseConnection;
use services::order_intake::OrderIntakeService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub intake: OrderIntakeService,
}

impl AppState {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            intake: OrderIntakeService::new(db.clone()),
            db,
        }
    }
}

pub mod entities {
    pub mod prelude;
    pub mod order_lines;
    pub mod warehouse_locations;
}

pub mod services {
    pub mod execution_api;
    pub mod location_index;
    pub mod order_intake;
    pub mod order_store;
    pub mod order_submitter;
    pub mod pick_aggregation;
    pub mod pick_reconciler;
}

pub mod jobs {
    pub mod order_submission_sync;
    pub mod pick_status_sync;
}

pub mod config;
pub mod models;
pub mod handlers;
