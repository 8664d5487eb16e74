//! `SeaORM` Entity for order_lines table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::order_line::{LineState, LineStatus, TransactionType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_number: String,
    pub transaction_type: TransactionType,
    pub item: String,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))")]
    pub requested_qty: Decimal,
    pub order_line: i32,
    pub status: LineStatus,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))", nullable)]
    pub actual_qty: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((18, 4)))", nullable)]
    pub shortage_qty: Option<Decimal>,
    pub picked_by: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub api_error: Option<String>,
    pub source: String,
    pub wms_location: Option<String>,
    pub bin_location: Option<String>,
    pub inserted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Current position of the line in the fulfillment state machine
    pub fn state(&self) -> LineState {
        LineState::from_row(self.status, self.api_error.clone())
    }
}
