//! History feed records reported by the execution system
//!
//! `GET /api/history/?order_name=<order_number>` returns a JSON array of these.
//! Only a handful of fields matter for reconciliation; anything else in the
//! payload is ignored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Kinds of history record the reconciler acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// Confirmed pick/put quantity
    Confirmed,
    /// Shortage report, `quantity_requested` holds the missing amount
    Shortage,
}

impl HistoryKind {
    pub const CONFIRMED_CODE: i32 = 1;
    pub const SHORTAGE_CODE: i32 = 5;

    /// Map a raw `history_type`; every other code is ignored
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::CONFIRMED_CODE => Some(HistoryKind::Confirmed),
            Self::SHORTAGE_CODE => Some(HistoryKind::Shortage),
            _ => None,
        }
    }
}

/// One history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: i64,
    pub order_type: i32,
    pub history_type: i32,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub order_line_number: Option<i32>,
    #[serde(default)]
    pub quantity_confirmed: Option<Decimal>,
    #[serde(default)]
    pub quantity_requested: Option<Decimal>,
    /// Operator who performed the pick/put
    #[serde(default)]
    pub user: Option<String>,
}

impl HistoryEvent {
    pub fn kind(&self) -> Option<HistoryKind> {
        HistoryKind::from_code(self.history_type)
    }
}

/// Decode a raw feed one record at a time.
///
/// Records that do not fit [`HistoryEvent`] (null ids, missing type codes) are
/// dropped with a warning so the rest of the order's feed still counts.
pub fn parse_history_feed(records: Vec<Value>) -> Vec<HistoryEvent> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            match serde_json::from_value::<HistoryEvent>(record) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed history record");
                    None
                }
            }
        })
        .collect()
}
