//! Order payload pushed to the execution system (`POST /api/full-order/`)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmission {
    /// Order number, used later to query the history feed
    pub name: String,
    pub warehouse: String,
    pub order_type: i32,
    pub order_lines: Vec<SubmissionLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionLine {
    /// 1-based position within this submission, independent of the stored order_line
    pub line_number: i32,
    pub item: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub suggested_bin: Option<String>,
}
