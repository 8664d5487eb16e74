//! History feed aggregation
//!
//! Folds an order's history feed into one [`LineFulfillment`] per
//! `(order_line_number, item_name)`:
//! - events for the other transaction direction are dropped (PUT=3, PICK=4)
//! - only confirmed (1) and shortage (5) records count
//! - confirmed quantities are summed across every matching event
//! - shortages are NOT summed: the record with the highest id wins
//!
//! Totals are re-derived from the complete feed on every pass, so replaying
//! the same feed always yields the same result.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::warn;

use crate::models::history::{HistoryEvent, HistoryKind};
use crate::models::order_line::{Resolution, TransactionType};

/// Aggregated execution progress for one order line
#[derive(Debug, Clone, PartialEq)]
pub struct LineFulfillment {
    pub item: String,
    pub order_line: i32,
    /// Sum of all confirmed quantities seen for the line
    pub confirmed_total: Decimal,
    /// Shortage amount from the most recent shortage record
    pub latest_shortage: Option<Decimal>,
    /// Operator on the most recent confirmed record
    pub picked_by: Option<String>,
}

impl LineFulfillment {
    pub fn shortage_amount(&self) -> Decimal {
        self.latest_shortage.unwrap_or(Decimal::ZERO)
    }

    /// Decide whether the line is finished.
    ///
    /// Policy: a positive shortage report is terminal even when the confirmed
    /// quantity does not add up to the request. The execution system's
    /// shortage acknowledgement is treated as authoritative; the line will not
    /// receive further picks.
    pub fn resolve(&self, requested_qty: Decimal) -> Resolution {
        if self.confirmed_total == requested_qty || self.shortage_amount() > Decimal::ZERO {
            Resolution::Complete
        } else {
            Resolution::AwaitingConfirmation
        }
    }
}

#[derive(Default)]
struct LineAccumulator {
    confirmed_total: Decimal,
    /// (record id, amount)
    latest_shortage: Option<(i64, Decimal)>,
    /// (record id, user)
    latest_picker: Option<(i64, String)>,
}

/// Aggregate an order's history feed for lines of `transaction_type`.
///
/// Output is ordered by line number then item.
pub fn aggregate_history(
    events: &[HistoryEvent],
    transaction_type: TransactionType,
) -> Vec<LineFulfillment> {
    let expected_order_type = transaction_type.order_type_code();
    let mut lines: BTreeMap<(i32, String), LineAccumulator> = BTreeMap::new();

    for event in events {
        if event.order_type != expected_order_type {
            continue;
        }

        let Some(kind) = event.kind() else {
            continue;
        };

        let (Some(item), Some(line_number)) = (event.item_name.as_ref(), event.order_line_number)
        else {
            warn!(record_id = event.id, "History record missing item or line number, skipping");
            continue;
        };

        match kind {
            HistoryKind::Confirmed => {
                let Some(quantity) = event.quantity_confirmed else {
                    warn!(record_id = event.id, item = %item, "Confirmed record without quantity, skipping");
                    continue;
                };

                let acc = lines.entry((line_number, item.clone())).or_default();
                acc.confirmed_total += quantity;

                if let Some(user) = event.user.as_ref() {
                    let newer = acc
                        .latest_picker
                        .as_ref()
                        .is_none_or(|(id, _)| event.id > *id);
                    if newer {
                        acc.latest_picker = Some((event.id, user.clone()));
                    }
                }
            }
            HistoryKind::Shortage => {
                let Some(amount) = event.quantity_requested else {
                    warn!(record_id = event.id, item = %item, "Shortage record without quantity, skipping");
                    continue;
                };

                let acc = lines.entry((line_number, item.clone())).or_default();
                let newer = acc
                    .latest_shortage
                    .as_ref()
                    .is_none_or(|(id, _)| event.id > *id);
                if newer {
                    acc.latest_shortage = Some((event.id, amount));
                }
            }
        }
    }

    lines
        .into_iter()
        .map(|((order_line, item), acc)| LineFulfillment {
            item,
            order_line,
            confirmed_total: acc.confirmed_total,
            latest_shortage: acc.latest_shortage.map(|(_, amount)| amount),
            picked_by: acc.latest_picker.map(|(_, user)| user),
        })
        .collect()
}
