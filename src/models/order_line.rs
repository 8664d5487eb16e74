//! Order line status vocabulary and the fulfillment state machine
//!
//! Lines move through:
//!
//! ```text
//! Pending(0) → Sent(1) → Processing(99) ⇄ Processing(99) → Complete(3) → Exported(4)
//!         ↘ Processing(99) (submission failed)
//! ```
//!
//! `Processing` is a single state with an optional error payload: it covers
//! both "submitted, awaiting further confirmation" and "submission failed,
//! awaiting recovery". Every persisted update is guarded by
//! [`Transition::sources`], so a line is only ever moved from a status the
//! transition accepts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Persisted status codes.
///
/// The numeric values are shared with the reporting and export side and must
/// not be renumbered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    #[sea_orm(num_value = 0)]
    Pending,
    #[sea_orm(num_value = 1)]
    Sent,
    #[sea_orm(num_value = 3)]
    Complete,
    #[sea_orm(num_value = 4)]
    Exported,
    #[sea_orm(num_value = 99)]
    Processing,
}

impl LineStatus {
    /// Wire-level status code
    pub fn code(self) -> i32 {
        match self {
            LineStatus::Pending => 0,
            LineStatus::Sent => 1,
            LineStatus::Complete => 3,
            LineStatus::Exported => 4,
            LineStatus::Processing => 99,
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineStatus::Pending => write!(f, "pending"),
            LineStatus::Sent => write!(f, "sent"),
            LineStatus::Complete => write!(f, "complete"),
            LineStatus::Exported => write!(f, "exported"),
            LineStatus::Processing => write!(f, "processing"),
        }
    }
}

/// Direction of stock movement for a line
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    #[sea_orm(string_value = "PUT")]
    Put,
    #[sea_orm(string_value = "PICK")]
    Pick,
}

impl TransactionType {
    /// `order_type` code used by the execution system (PUT=3, PICK=4)
    pub fn order_type_code(self) -> i32 {
        match self {
            TransactionType::Put => 3,
            TransactionType::Pick => 4,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Put => write!(f, "PUT"),
            TransactionType::Pick => write!(f, "PICK"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PUT" => Ok(TransactionType::Put),
            "PICK" => Ok(TransactionType::Pick),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// Where a line sits in the fulfillment state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineState {
    Pending,
    Sent,
    /// Awaiting further confirmation. `api_error` is set when the last
    /// submission attempt failed.
    Processing { api_error: Option<String> },
    Complete,
    Exported,
}

/// Outcome of comparing confirmed history against the requested quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Complete,
    AwaitingConfirmation,
}

/// Every way a line can change status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Execution system accepted the order
    Submitted,
    /// Execution system rejected or could not be reached
    SubmissionFailed(String),
    /// History feed was folded into the line
    Confirmed(Resolution),
    /// Line sat in Processing past the timeout window
    TimedOut,
    /// Export collaborator wrote the line out
    Exported,
    /// Manual recovery back to Pending
    Reset,
}

/// A transition was applied to a line whose status does not accept it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply '{transition}' to a line in status {from}")]
pub struct InvalidTransition {
    pub from: LineStatus,
    pub transition: &'static str,
}

impl Transition {
    /// Statuses this transition may leave from
    pub fn sources(&self) -> &'static [LineStatus] {
        match self {
            Transition::Submitted | Transition::SubmissionFailed(_) => &[LineStatus::Pending],
            Transition::Confirmed(_) | Transition::Reset => {
                &[LineStatus::Sent, LineStatus::Processing]
            }
            Transition::TimedOut => &[LineStatus::Processing],
            Transition::Exported => &[LineStatus::Complete],
        }
    }

    /// Status the line ends up in
    pub fn target_status(&self) -> LineStatus {
        match self {
            Transition::Submitted => LineStatus::Sent,
            Transition::SubmissionFailed(_) => LineStatus::Processing,
            Transition::Confirmed(Resolution::Complete) | Transition::TimedOut => {
                LineStatus::Complete
            }
            Transition::Confirmed(Resolution::AwaitingConfirmation) => LineStatus::Processing,
            Transition::Exported => LineStatus::Exported,
            Transition::Reset => LineStatus::Pending,
        }
    }

    /// New value for the `api_error` column, `None` when it is left untouched
    pub fn api_error_update(&self) -> Option<Option<String>> {
        match self {
            Transition::Submitted | Transition::Reset => Some(None),
            Transition::SubmissionFailed(message) => Some(Some(message.clone())),
            Transition::Confirmed(_) | Transition::TimedOut | Transition::Exported => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::Submitted => "submitted",
            Transition::SubmissionFailed(_) => "submission_failed",
            Transition::Confirmed(_) => "confirmed",
            Transition::TimedOut => "timed_out",
            Transition::Exported => "exported",
            Transition::Reset => "reset",
        }
    }
}

impl LineState {
    /// Rebuild the state from its persisted columns
    pub fn from_row(status: LineStatus, api_error: Option<String>) -> Self {
        match status {
            LineStatus::Pending => LineState::Pending,
            LineStatus::Sent => LineState::Sent,
            LineStatus::Processing => LineState::Processing { api_error },
            LineStatus::Complete => LineState::Complete,
            LineStatus::Exported => LineState::Exported,
        }
    }

    pub fn status(&self) -> LineStatus {
        match self {
            LineState::Pending => LineStatus::Pending,
            LineState::Sent => LineStatus::Sent,
            LineState::Processing { .. } => LineStatus::Processing,
            LineState::Complete => LineStatus::Complete,
            LineState::Exported => LineStatus::Exported,
        }
    }

    pub fn api_error(&self) -> Option<&str> {
        match self {
            LineState::Processing { api_error } => api_error.as_deref(),
            _ => None,
        }
    }

    /// Apply a transition, rejecting it when the current status is not one of
    /// its sources
    pub fn apply(&self, transition: &Transition) -> Result<LineState, InvalidTransition> {
        let from = self.status();
        if !transition.sources().contains(&from) {
            return Err(InvalidTransition {
                from,
                transition: transition.name(),
            });
        }

        let api_error = match transition.api_error_update() {
            Some(update) => update,
            None => self.api_error().map(str::to_owned),
        };

        Ok(LineState::from_row(transition.target_status(), api_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(LineStatus::Pending.code(), 0);
        assert_eq!(LineStatus::Sent.code(), 1);
        assert_eq!(LineStatus::Complete.code(), 3);
        assert_eq!(LineStatus::Exported.code(), 4);
        assert_eq!(LineStatus::Processing.code(), 99);
        assert_eq!(LineStatus::Processing.to_value(), 99);
    }

    #[test]
    fn test_order_type_codes() {
        assert_eq!(TransactionType::Put.order_type_code(), 3);
        assert_eq!(TransactionType::Pick.order_type_code(), 4);
    }

    #[test]
    fn test_transaction_type_parse_is_case_insensitive() {
        assert_eq!("pick".parse::<TransactionType>(), Ok(TransactionType::Pick));
        assert_eq!(" Put ".parse::<TransactionType>(), Ok(TransactionType::Put));
        assert!("move".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_submission_paths() {
        let sent = LineState::Pending.apply(&Transition::Submitted).unwrap();
        assert_eq!(sent, LineState::Sent);

        let failed = LineState::Pending
            .apply(&Transition::SubmissionFailed("Timeout".to_string()))
            .unwrap();
        assert_eq!(
            failed,
            LineState::Processing {
                api_error: Some("Timeout".to_string())
            }
        );
    }

    #[test]
    fn test_confirmation_from_sent_and_processing() {
        let awaiting = Transition::Confirmed(Resolution::AwaitingConfirmation);
        let done = Transition::Confirmed(Resolution::Complete);

        assert_eq!(
            LineState::Sent.apply(&awaiting).unwrap(),
            LineState::Processing { api_error: None }
        );
        assert_eq!(LineState::Sent.apply(&done).unwrap(), LineState::Complete);

        // Processing self-loop keeps the recorded error
        let failed = LineState::Processing {
            api_error: Some("API error".to_string()),
        };
        assert_eq!(failed.apply(&awaiting).unwrap(), failed);
        assert_eq!(failed.apply(&done).unwrap(), LineState::Complete);
    }

    #[test]
    fn test_timeout_only_from_processing() {
        let processing = LineState::Processing { api_error: None };
        assert_eq!(
            processing.apply(&Transition::TimedOut).unwrap(),
            LineState::Complete
        );

        let err = LineState::Sent.apply(&Transition::TimedOut).unwrap_err();
        assert_eq!(err.from, LineStatus::Sent);
        assert_eq!(err.transition, "timed_out");
    }

    #[test]
    fn test_complete_is_never_demoted() {
        for transition in [
            Transition::Submitted,
            Transition::SubmissionFailed("x".to_string()),
            Transition::Confirmed(Resolution::AwaitingConfirmation),
            Transition::Confirmed(Resolution::Complete),
            Transition::TimedOut,
            Transition::Reset,
        ] {
            assert!(LineState::Complete.apply(&transition).is_err());
        }
        assert_eq!(
            LineState::Complete.apply(&Transition::Exported).unwrap(),
            LineState::Exported
        );
    }

    #[test]
    fn test_reset_clears_error() {
        let failed = LineState::Processing {
            api_error: Some("Connection error".to_string()),
        };
        assert_eq!(failed.apply(&Transition::Reset).unwrap(), LineState::Pending);
        assert!(LineState::Pending.apply(&Transition::Reset).is_err());
        assert!(LineState::Exported.apply(&Transition::Reset).is_err());
    }

    #[test]
    fn test_from_row_ignores_error_outside_processing() {
        let state = LineState::from_row(LineStatus::Sent, Some("stale".to_string()));
        assert_eq!(state, LineState::Sent);
        assert_eq!(state.api_error(), None);
    }
}
