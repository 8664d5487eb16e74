//! Order line admin endpoints
//!
//! - GET  /api/order-lines/summary      line counts per status
//! - POST /api/order-lines/{id}/reset   manual recovery back to Pending
//! - POST /api/orders                   take in a new order

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;
use crate::models::order_line::LineStatus;
use crate::services::order_intake::{IntakeError, NewOrder};
use crate::services::order_store::{self, ResetOutcome};

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: Some(code.to_string()),
        }),
    )
}

fn db_error(e: sea_orm::DbErr) -> ApiError {
    warn!(error = %e, "Database query failed");
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to query order lines",
        "DB_ERROR",
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: LineStatus,
    pub code: i32,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusSummaryResponse {
    pub statuses: Vec<StatusCount>,
    pub total: i64,
}

/// GET /api/order-lines/summary
///
/// Every status is listed, including those with no lines.
pub async fn get_status_summary(
    State(state): State<AppState>,
) -> Result<Json<StatusSummaryResponse>, ApiError> {
    let counts = order_store::status_counts(&state.db).await.map_err(db_error)?;

    let mut statuses: Vec<StatusCount> = LineStatus::iter()
        .map(|status| StatusCount {
            status,
            code: status.code(),
            count: counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, c)| *c)
                .unwrap_or(0),
        })
        .collect();
    statuses.sort_by_key(|s| s.code);

    let total = statuses.iter().map(|s| s.count).sum();

    Ok(Json(StatusSummaryResponse { statuses, total }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub id: i32,
    pub order_number: String,
    pub status: LineStatus,
}

/// POST /api/order-lines/{id}/reset
///
/// # Response
/// - 200: Line is Pending again and will be picked up by the next submission run
/// - 404: Unknown line
/// - 409: Line status does not allow a reset (Pending, Complete, Exported)
pub async fn reset_order_line(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ResetResponse>, ApiError> {
    match order_store::reset_line(&state.db, id).await.map_err(db_error)? {
        ResetOutcome::Reset(line) => {
            info!(line_id = line.id, order_number = %line.order_number, "Reset order line to pending");
            Ok(Json(ResetResponse {
                id: line.id,
                order_number: line.order_number,
                status: line.status,
            }))
        }
        ResetOutcome::NotFound => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Order line {} not found", id),
            "NOT_FOUND",
        )),
        ResetOutcome::Rejected(e) => Err(api_error(
            StatusCode::CONFLICT,
            e.to_string(),
            "INVALID_TRANSITION",
        )),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_number: String,
    pub lines: usize,
}

/// POST /api/orders
///
/// # Response
/// - 201: Order stored, lines Pending
/// - 400: Validation failed
/// - 409: Order number already taken in
pub async fn create_order(
    State(state): State<AppState>,
    Json(order): Json<NewOrder>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    match state.intake.create_order(order).await {
        Ok(lines) => Ok((
            StatusCode::CREATED,
            Json(CreateOrderResponse {
                order_number: lines
                    .first()
                    .map(|l| l.order_number.clone())
                    .unwrap_or_default(),
                lines: lines.len(),
            }),
        )),
        Err(IntakeError::Store(e)) => Err(db_error(e)),
        Err(e @ IntakeError::Duplicate(_)) => {
            Err(api_error(StatusCode::CONFLICT, e.to_string(), "DUPLICATE_ORDER"))
        }
        Err(e) => {
            warn!(error = %e, "Rejected order");
            Err(api_error(StatusCode::BAD_REQUEST, e.to_string(), "INVALID_ORDER"))
        }
    }
}
