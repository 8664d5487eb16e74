//! Execution API client
//!
//! Thin wrapper over the fulfillment execution system's HTTP API:
//! - `POST /api/full-order/` submits an order
//! - `GET /api/history/?order_name=<order>` returns the order's history feed
//!
//! Transport failures (timeout, connection, non-2xx) are always errors; an
//! order with no history yet is an empty list.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::models::history::{HistoryEvent, parse_history_feed};
use crate::models::submission::OrderSubmission;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionApiError {
    #[error("Timeout while connecting to API: {0}")]
    Timeout(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid API response: {0}")]
    Decode(String),
    #[error("API request failed: {0}")]
    Request(String),
}

impl ExecutionApiError {
    /// True for failures where the request may not have reached the API or
    /// the API did not answer with a usable response
    pub fn is_transport(&self) -> bool {
        !matches!(self, ExecutionApiError::Decode(_))
    }
}

impl From<reqwest::Error> for ExecutionApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExecutionApiError::Timeout(e.to_string())
        } else if e.is_connect() {
            ExecutionApiError::Connection(e.to_string())
        } else if e.is_decode() {
            ExecutionApiError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ExecutionApiError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            ExecutionApiError::Request(e.to_string())
        }
    }
}

/// Operations the order pipeline needs from the execution system
#[async_trait]
pub trait ExecutionApi: Send + Sync {
    /// Submit one order; success means the execution system accepted it
    async fn submit_order(&self, order: &OrderSubmission) -> Result<(), ExecutionApiError>;

    /// Full history feed for an order
    async fn history(&self, order_number: &str) -> Result<Vec<HistoryEvent>, ExecutionApiError>;
}

/// reqwest-backed [`ExecutionApi`]
#[derive(Clone)]
pub struct ExecutionApiService {
    client: Client,
    base_url: String,
}

impl ExecutionApiService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ExecutionApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionApiError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ExecutionApiError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ExecutionApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ExecutionApi for ExecutionApiService {
    async fn submit_order(&self, order: &OrderSubmission) -> Result<(), ExecutionApiError> {
        let url = format!("{}/api/full-order/", self.base_url);

        tracing::info!(order_number = %order.name, lines = order.order_lines.len(), "Submitting order to execution API");
        if let Ok(payload) = serde_json::to_string_pretty(order) {
            tracing::debug!(order_number = %order.name, "Request payload: {}", payload);
        }

        let response = self
            .client
            .post(&url)
            .header("accept", "application/json")
            .json(order)
            .send()
            .await?;

        tracing::debug!(order_number = %order.name, status = %response.status(), "Execution API responded");

        let response = Self::check_status(response).await?;
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(order_number = %order.name, "Response body: {}", body);

        Ok(())
    }

    async fn history(&self, order_number: &str) -> Result<Vec<HistoryEvent>, ExecutionApiError> {
        let url = format!("{}/api/history/", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&[("order_name", order_number)])
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let records: Vec<serde_json::Value> = response.json().await?;
        let received = records.len();
        let events = parse_history_feed(records);

        if events.len() < received {
            tracing::warn!(
                order_number,
                skipped = received - events.len(),
                "Dropped malformed records from history feed"
            );
        }
        tracing::debug!(order_number, count = events.len(), "Fetched history events");

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        routing::{get, post},
    };
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::models::submission::SubmissionLine;

    /// Serve `app` on an ephemeral local port and return its base URL
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn service(base_url: String) -> ExecutionApiService {
        ExecutionApiService::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_history_parses_feed() {
        let app = Router::new().route(
            "/api/history/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("order_name").map(String::as_str), Some("SO-1"));
                Json(json!([
                    {"id": 1, "order_type": 4, "history_type": 1, "item_name": "A",
                     "order_line_number": 1, "quantity_confirmed": 2, "quantity_requested": 5},
                    {"id": 2, "order_type": 4, "history_type": 5, "item_name": "A",
                     "order_line_number": 1, "quantity_confirmed": 0, "quantity_requested": 3}
                ]))
            }),
        );
        let api = service(serve(app).await);

        let events = api.history("SO-1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].quantity_confirmed, Some(dec!(2)));
        assert_eq!(events[1].history_type, 5);
    }

    #[tokio::test]
    async fn test_history_skips_malformed_records() {
        let app = Router::new().route(
            "/api/history/",
            get(|| async {
                Json(json!([
                    {"id": 2, "order_type": null, "history_type": 9, "item_name": null},
                    {"id": 3, "order_type": 4, "history_type": 1, "item_name": "A",
                     "order_line_number": 1, "quantity_confirmed": 5}
                ]))
            }),
        );
        let api = service(serve(app).await);

        let events = api.history("SO-1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 3);
    }

    #[tokio::test]
    async fn test_history_empty_is_not_an_error() {
        let app = Router::new().route("/api/history/", get(|| async { Json(json!([])) }));
        let api = service(serve(app).await);

        assert!(api.history("SO-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_server_error_is_transport_failure() {
        let app = Router::new().route(
            "/api/history/",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let api = service(serve(app).await);

        let err = api.history("SO-1").await.unwrap_err();
        assert!(err.is_transport());
        match err {
            ExecutionApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = service(format!("http://{}", addr));
        let err = api.history("SO-1").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_submit_order_posts_payload() {
        let received: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let sink = received.clone();
        let app = Router::new().route(
            "/api/full-order/",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(body);
                    (StatusCode::CREATED, Json(json!({"id": 10})))
                }
            }),
        );
        let api = service(format!("{}/", serve(app).await));

        let order = OrderSubmission {
            name: "SO-9".to_string(),
            warehouse: "WH1".to_string(),
            order_type: 4,
            order_lines: vec![SubmissionLine {
                line_number: 1,
                item: "A".to_string(),
                quantity: dec!(5),
                suggested_bin: Some("B-01".to_string()),
            }],
        };
        api.submit_order(&order).await.unwrap();

        let body = received.lock().unwrap().clone().unwrap();
        assert_eq!(body["name"], "SO-9");
        assert_eq!(body["order_type"], 4);
        assert_eq!(body["order_lines"][0]["line_number"], 1);
        assert_eq!(body["order_lines"][0]["quantity"], 5.0);
        assert_eq!(body["order_lines"][0]["suggested_bin"], "B-01");
    }

    #[tokio::test]
    async fn test_submit_order_rejected() {
        let app = Router::new().route(
            "/api/full-order/",
            post(|| async { (StatusCode::BAD_REQUEST, "unknown item") }),
        );
        let api = service(serve(app).await);

        let order = OrderSubmission {
            name: "SO-9".to_string(),
            warehouse: "WH1".to_string(),
            order_type: 3,
            order_lines: vec![],
        };
        let err = api.submit_order(&order).await.unwrap_err();
        assert_eq!(err.to_string(), "API error 400: unknown item");
    }
}
