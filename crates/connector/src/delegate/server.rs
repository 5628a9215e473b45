//! Inbound webhook endpoint: the provider POSTs bot replies here.

use crate::delegate::RestDelegate;
use crate::error::ConnectorError;
use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use std::sync::Arc;

/// Router with `POST /` feeding provider callbacks to `delegate`.
pub fn inbound_router(delegate: Arc<dyn RestDelegate>) -> Router {
    Router::new()
        .route("/", post(inbound_webhook))
        .with_state(delegate)
}

/// POST /: 200 when routed, 202 when ignored (other conversation), 400 on bad JSON.
async fn inbound_webhook(
    State(delegate): State<Arc<dyn RestDelegate>>,
    body: Bytes,
) -> StatusCode {
    let body: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("inbound webhook: rejected malformed JSON: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    match delegate.receive(body).await {
        Ok(true) => StatusCode::OK,
        Ok(false) => StatusCode::ACCEPTED,
        Err(ConnectorError::QueueClosed) => StatusCode::SERVICE_UNAVAILABLE,
        Err(e) => {
            log::warn!("inbound webhook: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
