//! # Webhook Routes
//!
//! Inbound order notifications from the cloud store.
//!
//! ## Delivery Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/webhooks/tiendanube/orders   (raw body)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  secret configured? ── yes ──► HMAC-SHA256(body) == header? ── no ─► 401│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  topic (X-Topic, else body.event) ── not order/created|paid ─► ignored  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sale already mirrors order id? ── yes ──────────────────────► duplicate│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  body has products? ── no ──► GET /orders/{id} ── fails ─► 502          │
//! │       │                          (platform redelivers)                  │
//! │       ▼                                                                 │
//! │  CloudOrderRepository::ingest ─────────────────────────────► processed  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock changes from a cloud order are not pushed back: the cloud store
//! already accounted for the sale.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, info};

use tienda_cloud::signature::{self, SIGNATURE_HEADER};
use tienda_cloud::{OrderPayload, WebhookTopic};
use tienda_db::IngestOutcome;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header naming the event.
pub const TOPIC_HEADER: &str = "X-Topic";

pub fn router() -> Router<AppState> {
    Router::new().route("/tiendanube/orders", post(order_webhook))
}

/// POST /api/webhooks/tiendanube/orders
///
/// Must receive the raw body for signature verification.
async fn order_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if let Some(secret) = state.config.cloud.client_secret.as_deref() {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        signature::verify(secret, &body, provided)?;
    }

    let payload: OrderPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::validation(format!("Invalid webhook payload: {}", e)))?;

    let header_topic = headers.get(TOPIC_HEADER).and_then(|v| v.to_str().ok());
    let topic = WebhookTopic::resolve(header_topic, payload.event.as_deref());
    if !topic.records_sale() {
        debug!(?topic, "Webhook topic ignored");
        return Ok(Json(json!({ "status": "ignored" })));
    }

    let order_id = payload
        .order_id()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    if let Some(sale_id) = state.db.cloud_orders().find(order_id).await? {
        debug!(order_id, sale_id, "Webhook replay");
        return Ok(Json(json!({ "status": "duplicate", "sale_id": sale_id })));
    }

    let order = if payload.needs_fetch() {
        state.pusher.store().fetch_order(order_id).await?
    } else {
        payload
            .into_remote_order()
            .map_err(|e| ApiError::validation(e.to_string()))?
    };

    let outcome = state.db.cloud_orders().ingest(&order).await?;
    if let IngestOutcome::Processed { sale_id, stock_changes } = &outcome {
        info!(
            order_id,
            sale_id,
            lines = order.lines.len(),
            stock_changes = stock_changes.len(),
            "Cloud order recorded"
        );
    }

    let body = serde_json::to_value(&outcome)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(body))
}
