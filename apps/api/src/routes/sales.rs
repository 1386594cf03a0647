//! # Sales Routes
//!
//! The register: checkout, cash sessions, reservations, quotes, credit
//! notes and sales statistics.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/sales/checkout                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleRepository::checkout ── one transaction ──────────────────────┐    │
//! │       │  recompute totals from catalog prices                      │    │
//! │       │  redeem credit note (if any)                               │    │
//! │       │  insert sale, lines, payments                              │    │
//! │       │  checked decrement per inventory line ── short? ─► ROLLBACK│    │
//! │       ▼                                                            │    │
//! │  COMMIT ◄──────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CloudPusher::push_stock(receipt.stock_changes)   best-effort           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  201 { sale_id, totals, credit_note_code }                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use tienda_core::{CashMovement, CashSession, CreditNote, PaymentMethod};
use tienda_db::repository::cash::{CashStatus, CloseSummary, NewMovement, CLOSED_SESSION_LIMIT};
use tienda_db::repository::product::ScanResult;
use tienda_db::repository::quote::{NewQuote, QuoteDetail, QUOTE_LIST_LIMIT};
use tienda_db::repository::reservation::{
    CancelOutcome, NewReservation, ReservationCreated, ReservationDetail, WithdrawOutcome,
};
use tienda_db::repository::sale::{CheckoutInput, Receipt, SalesHistory, VoidOutcome};
use tienda_db::repository::stats::{Dashboard, PeriodStats, ProductTotal};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/payment-methods", get(payment_methods))
        .route("/scan/{code}", get(scan))
        .route("/history", get(history))
        .route("/{id}/void", delete(void_sale))
        // Cash register
        .route("/caja/open", post(open_session))
        .route("/caja/close", post(close_session))
        .route("/caja/status", get(session_status))
        .route("/caja/movement", post(add_movement))
        .route("/caja/list", get(closed_sessions))
        // Reservations
        .route("/reservas", get(list_reservations))
        .route("/reservas/crear", post(create_reservation))
        .route("/reservas/{id}", delete(delete_reservation))
        .route("/reservas/{id}/retirar", post(withdraw_reservation))
        .route("/reservas/{id}/cancelar", post(cancel_reservation))
        // Quotes
        .route("/presupuestos", get(list_quotes).post(create_quote))
        // Credit notes
        .route("/notas-credito", get(list_credit_notes))
        .route("/notas-credito/crear", post(create_credit_note))
        .route("/notas-credito/validar/{code}", get(validate_credit_note))
        // Statistics
        .route("/dashboard/stats", get(dashboard))
        .route("/stats/period", post(period_stats))
        .route("/stats/products-detail", post(products_detail))
}

// =============================================================================
// Sales
// =============================================================================

/// POST /api/sales/checkout
async fn checkout(
    State(state): State<AppState>,
    Json(input): Json<CheckoutInput>,
) -> ApiResult<(StatusCode, Json<Receipt>)> {
    let receipt = state.db.sales().checkout(input).await?;
    state.pusher.push_stock(&receipt.stock_changes).await;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/sales/payment-methods
async fn payment_methods(State(state): State<AppState>) -> ApiResult<Json<Vec<PaymentMethod>>> {
    Ok(Json(state.db.payment_methods().list().await?))
}

/// GET /api/sales/scan/{code}
async fn scan(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<ScanResult>> {
    Ok(Json(state.db.products().scan(&code).await?))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    current_session: bool,
}

/// GET /api/sales/history
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<SalesHistory>> {
    Ok(Json(state.db.sales().history(query.current_session).await?))
}

/// DELETE /api/sales/{id}/void
async fn void_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<VoidOutcome>> {
    let outcome = state.db.sales().void(id).await?;
    state.pusher.push_stock(&outcome.stock_changes).await;
    Ok(Json(outcome))
}

// =============================================================================
// Cash Register
// =============================================================================

#[derive(Debug, Deserialize)]
struct OpenSessionRequest {
    #[serde(default)]
    opening_float_cents: i64,
}

/// POST /api/sales/caja/open
async fn open_session(
    State(state): State<AppState>,
    Json(input): Json<OpenSessionRequest>,
) -> ApiResult<(StatusCode, Json<CashSession>)> {
    let session = state.db.cash().open(input.opening_float_cents).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
struct CloseSessionRequest {
    counted_cents: i64,
}

/// POST /api/sales/caja/close
async fn close_session(
    State(state): State<AppState>,
    Json(input): Json<CloseSessionRequest>,
) -> ApiResult<Json<CloseSummary>> {
    Ok(Json(state.db.cash().close(input.counted_cents).await?))
}

/// GET /api/sales/caja/status
async fn session_status(State(state): State<AppState>) -> ApiResult<Json<CashStatus>> {
    Ok(Json(state.db.cash().status().await?))
}

/// POST /api/sales/caja/movement
async fn add_movement(
    State(state): State<AppState>,
    Json(input): Json<NewMovement>,
) -> ApiResult<(StatusCode, Json<CashMovement>)> {
    let movement = state.db.cash().add_movement(input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// GET /api/sales/caja/list
async fn closed_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<CashSession>>> {
    Ok(Json(state.db.cash().list_closed(CLOSED_SESSION_LIMIT).await?))
}

// =============================================================================
// Reservations
// =============================================================================

/// GET /api/sales/reservas
async fn list_reservations(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ReservationDetail>>> {
    Ok(Json(state.db.reservations().list().await?))
}

/// POST /api/sales/reservas/crear
async fn create_reservation(
    State(state): State<AppState>,
    Json(input): Json<NewReservation>,
) -> ApiResult<(StatusCode, Json<ReservationCreated>)> {
    let created = state
        .db
        .reservations()
        .create(input, state.config.reservation_expiry_days)
        .await?;
    state.pusher.push_stock(&created.stock_changes).await;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Default, Deserialize)]
struct WithdrawRequest {
    payment_method_id: Option<i64>,
}

/// POST /api/sales/reservas/{id}/retirar
async fn withdraw_reservation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<WithdrawRequest>,
) -> ApiResult<Json<WithdrawOutcome>> {
    Ok(Json(
        state
            .db
            .reservations()
            .withdraw(id, input.payment_method_id)
            .await?,
    ))
}

/// POST /api/sales/reservas/{id}/cancelar
async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CancelOutcome>> {
    let outcome = state.db.reservations().cancel(id).await?;
    state.pusher.push_stock(&outcome.stock_changes).await;
    Ok(Json(outcome))
}

/// DELETE /api/sales/reservas/{id}
async fn delete_reservation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.db.reservations().delete(id).await?;
    Ok(Json(json!({ "deleted": id })))
}

// =============================================================================
// Quotes
// =============================================================================

/// POST /api/sales/presupuestos
async fn create_quote(
    State(state): State<AppState>,
    Json(input): Json<NewQuote>,
) -> ApiResult<(StatusCode, Json<QuoteDetail>)> {
    let quote = state.db.quotes().create(input).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// GET /api/sales/presupuestos
async fn list_quotes(State(state): State<AppState>) -> ApiResult<Json<Vec<QuoteDetail>>> {
    Ok(Json(state.db.quotes().list(QUOTE_LIST_LIMIT).await?))
}

// =============================================================================
// Credit Notes
// =============================================================================

#[derive(Debug, Deserialize)]
struct NewCreditNoteRequest {
    amount_cents: i64,
    notes: Option<String>,
}

/// POST /api/sales/notas-credito/crear
async fn create_credit_note(
    State(state): State<AppState>,
    Json(input): Json<NewCreditNoteRequest>,
) -> ApiResult<(StatusCode, Json<CreditNote>)> {
    let note = state
        .db
        .credit_notes()
        .create(input.amount_cents, input.notes.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /api/sales/notas-credito
async fn list_credit_notes(State(state): State<AppState>) -> ApiResult<Json<Vec<CreditNote>>> {
    Ok(Json(state.db.credit_notes().list().await?))
}

/// GET /api/sales/notas-credito/validar/{code}
///
/// Unknown codes answer 404, used ones 400 `CONFLICT`.
async fn validate_credit_note(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    let note = state.db.credit_notes().validate(&code).await?;
    Ok(Json(json!({
        "valid": true,
        "id": note.id,
        "code": note.code,
        "amount_cents": note.amount_cents,
    })))
}

// =============================================================================
// Statistics
// =============================================================================

/// GET /api/sales/dashboard/stats
async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<Dashboard>> {
    Ok(Json(state.db.stats().dashboard().await?))
}

/// Inclusive `YYYY-MM-DD` range.
#[derive(Debug, Deserialize)]
struct PeriodRequest {
    start_date: String,
    end_date: String,
}

/// POST /api/sales/stats/period
async fn period_stats(
    State(state): State<AppState>,
    Json(range): Json<PeriodRequest>,
) -> ApiResult<Json<PeriodStats>> {
    Ok(Json(
        state
            .db
            .stats()
            .period(&range.start_date, &range.end_date)
            .await?,
    ))
}

/// POST /api/sales/stats/products-detail
async fn products_detail(
    State(state): State<AppState>,
    Json(range): Json<PeriodRequest>,
) -> ApiResult<Json<Vec<ProductTotal>>> {
    Ok(Json(
        state
            .db
            .stats()
            .products_detail(&range.start_date, &range.end_date)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tienda_cloud::testing::CloudCall;
    use tienda_core::CloudLink;

    use crate::routes::test_support::{TestApp, CASH_METHOD_ID};

    #[tokio::test]
    async fn test_checkout_decrements_and_pushes_stock() {
        let app = TestApp::new().await;
        let (product_id, variants) = app.seed_product("Camiseta", 25_000, "M", 5).await;
        app.link(product_id).await;

        let (status, body) = app
            .post(
                "/api/sales/checkout",
                json!({
                    "items": [{ "variant_id": variants[0], "quantity": 2 }],
                    "payment_method_id": CASH_METHOD_ID,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["totals"]["total"], 50_000);
        assert_eq!(app.stock(variants[0]).await, 3);

        let link = CloudLink {
            product_id: product_id + 500,
            variant_id: variants[0] + 7000,
        };
        assert_eq!(app.store.calls(), vec![CloudCall::Stock(link, 3)]);
    }

    #[tokio::test]
    async fn test_checkout_over_stock_rolls_back() {
        let app = TestApp::new().await;
        let (_, variants) = app.seed_product("Camiseta", 25_000, "M", 1).await;

        let (status, body) = app
            .post(
                "/api/sales/checkout",
                json!({
                    "items": [{ "variant_id": variants[0], "quantity": 2 }],
                    "payment_method_id": CASH_METHOD_ID,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(app.stock(variants[0]).await, 1);

        let (_, history) = app.get("/api/sales/history").await;
        assert_eq!(history["sales"], json!([]));
    }

    #[tokio::test]
    async fn test_checkout_rejects_overflowing_manual_line() {
        let app = TestApp::new().await;

        let (status, body) = app
            .post(
                "/api/sales/checkout",
                json!({
                    "items": [{
                        "name": "Servicio",
                        "quantity": 3,
                        "unit_price_cents": i64::MAX / 2,
                    }],
                    "payment_method_id": CASH_METHOD_ID,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (_, history) = app.get("/api/sales/history").await;
        assert_eq!(history["sales"], json!([]));
    }

    #[tokio::test]
    async fn test_cash_session_variance() {
        let app = TestApp::new().await;
        let (_, variants) = app.seed_product("Media", 500, "U", 10).await;
        let (_, card_variants) = app.seed_product("Gorra", 300, "U", 10).await;

        let (status, _) = app
            .post("/api/sales/caja/open", json!({ "opening_float_cents": 1_000 }))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .post("/api/sales/caja/open", json!({ "opening_float_cents": 1_000 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFLICT");

        app.post(
            "/api/sales/checkout",
            json!({ "items": [{ "variant_id": variants[0] }], "payment_method_id": CASH_METHOD_ID }),
        )
        .await;
        app.post(
            "/api/sales/checkout",
            json!({ "items": [{ "variant_id": card_variants[0] }], "payment_method_id": 2 }),
        )
        .await;
        let (status, _) = app
            .post(
                "/api/sales/caja/movement",
                json!({ "amount_cents": 200, "description": "Cambio" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, status_body) = app.get("/api/sales/caja/status").await;
        assert_eq!(status_body["status"], "open");
        assert_eq!(status_body["expected"]["cash_in_drawer"], 1_300);

        let (status, summary) = app
            .post("/api/sales/caja/close", json!({ "counted_cents": 1_300 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["variance"], 0);

        let (status, _) = app
            .post("/api/sales/caja/close", json!({ "counted_cents": 0 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, closed) = app.get("/api/sales/caja/list").await;
        assert_eq!(closed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_credit_note_round_trip() {
        let app = TestApp::new().await;
        let (_, variants) = app.seed_product("Buzo", 4_000, "L", 3).await;

        let (status, note) = app
            .post("/api/sales/notas-credito/crear", json!({ "amount_cents": 1_500 }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let code = note["code"].as_str().unwrap().to_string();

        let (status, body) = app
            .get(&format!("/api/sales/notas-credito/validar/{}", code))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["amount_cents"], 1_500);

        let (status, _) = app
            .post(
                "/api/sales/checkout",
                json!({
                    "items": [{ "variant_id": variants[0] }],
                    "payment_method_id": CASH_METHOD_ID,
                    "credit_note_code": code,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .get(&format!("/api/sales/notas-credito/validar/{}", code))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFLICT");

        let (status, _) = app.get("/api/sales/notas-credito/validar/NC-00000000").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reservation_lifecycle() {
        let app = TestApp::new().await;
        let (_, variants) = app.seed_product("Camiseta", 10_000, "M", 4).await;

        let (status, created) = app
            .post(
                "/api/sales/reservas/crear",
                json!({
                    "customer_name": "Lucia",
                    "items": [{ "variant_id": variants[0], "quantity": 3 }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(app.stock(variants[0]).await, 1);
        let id = created["reservation"]["id"].as_i64().unwrap();

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/sales/reservas/{}", id), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/sales/reservas/{}/cancelar", id);
        let (status, _) = app.post(&uri, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.stock(variants[0]).await, 4);

        let (status, body) = app.post(&uri, json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFLICT");

        let (status, _) = app
            .send(Method::DELETE, &format!("/api/sales/reservas/{}", id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_void_restores_stock() {
        let app = TestApp::new().await;
        let (_, variants) = app.seed_product("Short", 5_000, "S", 2).await;

        let (_, receipt) = app
            .post(
                "/api/sales/checkout",
                json!({ "items": [{ "variant_id": variants[0], "quantity": 2 }], "payment_method_id": CASH_METHOD_ID }),
            )
            .await;
        assert_eq!(app.stock(variants[0]).await, 0);
        let sale_id = receipt["sale_id"].as_i64().unwrap();

        let uri = format!("/api/sales/{}/void", sale_id);
        let (status, _) = app.send(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.stock(variants[0]).await, 2);

        let (status, _) = app.send(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_and_quotes() {
        let app = TestApp::new().await;
        let (product_id, variants) = app.seed_product("Pelota", 7_000, "U", 6).await;

        let (status, body) = app
            .get(&format!("/api/sales/scan/P{}-U", product_id))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["variant_id"], variants[0]);
        assert_eq!(body["stock"], 6);

        let (status, _) = app.get("/api/sales/scan/UNKNOWN").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, quote) = app
            .post(
                "/api/sales/presupuestos",
                json!({
                    "customer_name": "Club",
                    "items": [{ "variant_id": variants[0], "quantity": 10 }],
                    "discount_percent": 10,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(quote["total_cents"], 63_000);
        assert_eq!(app.stock(variants[0]).await, 6);

        let (_, quotes) = app.get("/api/sales/presupuestos").await;
        assert_eq!(quotes.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_methods_and_dashboard() {
        let app = TestApp::new().await;

        let (status, methods) = app.get("/api/sales/payment-methods").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(methods[0]["category"], "cash");

        let (status, dashboard) = app.get("/api/sales/dashboard/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dashboard["today_count"], 0);

        let (status, body) = app
            .post(
                "/api/sales/stats/period",
                json!({ "start_date": "2024-13-01", "end_date": "2024-12-31" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
