//! # Return Routes
//!
//! Returns and exchanges in one call: returned items go back on the shelf,
//! exchanged items leave it, and the difference is settled.
//!
//! ```text
//! balance = total_out − total_in
//!
//!   balance < 0 ──► credit note for |balance|
//!   balance > 0 ──► supplementary sale, payment_method_id required
//!   balance = 0 ──► nothing to settle
//! ```

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use tienda_db::repository::returns::{ReturnInput, ReturnOutcome};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/process", post(process_return))
}

/// POST /api/returns/process
async fn process_return(
    State(state): State<AppState>,
    Json(input): Json<ReturnInput>,
) -> ApiResult<Json<ReturnOutcome>> {
    let outcome = state.db.returns().process(input).await?;
    state.pusher.push_stock(&outcome.stock_changes).await;
    Ok(Json(outcome))
}
