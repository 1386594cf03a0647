//! # Tienda API
//!
//! REST server for the register frontend and the cloud store's webhooks.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           API Server                                    │
//! │                                                                         │
//! │  Frontend ───► /api/products ──┐                                        │
//! │           ───► /api/sales ─────┤                                        │
//! │           ───► /api/returns ───┼──► tienda-db ───► SQLite               │
//! │  Cloud    ───► /api/webhooks ──┘        │                               │
//! │                                         │ StockChange (after commit)    │
//! │                                         ▼                               │
//! │                                   tienda-cloud ───► Tiendanube REST     │
//! │                                                                         │
//! │  Local state commits first. Cloud pushes are best-effort and never     │
//! │  turn a committed request into a failure.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use state::AppState;
