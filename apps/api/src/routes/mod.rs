//! # Routes
//!
//! HTTP surface of the server, one module per resource group.
//!
//! ## Route Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /api/health                    liveness + database probe               │
//! │  /api/products/...              catalog, categories, stock, cloud link  │
//! │  /api/sales/...                 checkout, cash, reservations, quotes,   │
//! │                                 credit notes, stats                     │
//! │  /api/returns/process           returns and exchanges                   │
//! │  /api/webhooks/tiendanube/...   inbound cloud orders                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers are thin: parse, call one repository workflow, push the
//! committed stock changes to the cloud, answer.

pub mod health;
pub mod products;
pub mod returns;
pub mod sales;
pub mod webhooks;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .nest("/api/products", products::router())
        .nest("/api/sales", sales::router())
        .nest("/api/returns", returns::router())
        .nest("/api/webhooks", webhooks::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-process harness: in-memory database, recording cloud store,
    //! requests sent with `oneshot`.

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tienda_cloud::testing::RecordingCloudStore;
    use tienda_db::repository::product::NewProduct;
    use tienda_db::{Database, DbConfig};
    use tower::ServiceExt;

    use super::create_router;
    use crate::config::ApiConfig;
    use crate::state::AppState;

    /// Seeded `Efectivo` (cash) method.
    pub const CASH_METHOD_ID: i64 = 1;

    pub struct TestApp {
        pub router: Router,
        pub db: Database,
        pub store: Arc<RecordingCloudStore>,
    }

    impl TestApp {
        pub async fn new() -> Self {
            Self::with_config(ApiConfig::default(), RecordingCloudStore::new()).await
        }

        pub async fn with_config(config: ApiConfig, store: RecordingCloudStore) -> Self {
            let db = Database::new(DbConfig::in_memory()).await.unwrap();
            let store = Arc::new(store);
            let state = AppState::new(db.clone(), store.clone(), config);
            TestApp {
                router: create_router(state),
                db,
                store,
            }
        }

        /// Sends a request and returns the status and JSON body
        /// (`Null` for an empty body).
        pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(json) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.call(request).await
        }

        pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Method::GET, uri, None).await
        }

        pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.send(Method::POST, uri, Some(body)).await
        }

        /// Creates a product; returns its id and variant ids in size order.
        pub async fn seed_product(&self, name: &str, price_cents: i64, sizes: &str, stock: i64) -> (i64, Vec<i64>) {
            let listing = self
                .db
                .products()
                .create(NewProduct {
                    name: name.to_string(),
                    description: None,
                    price_cents,
                    category_id: None,
                    specific_category_id: None,
                    sizes: Some(sizes.to_string()),
                    stock,
                })
                .await
                .unwrap();
            let ids = listing.variants.iter().map(|v| v.id).collect();
            (listing.product.id, ids)
        }

        /// Links a product and its variants to made-up cloud ids
        /// (`product_id + 500`, `variant_id + 7000`).
        pub async fn link(&self, product_id: i64) {
            let listing = self.db.products().get(product_id).await.unwrap();
            let variants: Vec<(String, i64)> = listing
                .variants
                .iter()
                .map(|v| (v.sku.clone(), v.id + 7000))
                .collect();
            self.db
                .products()
                .link_cloud(product_id, product_id + 500, &variants)
                .await
                .unwrap();
        }

        pub async fn stock(&self, variant_id: i64) -> i64 {
            self.db.inventory().stock_of(variant_id).await.unwrap()
        }
    }
}
