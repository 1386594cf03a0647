//! # Product Routes
//!
//! Catalog, categories, stock and the cloud store link.
//!
//! ## Cloud Mirroring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Route                       Local write        Cloud effect            │
//! │  ──────────────────────────  ─────────────────  ─────────────────────── │
//! │  PUT    /{id}                product row        name, stock, price      │
//! │  DELETE /{id}                product + variants delete product         │
//! │  PUT    /variants/{id}       sku / stock        stock                   │
//! │  POST   /bulk-update-price   prices             marked-up prices        │
//! │  POST   /stock/bulk-update   stock counts       queued sync job (202)   │
//! │  POST   /{id}/publish        cloud ids          create product          │
//! │                                                                         │
//! │  Every cloud effect runs after commit and is best-effort, except       │
//! │  publish: nothing local changes until the cloud answers, so its        │
//! │  failure is reported as EXTERNAL_SERVICE.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use tienda_cloud::{NewCloudProduct, NewCloudVariant, SyncJobState};
use tienda_core::{Category, Money, StockChange};
use tienda_db::repository::inventory::LowStockItem;
use tienda_db::repository::product::{
    BulkPriceUpdate, NewProduct, NewVariant, ProductFilter, ProductListing, ProductPage,
    ProductUpdate, StockCount, VariantStock, VariantUpdate,
};
use tienda_db::{CategoryKind, CategoryRepository};

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;

/// Default size of the low-stock list.
const LOW_STOCK_LIMIT: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/{id}", put(update_product).delete(delete_product))
        .route("/{id}/publish", post(publish_product))
        .route(
            "/categories",
            get(list_categories::<false>).post(create_category::<false>),
        )
        .route(
            "/categories/{id}",
            put(update_category::<false>).delete(delete_category::<false>),
        )
        .route(
            "/specific-categories",
            get(list_categories::<true>).post(create_category::<true>),
        )
        .route(
            "/specific-categories/{id}",
            put(update_category::<true>).delete(delete_category::<true>),
        )
        .route("/variants", post(add_variant))
        .route("/variants/{id}", put(update_variant).delete(delete_variant))
        .route("/bulk-update-price", post(bulk_update_price))
        .route("/stock/bulk-update", post(bulk_update_stock))
        .route("/stock/jobs/{id}", get(job_status))
        .route("/low-stock", get(low_stock))
        .route("/tiendanube/test", get(test_cloud_connection))
}

// =============================================================================
// Products
// =============================================================================

/// GET /api/products
async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Json<ProductPage>> {
    Ok(Json(state.db.products().list(&filter).await?))
}

/// POST /api/products
async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<ProductListing>)> {
    let listing = state.db.products().create(input).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// PUT /api/products/{id}
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ProductUpdate>,
) -> ApiResult<Json<ProductListing>> {
    let listing = state.db.products().update(id, input).await?;

    if let Some(cloud_product_id) = listing.product.cloud_product_id {
        mirror_product(&state, cloud_product_id, &listing).await;
    }

    Ok(Json(listing))
}

/// Pushes name, stock and marked-up price of a linked product.
async fn mirror_product(state: &AppState, cloud_product_id: i64, listing: &ProductListing) {
    state
        .pusher
        .push_product(
            cloud_product_id,
            &listing.product.name,
            listing.product.description.as_deref(),
        )
        .await;

    let changes: Vec<StockChange> = listing
        .linked_variants()
        .map(|(link, variant)| StockChange {
            variant_id: variant.id,
            new_stock: variant.stock_on_hand,
            cloud: Some(link),
        })
        .collect();
    let stock = state.pusher.push_stock(&changes).await;

    let price = Money::from_cents(listing.product.price_cents);
    let prices: Vec<_> = listing.linked_variants().map(|(link, _)| (link, price)).collect();
    let prices = state.pusher.push_prices(&prices).await;

    info!(
        product_id = listing.product.id,
        cloud_product_id,
        stock_failed = stock.failed,
        price_failed = prices.failed,
        "Product mirrored to cloud store"
    );
}

/// DELETE /api/products/{id}
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let cloud_product_id = state.db.products().delete(id).await?;

    let cloud_deleted = match cloud_product_id {
        Some(cloud_id) => Some(state.pusher.delete_product(cloud_id).await),
        None => None,
    };

    Ok(Json(json!({ "deleted": id, "cloud_deleted": cloud_deleted })))
}

/// POST /api/products/{id}/publish
async fn publish_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let listing = state.db.products().get(id).await?;
    if let Some(cloud_id) = listing.product.cloud_product_id {
        return Err(ApiError::conflict(format!(
            "Product {} is already published as {}",
            id, cloud_id
        )));
    }

    let price = state
        .pusher
        .cloud_price(Money::from_cents(listing.product.price_cents));
    let product = NewCloudProduct {
        name: listing.product.name.clone(),
        description: listing.product.description.clone(),
        variants: listing
            .variants
            .iter()
            .map(|v| NewCloudVariant {
                sku: v.sku.clone(),
                size: v.size.clone(),
                price,
                stock: v.stock_on_hand,
            })
            .collect(),
    };

    let created = state.pusher.store().create_product(&product).await?;
    let linked = state
        .db
        .products()
        .link_cloud(id, created.id, &created.sku_map())
        .await?;

    if (linked as usize) < listing.variants.len() {
        warn!(
            product_id = id,
            cloud_product_id = created.id,
            linked,
            variants = listing.variants.len(),
            "Some variants were not matched by SKU"
        );
    }

    Ok(Json(json!({
        "product_id": id,
        "cloud_product_id": created.id,
        "linked_variants": linked,
    })))
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Deserialize)]
struct CategoryInput {
    name: String,
}

fn categories<const SPECIFIC: bool>(state: &AppState) -> CategoryRepository {
    if SPECIFIC {
        CategoryRepository::new(state.db.pool().clone(), CategoryKind::Specific)
    } else {
        CategoryRepository::new(state.db.pool().clone(), CategoryKind::General)
    }
}

/// GET /api/products/categories, /specific-categories
async fn list_categories<const SPECIFIC: bool>(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(categories::<SPECIFIC>(&state).list().await?))
}

/// POST /api/products/categories, /specific-categories
async fn create_category<const SPECIFIC: bool>(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = categories::<SPECIFIC>(&state).create(&input.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/products/categories/{id}, /specific-categories/{id}
async fn update_category<const SPECIFIC: bool>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<Json<Category>> {
    Ok(Json(
        categories::<SPECIFIC>(&state)
            .update(id, &input.name)
            .await?,
    ))
}

/// DELETE /api/products/categories/{id}, /specific-categories/{id}
async fn delete_category<const SPECIFIC: bool>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    categories::<SPECIFIC>(&state).delete(id).await?;
    Ok(Json(json!({ "deleted": id })))
}

// =============================================================================
// Variants
// =============================================================================

/// POST /api/products/variants
async fn add_variant(
    State(state): State<AppState>,
    Json(input): Json<NewVariant>,
) -> ApiResult<(StatusCode, Json<VariantStock>)> {
    let variant = state.db.products().add_variant(input).await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

/// PUT /api/products/variants/{id}
async fn update_variant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<VariantUpdate>,
) -> ApiResult<Json<Value>> {
    let change = state.db.products().update_variant(id, input).await?;

    if let Some(change) = change {
        state.pusher.push_stock(&[change]).await;
    }

    Ok(Json(json!({
        "variant_id": id,
        "stock_on_hand": change.map(|c| c.new_stock),
    })))
}

/// DELETE /api/products/variants/{id}
async fn delete_variant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.db.products().delete_variant(id).await?;
    Ok(Json(json!({ "deleted": id })))
}

// =============================================================================
// Bulk Actions
// =============================================================================

/// POST /api/products/bulk-update-price
async fn bulk_update_price(
    State(state): State<AppState>,
    Json(input): Json<BulkPriceUpdate>,
) -> ApiResult<Json<Value>> {
    let result = state.db.products().bulk_update_price(input).await?;
    let cloud = state.pusher.push_prices(&result.cloud_prices).await;

    Ok(Json(json!({ "updated": result.updated, "cloud": cloud })))
}

#[derive(Debug, Deserialize)]
struct BulkStockRequest {
    #[serde(default)]
    items: Vec<StockCount>,
}

/// POST /api/products/stock/bulk-update
///
/// Commits the counts, then queues the cloud push and answers `202`.
async fn bulk_update_stock(
    State(state): State<AppState>,
    Json(input): Json<BulkStockRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let result = state.db.products().bulk_set_stock(&input.items).await?;

    let job_id = state.jobs.enqueue(&result.changes).await.map_err(|e| {
        warn!(error = %e, updated = result.updated, "Stock saved but cloud sync not queued");
        ApiError::from(e)
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "job_id": job_id,
            "updated": result.updated,
            "unknown_skus": result.unknown_skus,
        })),
    ))
}

/// GET /api/products/stock/jobs/{id}
async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SyncJobState>> {
    state
        .jobs
        .status(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("Sync job not found: {}", id)))
}

#[derive(Debug, Deserialize)]
struct LowStockQuery {
    limit: Option<i64>,
}

/// GET /api/products/low-stock
async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> ApiResult<Json<Vec<LowStockItem>>> {
    let limit = query.limit.unwrap_or(LOW_STOCK_LIMIT).clamp(1, 500);
    Ok(Json(state.db.inventory().low_stock(limit).await?))
}

/// GET /api/products/tiendanube/test
async fn test_cloud_connection(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let store = state.pusher.store().store_info().await?;
    Ok(Json(json!({ "connected": true, "store": store })))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tienda_cloud::testing::CloudCall;
    use tienda_core::CloudLink;

    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn test_create_and_list_products() {
        let app = TestApp::new().await;

        let (status, body) = app
            .post(
                "/api/products",
                json!({ "name": "Camiseta Boca", "price_cents": 25_000, "sizes": "S, M", "stock": 4 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["variants"].as_array().unwrap().len(), 2);
        assert_eq!(body["total_stock"], 8);

        let (status, body) = app.get("/api/products?search=boca").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total_items"], 1);
        assert_eq!(body["products"][0]["name"], "Camiseta Boca");
    }

    #[tokio::test]
    async fn test_update_linked_product_pushes_to_cloud() {
        let app = TestApp::new().await;
        let (product_id, variants) = app.seed_product("Short", 10_000, "M", 3).await;
        app.link(product_id).await;

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/products/{}", product_id),
                Some(json!({ "name": "Short Titular", "price_cents": 12_000 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Short Titular");

        let link = CloudLink {
            product_id: product_id + 500,
            variant_id: variants[0] + 7000,
        };
        assert_eq!(
            app.store.calls(),
            vec![
                CloudCall::UpdateProduct(product_id + 500, "Short Titular".into()),
                CloudCall::Stock(link, 3),
                CloudCall::Price(link, tienda_core::Money::from_cents(12_000)),
            ]
        );
    }

    #[tokio::test]
    async fn test_cloud_failure_does_not_fail_local_update() {
        let app = TestApp::new().await;
        let (product_id, variants) = app.seed_product("Buzo", 30_000, "L", 5).await;
        app.link(product_id).await;
        app.store.fail_next(10);

        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/api/products/variants/{}", variants[0]),
                Some(json!({ "stock": 9 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.stock(variants[0]).await, 9);
    }

    #[tokio::test]
    async fn test_publish_links_variants() {
        let app = TestApp::new().await;
        let (product_id, _) = app.seed_product("Gorra", 8_000, "U", 2).await;

        let (status, body) = app
            .post(&format!("/api/products/{}/publish", product_id), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["linked_variants"], 1);

        let listing = app.db.products().get(product_id).await.unwrap();
        assert!(listing.product.cloud_product_id.is_some());
        assert_eq!(listing.linked_variants().count(), 1);

        let (status, body) = app
            .post(&format!("/api/products/{}/publish", product_id), json!({}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_publish_surfaces_cloud_failure() {
        let app = TestApp::new().await;
        let (product_id, _) = app.seed_product("Gorra", 8_000, "U", 2).await;
        app.store.fail_next(1);

        let (status, body) = app
            .post(&format!("/api/products/{}/publish", product_id), json!({}))
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "EXTERNAL_SERVICE");

        let listing = app.db.products().get(product_id).await.unwrap();
        assert!(listing.product.cloud_product_id.is_none());
    }

    #[tokio::test]
    async fn test_bulk_stock_update_returns_observable_job() {
        let app = TestApp::new().await;
        let (product_id, variants) = app.seed_product("Media", 2_000, "U", 1).await;
        app.link(product_id).await;
        let sku = app.db.products().get(product_id).await.unwrap().variants[0]
            .sku
            .clone();

        let (status, body) = app
            .post(
                "/api/products/stock/bulk-update",
                json!({ "items": [{ "sku": sku, "quantity": 12 }, { "sku": "NOPE", "quantity": 1 }] }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["updated"], 1);
        assert_eq!(body["unknown_skus"], json!(["NOPE"]));
        assert_eq!(app.stock(variants[0]).await, 12);

        let job_id = body["job_id"].as_str().unwrap().to_string();
        let mut job = serde_json::Value::Null;
        for _ in 0..50 {
            let (status, body) = app.get(&format!("/api/products/stock/jobs/{}", job_id)).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "completed" {
                job = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(job["pushed"], 1);
    }

    #[tokio::test]
    async fn test_bulk_stock_update_rejects_empty_list() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post("/api/products/stock/bulk-update", json!({ "items": [] }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = TestApp::new().await;
        let (status, _) = app
            .get("/api/products/stock/jobs/00000000-0000-0000-0000-000000000000")
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_category_delete_rejected_while_referenced() {
        let app = TestApp::new().await;
        let (status, category) = app
            .post("/api/products/categories", json!({ "name": "Camisetas" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let category_id = category["id"].as_i64().unwrap();

        app.post(
            "/api/products",
            json!({ "name": "Titular", "price_cents": 1_000, "category_id": category_id }),
        )
        .await;

        let (status, body) = app
            .send(
                Method::DELETE,
                &format!("/api/products/categories/{}", category_id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFLICT");

        let (_, list) = app.get("/api/products/specific-categories").await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_cloud_connection_reports_store() {
        let app = TestApp::new().await;
        app.store.fail_next(1);
        let (status, _) = app.get("/api/products/tiendanube/test").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, body) = app.get("/api/products/tiendanube/test").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"]["name"], "Test Store");
    }
}
