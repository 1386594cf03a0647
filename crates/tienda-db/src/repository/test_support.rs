//! Shared fixtures for repository tests.

use crate::pool::{Database, DbConfig};
use crate::repository::product::NewProduct;

/// Fresh in-memory database with migrations applied.
pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// Creates a product with one variant per size and `stock` units each.
///
/// Returns the product id and the variant ids in size-list order.
pub async fn seed_product(
    db: &Database,
    name: &str,
    price_cents: i64,
    sizes: &str,
    stock: i64,
) -> (i64, Vec<i64>) {
    let listing = db
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

/// Id of a seeded payment method by display name.
pub async fn method_id(db: &Database, name: &str) -> i64 {
    sqlx::query_scalar("SELECT id FROM payment_methods WHERE name = ?1")
        .bind(name)
        .fetch_one(db.pool())
        .await
        .unwrap()
}
