//! # Product Repository
//!
//! Database operations for products and their variants.
//!
//! ## Key Operations
//! - Paginated, filtered listing with per-variant stock
//! - Product creation from a size list (one variant + inventory per size)
//! - Bulk price actions and bulk absolute stock counts
//! - Scan by SKU or numeric variant id
//! - Linking local rows to their cloud store counterparts
//!
//! ## Listing Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How Listing Search Works                             │
//! │                                                                         │
//! │  User types: "boca  xl"                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  search_terms() → ["boca", "xl"]                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Every term must match ONE of:                                         │
//! │    LOWER(product name)  LIKE %term%                                    │
//! │    LOWER(category name) LIKE %term%                                    │
//! │    any variant SKU      LIKE %term%                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  + category / specific category / price range filters                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COUNT(*) for meta, then one page ordered newest first                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::inventory;
use tienda_core::pricing::PriceAdjustment;
use tienda_core::validation::{
    parse_size_list, search_terms, validate_name, validate_price_cents, validate_sku,
    validate_stock_count,
};
use tienda_core::{CloudLink, Money, Product, StockChange, ValidationError};

/// Default page size of the product listing.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

const PRODUCT_COLUMNS: &str = r#"
    p.id, p.name, p.description, p.price_cents, p.category_id,
    p.specific_category_id, p.cloud_product_id, p.cloud_synced,
    p.created_at, p.updated_at
"#;

// =============================================================================
// Shapes
// =============================================================================

/// Input of `POST /api/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub category_id: Option<i64>,
    pub specific_category_id: Option<i64>,
    /// Comma-separated sizes; blank means a single `U` variant.
    pub sizes: Option<String>,
    /// Initial stock of every variant.
    #[serde(default)]
    pub stock: i64,
}

/// Partial update of a product. `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<i64>,
    pub specific_category_id: Option<i64>,
}

/// Input of `POST /api/products/variants`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    pub product_id: i64,
    pub size: String,
    pub sku: Option<String>,
    #[serde(default)]
    pub stock: i64,
}

/// Input of `PUT /api/products/variants/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantUpdate {
    pub sku: Option<String>,
    /// Absolute stock count.
    pub stock: Option<i64>,
}

/// A variant together with its stock counters.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VariantStock {
    pub id: i64,
    pub product_id: i64,
    pub size: String,
    pub sku: String,
    pub color: Option<String>,
    pub cloud_variant_id: Option<i64>,
    pub stock_on_hand: i64,
    pub stock_minimum: i64,
}

/// A product with its variants, as listed and returned by writes.
#[derive(Debug, Clone, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<VariantStock>,
    pub total_stock: i64,
}

impl ProductListing {
    fn new(product: Product, variants: Vec<VariantStock>) -> Self {
        let total_stock = variants.iter().map(|v| v.stock_on_hand).sum();
        ProductListing {
            product,
            variants,
            total_stock,
        }
    }

    /// Variants that exist in the cloud store, with their link.
    pub fn linked_variants(&self) -> impl Iterator<Item = (CloudLink, &VariantStock)> {
        let product_id = self.product.cloud_product_id;
        self.variants.iter().filter_map(move |v| {
            CloudLink::from_parts(product_id, v.cloud_variant_id).map(|link| (link, v))
        })
    }
}

/// Query parameters of `GET /api/products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub specific_category_id: Option<i64>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// One page of products.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductListing>,
    pub meta: PageMeta,
}

/// Which products a bulk price action touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum PriceTarget {
    All,
    Category(i64),
    SpecificCategory(i64),
}

/// Input of `POST /api/products/bulk-update-price`.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkPriceUpdate {
    pub target: PriceTarget,
    pub adjustment: PriceAdjustment,
}

/// Outcome of a bulk price action.
#[derive(Debug, Clone, Default)]
pub struct BulkPriceResult {
    pub updated: u64,
    /// New local price of every cloud-linked variant touched.
    pub cloud_prices: Vec<(CloudLink, Money)>,
}

/// One line of a bulk stock count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCount {
    pub sku: String,
    pub quantity: i64,
}

/// Outcome of a bulk stock count.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkStockResult {
    pub updated: usize,
    pub unknown_skus: Vec<String>,
    #[serde(skip)]
    pub changes: Vec<StockChange>,
}

/// A variant resolved at the register.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScanResult {
    pub variant_id: i64,
    pub product_id: i64,
    pub name: String,
    pub size: String,
    pub sku: String,
    pub price_cents: i64,
    pub stock: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let page = repo.list(&ProductFilter { search: Some("boca".into()), ..Default::default() }).await?;
/// let listing = repo.get(42).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists one page of products matching `filter`.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<ProductPage> {
        let terms = filter
            .search
            .as_deref()
            .map(search_terms)
            .unwrap_or_default();
        let limit = filter.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        let page = filter.page.filter(|p| *p > 0).unwrap_or(1);

        debug!(?terms, page, limit, "Listing products");

        let mut count_query = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id WHERE 1 = 1",
        );
        push_filters(&mut count_query, filter, &terms);
        let total_items: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p LEFT JOIN categories c ON c.id = p.category_id WHERE 1 = 1"
        ));
        push_filters(&mut page_query, filter, &terms);
        page_query
            .push(" ORDER BY p.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1) * limit);
        let products: Vec<Product> = page_query.build_query_as().fetch_all(&self.pool).await?;

        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let mut variants = self.variants_for(&ids).await?;
        let products = products
            .into_iter()
            .map(|p| {
                let vs = variants.remove(&p.id).unwrap_or_default();
                ProductListing::new(p, vs)
            })
            .collect();

        Ok(ProductPage {
            products,
            meta: PageMeta {
                total_items,
                total_pages: (total_items + limit - 1) / limit,
                current_page: page,
            },
        })
    }

    /// Gets a product with its variants.
    pub async fn get(&self, id: i64) -> DbResult<ProductListing> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))?;

        let variants = self.variants_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(ProductListing::new(product, variants))
    }

    /// Variants with stock of the given products, keyed by product id.
    async fn variants_for(&self, product_ids: &[i64]) -> DbResult<HashMap<i64, Vec<VariantStock>>> {
        let mut grouped: HashMap<i64, Vec<VariantStock>> = HashMap::new();
        if product_ids.is_empty() {
            return Ok(grouped);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT
                v.id, v.product_id, v.size, v.sku, v.color, v.cloud_variant_id,
                COALESCE(i.stock_on_hand, 0) AS stock_on_hand,
                COALESCE(i.stock_minimum, 2) AS stock_minimum
            FROM variants v
            LEFT JOIN inventory i ON i.variant_id = v.id
            WHERE v.product_id IN (
            "#,
        );
        let mut ids = query.separated(", ");
        for id in product_ids {
            ids.push_bind(*id);
        }
        query.push(") ORDER BY v.id");

        let rows: Vec<VariantStock> = query.build_query_as().fetch_all(&self.pool).await?;
        for row in rows {
            grouped.entry(row.product_id).or_default().push(row);
        }
        Ok(grouped)
    }

    /// Creates a product with one variant per size, all in one transaction.
    ///
    /// ## What This Does
    /// 1. Validates name, price, stock and the size list
    /// 2. Inserts the product
    /// 3. Per size: variant with SKU `P{id}-{size}` and an inventory row
    ///    holding `stock` units with the default minimum
    pub async fn create(&self, input: NewProduct) -> DbResult<ProductListing> {
        let name = validate_name("name", &input.name)?;
        validate_price_cents(input.price_cents)?;
        validate_stock_count(input.stock)?;
        let sizes = parse_size_list(input.sizes.as_deref().unwrap_or(""))?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let product_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                name, description, price_cents, category_id, specific_category_id,
                cloud_synced, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(&input.description)
        .bind(input.price_cents)
        .bind(input.category_id)
        .bind(input.specific_category_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for size in &sizes {
            let sku = default_sku(product_id, size);
            let variant_id: i64 = sqlx::query_scalar(
                "INSERT INTO variants (product_id, size, sku) VALUES (?1, ?2, ?3) RETURNING id",
            )
            .bind(product_id)
            .bind(size)
            .bind(&sku)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| with_value(e, &sku))?;

            inventory::set_absolute(&mut tx, variant_id, input.stock).await?;
        }

        tx.commit().await?;

        info!(product_id, name = %name, sizes = sizes.len(), "Product created");
        self.get(product_id).await
    }

    /// Applies a partial update and returns the fresh listing.
    pub async fn update(&self, id: i64, input: ProductUpdate) -> DbResult<ProductListing> {
        let name = input
            .name
            .as_deref()
            .map(|n| validate_name("name", n))
            .transpose()?;
        if let Some(price) = input.price_cents {
            validate_price_cents(price)?;
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                price_cents = COALESCE(?3, price_cents),
                category_id = COALESCE(?4, category_id),
                specific_category_id = COALESCE(?5, specific_category_id),
                updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(name)
        .bind(input.description)
        .bind(input.price_cents)
        .bind(input.category_id)
        .bind(input.specific_category_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(product_id = id, "Product updated");
        self.get(id).await
    }

    /// Deletes a product, its variants and their inventory.
    ///
    /// Returns the cloud product id when the product was published.
    ///
    /// ## Errors
    /// - `Conflict` while a pending reservation still holds one of its sizes
    pub async fn delete(&self, id: i64) -> DbResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let cloud_id: Option<Option<i64>> =
            sqlx::query_scalar("SELECT cloud_product_id FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(cloud_id) = cloud_id else {
            return Err(DbError::not_found("Product", id));
        };

        if pending_holds(&mut tx, "v.product_id", id).await? > 0 {
            return Err(DbError::conflict(format!(
                "Product {} is held by a pending reservation",
                id
            )));
        }

        // variants and inventory go with the product through ON DELETE CASCADE
        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(product_id = id, ?cloud_id, "Product deleted");
        Ok(cloud_id)
    }

    /// Adds a size to an existing product.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown product
    /// - `Conflict` when the product already has that size
    pub async fn add_variant(&self, input: NewVariant) -> DbResult<VariantStock> {
        let size = validate_name("size", &input.size)?;
        validate_stock_count(input.stock)?;
        let sku = match input.sku.as_deref().map(str::trim) {
            Some(sku) if !sku.is_empty() => {
                validate_sku(sku)?;
                sku.to_string()
            }
            _ => default_sku(input.product_id, &size),
        };

        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
            .bind(input.product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Product", input.product_id));
        }

        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM variants WHERE product_id = ?1 AND LOWER(size) = LOWER(?2)",
        )
        .bind(input.product_id)
        .bind(&size)
        .fetch_one(&mut *tx)
        .await?;
        if taken > 0 {
            return Err(DbError::conflict(format!(
                "Product {} already has size {}",
                input.product_id, size
            )));
        }

        let variant_id: i64 = sqlx::query_scalar(
            "INSERT INTO variants (product_id, size, sku) VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(input.product_id)
        .bind(&size)
        .bind(&sku)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| with_value(e, &sku))?;

        let change = inventory::set_absolute(&mut tx, variant_id, input.stock).await?;
        tx.commit().await?;

        info!(product_id = input.product_id, variant_id, size = %size, "Variant added");
        Ok(VariantStock {
            id: variant_id,
            product_id: input.product_id,
            size,
            sku,
            color: None,
            cloud_variant_id: None,
            stock_on_hand: change.new_stock,
            stock_minimum: tienda_core::DEFAULT_STOCK_MINIMUM,
        })
    }

    /// Sets the SKU and/or an absolute stock count of a variant.
    ///
    /// Returns the stock change when the count was written.
    pub async fn update_variant(
        &self,
        id: i64,
        input: VariantUpdate,
    ) -> DbResult<Option<StockChange>> {
        if let Some(sku) = &input.sku {
            validate_sku(sku)?;
        }
        if let Some(stock) = input.stock {
            validate_stock_count(stock)?;
        }

        let mut tx = self.pool.begin().await?;

        // also the existence check when only stock changes
        let link = inventory::variant_link(&mut tx, id).await?;

        if let Some(sku) = &input.sku {
            let sku = sku.trim();
            sqlx::query("UPDATE variants SET sku = ?1 WHERE id = ?2")
                .bind(sku)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| with_value(e, sku))?;
        }

        let change = match input.stock {
            Some(stock) => Some(inventory::set_absolute(&mut tx, id, stock).await?),
            None => None,
        };

        tx.commit().await?;

        debug!(variant_id = id, linked = link.is_some(), "Variant updated");
        Ok(change)
    }

    /// Deletes one variant and its inventory row.
    ///
    /// Refused with `Conflict` while a pending reservation holds it.
    pub async fn delete_variant(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        if pending_holds(&mut tx, "v.id", id).await? > 0 {
            return Err(DbError::conflict(format!(
                "Variant {} is held by a pending reservation",
                id
            )));
        }

        let result = sqlx::query("DELETE FROM variants WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        tx.commit().await?;

        info!(variant_id = id, "Variant deleted");
        Ok(())
    }

    /// Applies a price action to every targeted product.
    pub async fn bulk_update_price(&self, input: BulkPriceUpdate) -> DbResult<BulkPriceResult> {
        input.adjustment.validate()?;

        let mut tx = self.pool.begin().await?;

        let (filter, target_id) = match input.target {
            PriceTarget::All => ("", None),
            PriceTarget::Category(id) => (" WHERE category_id = ?1", Some(id)),
            PriceTarget::SpecificCategory(id) => (" WHERE specific_category_id = ?1", Some(id)),
        };
        let sql = format!("SELECT id, price_cents, cloud_product_id FROM products{filter}");
        let mut query = sqlx::query_as::<_, (i64, i64, Option<i64>)>(&sql);
        if let Some(id) = target_id {
            query = query.bind(id);
        }
        let targets = query.fetch_all(&mut *tx).await?;

        let now = Utc::now();
        let mut result = BulkPriceResult::default();

        for (product_id, price_cents, cloud_product_id) in targets {
            let new_price = input.adjustment.apply(Money::from_cents(price_cents));
            sqlx::query("UPDATE products SET price_cents = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(new_price.cents())
                .bind(now)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            result.updated += 1;

            if cloud_product_id.is_some() {
                let cloud_variants: Vec<Option<i64>> = sqlx::query_scalar(
                    "SELECT cloud_variant_id FROM variants WHERE product_id = ?1 AND cloud_variant_id IS NOT NULL",
                )
                .bind(product_id)
                .fetch_all(&mut *tx)
                .await?;
                result.cloud_prices.extend(
                    cloud_variants
                        .into_iter()
                        .filter_map(|v| CloudLink::from_parts(cloud_product_id, v))
                        .map(|link| (link, new_price)),
                );
            }
        }

        tx.commit().await?;

        info!(target = ?input.target, updated = result.updated, "Bulk price update applied");
        Ok(result)
    }

    /// Sets absolute stock counts by SKU in one transaction.
    ///
    /// Unknown SKUs are skipped and reported.
    pub async fn bulk_set_stock(&self, items: &[StockCount]) -> DbResult<BulkStockResult> {
        if items.is_empty() {
            return Err(ValidationError::Empty {
                field: "items".to_string(),
            }
            .into());
        }
        for item in items {
            validate_stock_count(item.quantity)?;
        }

        let mut tx = self.pool.begin().await?;
        let mut result = BulkStockResult::default();

        for item in items {
            let variant_id: Option<i64> =
                sqlx::query_scalar("SELECT id FROM variants WHERE sku = ?1")
                    .bind(item.sku.trim())
                    .fetch_optional(&mut *tx)
                    .await?;

            match variant_id {
                Some(variant_id) => {
                    let change = inventory::set_absolute(&mut tx, variant_id, item.quantity).await?;
                    result.changes.push(change);
                    result.updated += 1;
                }
                None => result.unknown_skus.push(item.sku.clone()),
            }
        }

        tx.commit().await?;

        info!(
            updated = result.updated,
            unknown = result.unknown_skus.len(),
            "Bulk stock count applied"
        );
        Ok(result)
    }

    /// Resolves a scanned code: exact SKU first, then numeric variant id.
    pub async fn scan(&self, code: &str) -> DbResult<ScanResult> {
        let code = code.trim();
        const SCAN_SELECT: &str = r#"
            SELECT
                v.id AS variant_id, p.id AS product_id, p.name, v.size, v.sku,
                p.price_cents, COALESCE(i.stock_on_hand, 0) AS stock
            FROM variants v
            JOIN products p ON p.id = v.product_id
            LEFT JOIN inventory i ON i.variant_id = v.id
        "#;

        let by_sku = sqlx::query_as::<_, ScanResult>(&format!("{SCAN_SELECT} WHERE v.sku = ?1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(found) = by_sku {
            return Ok(found);
        }

        if let Ok(id) = code.parse::<i64>() {
            let by_id = sqlx::query_as::<_, ScanResult>(&format!("{SCAN_SELECT} WHERE v.id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            if let Some(found) = by_id {
                return Ok(found);
            }
        }

        Err(DbError::not_found("Variant", code))
    }

    /// Stores the cloud ids returned when a product was published.
    ///
    /// Variants are matched by SKU. Returns how many variants were linked.
    pub async fn link_cloud(
        &self,
        product_id: i64,
        cloud_product_id: i64,
        variants: &[(String, i64)],
    ) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE products SET cloud_product_id = ?1, cloud_synced = 1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(cloud_product_id)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product_id));
        }

        let mut linked = 0;
        for (sku, cloud_variant_id) in variants {
            linked += sqlx::query(
                "UPDATE variants SET cloud_variant_id = ?1 WHERE product_id = ?2 AND sku = ?3",
            )
            .bind(cloud_variant_id)
            .bind(product_id)
            .bind(sku)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        info!(product_id, cloud_product_id, linked, "Product linked to cloud store");
        Ok(linked)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// SKU given to a variant when none is supplied.
pub fn default_sku(product_id: i64, size: &str) -> String {
    format!("P{}-{}", product_id, size)
}

/// Fills the offending value into a unique violation.
fn with_value(err: sqlx::Error, value: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, value),
        other => other,
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter, terms: &[String]) {
    for term in terms {
        let pattern = format!("%{}%", term);
        query
            .push(" AND (LOWER(p.name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(COALESCE(c.name, '')) LIKE ")
            .push_bind(pattern.clone())
            .push(
                " OR EXISTS (SELECT 1 FROM variants sv WHERE sv.product_id = p.id AND LOWER(sv.sku) LIKE ",
            )
            .push_bind(pattern)
            .push("))");
    }
    if let Some(id) = filter.category_id {
        query.push(" AND p.category_id = ").push_bind(id);
    }
    if let Some(id) = filter.specific_category_id {
        query.push(" AND p.specific_category_id = ").push_bind(id);
    }
    if let Some(min) = filter.min_price_cents {
        query.push(" AND p.price_cents >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price_cents {
        query.push(" AND p.price_cents <= ").push_bind(max);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

/// Counts pending reservation lines on the variants matched by `column = id`.
///
/// Settled reservations keep their lines with a NULL variant after a delete,
/// pending ones would lose the stock they hold.
async fn pending_holds(conn: &mut SqliteConnection, column: &str, id: i64) -> DbResult<i64> {
    let sql = format!(
        r#"
        SELECT COUNT(*)
        FROM reservation_items ri
        JOIN reservations r ON r.id = ri.reservation_id
        JOIN variants v ON v.id = ri.variant_id
        WHERE {column} = ?1 AND r.status = 'pending'
        "#
    );
    let count = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::reservation::{NewReservation, ReservationLine};
    use crate::repository::test_support::{seed_product, test_db};

    #[tokio::test]
    async fn test_create_builds_variants_from_sizes() {
        let db = test_db().await;
        let (product_id, variants) = seed_product(&db, "Camiseta Boca", 45_000, "S, M, L", 4).await;
        assert_eq!(variants.len(), 3);

        let listing = db.products().get(product_id).await.unwrap();
        assert_eq!(listing.total_stock, 12);
        assert_eq!(listing.variants[1].sku, format!("P{}-M", product_id));
        assert_eq!(listing.variants[1].stock_minimum, 2);
    }

    #[tokio::test]
    async fn test_create_without_sizes_uses_default() {
        let db = test_db().await;
        let (product_id, variants) = seed_product(&db, "Pelota", 15_000, "", 1).await;
        assert_eq!(variants.len(), 1);
        let listing = db.products().get(product_id).await.unwrap();
        assert_eq!(listing.variants[0].size, "U");
    }

    #[tokio::test]
    async fn test_list_search_and_pagination() {
        let db = test_db().await;
        let cat = db.categories().create("Futbol").await.unwrap();
        db.products()
            .create(NewProduct {
                name: "Camiseta River".into(),
                description: None,
                price_cents: 40_000,
                category_id: Some(cat.id),
                specific_category_id: None,
                sizes: Some("M".into()),
                stock: 1,
            })
            .await
            .unwrap();
        seed_product(&db, "Camiseta Boca", 45_000, "M", 1).await;
        seed_product(&db, "Short Boca", 20_000, "M", 1).await;

        let repo = db.products();

        let page = repo
            .list(&ProductFilter {
                search: Some("camiseta boca".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.meta.total_items, 1);
        assert_eq!(page.products[0].product.name, "Camiseta Boca");

        // category name matches too
        let page = repo
            .list(&ProductFilter {
                search: Some("futbol".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.meta.total_items, 1);

        let page = repo
            .list(&ProductFilter {
                limit: Some(2),
                page: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.meta.total_items, 3);
        assert_eq!(page.meta.total_pages, 2);
        assert_eq!(page.products.len(), 1);

        let page = repo
            .list(&ProductFilter {
                min_price_cents: Some(41_000),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.meta.total_items, 1);
    }

    #[tokio::test]
    async fn test_add_variant_duplicate_size_conflict() {
        let db = test_db().await;
        let (product_id, _) = seed_product(&db, "Buzo", 30_000, "M", 0).await;

        let added = db
            .products()
            .add_variant(NewVariant {
                product_id,
                size: "XL".into(),
                sku: None,
                stock: 3,
            })
            .await
            .unwrap();
        assert_eq!(added.sku, format!("P{}-XL", product_id));
        assert_eq!(added.stock_on_hand, 3);

        let err = db
            .products()
            .add_variant(NewVariant {
                product_id,
                size: "m".into(),
                sku: None,
                stock: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_variant_sets_absolute_stock() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Gorra", 8_000, "U", 5).await;

        let change = db
            .products()
            .update_variant(
                variants[0],
                VariantUpdate {
                    sku: Some("GORRA-01".into()),
                    stock: Some(9),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.new_stock, 9);

        let scanned = db.products().scan("GORRA-01").await.unwrap();
        assert_eq!(scanned.stock, 9);
        assert_eq!(scanned.price_cents, 8_000);
    }

    #[tokio::test]
    async fn test_scan_falls_back_to_variant_id() {
        let db = test_db().await;
        let (_, variants) = seed_product(&db, "Media", 2_000, "U", 2).await;

        let scanned = db.products().scan(&variants[0].to_string()).await.unwrap();
        assert_eq!(scanned.variant_id, variants[0]);

        assert!(matches!(
            db.products().scan("NOPE").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_bulk_update_price_by_category() {
        let db = test_db().await;
        let cat = db.categories().create("Ofertas").await.unwrap();
        let listing = db
            .products()
            .create(NewProduct {
                name: "Campera".into(),
                description: None,
                price_cents: 10_000,
                category_id: Some(cat.id),
                specific_category_id: None,
                sizes: None,
                stock: 0,
            })
            .await
            .unwrap();
        let (other, _) = seed_product(&db, "Otro", 10_000, "U", 0).await;

        let result = db
            .products()
            .bulk_update_price(BulkPriceUpdate {
                target: PriceTarget::Category(cat.id),
                adjustment: PriceAdjustment::PercentIncrease(10.0),
            })
            .await
            .unwrap();
        assert_eq!(result.updated, 1);

        let updated = db.products().get(listing.product.id).await.unwrap();
        assert_eq!(updated.product.price_cents, 11_000);
        let untouched = db.products().get(other).await.unwrap();
        assert_eq!(untouched.product.price_cents, 10_000);
    }

    #[tokio::test]
    async fn test_bulk_set_stock_reports_unknown() {
        let db = test_db().await;
        let (product_id, variants) = seed_product(&db, "Remera", 9_000, "S", 1).await;

        let result = db
            .products()
            .bulk_set_stock(&[
                StockCount {
                    sku: format!("P{}-S", product_id),
                    quantity: 7,
                },
                StockCount {
                    sku: "MISSING".into(),
                    quantity: 1,
                },
            ])
            .await
            .unwrap();
        assert_eq!(result.updated, 1);
        assert_eq!(result.unknown_skus, vec!["MISSING".to_string()]);
        assert_eq!(db.inventory().stock_of(variants[0]).await.unwrap(), 7);

        assert!(matches!(
            db.products().bulk_set_stock(&[]).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_link_cloud_and_delete() {
        let db = test_db().await;
        let (product_id, _) = seed_product(&db, "Pantalon", 25_000, "M,L", 2).await;

        let linked = db
            .products()
            .link_cloud(product_id, 900, &[(format!("P{}-L", product_id), 9001)])
            .await
            .unwrap();
        assert_eq!(linked, 1);

        let listing = db.products().get(product_id).await.unwrap();
        let links: Vec<_> = listing.linked_variants().map(|(l, _)| l).collect();
        assert_eq!(
            links,
            vec![CloudLink {
                product_id: 900,
                variant_id: 9001
            }]
        );

        let cloud_id = db.products().delete(product_id).await.unwrap();
        assert_eq!(cloud_id, Some(900));
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    fn hold(variant_id: i64) -> NewReservation {
        NewReservation {
            customer_name: "Ana".into(),
            phone: None,
            items: vec![ReservationLine {
                variant_id,
                quantity: 1,
            }],
            deposit_cents: 0,
            payment_method_id: None,
            total_cents: None,
        }
    }

    #[tokio::test]
    async fn test_delete_refused_while_reservation_pending() {
        let db = test_db().await;
        let (product_id, variants) = seed_product(&db, "Campera", 40_000, "M,L", 2).await;
        let created = db.reservations().create(hold(variants[1]), 30).await.unwrap();

        let err = db.products().delete(product_id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        let err = db.products().delete_variant(variants[1]).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // the other size is not held
        db.products().delete_variant(variants[0]).await.unwrap();
        assert!(db.products().get(product_id).await.is_ok());

        db.reservations()
            .cancel(created.reservation.reservation.id)
            .await
            .unwrap();
        db.products().delete(product_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_keeps_settled_reservation_lines() {
        let db = test_db().await;
        let (product_id, variants) = seed_product(&db, "Buzo", 30_000, "U", 3).await;
        let created = db.reservations().create(hold(variants[0]), 30).await.unwrap();
        let reservation_id = created.reservation.reservation.id;
        db.reservations().cancel(reservation_id).await.unwrap();

        db.products().delete(product_id).await.unwrap();

        let detail = db.reservations().get(reservation_id).await.unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].variant_id, None);
        assert_eq!(detail.items[0].product_name, None);
        assert_eq!(detail.items[0].subtotal_cents, 30_000);
    }
}
