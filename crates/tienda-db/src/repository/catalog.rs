//! # Category Repository
//!
//! Categories and specific categories (league/type tags) share one shape
//! and one set of rules, so a single repository serves both tables.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tienda_core::validation::validate_name;
use tienda_core::Category;

/// Which category table a repository operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryKind {
    /// `categories`, referenced by `products.category_id`.
    General,
    /// `specific_categories`, referenced by `products.specific_category_id`.
    Specific,
}

impl CategoryKind {
    const fn table(self) -> &'static str {
        match self {
            CategoryKind::General => "categories",
            CategoryKind::Specific => "specific_categories",
        }
    }

    const fn product_column(self) -> &'static str {
        match self {
            CategoryKind::General => "category_id",
            CategoryKind::Specific => "specific_category_id",
        }
    }

    const fn entity(self) -> &'static str {
        match self {
            CategoryKind::General => "Category",
            CategoryKind::Specific => "Specific category",
        }
    }
}

/// Repository for either category table.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    kind: CategoryKind,
}

impl CategoryRepository {
    /// Creates a repository over the table selected by `kind`.
    pub fn new(pool: SqlitePool, kind: CategoryKind) -> Self {
        CategoryRepository { pool, kind }
    }

    /// All rows ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT id, name FROM {} ORDER BY name", self.kind.table());
        let rows = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Inserts a category. Duplicate names are a `UniqueViolation`.
    pub async fn create(&self, name: &str) -> DbResult<Category> {
        let name = validate_name("name", name)?;
        let sql = format!(
            "INSERT INTO {} (name) VALUES (?1) RETURNING id, name",
            self.kind.table()
        );
        let row = sqlx::query_as::<_, Category>(&sql)
            .bind(&name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name.clone()),
                other => other,
            })?;

        info!(kind = ?self.kind, id = row.id, name = %row.name, "Category created");
        Ok(row)
    }

    /// Renames a category.
    pub async fn update(&self, id: i64, name: &str) -> DbResult<Category> {
        let name = validate_name("name", name)?;
        let sql = format!(
            "UPDATE {} SET name = ?1 WHERE id = ?2 RETURNING id, name",
            self.kind.table()
        );
        let row = sqlx::query_as::<_, Category>(&sql)
            .bind(&name)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(self.kind.entity(), id))?;

        debug!(kind = ?self.kind, id, "Category renamed");
        Ok(row)
    }

    /// Deletes a category that no product references.
    ///
    /// ## Errors
    /// - `Conflict` while products still reference it
    /// - `NotFound` for an unknown id
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let in_use: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM products WHERE {} = ?1",
            self.kind.product_column()
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if in_use > 0 {
            return Err(DbError::conflict(format!(
                "{} {} is used by {} product(s)",
                self.kind.entity(),
                id,
                in_use
            )));
        }

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.entity(), id));
        }

        info!(kind = ?self.kind, id, "Category deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::NewProduct;
    use crate::repository::test_support::test_db;

    #[tokio::test]
    async fn test_category_crud() {
        let db = test_db().await;
        let repo = db.categories();

        let cat = repo.create("Camisetas").await.unwrap();
        let renamed = repo.update(cat.id, "Remeras").await.unwrap();
        assert_eq!(renamed.name, "Remeras");

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);

        repo.delete(cat.id).await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
        assert!(matches!(
            repo.delete(cat.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = test_db().await;
        db.specific_categories().create("NBA").await.unwrap();
        let err = db.specific_categories().create("NBA").await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_delete_in_use_is_conflict() {
        let db = test_db().await;
        let cat = db.categories().create("Botines").await.unwrap();
        db.products()
            .create(NewProduct {
                name: "Botin X".into(),
                description: None,
                price_cents: 50_000,
                category_id: Some(cat.id),
                specific_category_id: None,
                sizes: None,
                stock: 1,
            })
            .await
            .unwrap();

        let err = db.categories().delete(cat.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }
}
