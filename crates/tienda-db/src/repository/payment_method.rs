//! # Payment Method Repository

use sqlx::SqlitePool;

use crate::error::DbResult;
use tienda_core::PaymentMethod;

/// Repository for payment methods.
#[derive(Debug, Clone)]
pub struct PaymentMethodRepository {
    pool: SqlitePool,
}

impl PaymentMethodRepository {
    /// Creates a new PaymentMethodRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentMethodRepository { pool }
    }

    /// All payment methods in insertion order.
    pub async fn list(&self) -> DbResult<Vec<PaymentMethod>> {
        let methods =
            sqlx::query_as::<_, PaymentMethod>("SELECT id, name, category FROM payment_methods ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(methods)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::test_db;
    use tienda_core::PaymentCategory;

    #[tokio::test]
    async fn test_seeded_methods_carry_categories() {
        let db = test_db().await;
        let methods = db.payment_methods().list().await.unwrap();

        assert_eq!(methods.len(), 4);
        assert_eq!(methods[0].name, "Efectivo");
        assert_eq!(methods[0].category, PaymentCategory::Cash);
        assert!(methods
            .iter()
            .any(|m| m.category == PaymentCategory::Transfer));
    }
}
