//! # Stats Repository
//!
//! Read-only aggregates for the dashboard and period reports.
//!
//! Date ranges are computed here as UTC instants and bound as parameters,
//! so every comparison is a plain `created_at >= ? AND created_at < ?` on
//! the RFC 3339 text column.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use crate::repository::cash::CashRepository;
use crate::repository::inventory::{InventoryRepository, LowStockItem};
use crate::repository::sale::SaleRepository;
use tienda_core::validation::parse_date_range;
use tienda_core::{CashSession, PaymentCategory, Sale};

/// Low stock rows on the dashboard.
const DASHBOARD_LOW_STOCK: i64 = 10;
/// Recent sales on the dashboard.
const DASHBOARD_RECENT_SALES: i64 = 5;
/// Products in the period ranking.
const TOP_PRODUCTS: i64 = 5;

/// UTC midnight starting `date`.
pub(crate) fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// UTC midnight of today.
pub(crate) fn start_of_today() -> DateTime<Utc> {
    start_of(Utc::now().date_naive())
}

fn start_of_month() -> DateTime<Utc> {
    let today = Utc::now().date_naive();
    start_of(today.with_day(1).unwrap_or(today))
}

// =============================================================================
// Shapes
// =============================================================================

/// Payload of `GET /api/sales/dashboard/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today_total_cents: i64,
    pub today_count: i64,
    pub month_total_cents: i64,
    pub cash_session: Option<CashSession>,
    pub low_stock: Vec<LowStockItem>,
    pub recent_sales: Vec<Sale>,
}

/// Revenue of one payment method in a period.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MethodTotal {
    pub payment_method_id: i64,
    pub method_name: String,
    pub category: PaymentCategory,
    pub total_cents: i64,
    pub count: i64,
}

/// Units and revenue of one product in a period.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductTotal {
    pub product_id: i64,
    pub name: String,
    pub category_name: Option<String>,
    pub units: i64,
    pub revenue_cents: i64,
}

/// Payload of `POST /api/sales/stats/period`.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue_cents: i64,
    pub tickets: i64,
    pub average_ticket_cents: i64,
    pub by_method: Vec<MethodTotal>,
    pub top_products: Vec<ProductTotal>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reports.
#[derive(Debug, Clone)]
pub struct StatsRepository {
    pool: SqlitePool,
}

impl StatsRepository {
    /// Creates a new StatsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StatsRepository { pool }
    }

    /// Today, this month, the register and what needs restocking.
    pub async fn dashboard(&self) -> DbResult<Dashboard> {
        let sales = SaleRepository::new(self.pool.clone());
        let today = sales.today_summary().await?;

        let month_total_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents), 0) FROM sales WHERE created_at >= ?1 AND status = 'completed'",
        )
        .bind(start_of_month())
        .fetch_one(&self.pool)
        .await?;

        Ok(Dashboard {
            today_total_cents: today.total_cents,
            today_count: today.count,
            month_total_cents,
            cash_session: CashRepository::new(self.pool.clone()).current().await?,
            low_stock: InventoryRepository::new(self.pool.clone())
                .low_stock(DASHBOARD_LOW_STOCK)
                .await?,
            recent_sales: sales.recent(None, Some(DASHBOARD_RECENT_SALES)).await?,
        })
    }

    /// Revenue, tickets, tender mix and best sellers of an inclusive range.
    pub async fn period(&self, start_date: &str, end_date: &str) -> DbResult<PeriodStats> {
        let (start, end) = parse_date_range(start_date, end_date)?;
        let (from, to) = bounds(start, end)?;

        let (revenue_cents, tickets): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM sales
            WHERE created_at >= ?1 AND created_at < ?2 AND status = 'completed'
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let by_method = sqlx::query_as::<_, MethodTotal>(
            r#"
            SELECT
                pm.id AS payment_method_id,
                pm.name AS method_name,
                pm.category,
                SUM(sp.amount_cents) AS total_cents,
                COUNT(DISTINCT sp.sale_id) AS count
            FROM sale_payments sp
            JOIN payment_methods pm ON pm.id = sp.payment_method_id
            JOIN sales s ON s.id = sp.sale_id
            WHERE s.created_at >= ?1 AND s.created_at < ?2 AND s.status = 'completed'
            GROUP BY pm.id, pm.name, pm.category
            ORDER BY total_cents DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let top_products = self
            .product_totals(from, to, "revenue_cents DESC", Some(TOP_PRODUCTS))
            .await?;

        Ok(PeriodStats {
            start_date: start,
            end_date: end,
            revenue_cents,
            tickets,
            average_ticket_cents: if tickets > 0 { revenue_cents / tickets } else { 0 },
            by_method,
            top_products,
        })
    }

    /// Units and revenue of every product sold in an inclusive range.
    pub async fn products_detail(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> DbResult<Vec<ProductTotal>> {
        let (start, end) = parse_date_range(start_date, end_date)?;
        let (from, to) = bounds(start, end)?;
        self.product_totals(from, to, "units DESC", None).await
    }

    async fn product_totals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        order: &str,
        limit: Option<i64>,
    ) -> DbResult<Vec<ProductTotal>> {
        let rows = sqlx::query_as::<_, ProductTotal>(&format!(
            r#"
            SELECT
                p.id AS product_id,
                p.name,
                c.name AS category_name,
                SUM(si.quantity) AS units,
                SUM(si.subtotal_cents) AS revenue_cents
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN variants v ON v.id = si.variant_id
            JOIN products p ON p.id = v.product_id
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE s.created_at >= ?1 AND s.created_at < ?2 AND s.status = 'completed'
            GROUP BY p.id, p.name, c.name
            ORDER BY {order}, p.id
            LIMIT ?3
            "#
        ))
        .bind(from)
        .bind(to)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// `[start 00:00, end + 1 day 00:00)` in UTC.
fn bounds(start: NaiveDate, end: NaiveDate) -> DbResult<(DateTime<Utc>, DateTime<Utc>)> {
    let after_end = end
        .checked_add_days(Days::new(1))
        .ok_or_else(|| DbError::Internal(format!("date out of range: {}", end)))?;
    Ok((start_of(start), start_of(after_end)))
}
