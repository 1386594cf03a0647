//! # Cloud Pusher
//!
//! Best-effort mirroring of local changes to the cloud store.
//!
//! ## When Pushes Happen
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  handler ──► repository workflow ──► COMMIT ──► Vec<StockChange>       │
//! │                                                    │                    │
//! │                                                    ▼                    │
//! │                                     CloudPusher::push_stock(&changes)   │
//! │                                                    │                    │
//! │                     linked? ── no ──► skipped      │                    │
//! │                        │                           │                    │
//! │                       yes ──► PUT variant {stock}  │                    │
//! │                                  │                 │                    │
//! │                        error ──► warn!, counted ───┘                    │
//! │                                                                         │
//! │  A cloud failure never undoes or fails the local operation.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::SharedCloudStore;
use tienda_core::{CloudLink, Money, Percentage, StockChange};

/// Counts of one best-effort push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
    /// Changes without a cloud link.
    pub skipped: usize,
}

/// Pushes committed changes to the cloud, logging failures.
#[derive(Clone)]
pub struct CloudPusher {
    store: SharedCloudStore,
    markup: Percentage,
}

impl CloudPusher {
    pub fn new(store: SharedCloudStore, markup: Percentage) -> Self {
        CloudPusher { store, markup }
    }

    pub fn store(&self) -> &SharedCloudStore {
        &self.store
    }

    /// Cloud price of a local price: `local × (1 + markup)`.
    pub fn cloud_price(&self, local: Money) -> Money {
        local.apply_markup(self.markup)
    }

    /// Mirrors new stock counts of linked variants.
    pub async fn push_stock(&self, changes: &[StockChange]) -> PushReport {
        let mut report = PushReport::default();
        for change in changes {
            let Some(link) = change.cloud else {
                report.skipped += 1;
                continue;
            };
            match self.store.update_variant_stock(link, change.new_stock).await {
                Ok(()) => {
                    debug!(
                        variant_id = change.variant_id,
                        cloud_variant_id = link.variant_id,
                        stock = change.new_stock,
                        "Cloud stock updated"
                    );
                    report.pushed += 1;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        variant_id = change.variant_id,
                        cloud_product_id = link.product_id,
                        cloud_variant_id = link.variant_id,
                        "Cloud stock push failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Mirrors local prices, applying the markup.
    pub async fn push_prices(&self, prices: &[(CloudLink, Money)]) -> PushReport {
        let mut report = PushReport::default();
        for &(link, local) in prices {
            let price = self.cloud_price(local);
            match self.store.update_variant_price(link, price).await {
                Ok(()) => report.pushed += 1,
                Err(e) => {
                    warn!(
                        error = %e,
                        cloud_product_id = link.product_id,
                        cloud_variant_id = link.variant_id,
                        price = %price,
                        "Cloud price push failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Mirrors name and description. Returns whether it succeeded.
    pub async fn push_product(
        &self,
        cloud_product_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> bool {
        match self
            .store
            .update_product(cloud_product_id, name, description)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, cloud_product_id, "Cloud product update failed");
                false
            }
        }
    }

    /// Deletes the cloud product. Returns whether it succeeded.
    pub async fn delete_product(&self, cloud_product_id: i64) -> bool {
        match self.store.delete_product(cloud_product_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, cloud_product_id, "Cloud product delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CloudCall, RecordingCloudStore};
    use std::sync::Arc;

    fn link(variant_id: i64) -> CloudLink {
        CloudLink {
            product_id: 10,
            variant_id,
        }
    }

    #[tokio::test]
    async fn test_push_stock_skips_unlinked() {
        let store = Arc::new(RecordingCloudStore::new());
        let pusher = CloudPusher::new(store.clone(), Percentage::zero());

        let report = pusher
            .push_stock(&[
                StockChange {
                    variant_id: 1,
                    new_stock: 4,
                    cloud: Some(link(100)),
                },
                StockChange {
                    variant_id: 2,
                    new_stock: 9,
                    cloud: None,
                },
            ])
            .await;

        assert_eq!(
            report,
            PushReport {
                pushed: 1,
                failed: 0,
                skipped: 1
            }
        );
        assert_eq!(store.calls(), vec![CloudCall::Stock(link(100), 4)]);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_raised() {
        let store = Arc::new(RecordingCloudStore::new());
        store.fail_next(1);
        let pusher = CloudPusher::new(store.clone(), Percentage::zero());

        let change = StockChange {
            variant_id: 1,
            new_stock: 4,
            cloud: Some(link(100)),
        };
        let report = pusher.push_stock(&[change, change]).await;

        assert_eq!(report.pushed, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_prices_are_marked_up() {
        let store = Arc::new(RecordingCloudStore::new());
        let pusher = CloudPusher::new(store.clone(), Percentage::from_whole(15));

        pusher
            .push_prices(&[(link(100), Money::from_cents(10_000))])
            .await;

        assert_eq!(
            store.calls(),
            vec![CloudCall::Price(link(100), Money::from_cents(11_500))]
        );
    }
}
