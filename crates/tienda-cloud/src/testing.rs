//! # Test Double
//!
//! [`RecordingCloudStore`] records successful calls, serves canned orders
//! and can fail or block on demand. Enabled by the `testing` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::client::CloudStore;
use crate::error::{CloudError, CloudResult};
use crate::model::{CreatedProduct, CreatedVariant, NewCloudProduct, StoreInfo};
use tienda_core::{CloudLink, Money, RemoteOrder};

/// A recorded, successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    StoreInfo,
    FetchOrder(i64),
    CreateProduct(String),
    UpdateProduct(i64, String),
    DeleteProduct(i64),
    Stock(CloudLink, i64),
    Price(CloudLink, Money),
}

/// In-memory [`CloudStore`].
#[derive(Debug)]
pub struct RecordingCloudStore {
    calls: Mutex<Vec<CloudCall>>,
    orders: Mutex<HashMap<i64, RemoteOrder>>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    next_id: AtomicI64,
    gate: RwLock<()>,
}

impl Default for RecordingCloudStore {
    fn default() -> Self {
        RecordingCloudStore::new()
    }
}

impl RecordingCloudStore {
    pub fn new() -> Self {
        RecordingCloudStore {
            calls: Mutex::new(Vec::new()),
            orders: Mutex::new(HashMap::new()),
            failures_left: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            next_id: AtomicI64::new(1000),
            gate: RwLock::new(()),
        }
    }

    /// Serves `order` from `fetch_order`.
    pub fn with_order(self, order: RemoteOrder) -> Self {
        self.orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(order.id, order);
        self
    }

    /// The next `n` calls fail with a retryable transport error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Blocks every call until the guard is dropped.
    pub async fn hold(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Successful calls in order.
    pub fn calls(&self) -> Vec<CloudCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Every call made, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> CloudResult<()> {
        let _open = self.gate.read().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(CloudError::Http("injected failure".to_string()));
        }
        Ok(())
    }

    fn record(&self, call: CloudCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl CloudStore for RecordingCloudStore {
    async fn store_info(&self) -> CloudResult<StoreInfo> {
        self.enter().await?;
        self.record(CloudCall::StoreInfo);
        Ok(StoreInfo {
            id: Some(1),
            name: "Test Store".to_string(),
            url: Some("https://test.example".to_string()),
        })
    }

    async fn fetch_order(&self, order_id: i64) -> CloudResult<RemoteOrder> {
        self.enter().await?;
        let order = self
            .orders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&order_id)
            .cloned();
        match order {
            Some(order) => {
                self.record(CloudCall::FetchOrder(order_id));
                Ok(order)
            }
            None => Err(CloudError::Status {
                status: 404,
                body: "Not Found".to_string(),
            }),
        }
    }

    async fn create_product(&self, product: &NewCloudProduct) -> CloudResult<CreatedProduct> {
        self.enter().await?;
        self.record(CloudCall::CreateProduct(product.name.clone()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let variants = product
            .variants
            .iter()
            .map(|v| CreatedVariant {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                sku: Some(v.sku.clone()),
            })
            .collect();
        Ok(CreatedProduct { id, variants })
    }

    async fn update_product(
        &self,
        product_id: i64,
        name: &str,
        _description: Option<&str>,
    ) -> CloudResult<()> {
        self.enter().await?;
        self.record(CloudCall::UpdateProduct(product_id, name.to_string()));
        Ok(())
    }

    async fn delete_product(&self, product_id: i64) -> CloudResult<()> {
        self.enter().await?;
        self.record(CloudCall::DeleteProduct(product_id));
        Ok(())
    }

    async fn update_variant_stock(&self, link: CloudLink, stock: i64) -> CloudResult<()> {
        self.enter().await?;
        self.record(CloudCall::Stock(link, stock));
        Ok(())
    }

    async fn update_variant_price(&self, link: CloudLink, price: Money) -> CloudResult<()> {
        self.enter().await?;
        self.record(CloudCall::Price(link, price));
        Ok(())
    }
}
