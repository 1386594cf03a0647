//! # Cloud Store Client
//!
//! The [`CloudStore`] trait and its Tiendanube implementation.
//!
//! ## Request Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {api_base}/{store_id}/products/{pid}/variants/{vid}                   │
//! │                                                                         │
//! │  Authentication: bearer {token}     (sic, not "Authorization")         │
//! │  User-Agent: {configured}           (rejected by the platform if       │
//! │                                      missing)                          │
//! │  Content-Type: application/json                                        │
//! │                                                                         │
//! │  Every call is bounded by the client timeout.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! When credentials are missing, [`connect`] returns a [`DisabledCloudStore`]
//! whose every call fails with `CloudError::Disabled`. Callers treat that
//! like any other cloud failure.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::model::{CreatedProduct, NewCloudProduct, OrderPayload, StoreInfo};
use tienda_core::{CloudLink, Money, RemoteOrder};

// =============================================================================
// Trait
// =============================================================================

/// Operations the store performs against the cloud platform.
#[async_trait]
pub trait CloudStore: Send + Sync {
    /// `GET /store`.
    async fn store_info(&self) -> CloudResult<StoreInfo>;

    /// `GET /orders/{id}`.
    async fn fetch_order(&self, order_id: i64) -> CloudResult<RemoteOrder>;

    /// `POST /products`.
    async fn create_product(&self, product: &NewCloudProduct) -> CloudResult<CreatedProduct>;

    /// `PUT /products/{id}` with name and description.
    async fn update_product(
        &self,
        product_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> CloudResult<()>;

    /// `DELETE /products/{id}`.
    async fn delete_product(&self, product_id: i64) -> CloudResult<()>;

    /// `PUT /products/{pid}/variants/{vid}` with `{stock}`.
    async fn update_variant_stock(&self, link: CloudLink, stock: i64) -> CloudResult<()>;

    /// `PUT /products/{pid}/variants/{vid}` with `{price}`. `price` is final.
    async fn update_variant_price(&self, link: CloudLink, price: Money) -> CloudResult<()>;
}

/// Shared handle used across the app.
pub type SharedCloudStore = Arc<dyn CloudStore>;

/// Builds the client for `config`, or a disabled store without credentials.
pub fn connect(config: &CloudConfig) -> CloudResult<SharedCloudStore> {
    if !config.is_enabled() {
        info!("Cloud store credentials not set, integration disabled");
        return Ok(Arc::new(DisabledCloudStore));
    }
    Ok(Arc::new(TiendanubeClient::new(config)?))
}

// =============================================================================
// Tiendanube
// =============================================================================

/// HTTP client for the Tiendanube REST API.
#[derive(Debug, Clone)]
pub struct TiendanubeClient {
    http: reqwest::Client,
    /// `{api_base}/{store_id}/`
    base: Url,
    token: String,
}

impl TiendanubeClient {
    /// Creates a client. Fails with `Disabled` when credentials are missing.
    pub fn new(config: &CloudConfig) -> CloudResult<Self> {
        let (Some(store_id), Some(token)) = (&config.store_id, &config.access_token) else {
            return Err(CloudError::Disabled);
        };

        let base = Url::parse(&format!(
            "{}/{}/",
            config.api_base.trim_end_matches('/'),
            store_id.trim()
        ))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CloudError::Http(e.to_string()))?;

        debug!(base = %base, timeout_secs = config.timeout.as_secs(), "Cloud client ready");
        Ok(TiendanubeClient {
            http,
            base,
            token: token.trim().to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> CloudResult<RequestBuilder> {
        let url = self.base.join(path)?;
        Ok(self
            .http
            .request(method, url)
            .header("Authentication", format!("bearer {}", self.token)))
    }

    /// Sends and maps non-success statuses to `CloudError::Status`.
    async fn send(&self, request: RequestBuilder) -> CloudResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CloudError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn put_variant(&self, link: CloudLink, body: Value) -> CloudResult<()> {
        let path = format!("products/{}/variants/{}", link.product_id, link.variant_id);
        self.send(self.request(Method::PUT, &path)?.json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CloudStore for TiendanubeClient {
    async fn store_info(&self) -> CloudResult<StoreInfo> {
        let value: Value = self
            .send(self.request(Method::GET, "store")?)
            .await?
            .json()
            .await?;
        Ok(StoreInfo::from_value(&value))
    }

    async fn fetch_order(&self, order_id: i64) -> CloudResult<RemoteOrder> {
        let payload: OrderPayload = self
            .send(self.request(Method::GET, &format!("orders/{}", order_id))?)
            .await?
            .json()
            .await?;
        payload.into_remote_order()
    }

    async fn create_product(&self, product: &NewCloudProduct) -> CloudResult<CreatedProduct> {
        let created: CreatedProduct = self
            .send(self.request(Method::POST, "products")?.json(&product.to_payload()))
            .await?
            .json()
            .await?;
        info!(
            cloud_product_id = created.id,
            variants = created.variants.len(),
            "Product created in cloud store"
        );
        Ok(created)
    }

    async fn update_product(
        &self,
        product_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> CloudResult<()> {
        let mut body = json!({ "name": { "es": name } });
        if let Some(description) = description {
            body["description"] = json!({ "es": description });
        }
        self.send(
            self.request(Method::PUT, &format!("products/{}", product_id))?
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_product(&self, product_id: i64) -> CloudResult<()> {
        self.send(self.request(Method::DELETE, &format!("products/{}", product_id))?)
            .await?;
        Ok(())
    }

    async fn update_variant_stock(&self, link: CloudLink, stock: i64) -> CloudResult<()> {
        self.put_variant(link, json!({ "stock": stock })).await
    }

    async fn update_variant_price(&self, link: CloudLink, price: Money) -> CloudResult<()> {
        self.put_variant(link, json!({ "price": price.to_decimal_string() }))
            .await
    }
}

// =============================================================================
// Disabled
// =============================================================================

/// Stand-in used when the integration is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCloudStore;

#[async_trait]
impl CloudStore for DisabledCloudStore {
    async fn store_info(&self) -> CloudResult<StoreInfo> {
        Err(CloudError::Disabled)
    }

    async fn fetch_order(&self, _order_id: i64) -> CloudResult<RemoteOrder> {
        Err(CloudError::Disabled)
    }

    async fn create_product(&self, _product: &NewCloudProduct) -> CloudResult<CreatedProduct> {
        Err(CloudError::Disabled)
    }

    async fn update_product(
        &self,
        _product_id: i64,
        _name: &str,
        _description: Option<&str>,
    ) -> CloudResult<()> {
        Err(CloudError::Disabled)
    }

    async fn delete_product(&self, _product_id: i64) -> CloudResult<()> {
        Err(CloudError::Disabled)
    }

    async fn update_variant_stock(&self, _link: CloudLink, _stock: i64) -> CloudResult<()> {
        Err(CloudError::Disabled)
    }

    async fn update_variant_price(&self, _link: CloudLink, _price: Money) -> CloudResult<()> {
        Err(CloudError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> CloudConfig {
        CloudConfig {
            store_id: Some("123456".into()),
            access_token: Some("tok".into()),
            ..CloudConfig::default()
        }
    }

    #[test]
    fn test_base_url_includes_store_id() {
        let client = TiendanubeClient::new(&enabled_config()).unwrap();
        assert_eq!(
            client.base.join("products/9/variants/3").unwrap().as_str(),
            "https://api.tiendanube.com/v1/123456/products/9/variants/3"
        );
    }

    #[test]
    fn test_new_requires_credentials() {
        assert!(matches!(
            TiendanubeClient::new(&CloudConfig::default()),
            Err(CloudError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_disabled_store_fails_every_call() {
        let store = connect(&CloudConfig::default()).unwrap();
        let link = CloudLink {
            product_id: 1,
            variant_id: 2,
        };
        assert!(matches!(
            store.update_variant_stock(link, 3).await,
            Err(CloudError::Disabled)
        ));
        assert!(matches!(store.store_info().await, Err(CloudError::Disabled)));
    }
}
