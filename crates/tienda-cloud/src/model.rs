//! # Cloud Store Payloads
//!
//! Wire shapes of the Tiendanube API and webhooks, and their conversion
//! into domain values.
//!
//! ## Money on the Wire
//! ```text
//! "total": "15999.90"   ──┐
//! "total": 15999.9      ──┼──► Decimal ──► × 100, half away from zero ──► Money(1_599_990)
//! "total": 15999        ──┘
//! ```
//! Amounts are parsed with `rust_decimal`, never through `f64`.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CloudError, CloudResult};
use tienda_core::validation::{validate_price_cents, validate_quantity};
use tienda_core::{Money, RemoteOrder, RemoteOrderLine};

// =============================================================================
// Flexible Scalars
// =============================================================================

/// A number the platform sends either as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexNumber {
    Number(serde_json::Number),
    Text(String),
}

impl FlexNumber {
    fn as_text(&self) -> String {
        match self {
            FlexNumber::Number(n) => n.to_string(),
            FlexNumber::Text(s) => s.trim().to_string(),
        }
    }

    /// Exact money value. `field` names the source in errors.
    pub fn to_money(&self, field: &str) -> CloudResult<Money> {
        parse_money(field, &self.as_text())
    }

    /// Integer value (ids, quantities).
    pub fn to_i64(&self, field: &str) -> CloudResult<i64> {
        let text = self.as_text();
        let invalid = || CloudError::InvalidPayload(format!("{} is not an integer: {}", field, text));
        let value = Decimal::from_str(&text).map_err(|_| invalid())?;
        if !value.fract().is_zero() {
            return Err(invalid());
        }
        value.to_i64().ok_or_else(invalid)
    }
}

/// Parses a decimal string into cents, rounding half away from zero.
pub fn parse_money(field: &str, text: &str) -> CloudResult<Money> {
    let invalid = || CloudError::InvalidAmount {
        field: field.to_string(),
        value: text.to_string(),
    };
    let value = Decimal::from_str(text.trim())
        .or_else(|_| Decimal::from_scientific(text.trim()))
        .map_err(|_| invalid())?;
    let cents = (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(invalid)?;
    Ok(Money::from_cents(cents))
}

/// The platform localizes names as `{"es": "..."}`; older payloads send a string.
fn localized(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("es")
            .or_else(|| map.values().next())
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

// =============================================================================
// Orders
// =============================================================================

/// One product line of an order payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderLinePayload {
    #[serde(default)]
    pub variant_id: Option<FlexNumber>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub variant_sku: Option<String>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub quantity: Option<FlexNumber>,
    #[serde(default)]
    pub price: Option<FlexNumber>,
}

impl OrderLinePayload {
    /// Converts one line.
    ///
    /// Quantities must be in `1..=MAX_ITEM_QUANTITY` and prices in
    /// `0..=MAX_PRICE_CENTS`, the same bounds local checkout enforces.
    fn into_line(self) -> CloudResult<RemoteOrderLine> {
        let quantity = match &self.quantity {
            Some(q) => q.to_i64("quantity")?,
            None => 1,
        };
        validate_quantity(quantity)
            .map_err(|e| CloudError::InvalidPayload(format!("line {}", e)))?;
        let unit_price = match &self.price {
            Some(p) => p.to_money("price")?,
            None => Money::zero(),
        };
        validate_price_cents(unit_price.cents()).map_err(|_| CloudError::InvalidAmount {
            field: "price".to_string(),
            value: unit_price.to_decimal_string(),
        })?;
        let cloud_variant_id = match &self.variant_id {
            Some(id) => Some(id.to_i64("variant_id")?),
            None => None,
        };
        let sku = self
            .variant_sku
            .or(self.sku)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let name = self
            .name
            .as_ref()
            .and_then(localized)
            .unwrap_or_else(|| "Unknown product".to_string());

        Ok(RemoteOrderLine {
            cloud_variant_id,
            sku,
            name,
            quantity,
            unit_price,
        })
    }
}

/// An order as sent by webhooks and returned by `GET /orders/{id}`.
///
/// Webhook bodies may carry only `id` and `event`; `products` is then empty
/// and the full order must be fetched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPayload {
    pub id: FlexNumber,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub store_id: Option<FlexNumber>,
    #[serde(default)]
    pub subtotal: Option<FlexNumber>,
    #[serde(default)]
    pub discount: Option<FlexNumber>,
    #[serde(default)]
    pub total: Option<FlexNumber>,
    #[serde(default)]
    pub products: Vec<OrderLinePayload>,
}

impl Default for FlexNumber {
    fn default() -> Self {
        FlexNumber::Number(0.into())
    }
}

impl OrderPayload {
    pub fn order_id(&self) -> CloudResult<i64> {
        self.id.to_i64("id")
    }

    /// True when the lines must be fetched from the API.
    pub fn needs_fetch(&self) -> bool {
        self.products.is_empty()
    }

    /// Converts into a domain order.
    ///
    /// Missing totals fall back to the sum of the lines and a zero discount.
    pub fn into_remote_order(self) -> CloudResult<RemoteOrder> {
        let id = self.order_id()?;
        let lines = self
            .products
            .into_iter()
            .map(OrderLinePayload::into_line)
            .collect::<CloudResult<Vec<_>>>()?;

        let line_sum = Money::checked_line_sum(lines.iter().map(|l| (l.unit_price, l.quantity)))
            .ok_or_else(|| CloudError::InvalidPayload("order lines overflow".to_string()))?;
        let subtotal = match &self.subtotal {
            Some(v) => v.to_money("subtotal")?,
            None => line_sum,
        };
        let discount = match &self.discount {
            Some(v) => v.to_money("discount")?,
            None => Money::zero(),
        };
        let total = match &self.total {
            Some(v) => v.to_money("total")?,
            None => subtotal - discount,
        };

        Ok(RemoteOrder {
            id,
            subtotal,
            discount,
            total,
            lines,
        })
    }
}

// =============================================================================
// Webhook Topics
// =============================================================================

/// Event named by `X-Topic` or the body's `event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTopic {
    OrderCreated,
    OrderPaid,
    Other(String),
}

impl WebhookTopic {
    /// Header first, then the body field.
    pub fn resolve(header: Option<&str>, body_event: Option<&str>) -> Self {
        let raw = header
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(body_event.map(str::trim))
            .unwrap_or("");
        match raw {
            "order/created" => WebhookTopic::OrderCreated,
            "order/paid" => WebhookTopic::OrderPaid,
            other => WebhookTopic::Other(other.to_string()),
        }
    }

    /// Topics that record a sale.
    pub fn records_sale(&self) -> bool {
        matches!(self, WebhookTopic::OrderCreated | WebhookTopic::OrderPaid)
    }
}

// =============================================================================
// Store & Products
// =============================================================================

/// Subset of `GET /store`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreInfo {
    pub id: Option<i64>,
    pub name: String,
    pub url: Option<String>,
}

impl StoreInfo {
    pub(crate) fn from_value(value: &Value) -> Self {
        StoreInfo {
            id: value.get("id").and_then(Value::as_i64),
            name: value
                .get("name")
                .and_then(localized)
                .unwrap_or_default(),
            url: value
                .get("url_with_protocol")
                .or_else(|| value.get("original_domain"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// A variant to create in the cloud. Prices are already marked up.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCloudVariant {
    pub sku: String,
    pub size: String,
    pub price: Money,
    pub stock: i64,
}

/// A product to create in the cloud, one variant per size.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCloudProduct {
    pub name: String,
    pub description: Option<String>,
    pub variants: Vec<NewCloudVariant>,
}

impl NewCloudProduct {
    /// Body of `POST /products`. Variants vary by the "Talle" attribute.
    pub fn to_payload(&self) -> Value {
        let variants: Vec<Value> = self
            .variants
            .iter()
            .map(|v| {
                json!({
                    "price": v.price.to_decimal_string(),
                    "stock": v.stock,
                    "sku": v.sku,
                    "values": [{ "es": v.size }],
                })
            })
            .collect();
        json!({
            "images": [],
            "name": { "es": self.name },
            "description": { "es": self.description.clone().unwrap_or_default() },
            "attributes": [{ "es": "Talle" }],
            "variants": variants,
        })
    }
}

/// A variant returned by `POST /products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedVariant {
    pub id: i64,
    #[serde(default)]
    pub sku: Option<String>,
}

/// Response of `POST /products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedProduct {
    pub id: i64,
    #[serde(default)]
    pub variants: Vec<CreatedVariant>,
}

impl CreatedProduct {
    /// `(sku, cloud_variant_id)` pairs of variants that came back with a SKU.
    pub fn sku_map(&self) -> Vec<(String, i64)> {
        self.variants
            .iter()
            .filter_map(|v| v.sku.clone().map(|sku| (sku, v.id)))
            .collect()
    }
}
