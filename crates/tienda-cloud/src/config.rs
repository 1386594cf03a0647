//! # Cloud Configuration
//!
//! Settings for the cloud store client and the bulk sync worker.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Flow                                   │
//! │                                                                         │
//! │  .env / process environment                                            │
//! │     TIENDANUBE_USER_ID=123456                                          │
//! │     TIENDANUBE_ACCESS_TOKEN=...                                        │
//! │     TIENDANUBE_PRICE_MARKUP_PERCENT=15                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiConfig::load() (apps/api) parses and validates                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CloudConfig + SyncConfig (this module, plain values)                  │
//! │       │                                                                 │
//! │       ├──► client::connect(&CloudConfig)                               │
//! │       └──► SyncJobs::spawn(store, SyncConfig)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cloud integration is enabled only when both the store id and the
//! access token are present.

use std::time::Duration;

use tienda_core::Percentage;

// =============================================================================
// Cloud Store Settings
// =============================================================================

/// Connection settings for the cloud store API.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Store id (`TIENDANUBE_USER_ID`).
    pub store_id: Option<String>,

    /// Bearer token (`TIENDANUBE_ACCESS_TOKEN`).
    pub access_token: Option<String>,

    /// User-Agent the platform requires on every call.
    pub user_agent: String,

    /// HMAC secret for webhook signatures. Unset disables verification.
    pub client_secret: Option<String>,

    /// API base URL, without the store id.
    pub api_base: String,

    /// Markup applied to local prices when mirrored to the cloud.
    pub price_markup: Percentage,

    /// Per-call timeout.
    pub timeout: Duration,
}

impl CloudConfig {
    /// Both credentials present.
    pub fn is_enabled(&self) -> bool {
        matches!(
            (self.store_id.as_deref(), self.access_token.as_deref()),
            (Some(id), Some(token)) if !id.trim().is_empty() && !token.trim().is_empty()
        )
    }
}

pub fn default_user_agent() -> String {
    "tienda-pos (support@example.com)".to_string()
}

pub fn default_api_base() -> String {
    "https://api.tiendanube.com/v1".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for CloudConfig {
    fn default() -> Self {
        CloudConfig {
            store_id: None,
            access_token: None,
            user_agent: default_user_agent(),
            client_secret: None,
            api_base: default_api_base(),
            price_markup: Percentage::zero(),
            timeout: default_timeout(),
        }
    }
}

// =============================================================================
// Sync Worker Settings
// =============================================================================

/// Settings for the bulk stock sync worker.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Jobs waiting beyond this are rejected with `QueueFull`.
    pub queue_capacity: usize,

    /// Retries per item after the first attempt.
    pub max_retries: u32,

    /// First backoff interval.
    pub initial_backoff: Duration,

    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            queue_capacity: 16,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}
