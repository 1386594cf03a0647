//! # tienda-cloud: Cloud Store Integration for Tienda POS
//!
//! Everything that talks to the cloud store (Tiendanube): the REST client,
//! payload parsing, webhook signatures, best-effort pushes and the bulk
//! sync job runner.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cloud Integration                                │
//! │                                                                         │
//! │  Outbound (local ──► cloud)                                            │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  CloudPusher   │  │   SyncJobs     │  │  CloudStore (trait)    │    │
//! │  │                │  │                │  │                        │    │
//! │  │ after-commit   │  │ bounded queue  │  │ TiendanubeClient       │    │
//! │  │ stock/price/   │─►│ one worker     │─►│ DisabledCloudStore     │    │
//! │  │ product pushes │  │ backoff retry  │  │ RecordingCloudStore    │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  Inbound (cloud ──► local)                                             │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │  signature     │  │  model         │                                │
//! │  │                │  │                │                                │
//! │  │ HMAC-SHA256    │─►│ OrderPayload   │──► RemoteOrder (tienda-core)  │
//! │  │ constant time  │  │ exact decimals │    ingested by tienda-db      │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  Failure policy: a cloud error never rolls back local state.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - `CloudStore` trait and the Tiendanube client
//! - [`config`] - Client and worker settings
//! - [`error`] - Cloud error types
//! - [`jobs`] - Observable bulk stock sync jobs
//! - [`model`] - Wire payloads and their conversion
//! - [`pusher`] - Best-effort pushes after commit
//! - [`signature`] - Webhook HMAC verification
//! - `testing` - In-memory store (feature `testing`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tienda_cloud::{connect, CloudConfig, CloudPusher, SyncConfig, SyncJobs};
//!
//! let store = connect(&cloud_config)?;
//! let pusher = CloudPusher::new(store.clone(), cloud_config.price_markup);
//! let jobs = SyncJobs::spawn(store, SyncConfig::default());
//!
//! let receipt = db.sales().checkout(input).await?;
//! pusher.push_stock(&receipt.stock_changes).await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod model;
pub mod pusher;
pub mod signature;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{connect, CloudStore, DisabledCloudStore, SharedCloudStore, TiendanubeClient};
pub use config::{CloudConfig, SyncConfig};
pub use error::{CloudError, CloudResult};
pub use jobs::{JobStatus, SyncJobState, SyncJobs};
pub use model::{NewCloudProduct, NewCloudVariant, OrderPayload, StoreInfo, WebhookTopic};
pub use pusher::{CloudPusher, PushReport};
