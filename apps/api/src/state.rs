//! # Shared State
//!
//! Everything a handler needs, cloned into every request.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         AppState (Clone)                                │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌────────────┐  │
//! │  │  Database    │  │ CloudPusher  │  │  SyncJobs    │  │ ApiConfig  │  │
//! │  │              │  │              │  │              │  │            │  │
//! │  │  SqlitePool  │  │ Arc<dyn      │  │ mpsc sender  │  │ Arc, read  │  │
//! │  │  (refcount)  │  │ CloudStore>  │  │ + job map    │  │ only       │  │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └────────────┘  │
//! │                                                                         │
//! │  Every field is a handle: cloning copies pointers, never data.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tienda_cloud::{CloudPusher, SharedCloudStore, SyncJobs};
use tienda_db::Database;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub pusher: CloudPusher,
    pub jobs: SyncJobs,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// Wires the state. Spawns the sync worker, so a runtime must be running.
    pub fn new(db: Database, store: SharedCloudStore, config: ApiConfig) -> Self {
        let pusher = CloudPusher::new(store.clone(), config.cloud.price_markup);
        let jobs = SyncJobs::spawn(store, config.sync.clone());
        AppState {
            db,
            pusher,
            jobs,
            config: Arc::new(config),
        }
    }
}
