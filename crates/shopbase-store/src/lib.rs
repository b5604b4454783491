//! # shopbase-store: Cart Store for the ShopBase Storefront
//!
//! Owns the live cart: one context object shared by every UI collaborator,
//! backed by a key-value record that survives restarts.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Store Architecture                          │
//! │                                                                         │
//! │   Product page   Header badge   Cart page   Cart panel                  │
//! │        │              │             │            │                      │
//! │        └──────────────┴──────┬──────┴────────────┘                      │
//! │                              │ Arc<CartStore>                           │
//! │  ┌───────────────────────────▼──────────────────────────────────────┐  │
//! │  │                      CartStore                                   │  │
//! │  │  snapshot (RwLock<Arc<CartState>>) + writer lock + observers     │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │ apply (pure)                  │ submit(PersistedCart)│
//! │                  ▼                               ▼                      │
//! │         shopbase-core reducer          ┌────────────────────┐          │
//! │                                        │ InlineSink │ Worker │          │
//! │                                        └─────────┬──────────┘          │
//! │                                                  ▼                      │
//! │                                  CartPersistence → KeyValueStorage      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`store`] - `CartStore` context object
//! - [`observers`] - Subscriptions and memoized selectors
//! - [`storage`] - `KeyValueStorage` adapters and `CartPersistence`
//! - [`worker`] - Save sinks: inline and the queued save worker
//! - [`config`] - `StoreConfig` (TOML + environment)
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Store error types
//!
//! ## Usage
//! ```rust
//! use std::sync::Arc;
//! use shopbase_core::{CartRules, LineCandidate};
//! use shopbase_store::{CartPersistence, CartStore, InlineSink, MemoryStorage};
//!
//! let persistence = CartPersistence::new(Arc::new(MemoryStorage::new()), "cart-storage");
//! let sink = Arc::new(InlineSink::new(persistence.clone()));
//! let store = CartStore::open(&persistence, sink, CartRules::default());
//!
//! store.add_line(LineCandidate::new("v1", 999), 2).unwrap();
//! assert_eq!(store.subtotal().cents(), 1998);
//! assert_eq!(persistence.load().unwrap().lines.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod observers;
pub mod storage;
pub mod store;
pub mod worker;

use std::sync::Arc;

use tracing::warn;

pub use config::{CurrencyConfig, PersistMode, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use observers::SubscriptionId;
pub use storage::{CartPersistence, FileStorage, KeyValueStorage, MemoryStorage};
pub use store::CartStore;
pub use worker::{InlineSink, SaveHandle, SaveSink, SaveStats, SaveWorker};

/// A store built from configuration, plus its save worker when queued.
#[derive(Debug)]
pub struct OpenStore {
    pub store: Arc<CartStore>,
    pub saver: Option<SaveHandle>,
}

impl OpenStore {
    /// Waits for pending saves to land, then stops the worker.
    pub async fn close(self) -> StoreResult<()> {
        match self.saver {
            Some(saver) => saver.shutdown().await,
            None => Ok(()),
        }
    }
}

/// Opens the file-backed cart described by `config`.
///
/// If the storage directory cannot be created the cart still opens, backed
/// by memory for this session only.
///
/// ## Panics
/// With [`PersistMode::Queued`], panics outside a tokio runtime.
pub fn open_store(config: &StoreConfig) -> StoreResult<OpenStore> {
    config.validate()?;

    let opened = config.storage_dir().and_then(|dir| FileStorage::open(dir));
    let storage: Arc<dyn KeyValueStorage> = match opened {
        Ok(files) => Arc::new(files),
        Err(e) => {
            warn!(error = %e, "Cart storage unavailable; cart will not survive restart");
            Arc::new(MemoryStorage::new())
        }
    };
    let persistence = CartPersistence::new(storage, config.storage.key.clone());

    let (sink, saver): (Arc<dyn SaveSink>, Option<SaveHandle>) = match config.storage.persist_mode {
        PersistMode::Inline => {
            let inline: Arc<dyn SaveSink> = Arc::new(InlineSink::new(persistence.clone()));
            (inline, None)
        }
        PersistMode::Queued => {
            let handle = SaveWorker::spawn(persistence.clone());
            let queued: Arc<dyn SaveSink> = Arc::new(handle.clone());
            (queued, Some(handle))
        }
    };

    let store = CartStore::open(&persistence, sink, config.rules());

    Ok(OpenStore {
        store: Arc::new(store),
        saver,
    })
}
