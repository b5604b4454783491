//! # Save Worker
//!
//! Moves cart writes off the caller's thread while keeping them in order.
//!
//! ## Save Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Save Worker Flow                                     │
//! │                                                                         │
//! │  CartStore (writer lock held)                                           │
//! │       │ submit(PersistedCart)          never blocks, never fails        │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  mpsc queue (FIFO)                                              │   │
//! │  │  Save(v3) ─ Save(v4) ─ Save(v5) ─ Flush ─ Save(v6)              │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SaveWorker::run                                                │   │
//! │  │                                                                 │   │
//! │  │  1. Take a Save, drain every Save queued right behind it       │   │
//! │  │  2. Write only the newest one (v5): older ones are obsolete    │   │
//! │  │  3. Answer the Flush that stopped the drain                    │   │
//! │  │  4. Continue with v6                                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Storage is only ever written by this one task, so the last write      │
//! │  to land is always the most recent cart.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use shopbase_core::PersistedCart;

use crate::error::{StoreError, StoreResult};
use crate::storage::CartPersistence;

// =============================================================================
// Save Sink
// =============================================================================

/// Destination for persisted-cart snapshots produced by the store.
///
/// Called while the store's writer lock is held, in mutation order.
/// Implementations must not call back into the store.
pub trait SaveSink: Send + Sync {
    fn submit(&self, cart: PersistedCart);
}

/// Counters shared by the sinks.
#[derive(Debug, Default)]
pub struct SaveStats {
    written: AtomicU64,
    failed: AtomicU64,
    coalesced: AtomicU64,
}

impl SaveStats {
    /// Records written to storage.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Writes that failed and were dropped.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Snapshots skipped because a newer one was already queued.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    fn record(&self, result: &StoreResult<()>) {
        match result {
            Ok(()) => self.written.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

// =============================================================================
// Inline Sink
// =============================================================================

/// Writes synchronously on the mutating thread.
#[derive(Debug)]
pub struct InlineSink {
    persistence: CartPersistence,
    stats: SaveStats,
}

impl InlineSink {
    pub fn new(persistence: CartPersistence) -> Self {
        InlineSink {
            persistence,
            stats: SaveStats::default(),
        }
    }

    pub fn stats(&self) -> &SaveStats {
        &self.stats
    }
}

impl SaveSink for InlineSink {
    fn submit(&self, cart: PersistedCart) {
        let result = self.persistence.save(&cart);
        if let Err(e) = &result {
            warn!(key = %self.persistence.key(), error = %e, "Failed to save cart; keeping it in memory");
        }
        self.stats.record(&result);
    }
}

// =============================================================================
// Queued Worker
// =============================================================================

enum SaveCommand {
    Save(PersistedCart),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Background task owning all writes to one cart record.
pub struct SaveWorker {
    persistence: CartPersistence,
    rx: mpsc::UnboundedReceiver<SaveCommand>,
    stats: Arc<SaveStats>,
}

/// Handle for submitting saves to a running [`SaveWorker`].
#[derive(Clone)]
pub struct SaveHandle {
    tx: mpsc::UnboundedSender<SaveCommand>,
    stats: Arc<SaveStats>,
}

impl std::fmt::Debug for SaveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveHandle")
            .field("running", &!self.tx.is_closed())
            .field("stats", &self.stats)
            .finish()
    }
}

impl SaveWorker {
    /// Creates a worker and its handle. The worker must be driven with [`run`](Self::run).
    pub fn new(persistence: CartPersistence) -> (Self, SaveHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(SaveStats::default());

        let worker = SaveWorker {
            persistence,
            rx,
            stats: Arc::clone(&stats),
        };

        (worker, SaveHandle { tx, stats })
    }

    /// Spawns the worker on the current tokio runtime.
    ///
    /// ## Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(persistence: CartPersistence) -> SaveHandle {
        let (worker, handle) = Self::new(persistence);
        tokio::spawn(worker.run());
        handle
    }

    /// Runs until shut down or until every handle is dropped.
    pub async fn run(mut self) {
        info!(key = %self.persistence.key(), "Save worker starting");

        let mut pending: Option<SaveCommand> = None;

        loop {
            let command = match pending.take() {
                Some(command) => command,
                None => match self.rx.recv().await {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                SaveCommand::Save(cart) => {
                    let mut latest = cart;

                    // Drain saves queued behind this one; stop at anything else
                    while let Ok(queued) = self.rx.try_recv() {
                        match queued {
                            SaveCommand::Save(newer) => {
                                self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                                latest = newer;
                            }
                            other => {
                                pending = Some(other);
                                break;
                            }
                        }
                    }

                    self.write(latest).await;
                }

                SaveCommand::Flush(reply) => {
                    let _ = reply.send(());
                }

                SaveCommand::Shutdown(reply) => {
                    info!("Save worker shutting down");
                    let _ = reply.send(());
                    break;
                }
            }
        }

        info!(
            written = self.stats.written(),
            failed = self.stats.failed(),
            coalesced = self.stats.coalesced(),
            "Save worker stopped"
        );
    }

    async fn write(&self, cart: PersistedCart) {
        let persistence = self.persistence.clone();
        let lines = cart.lines.len();

        let result = tokio::task::spawn_blocking(move || persistence.save(&cart))
            .await
            .map_err(StoreError::from)
            .and_then(|saved| saved);

        match &result {
            Ok(()) => debug!(lines, "Saved cart"),
            Err(e) => warn!(
                key = %self.persistence.key(),
                error = %e,
                lines,
                "Failed to save cart; keeping it in memory"
            ),
        }
        self.stats.record(&result);
    }
}

impl SaveHandle {
    /// Counters of the worker behind this handle.
    pub fn stats(&self) -> &SaveStats {
        &self.stats
    }

    /// Waits until every save submitted before this call has been written.
    pub async fn flush(&self) -> StoreResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SaveCommand::Flush(reply_tx))
            .map_err(|_| StoreError::ChannelClosed("flush".into()))?;
        reply_rx
            .await
            .map_err(|_| StoreError::ChannelClosed("flush".into()))
    }

    /// Writes everything queued so far, then stops the worker.
    pub async fn shutdown(&self) -> StoreResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SaveCommand::Shutdown(reply_tx))
            .map_err(|_| StoreError::ChannelClosed("shutdown".into()))?;
        reply_rx
            .await
            .map_err(|_| StoreError::ChannelClosed("shutdown".into()))
    }
}

impl SaveSink for SaveHandle {
    fn submit(&self, cart: PersistedCart) {
        if self.tx.send(SaveCommand::Save(cart)).is_err() {
            warn!("Save worker is not running; cart change kept in memory only");
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
