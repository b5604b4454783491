//! # Cart Store
//!
//! The single owner of the live cart. UI collaborators hold an
//! `Arc<CartStore>` and talk to it through the methods below.
//!
//! ## Mutation Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CartStore::dispatch(action)                          │
//! │                                                                         │
//! │  ┌──────────── writer: Mutex<()> ────────────────────────────────────┐ │
//! │  │                                                                   │ │
//! │  │  1. read current snapshot                                         │ │
//! │  │  2. next = current.apply(action, rules)   (pure, shopbase-core)   │ │
//! │  │        Err  ──► return Err, nothing changed                        │ │
//! │  │        None ──► return Ok(false), nothing changed                  │ │
//! │  │  3. publish next into current: RwLock<Arc<CartState>>             │ │
//! │  │  4. lines revision moved? ──► sink.submit(project(next))          │ │
//! │  │  5. take listeners out of observers, notify, put them back        │ │
//! │  │                                                                   │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! │  Readers only take the RwLock for an Arc clone; they never wait on     │
//! │  observers or storage.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Listeners run on the mutating thread with the writer lock held and the
//! observer lock released. They may read the store and subscribe or
//! unsubscribe, but must not mutate it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, info};

use shopbase_core::persist::{hydrate, project};
use shopbase_core::{
    CartAction, CartLine, CartRules, CartState, CartTotals, CoreResult, LineCandidate, Money,
};

use crate::observers::{memo, memo_lines, Batch, Observers, SubscriptionId};
use crate::storage::CartPersistence;
use crate::worker::SaveSink;

/// Live cart state with persistence and change notification.
pub struct CartStore {
    rules: CartRules,
    current: RwLock<Arc<CartState>>,
    writer: Mutex<()>,
    observers: Mutex<Observers>,
    sink: Option<Arc<dyn SaveSink>>,
}

/// A batch of listeners out for notification. Returned on drop, so a
/// panicking listener does not lose the others.
struct InFlight<'a> {
    observers: &'a Mutex<Observers>,
    batch: Option<Batch>,
}

impl<'a> InFlight<'a> {
    fn take(observers: &'a Mutex<Observers>) -> Self {
        let batch = lock(observers).take_batch();
        InFlight {
            observers,
            batch: Some(batch),
        }
    }

    fn notify(&mut self, state: &CartState) {
        if let Some(batch) = self.batch.as_mut() {
            batch.notify(state);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            lock(self.observers).restore_batch(batch);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("rules", &self.rules)
            .field("state", &self.snapshot())
            .field("persistent", &self.sink.is_some())
            .finish()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new(CartRules::default())
    }
}

impl CartStore {
    /// Empty, memory-only store.
    pub fn new(rules: CartRules) -> Self {
        Self::from_state(CartState::new(), rules)
    }

    /// Memory-only store starting from `state`.
    pub fn from_state(state: CartState, rules: CartRules) -> Self {
        CartStore {
            rules,
            current: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            observers: Mutex::new(Observers::default()),
            sink: None,
        }
    }

    /// Sends every line change to `sink` from now on.
    pub fn with_sink(mut self, sink: Arc<dyn SaveSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Hydrates from `persistence` and saves future changes through `sink`.
    ///
    /// A missing or unreadable record yields an empty cart.
    pub fn open(persistence: &CartPersistence, sink: Arc<dyn SaveSink>, rules: CartRules) -> Self {
        let state = persistence.load().map(hydrate).unwrap_or_default();

        info!(
            key = %persistence.key(),
            lines = state.line_count(),
            items = state.total_item_count(),
            "Cart store opened"
        );

        Self::from_state(state, rules).with_sink(sink)
    }

    pub fn rules(&self) -> &CartRules {
        &self.rules
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> Arc<CartState> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> Vec<CartLine> {
        self.snapshot().lines().to_vec()
    }

    pub fn line(&self, line_id: &str) -> Option<CartLine> {
        self.snapshot().line(line_id).cloned()
    }

    pub fn is_panel_open(&self) -> bool {
        self.snapshot().is_panel_open()
    }

    pub fn total_item_count(&self) -> i64 {
        self.snapshot().total_item_count()
    }

    pub fn subtotal(&self) -> Money {
        self.snapshot().subtotal()
    }

    pub fn line_count(&self) -> usize {
        self.snapshot().line_count()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn totals(&self) -> CartTotals {
        self.snapshot().totals()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Applies `action` atomically.
    ///
    /// Returns `Ok(true)` if the cart changed, `Ok(false)` for a no-op.
    /// A rejected action changes nothing and notifies no one.
    pub fn dispatch(&self, action: CartAction) -> CoreResult<bool> {
        let _writer = lock(&self.writer);
        let name = action.name();

        let current = self.snapshot();
        let next = match current.apply(action, &self.rules) {
            Ok(Some(next)) => Arc::new(next),
            Ok(None) => {
                debug!(action = name, "Cart action was a no-op");
                return Ok(false);
            }
            Err(e) => {
                debug!(action = name, error = %e, "Cart action rejected");
                return Err(e);
            }
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);

        debug!(
            action = name,
            lines = next.line_count(),
            items = next.total_item_count(),
            subtotal = %next.subtotal(),
            revision = next.lines_revision(),
            "Cart updated"
        );

        if next.lines_revision() != current.lines_revision() {
            if let Some(sink) = &self.sink {
                sink.submit(project(&next));
            }
        }

        InFlight::take(&self.observers).notify(&next);

        Ok(true)
    }

    /// Dispatches an action the reducer never rejects. Returns whether the
    /// cart changed.
    fn dispatch_infallible(&self, action: CartAction) -> bool {
        matches!(self.dispatch(action), Ok(true))
    }

    /// Adds `quantity` of a line, merging into an existing line with the same id.
    pub fn add_line(&self, candidate: LineCandidate, quantity: i64) -> CoreResult<()> {
        self.dispatch(CartAction::add(candidate, quantity)).map(|_| ())
    }

    /// Adds one unit of a line.
    pub fn add_one(&self, candidate: LineCandidate) -> CoreResult<()> {
        self.add_line(candidate, 1)
    }

    /// Removes a line. Returns whether it was present.
    pub fn remove_line(&self, line_id: &str) -> bool {
        self.dispatch_infallible(CartAction::remove(line_id))
    }

    /// Replaces a line's quantity; `quantity <= 0` removes the line.
    pub fn set_quantity(&self, line_id: &str, quantity: i64) -> CoreResult<()> {
        self.dispatch(CartAction::set_quantity(line_id, quantity))
            .map(|_| ())
    }

    /// Removes every line. Returns whether there was anything to remove.
    pub fn clear(&self) -> bool {
        self.dispatch_infallible(CartAction::Clear)
    }

    /// Returns whether the flag changed.
    pub fn set_panel_open(&self, open: bool) -> bool {
        self.dispatch_infallible(CartAction::SetPanelOpen(open))
    }

    pub fn toggle_panel(&self) -> bool {
        self.dispatch_infallible(CartAction::TogglePanel)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Calls `listener` with the new state after every change.
    ///
    /// Runs on the mutating thread while the writer lock is held: the
    /// listener may read the store and manage subscriptions but must not
    /// mutate the cart.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: FnMut(&CartState) + Send + 'static,
    {
        lock(&self.observers).insert(Box::new(listener))
    }

    /// Calls `on_change` whenever `selector`'s value changes.
    pub fn select<T, S, F>(&self, selector: S, on_change: F) -> SubscriptionId
    where
        T: PartialEq + Send + 'static,
        S: Fn(&CartState) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let mut observers = lock(&self.observers);
        let listener = memo(&self.snapshot(), selector, on_change);
        observers.insert(listener)
    }

    /// Like [`select`](Self::select) for values derived from lines only.
    /// The selector is not re-run when only the panel flag changes.
    pub fn select_lines<T, S, F>(&self, selector: S, on_change: F) -> SubscriptionId
    where
        T: PartialEq + Send + 'static,
        S: Fn(&[CartLine]) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let mut observers = lock(&self.observers);
        let listener = memo_lines(&self.snapshot(), selector, on_change);
        observers.insert(listener)
    }

    /// Header badge: notified with the new total item count.
    pub fn watch_item_count<F>(&self, on_change: F) -> SubscriptionId
    where
        F: FnMut(&i64) + Send + 'static,
    {
        self.select_lines(shopbase_core::cart::total_item_count, on_change)
    }

    /// Cart page: notified with the new subtotal.
    pub fn watch_subtotal<F>(&self, on_change: F) -> SubscriptionId
    where
        F: FnMut(&Money) + Send + 'static,
    {
        self.select_lines(shopbase_core::cart::subtotal, on_change)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.observers).remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.observers).len()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::worker::InlineSink;
    use shopbase_core::{CoreError, PersistedCart, QuantityPolicy, ValidationError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn candidate(id: &str, price: i64) -> LineCandidate {
        LineCandidate::new(id, price).product(format!("p-{}", id), "Widget", "widget")
    }

    /// Records every submitted cart.
    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<PersistedCart>>,
    }

    impl SaveSink for RecordingSink {
        fn submit(&self, cart: PersistedCart) {
            self.saved.lock().unwrap().push(cart);
        }
    }

    fn recording_store() -> (CartStore, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let store = CartStore::default().with_sink(sink.clone());
        (store, sink)
    }

    #[test]
    fn test_scenarios() {
        let store = CartStore::default();

        store.add_one(candidate("v1", 999)).unwrap();
        store.add_line(candidate("v2", 500), 3).unwrap();
        store.set_quantity("v1", 2).unwrap();

        assert_eq!(store.total_item_count(), 5);
        assert_eq!(store.subtotal().cents(), 3498);

        assert!(store.remove_line("v2"));
        assert_eq!(store.total_item_count(), 2);
        assert_eq!(store.subtotal().cents(), 1998);
    }

    #[test]
    fn test_merge_keeps_order() {
        let store = CartStore::default();
        store.add_line(candidate("a", 100), 2).unwrap();
        store.add_line(candidate("b", 100), 1).unwrap();
        store.add_line(candidate("a", 100), 3).unwrap();

        let ids: Vec<_> = store.lines().into_iter().map(|l| l.line_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.line("a").unwrap().quantity, 5);
    }

    #[test]
    fn test_rejected_action_changes_nothing() {
        let (store, sink) = recording_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = store.add_line(candidate("v1", 100), 0).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MustBePositive { .. })
        ));
        assert!(store.add_line(candidate("v1", 100), 1000).is_err());

        assert!(store.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clamp_policy() {
        let store = CartStore::new(CartRules {
            quantity_policy: QuantityPolicy::Clamp,
            max_item_quantity: 10,
        });

        store.add_line(candidate("v1", 100), 0).unwrap();
        assert_eq!(store.line("v1").unwrap().quantity, 1);

        store.add_line(candidate("v1", 100), 50).unwrap();
        assert_eq!(store.line("v1").unwrap().quantity, 10);
    }

    #[test]
    fn test_no_ops_do_not_save_or_notify() {
        let (store, sink) = recording_store();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!store.remove_line("missing"));
        store.set_quantity("missing", 4).unwrap();
        store.clear();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn test_saves_follow_mutation_order_and_skip_panel() {
        let (store, sink) = recording_store();

        store.add_one(candidate("v1", 100)).unwrap();
        store.toggle_panel();
        store.set_quantity("v1", 4).unwrap();
        store.set_panel_open(false);
        store.clear();

        let saved = sink.saved.lock().unwrap();
        let quantities: Vec<Vec<i64>> = saved
            .iter()
            .map(|c| c.lines.iter().map(|l| l.quantity).collect())
            .collect();
        assert_eq!(quantities, vec![vec![1], vec![4], vec![]]);
    }

    #[test]
    fn test_clear_keeps_panel_open() {
        let store = CartStore::default();
        store.add_one(candidate("v1", 100)).unwrap();
        store.set_panel_open(true);
        store.clear();

        assert!(store.is_empty());
        assert!(store.is_panel_open());
    }

    #[test]
    fn test_subscribers_see_new_state() {
        let store = CartStore::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store.subscribe(move |state| sink.lock().unwrap().push(state.total_item_count()));

        store.add_line(candidate("v1", 100), 2).unwrap();
        store.toggle_panel();
        assert!(store.unsubscribe(id));
        store.add_one(candidate("v1", 100)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![2, 2]);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_subtotal_watch_ignores_panel_toggles() {
        let store = CartStore::default();
        store.add_one(candidate("v1", 250)).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let notified = Arc::new(Mutex::new(Vec::new()));
        let (r, n) = (Arc::clone(&runs), Arc::clone(&notified));
        store.select_lines(
            move |lines| {
                r.fetch_add(1, Ordering::SeqCst);
                shopbase_core::cart::subtotal(lines)
            },
            move |subtotal: &Money| n.lock().unwrap().push(subtotal.cents()),
        );

        for _ in 0..4 {
            store.toggle_panel();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        store.add_one(candidate("v1", 250)).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(*notified.lock().unwrap(), vec![500]);
    }

    #[test]
    fn test_item_count_watch_only_fires_on_change() {
        let store = CartStore::default();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);
        store.watch_item_count(move |count| sink.lock().unwrap().push(*count));

        store.add_line(candidate("a", 100), 2).unwrap();
        // Same count, different lines
        store.set_quantity("a", 1).unwrap();
        store.add_one(candidate("b", 300)).unwrap();
        store.set_quantity("b", 1).unwrap();

        assert_eq!(*counts.lock().unwrap(), vec![2, 1, 2]);
    }

    #[test]
    fn test_panel_watch_via_select() {
        let store = CartStore::default();
        let flips = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&flips);
        store.select(|s: &CartState| s.is_panel_open(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_panel_open(true);
        store.set_panel_open(true);
        store.add_one(candidate("v1", 100)).unwrap();
        store.set_panel_open(false);

        assert_eq!(flips.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_observer_can_read_store() {
        let store = Arc::new(CartStore::default());
        let seen = Arc::new(AtomicUsize::new(0));

        let (reader, sink) = (Arc::downgrade(&store), Arc::clone(&seen));
        store.subscribe(move |_| {
            if let Some(store) = reader.upgrade() {
                sink.store(store.line_count(), Ordering::SeqCst);
            }
        });

        store.add_one(candidate("v1", 100)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutators_report_change() {
        let store = CartStore::default();

        assert!(!store.clear());
        assert!(!store.remove_line("v1"));
        assert!(store.set_panel_open(true));
        assert!(!store.set_panel_open(true));
        assert!(store.toggle_panel());
        assert!(!store.is_panel_open());

        store.add_one(candidate("v1", 100)).unwrap();
        assert!(store.clear());
        assert!(!store.clear());
    }

    #[test]
    fn test_observer_can_unsubscribe_itself() {
        let store = Arc::new(CartStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counts = Arc::new(Mutex::new(Vec::new()));
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let (reader, counter, sink, slot) = (
            Arc::downgrade(&store),
            Arc::clone(&calls),
            Arc::clone(&counts),
            Arc::clone(&own_id),
        );
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(store) = reader.upgrade() {
                sink.lock().unwrap().push(store.subscriber_count());
                if let Some(id) = *slot.lock().unwrap() {
                    assert!(store.unsubscribe(id));
                }
                sink.lock().unwrap().push(store.subscriber_count());
            }
        });
        *own_id.lock().unwrap() = Some(id);

        let other = Arc::new(AtomicUsize::new(0));
        let other_counter = Arc::clone(&other);
        store.subscribe(move |_| {
            other_counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add_one(candidate("v1", 100)).unwrap();
        store.add_one(candidate("v1", 100)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 2);
        assert_eq!(*counts.lock().unwrap(), vec![2, 1]);
        assert_eq!(store.subscriber_count(), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn test_panicking_observer_keeps_subscriptions() {
        let store = Arc::new(CartStore::default());
        let calls = Arc::new(AtomicUsize::new(0));

        store.subscribe(|state| {
            if state.total_item_count() == 1 {
                panic!("listener failed");
            }
        });
        let counter = Arc::clone(&calls);
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let failing = Arc::clone(&store);
        let result = thread::spawn(move || failing.add_one(candidate("v1", 100))).join();
        assert!(result.is_err());

        assert_eq!(store.subscriber_count(), 2);
        store.add_one(candidate("v1", 100)).unwrap();
        assert_eq!(store.total_item_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_adds_lose_no_update() {
        let store = Arc::new(CartStore::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.add_one(candidate("v1", 100)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.line_count(), 1);
        assert_eq!(store.total_item_count(), 200);
    }

    #[test]
    fn test_open_hydrates_and_persists() {
        let persistence = CartPersistence::new(Arc::new(MemoryStorage::new()), "cart-storage");

        {
            let sink = Arc::new(InlineSink::new(persistence.clone()));
            let store = CartStore::open(&persistence, sink, CartRules::default());
            assert!(store.is_empty());
            store.add_line(candidate("v1", 1000), 2).unwrap();
            store.set_panel_open(true);
        }

        let sink = Arc::new(InlineSink::new(persistence.clone()));
        let reopened = CartStore::open(&persistence, sink, CartRules::default());
        assert_eq!(reopened.total_item_count(), 2);
        assert_eq!(reopened.subtotal().cents(), 2000);
        assert!(!reopened.is_panel_open());
    }
}
