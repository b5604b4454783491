//! # Observers
//!
//! Observer list plus the equality-checked selectors built on top of it.
//!
//! Listeners are called outside the observer lock: a mutation takes the
//! current entries as a [`Batch`], notifies them, then hands them back.
//! Subscribing or unsubscribing while a batch is out takes effect from the
//! next notification.
//!
//! ```text
//!   mutation ──► Batch::notify(&new_state)
//!                  ├── plain listener         called every time
//!                  ├── memo(selector)         recompute, call if value changed
//!                  └── memo_lines(selector)   skip unless lines_revision moved,
//!                                             then as memo
//! ```

use shopbase_core::{CartLine, CartState};

/// Identifies a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub(crate) type Listener = Box<dyn FnMut(&CartState) + Send>;

type Entry = (SubscriptionId, Listener);

/// Registered listeners, notified in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    entries: Vec<Entry>,
    /// Ids of the batch currently being notified.
    in_flight: Vec<SubscriptionId>,
    /// In-flight ids unsubscribed before the batch came back.
    removed: Vec<SubscriptionId>,
}

/// Listeners taken out of [`Observers`] for one notification.
pub(crate) struct Batch {
    entries: Vec<Entry>,
}

impl Batch {
    pub(crate) fn notify(&mut self, state: &CartState) {
        for (_, listener) in self.entries.iter_mut() {
            listener(state);
        }
    }
}

impl Observers {
    pub(crate) fn insert(&mut self, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        if self.entries.len() != before {
            return true;
        }

        if self.in_flight.contains(&id) && !self.removed.contains(&id) {
            self.removed.push(id);
            return true;
        }

        false
    }

    /// Moves every listener into a batch. Must be followed by
    /// [`restore_batch`](Self::restore_batch).
    pub(crate) fn take_batch(&mut self) -> Batch {
        let entries = std::mem::take(&mut self.entries);
        self.in_flight = entries.iter().map(|(id, _)| *id).collect();
        Batch { entries }
    }

    /// Puts a batch back ahead of listeners registered meanwhile, dropping
    /// those unsubscribed meanwhile.
    pub(crate) fn restore_batch(&mut self, batch: Batch) {
        let removed = std::mem::take(&mut self.removed);
        self.in_flight.clear();

        let mut entries = batch.entries;
        entries.retain(|(id, _)| !removed.contains(id));
        entries.append(&mut self.entries);
        self.entries = entries;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len() + self.in_flight.len() - self.removed.len()
    }
}

/// Wraps a selector so `on_change` only fires when its value changes.
pub(crate) fn memo<T, S, F>(current: &CartState, selector: S, mut on_change: F) -> Listener
where
    T: PartialEq + Send + 'static,
    S: Fn(&CartState) -> T + Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    let mut last = selector(current);

    Box::new(move |state| {
        let next = selector(state);
        if next != last {
            on_change(&next);
            last = next;
        }
    })
}

/// Like [`memo`], but the selector only sees lines and is not re-run while
/// the lines revision stays put.
pub(crate) fn memo_lines<T, S, F>(current: &CartState, selector: S, mut on_change: F) -> Listener
where
    T: PartialEq + Send + 'static,
    S: Fn(&[CartLine]) -> T + Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    let mut revision = current.lines_revision();
    let mut last = selector(current.lines());

    Box::new(move |state| {
        if state.lines_revision() == revision {
            return;
        }
        revision = state.lines_revision();

        let next = selector(state.lines());
        if next != last {
            on_change(&next);
            last = next;
        }
    })
}
