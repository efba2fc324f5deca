//! Observable state container
//!
//! Listeners run synchronously after every accepted update, outside the
//! state lock, and receive the new snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

pub type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

struct ListenerEntry<S> {
    id: SubscriptionId,
    listener: Listener<S>,
}

pub struct Store<S> {
    state: RwLock<S>,
    listeners: RwLock<Vec<ListenerEntry<S>>>,
    next_id: AtomicU64,
}

impl<S: Clone + Send + Sync + 'static> Store<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: RwLock::new(initial),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Snapshot of the current state
    pub fn get(&self) -> S {
        self.state.read().clone()
    }

    /// Reads part of the state without cloning all of it
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.read())
    }

    /// Applies `f` and notifies listeners
    pub fn update(&self, f: impl FnOnce(&mut S)) {
        self.try_update(|state| {
            f(state);
            true
        });
    }

    /// Applies `f` under the write lock; listeners only hear about it when it returns true
    ///
    /// `f` must leave the state untouched when it returns false.
    pub fn try_update(&self, f: impl FnOnce(&mut S) -> bool) -> bool {
        let snapshot = {
            let mut state = self.state.write();
            if !f(&mut state) {
                return false;
            }
            state.clone()
        };
        self.notify(&snapshot);
        true
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(ListenerEntry {
            id,
            listener: Arc::new(listener),
        });
        id
    }

    /// Returns false when the id was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify(&self, snapshot: &S) {
        let listeners: Vec<Listener<S>> = self
            .listeners
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}
