//! History adapters
//!
//! The router only talks to history through the [`History`] trait. Browser
//! integrations live outside this crate; [`MemoryHistory`] keeps a stack of
//! entries in memory for servers, tests and the CLI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use waypoint_router::location::{create_key, STATE_KEY};
use waypoint_router::HistoryState;

use crate::store::SubscriptionId;

/// One history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryLocation {
    pub href: String,
    pub state: HistoryState,
}

impl HistoryLocation {
    /// Key stored in the entry state, if any
    pub fn key(&self) -> Option<&str> {
        self.state.get(STATE_KEY).and_then(Value::as_str)
    }
}

/// What moved the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    Push,
    Replace,
    Back,
    Forward,
    Go(isize),
}

impl HistoryAction {
    /// Traversals made outside the router (back/forward/go)
    pub fn is_pop(&self) -> bool {
        matches!(self, HistoryAction::Back | HistoryAction::Forward | HistoryAction::Go(_))
    }
}

pub type HistoryListener = Arc<dyn Fn(&HistoryLocation, HistoryAction) + Send + Sync>;

/// Session history as seen by the router
pub trait History: Send + Sync {
    fn location(&self) -> HistoryLocation;

    fn push(&self, href: &str, state: HistoryState);

    fn replace(&self, href: &str, state: HistoryState);

    /// Moves `delta` entries, clamped to the stack
    fn go(&self, delta: isize);

    fn back(&self) {
        self.go(-1);
    }

    fn forward(&self) {
        self.go(1);
    }

    fn can_go_back(&self) -> bool;

    fn length(&self) -> usize;

    fn subscribe(&self, listener: HistoryListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

// ============================================================================
// MemoryHistory
// ============================================================================

struct Entries {
    stack: Vec<HistoryLocation>,
    index: usize,
}

/// In-memory history stack
pub struct MemoryHistory {
    entries: RwLock<Entries>,
    listeners: RwLock<Vec<(SubscriptionId, HistoryListener)>>,
    next_id: AtomicU64,
}

impl MemoryHistory {
    /// A history with a single entry
    pub fn new(initial_href: &str) -> Self {
        Self::with_entries(&[initial_href], 0)
    }

    /// A history seeded with `hrefs`, positioned at `index` (clamped)
    pub fn with_entries(hrefs: &[&str], index: usize) -> Self {
        let mut stack: Vec<HistoryLocation> = hrefs
            .iter()
            .map(|href| entry(href, HistoryState::new()))
            .collect();
        if stack.is_empty() {
            stack.push(entry("/", HistoryState::new()));
        }
        let index = index.min(stack.len() - 1);

        Self {
            entries: RwLock::new(Entries { stack, index }),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current position in the stack
    pub fn index(&self) -> usize {
        self.entries.read().index
    }

    /// Every entry href, oldest first
    pub fn hrefs(&self) -> Vec<String> {
        self.entries.read().stack.iter().map(|e| e.href.clone()).collect()
    }

    fn notify(&self, action: HistoryAction) {
        let location = self.location();
        let listeners: Vec<HistoryListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&location, action);
        }
    }
}

/// Builds an entry, assigning a key when the state has none
fn entry(href: &str, mut state: HistoryState) -> HistoryLocation {
    if !state.contains_key(STATE_KEY) {
        state.insert(STATE_KEY.to_string(), Value::String(create_key()));
    }
    HistoryLocation {
        href: href.to_string(),
        state,
    }
}

impl History for MemoryHistory {
    fn location(&self) -> HistoryLocation {
        let entries = self.entries.read();
        entries.stack[entries.index].clone()
    }

    fn push(&self, href: &str, state: HistoryState) {
        {
            let mut entries = self.entries.write();
            let next = entries.index + 1;
            entries.stack.truncate(next);
            entries.stack.push(entry(href, state));
            entries.index = next;
        }
        self.notify(HistoryAction::Push);
    }

    fn replace(&self, href: &str, state: HistoryState) {
        {
            let mut entries = self.entries.write();
            let index = entries.index;
            entries.stack[index] = entry(href, state);
        }
        self.notify(HistoryAction::Replace);
    }

    fn go(&self, delta: isize) {
        let moved = {
            let mut entries = self.entries.write();
            let last = entries.stack.len() as isize - 1;
            let target = (entries.index as isize + delta).clamp(0, last) as usize;
            let moved = target != entries.index;
            entries.index = target;
            moved
        };

        if moved {
            let action = match delta {
                -1 => HistoryAction::Back,
                1 => HistoryAction::Forward,
                other => HistoryAction::Go(other),
            };
            self.notify(action);
        }
    }

    fn can_go_back(&self) -> bool {
        self.entries.read().index > 0
    }

    fn length(&self) -> usize {
        self.entries.read().stack.len()
    }

    fn subscribe(&self, listener: HistoryListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(entry_id, _)| *entry_id != id);
        listeners.len() != before
    }
}
