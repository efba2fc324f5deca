//! Hand-off of loaded matches from a server render to a client router
//!
//! The server side calls [`Router::dehydrate`](crate::Router::dehydrate) and
//! pushes the entries through a channel; the client drains them and calls
//! [`Router::hydrate`](crate::Router::hydrate) before its first load.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::HydrationError;

/// One dehydrated match: its id and the transformed loader data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationEntry {
    pub match_id: String,
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Open,
    TornDown,
}

struct Inner {
    phase: Phase,
    queue: Vec<HydrationEntry>,
}

/// Ordered queue of hydration entries with an init/teardown lifecycle
pub struct HydrationChannel {
    inner: Mutex<Inner>,
}

impl HydrationChannel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Uninitialized,
                queue: Vec::new(),
            }),
        }
    }

    pub fn init(&self) -> Result<(), HydrationError> {
        let mut inner = self.inner.lock();
        match inner.phase {
            Phase::Uninitialized => {
                inner.phase = Phase::Open;
                Ok(())
            }
            Phase::Open => Err(HydrationError::AlreadyInitialized),
            Phase::TornDown => Err(HydrationError::TornDown),
        }
    }

    pub fn enqueue(&self, entry: HydrationEntry) -> Result<(), HydrationError> {
        let mut inner = self.inner.lock();
        ensure_open(inner.phase)?;
        inner.queue.push(entry);
        Ok(())
    }

    /// Takes every queued entry in enqueue order
    pub fn drain(&self) -> Result<Vec<HydrationEntry>, HydrationError> {
        let mut inner = self.inner.lock();
        ensure_open(inner.phase)?;
        Ok(std::mem::take(&mut inner.queue))
    }

    /// Closes the channel, discarding anything not drained
    pub fn teardown(&self) -> Result<(), HydrationError> {
        let mut inner = self.inner.lock();
        ensure_open(inner.phase)?;
        if !inner.queue.is_empty() {
            tracing::warn!("Hydration channel torn down with {} undrained entries", inner.queue.len());
        }
        inner.queue.clear();
        inner.phase = Phase::TornDown;
        Ok(())
    }
}

impl Default for HydrationChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_open(phase: Phase) -> Result<(), HydrationError> {
    match phase {
        Phase::Open => Ok(()),
        Phase::Uninitialized => Err(HydrationError::NotInitialized),
        Phase::TornDown => Err(HydrationError::TornDown),
    }
}
