//! Deferred loader values
//!
//! A loader can return part of its data right away and hand the rest over
//! later: a [`DeferredHandle`] settles once with a value or an error, and a
//! [`StreamHandle`] delivers chunks until it is closed. Both are backed by a
//! `tokio::sync::watch` channel, so any number of readers can await them.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredError {
    #[error("deferred value rejected: {0}")]
    Rejected(String),
}

/// State of a single deferred value
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredState<T> {
    Pending,
    Resolved(T),
    Rejected(String),
}

impl<T> DeferredState<T> {
    pub fn is_settled(&self) -> bool {
        !matches!(self, DeferredState::Pending)
    }
}

/// Writer and reader of a value that settles exactly once
#[derive(Clone)]
pub struct DeferredHandle<T> {
    sender: Arc<watch::Sender<DeferredState<T>>>,
}

impl<T: Clone + Send + Sync> DeferredHandle<T> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(DeferredState::Pending);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns false when the value was already settled
    pub fn resolve(&self, value: T) -> bool {
        self.settle(DeferredState::Resolved(value))
    }

    /// Returns false when the value was already settled
    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.settle(DeferredState::Rejected(reason.into()))
    }

    fn settle(&self, next: DeferredState<T>) -> bool {
        self.sender.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = next;
            true
        })
    }

    pub fn state(&self) -> DeferredState<T> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeferredState<T>> {
        self.sender.subscribe()
    }

    /// Waits until the value settles
    pub async fn wait(&self) -> Result<T, DeferredError> {
        let mut receiver = self.sender.subscribe();
        let settled = match receiver.wait_for(DeferredState::is_settled).await {
            Ok(state) => state.clone(),
            // the handle owns the sender, so the channel never closes under us
            Err(_) => self.state(),
        };
        match settled {
            DeferredState::Resolved(value) => Ok(value),
            DeferredState::Rejected(reason) => Err(DeferredError::Rejected(reason)),
            DeferredState::Pending => Err(DeferredError::Rejected("value was never settled".to_string())),
        }
    }
}

impl<T: Clone + Send + Sync> Default for DeferredHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Chunks received so far and whether the stream ended
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState<T> {
    pub chunks: Vec<T>,
    pub closed: bool,
    pub error: Option<String>,
}

impl<T> StreamState<T> {
    /// Closed or rejected
    pub fn is_done(&self) -> bool {
        self.closed || self.error.is_some()
    }
}

/// Writer and reader of a chunked value
#[derive(Clone)]
pub struct StreamHandle<T> {
    sender: Arc<watch::Sender<StreamState<T>>>,
}

impl<T: Clone + Send + Sync> StreamHandle<T> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(StreamState {
            chunks: Vec::new(),
            closed: false,
            error: None,
        });
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Appends a chunk; ignored once the stream is done
    pub fn push_chunk(&self, chunk: T) -> bool {
        self.sender.send_if_modified(|state| {
            if state.is_done() {
                return false;
            }
            state.chunks.push(chunk);
            true
        })
    }

    pub fn close(&self) -> bool {
        self.sender.send_if_modified(|state| {
            if state.is_done() {
                return false;
            }
            state.closed = true;
            true
        })
    }

    pub fn reject(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.sender.send_if_modified(|state| {
            if state.is_done() {
                return false;
            }
            state.error = Some(reason);
            true
        })
    }

    pub fn state(&self) -> StreamState<T> {
        self.sender.borrow().clone()
    }

    /// Chunks received so far
    pub fn chunks(&self) -> Vec<T> {
        self.sender.borrow().chunks.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamState<T>> {
        self.sender.subscribe()
    }

    /// Waits for the stream to close and returns every chunk
    pub async fn collect(&self) -> Result<Vec<T>, DeferredError> {
        let mut receiver = self.sender.subscribe();
        let done = match receiver.wait_for(StreamState::is_done).await {
            Ok(state) => state.clone(),
            Err(_) => self.sender.borrow().clone(),
        };
        match done.error {
            Some(reason) => Err(DeferredError::Rejected(reason)),
            None => Ok(done.chunks),
        }
    }
}

impl<T: Clone + Send + Sync> Default for StreamHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Loader data that may still be arriving
#[derive(Clone)]
pub enum DeferredValue<T> {
    Resolved(T),
    Pending(DeferredHandle<T>),
    Streaming(StreamHandle<T>),
}

impl<T: fmt::Debug> fmt::Debug for DeferredValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredValue::Resolved(value) => f.debug_tuple("Resolved").field(value).finish(),
            DeferredValue::Pending(_) => f.write_str("Pending"),
            DeferredValue::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

impl<T: Clone + Send + Sync> DeferredValue<T> {
    /// A pending value and the handle that settles it
    pub fn pending() -> (Self, DeferredHandle<T>) {
        let handle = DeferredHandle::new();
        (DeferredValue::Pending(handle.clone()), handle)
    }

    /// A streaming value and the handle that feeds it
    pub fn streaming() -> (Self, StreamHandle<T>) {
        let handle = StreamHandle::new();
        (DeferredValue::Streaming(handle.clone()), handle)
    }

    pub fn is_settled(&self) -> bool {
        match self {
            DeferredValue::Resolved(_) => true,
            DeferredValue::Pending(handle) => handle.state().is_settled(),
            DeferredValue::Streaming(handle) => handle.sender.borrow().is_done(),
        }
    }

    /// Waits for everything to arrive; a single value comes back as one chunk
    pub async fn collect(&self) -> Result<Vec<T>, DeferredError> {
        match self {
            DeferredValue::Resolved(value) => Ok(vec![value.clone()]),
            DeferredValue::Pending(handle) => handle.wait().await.map(|value| vec![value]),
            DeferredValue::Streaming(handle) => handle.collect().await,
        }
    }
}
