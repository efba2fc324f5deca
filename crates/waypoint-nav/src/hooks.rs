//! Per-route data hooks
//!
//! [`RouteHooks`] is stored on a route declaration as an opaque extension
//! (see [`RouteDefExt::with_hooks`]); the route tree never looks inside it.
//! Async hooks are boxed closures returning a [`BoxFuture`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::Shared;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use waypoint_router::{Params, ParsedLocation, RouteDef, SearchMap};

use crate::deferred::DeferredValue;
use crate::error::RouteSignal;
use crate::matches::{LoadCause, RouteMatch};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a user hook
pub type HookResult<T> = Result<T, RouteSignal>;

/// Cancellation signal handed to hooks; cancelled when the run is superseded
pub type AbortSignal = CancellationToken;

pub type ContextFn = Arc<dyn Fn(ContextArgs) -> HookResult<Value> + Send + Sync>;
pub type BeforeLoadFn = Arc<dyn Fn(BeforeLoadArgs) -> BoxFuture<'static, HookResult<Value>> + Send + Sync>;
pub type LoaderFn = Arc<dyn Fn(LoaderArgs) -> BoxFuture<'static, HookResult<Value>> + Send + Sync>;
pub type OnErrorFn = Arc<dyn Fn(&RouteSignal) -> Option<RouteSignal> + Send + Sync>;
/// Deferred fields registered by one loader call
pub(crate) type DeferredSink = Arc<Mutex<Vec<(String, DeferredValue<Value>)>>>;

pub type ShouldReloadFn = Arc<dyn Fn(&LoaderArgs) -> bool + Send + Sync>;

/// Arguments of the synchronous route context hook
#[derive(Debug, Clone)]
pub struct ContextArgs {
    pub params: Params,
    pub deps: Value,
    pub context: Value,
    pub location: ParsedLocation,
    pub cause: LoadCause,
    pub preload: bool,
}

/// Arguments of `before_load`
#[derive(Debug, Clone)]
pub struct BeforeLoadArgs {
    pub params: Params,
    pub search: SearchMap,
    /// Context accumulated so far, including this route's own route context
    pub context: Value,
    pub location: ParsedLocation,
    pub cause: LoadCause,
    pub preload: bool,
    pub abort: AbortSignal,
}

/// Settled state of a match's load, shared with the child loader
#[derive(Debug, Clone)]
pub(crate) struct MatchLoad {
    pub matched: RouteMatch,
    pub signal: Option<RouteSignal>,
}

pub(crate) type SharedMatchLoad = Shared<BoxFuture<'static, MatchLoad>>;

/// Handle to the parent match's load
#[derive(Clone, Default)]
pub struct ParentMatch {
    pub(crate) load: Option<SharedMatchLoad>,
}

impl fmt::Debug for ParentMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentMatch").field("present", &self.load.is_some()).finish()
    }
}

/// Arguments of `loader`
#[derive(Debug, Clone)]
pub struct LoaderArgs {
    pub route_id: String,
    pub params: Params,
    pub search: SearchMap,
    pub deps: Value,
    pub context: Value,
    pub location: ParsedLocation,
    pub cause: LoadCause,
    pub preload: bool,
    pub abort: AbortSignal,
    pub(crate) parent: ParentMatch,
    pub(crate) deferred: DeferredSink,
}

impl LoaderArgs {
    /// Waits for the parent match to settle and returns it
    ///
    /// `None` for the root match, or when the parent was not loaded in this run.
    pub async fn parent_match(&self) -> Option<RouteMatch> {
        match &self.parent.load {
            Some(load) => Some(load.clone().await.matched),
            None => None,
        }
    }

    /// Fills `key` of this loader's data once `value` arrives
    ///
    /// The loader returns without waiting; the match commits with the rest
    /// of its data and the router publishes an update as the value settles.
    ///
    /// ```no_run
    /// # use serde_json::json;
    /// # use waypoint_nav::{DeferredValue, RouteHooks};
    /// RouteHooks::new().loader(|args| async move {
    ///     let (comments, handle) = DeferredValue::pending();
    ///     args.defer("comments", comments);
    ///     tokio::spawn(async move { handle.resolve(json!(["first!"])) });
    ///     Ok(json!({ "title": "Hello" }))
    /// });
    /// ```
    pub fn defer(&self, key: impl Into<String>, value: DeferredValue<Value>) {
        self.deferred.lock().push((key.into(), value));
    }
}

/// Data hooks and cache timings of one route
#[derive(Clone, Default)]
pub struct RouteHooks {
    pub context: Option<ContextFn>,
    pub before_load: Option<BeforeLoadFn>,
    pub loader: Option<LoaderFn>,
    pub on_error: Option<OnErrorFn>,
    pub should_reload: Option<ShouldReloadFn>,
    pub stale_time: Option<Duration>,
    pub preload_stale_time: Option<Duration>,
    pub gc_time: Option<Duration>,
    pub pending_ms: Option<Duration>,
    pub pending_min_ms: Option<Duration>,
    /// `Some(false)` opts the route out of preloading
    pub preload: Option<bool>,
}

impl RouteHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context<F>(mut self, hook: F) -> Self
    where
        F: Fn(ContextArgs) -> HookResult<Value> + Send + Sync + 'static,
    {
        self.context = Some(Arc::new(hook));
        self
    }

    pub fn before_load<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(BeforeLoadArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Value>> + Send + 'static,
    {
        self.before_load = Some(Arc::new(move |args: BeforeLoadArgs| -> BoxFuture<'static, HookResult<Value>> {
            Box::pin(hook(args))
        }));
        self
    }

    pub fn loader<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<Value>> + Send + 'static,
    {
        self.loader = Some(Arc::new(move |args: LoaderArgs| -> BoxFuture<'static, HookResult<Value>> {
            Box::pin(hook(args))
        }));
        self
    }

    /// Sees every ordinary error; returning a signal replaces it
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RouteSignal) -> Option<RouteSignal> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Overrides the stale-time decision for a loaded match
    pub fn should_reload<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoaderArgs) -> bool + Send + Sync + 'static,
    {
        self.should_reload = Some(Arc::new(hook));
        self
    }

    pub fn stale_time(mut self, value: Duration) -> Self {
        self.stale_time = Some(value);
        self
    }

    pub fn preload_stale_time(mut self, value: Duration) -> Self {
        self.preload_stale_time = Some(value);
        self
    }

    pub fn gc_time(mut self, value: Duration) -> Self {
        self.gc_time = Some(value);
        self
    }

    pub fn pending_ms(mut self, value: Duration) -> Self {
        self.pending_ms = Some(value);
        self
    }

    pub fn pending_min_ms(mut self, value: Duration) -> Self {
        self.pending_min_ms = Some(value);
        self
    }

    pub fn preload(mut self, enabled: bool) -> Self {
        self.preload = Some(enabled);
        self
    }
}

impl fmt::Debug for RouteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHooks")
            .field("context", &self.context.is_some())
            .field("before_load", &self.before_load.is_some())
            .field("loader", &self.loader.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("should_reload", &self.should_reload.is_some())
            .field("stale_time", &self.stale_time)
            .field("preload_stale_time", &self.preload_stale_time)
            .field("gc_time", &self.gc_time)
            .field("pending_ms", &self.pending_ms)
            .field("pending_min_ms", &self.pending_min_ms)
            .field("preload", &self.preload)
            .finish()
    }
}

/// Attaches [`RouteHooks`] to a route declaration
pub trait RouteDefExt {
    fn with_hooks(self, hooks: RouteHooks) -> RouteDef;
}

impl RouteDefExt for RouteDef {
    fn with_hooks(self, hooks: RouteHooks) -> RouteDef {
        self.with_extension(hooks)
    }
}
