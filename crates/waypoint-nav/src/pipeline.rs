//! Load pipeline
//!
//! A run takes the matches of one resolution through two stages:
//!
//! 1. **Serial**: root to leaf, each match's route context and `before_load`
//!    run in order and their results are merged into the context handed to
//!    the next route. The first failure stops the stage.
//! 2. **Loaders**: every match up to the first failure runs its loader
//!    concurrently. A loader can wait on its parent's settled match through
//!    [`LoaderArgs::parent_match`].
//!
//! Loader calls are deduplicated by match id through a [`LoaderRegistry`]
//! shared between navigations and preloads. Every settled match is reported
//! through [`MatchEvent::Settled`] as soon as it settles, before the run ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{try_join_all, FutureExt, Shared as SharedFuture};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use waypoint_router::{replace_equal_deep, NotFoundMatch, ParsedLocation, RouteTree, Shared};

use crate::config::RouterConfig;
use crate::deferred::DeferredValue;
use crate::error::{NotFound, Redirect, RouteSignal};
use crate::hooks::{
    AbortSignal, BeforeLoadArgs, BoxFuture, ContextArgs, HookResult, LoaderArgs, LoaderFn, MatchLoad, ParentMatch,
    RouteHooks, SharedMatchLoad,
};
use crate::matches::{FetchState, MatchStatus, RouteMatch};

/// Data returned by one loader call, with the fields it deferred
#[derive(Debug, Clone)]
pub(crate) struct LoaderOutput {
    pub data: Value,
    pub deferred: Vec<(String, DeferredValue<Value>)>,
}

type LoaderResult = HookResult<LoaderOutput>;
type SharedLoader = SharedFuture<BoxFuture<'static, LoaderResult>>;

// ============================================================================
// Loader registry
// ============================================================================

struct InFlight {
    run_id: u64,
    /// Signal handed to the loader that started the run
    abort: AbortSignal,
    load: SharedLoader,
}

/// Loader runs currently in flight, keyed by match id
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    inflight: Arc<Mutex<HashMap<String, InFlight>>>,
    next_run: Arc<AtomicU64>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the in-flight run for `match_id`, or starts one with `start`
    ///
    /// A run whose abort signal is cancelled is never joined: its loader
    /// may already be bailing out. `start` calls into user code and runs
    /// without the registry lock held.
    pub(crate) fn run<F>(&self, match_id: &str, abort: &AbortSignal, start: F) -> SharedLoader
    where
        F: FnOnce() -> BoxFuture<'static, LoaderResult>,
    {
        if let Some(existing) = self.joinable(match_id) {
            tracing::debug!("Joining in-flight loader for {}", match_id);
            return existing;
        }

        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.inflight);
        let key = match_id.to_string();
        let load = start();
        let shared = async move {
            let result = load.await;
            let mut inflight = registry.lock();
            if inflight.get(&key).is_some_and(|entry| entry.run_id == run_id) {
                inflight.remove(&key);
            }
            result
        }
        .boxed()
        .shared();

        let mut inflight = self.inflight.lock();
        if let Some(existing) = inflight.get(match_id) {
            // another caller registered a live run while `start` ran
            if !existing.abort.is_cancelled() {
                return existing.load.clone();
            }
        }
        inflight.insert(
            match_id.to_string(),
            InFlight {
                run_id,
                abort: abort.clone(),
                load: shared.clone(),
            },
        );
        shared
    }

    fn joinable(&self, match_id: &str) -> Option<SharedLoader> {
        let mut inflight = self.inflight.lock();
        match inflight.get(match_id) {
            Some(entry) if !entry.abort.is_cancelled() => Some(entry.load.clone()),
            Some(_) => {
                tracing::debug!("Dropping superseded loader run for {}", match_id);
                inflight.remove(match_id);
                None
            }
            None => None,
        }
    }

    /// Number of loader runs in flight
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn is_loading(&self, match_id: &str) -> bool {
        self.inflight
            .lock()
            .get(match_id)
            .is_some_and(|entry| !entry.abort.is_cancelled())
    }
}

// ============================================================================
// Requests and outcomes
// ============================================================================

/// Progress reported while a run is in flight
#[derive(Debug, Clone)]
pub enum MatchEvent {
    /// The pending window elapsed before the loader finished
    PendingVisible { match_id: String },
    /// A match of the running load settled
    Settled(RouteMatch),
    /// A background revalidation finished
    Reloaded(RouteMatch),
    /// A deferred field of the match received a value, a chunk or an error
    DeferredSettled { match_id: String },
}

pub type MatchEventHandler = Arc<dyn Fn(MatchEvent) + Send + Sync>;

/// Everything one pipeline run needs
pub(crate) struct LoadRequest {
    pub tree: Arc<RouteTree>,
    pub config: Arc<RouterConfig>,
    pub registry: LoaderRegistry,
    pub router_context: Value,
    pub location: ParsedLocation,
    pub preload: bool,
    /// Await stale loaders instead of revalidating in the background
    pub sync: bool,
    pub abort: AbortSignal,
    pub events: Option<MatchEventHandler>,
}

impl LoadRequest {
    fn hooks_for(&self, route_match: &RouteMatch) -> RouteHooks {
        self.tree
            .node(route_match.node_id)
            .and_then(|node| node.extension::<RouteHooks>())
            .cloned()
            .unwrap_or_default()
    }

    fn emit(&self, event: MatchEvent) {
        if let Some(events) = &self.events {
            events(event);
        }
    }

    fn stale_age(&self, hooks: &RouteHooks) -> Duration {
        if self.preload {
            hooks
                .preload_stale_time
                .unwrap_or(self.config.default_preload_stale_time)
        } else {
            hooks.stale_time.unwrap_or(self.config.default_stale_time)
        }
    }

    fn is_boundary(&self, route_match: &RouteMatch) -> bool {
        self.tree
            .node(route_match.node_id)
            .map(|node| node.is_root() || node.options.not_found_boundary)
            .unwrap_or(false)
    }
}

/// Result of a pipeline run
#[derive(Debug)]
pub(crate) enum LoadOutcome {
    Loaded(Vec<RouteMatch>),
    Redirect(Redirect),
}

/// A not-found waiting to be attached to its boundary
struct PendingNotFound {
    signal: NotFound,
    /// Raised by `before_load` without naming a route
    start_from_parent: bool,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs the serial stage, then the loaders, then not-found marking
pub(crate) async fn load_matches(
    request: LoadRequest,
    mut matches: Vec<RouteMatch>,
    unmatched: Option<NotFoundMatch>,
) -> LoadOutcome {
    let request = Arc::new(request);
    let mut context = match &request.router_context {
        Value::Object(_) => request.router_context.clone(),
        _ => Value::Object(Map::new()),
    };
    let mut first_bad = None;
    let mut not_found = None;

    for index in 0..matches.len() {
        if request.abort.is_cancelled() {
            tracing::debug!("Load of {} aborted before {}", request.location.href, matches[index].route_id);
            return LoadOutcome::Loaded(matches);
        }

        let hooks = request.hooks_for(&matches[index]);
        if let Err(signal) = run_serial_stage(&request, &mut matches[index], &hooks, &mut context).await {
            let (signal, defaulted) = settle_failure(&mut matches[index], &hooks, signal);
            match signal {
                RouteSignal::Redirect(redirect) => return LoadOutcome::Redirect(redirect),
                RouteSignal::NotFound(signal) => {
                    not_found = Some(PendingNotFound {
                        signal,
                        start_from_parent: defaulted,
                    });
                }
                RouteSignal::Error(_) => {}
            }
            request.emit(MatchEvent::Settled(matches[index].clone()));
            first_bad = Some(index);
            break;
        }
    }

    let limit = first_bad.unwrap_or(matches.len());
    let mut handles: Vec<SharedMatchLoad> = Vec::with_capacity(limit);
    for route_match in matches.iter().take(limit) {
        let parent = ParentMatch {
            load: handles.last().cloned(),
        };
        let load = load_route_match(Arc::clone(&request), route_match.clone(), parent)
            .boxed()
            .shared();
        handles.push(load);
    }

    let settled = try_join_all(handles.into_iter().map(|load| {
        let request = Arc::clone(&request);
        async move {
            let settled = load.await;
            if let Some(RouteSignal::Redirect(redirect)) = &settled.signal {
                return Err(redirect.clone());
            }
            request.emit(MatchEvent::Settled(settled.matched.clone()));
            Ok(settled)
        }
    }))
    .await;

    let settled = match settled {
        Ok(settled) => settled,
        Err(redirect) => return LoadOutcome::Redirect(redirect),
    };

    for (index, load) in settled.into_iter().enumerate() {
        if not_found.is_none() {
            if let Some(RouteSignal::NotFound(signal)) = &load.signal {
                not_found = Some(PendingNotFound {
                    signal: signal.clone(),
                    start_from_parent: false,
                });
            }
        }
        matches[index] = load.matched;
    }

    // nothing below a failed serial stage was loaded
    if let Some(index) = first_bad {
        matches.truncate(index + 1);
    }

    if not_found.is_none() {
        not_found = unmatched.map(|unmatched| PendingNotFound {
            signal: NotFound {
                route_id: Some(unmatched.route_id),
                data: json!({ "leftover": unmatched.leftover }),
                global: true,
            },
            start_from_parent: false,
        });
    }

    if let Some(pending) = not_found {
        mark_not_found(&request, &mut matches, pending);
    }

    LoadOutcome::Loaded(matches)
}

/// Route context, then `before_load`, for one match
async fn run_serial_stage(
    request: &LoadRequest,
    route_match: &mut RouteMatch,
    hooks: &RouteHooks,
    context: &mut Value,
) -> HookResult<()> {
    if let Some(error) = route_match.validation_error.clone() {
        return Err(RouteSignal::error(error));
    }

    if let Some(context_fn) = &hooks.context {
        let route_context = context_fn(ContextArgs {
            params: route_match.params_map(),
            deps: route_match.loader_deps.clone(),
            context: context.clone(),
            location: request.location.clone(),
            cause: route_match.cause,
            preload: request.preload,
        })?;
        merge_context(context, route_context);
    }

    if let Some(before_load) = &hooks.before_load {
        route_match.fetching = FetchState::BeforeLoad;
        let result = before_load(BeforeLoadArgs {
            params: route_match.params_map(),
            search: route_match.search_map(),
            context: context.clone(),
            location: request.location.clone(),
            cause: route_match.cause,
            preload: request.preload,
            abort: request.abort.clone(),
        })
        .await;
        route_match.fetching = FetchState::Idle;
        merge_context(context, result?);
    }

    route_match.context = replace_equal_deep(&route_match.context, Shared::from(context.clone()));
    Ok(())
}

/// Shallow merge of an object into the accumulated context
fn merge_context(context: &mut Value, addition: Value) {
    if let (Value::Object(target), Value::Object(addition)) = (context, addition) {
        target.extend(addition);
    }
}

/// Applies `on_error` and records the failure on the match
///
/// Returns the final signal and whether a not-found had its route id
/// filled in with the originating route.
fn settle_failure(route_match: &mut RouteMatch, hooks: &RouteHooks, signal: RouteSignal) -> (RouteSignal, bool) {
    let signal = match &hooks.on_error {
        Some(on_error) if matches!(signal, RouteSignal::Error(_)) => on_error(&signal).unwrap_or(signal),
        _ => signal,
    };

    route_match.fetching = FetchState::Idle;
    let mut defaulted = false;
    let signal = match signal {
        RouteSignal::Redirect(redirect) => {
            route_match.status = MatchStatus::Redirected;
            RouteSignal::Redirect(redirect)
        }
        RouteSignal::NotFound(mut not_found) => {
            if not_found.route_id.is_none() {
                not_found.route_id = Some(route_match.route_id.clone());
                defaulted = true;
            }
            route_match.status = MatchStatus::NotFound;
            RouteSignal::NotFound(not_found)
        }
        RouteSignal::Error(error) => {
            tracing::warn!("Route {} failed: {:#}", route_match.route_id, error);
            route_match.status = MatchStatus::Error;
            RouteSignal::Error(error)
        }
    };

    route_match.error = Some(signal.clone());
    (signal, defaulted)
}

/// Marks the nearest boundary at or above the target and drops everything below it
fn mark_not_found(request: &LoadRequest, matches: &mut Vec<RouteMatch>, pending: PendingNotFound) {
    if matches.is_empty() {
        return;
    }

    let target = pending
        .signal
        .route_id
        .as_deref()
        .and_then(|route_id| matches.iter().position(|m| m.route_id == route_id))
        .unwrap_or(0);
    let mut index = if pending.start_from_parent {
        target.saturating_sub(1)
    } else {
        target
    };
    while index > 0 && !request.is_boundary(&matches[index]) {
        index -= 1;
    }

    tracing::info!(
        "Not found at {} handled by {}",
        request.location.pathname,
        matches[index].route_id
    );
    let boundary = &mut matches[index];
    boundary.status = MatchStatus::NotFound;
    boundary.error = Some(RouteSignal::NotFound(pending.signal));
    matches.truncate(index + 1);
}

// ============================================================================
// Loader stage
// ============================================================================

async fn load_route_match(request: Arc<LoadRequest>, mut route_match: RouteMatch, parent: ParentMatch) -> MatchLoad {
    let hooks = request.hooks_for(&route_match);

    if request.preload && hooks.preload == Some(false) {
        return settled(route_match);
    }

    let Some(loader) = hooks.loader.clone() else {
        route_match.invalid = false;
        if !route_match.is_success() {
            route_match.status = MatchStatus::Success;
            route_match.updated_at = Utc::now();
        }
        return settled(route_match);
    };

    if route_match.hydrated {
        tracing::debug!("Using hydrated data for {}", route_match.id);
        route_match.hydrated = false;
        route_match.status = MatchStatus::Success;
        return settled(route_match);
    }

    let args = LoaderArgs {
        route_id: route_match.route_id.clone(),
        params: route_match.params_map(),
        search: route_match.search_map(),
        deps: route_match.loader_deps.clone(),
        context: route_match.context.to_value(),
        location: request.location.clone(),
        cause: route_match.cause,
        preload: request.preload,
        abort: request.abort.clone(),
        parent,
        deferred: Arc::default(),
    };

    if route_match.is_success() {
        let stale = route_match.invalid
            || hooks
                .should_reload
                .as_ref()
                .map(|should_reload| should_reload(&args))
                .unwrap_or_else(|| route_match.age() > request.stale_age(&hooks));

        if !stale {
            tracing::debug!("Reusing fresh data for {}", route_match.id);
            return settled(route_match);
        }

        if !request.sync {
            tracing::debug!("Serving stale data for {} while revalidating", route_match.id);
            spawn_revalidation(Arc::clone(&request), route_match.clone(), loader, args, hooks);
            return settled(route_match);
        }
    }

    let show_pending = !request.preload && route_match.loader_data.is_none();
    run_loader(&request, route_match, &loader, args, &hooks, show_pending).await
}

fn settled(route_match: RouteMatch) -> MatchLoad {
    MatchLoad {
        matched: route_match,
        signal: None,
    }
}

fn spawn_revalidation(
    request: Arc<LoadRequest>,
    route_match: RouteMatch,
    loader: LoaderFn,
    args: LoaderArgs,
    hooks: RouteHooks,
) {
    tokio::spawn(async move {
        let load = run_loader(&request, route_match, &loader, args, &hooks, false).await;
        if request.abort.is_cancelled() {
            return;
        }
        match load.signal {
            None => request.emit(MatchEvent::Reloaded(load.matched)),
            Some(signal) => tracing::debug!("Background reload of {} ended with {}", load.matched.id, signal),
        }
    });
}

async fn run_loader(
    request: &LoadRequest,
    mut route_match: RouteMatch,
    loader: &LoaderFn,
    args: LoaderArgs,
    hooks: &RouteHooks,
    show_pending: bool,
) -> MatchLoad {
    route_match.fetching = FetchState::Loader;
    let sink = Arc::clone(&args.deferred);
    let start = || -> BoxFuture<'static, LoaderResult> {
        let load = loader(args);
        Box::pin(async move {
            let data = load.await?;
            let deferred = std::mem::take(&mut *sink.lock());
            Ok(LoaderOutput { data, deferred })
        })
    };
    let mut load = request.registry.run(&route_match.id, &request.abort, start);

    let result = if show_pending {
        let pending_ms = hooks.pending_ms.unwrap_or(request.config.default_pending_ms);
        let pending_min_ms = hooks.pending_min_ms.unwrap_or(request.config.default_pending_min_ms);

        tokio::select! {
            result = &mut load => result,
            _ = tokio::time::sleep(pending_ms) => {
                route_match.pending_visible = true;
                request.emit(MatchEvent::PendingVisible { match_id: route_match.id.clone() });
                let min_pending = tokio::time::sleep(pending_min_ms);
                let result = load.await;
                min_pending.await;
                result
            }
        }
    } else {
        load.await
    };

    route_match.fetching = FetchState::Idle;
    match result {
        Ok(output) => {
            let data = Shared::from(output.data);
            route_match.loader_data = Some(match &route_match.loader_data {
                Some(previous) => replace_equal_deep(previous, data),
                None => data,
            });
            route_match.deferred = output.deferred.into_iter().collect();
            route_match.deferred_errors.clear();
            watch_deferred(request, &route_match);
            route_match.apply_deferred();
            route_match.status = MatchStatus::Success;
            route_match.error = None;
            route_match.invalid = false;
            route_match.updated_at = Utc::now();
            settled(route_match)
        }
        Err(RouteSignal::Error(_)) if request.abort.is_cancelled() => {
            tracing::debug!("Ignoring loader error for {} after abort", route_match.id);
            settled(route_match)
        }
        Err(signal) => {
            let (signal, _) = settle_failure(&mut route_match, hooks, signal);
            let signal = match signal {
                RouteSignal::Error(_) => None,
                other => Some(other),
            };
            MatchLoad {
                matched: route_match,
                signal,
            }
        }
    }
}

/// Reports every change of the match's deferred fields
///
/// Receivers are created before returning, so nothing that settles after
/// the caller applies the current values goes unreported.
fn watch_deferred(request: &LoadRequest, route_match: &RouteMatch) {
    let Some(events) = &request.events else {
        return;
    };

    for value in route_match.deferred.values() {
        let events = Arc::clone(events);
        let match_id = route_match.id.clone();
        match value {
            DeferredValue::Resolved(_) => {}
            DeferredValue::Pending(handle) => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(error) = handle.wait().await {
                        tracing::debug!("Deferred field of {} failed: {}", match_id, error);
                    }
                    events(MatchEvent::DeferredSettled { match_id });
                });
            }
            DeferredValue::Streaming(handle) => {
                let mut receiver = handle.subscribe();
                tokio::spawn(async move {
                    while receiver.changed().await.is_ok() {
                        let done = receiver.borrow_and_update().is_done();
                        events(MatchEvent::DeferredSettled {
                            match_id: match_id.clone(),
                        });
                        if done {
                            break;
                        }
                    }
                });
            }
        }
    }
}
