//! Navigation state machine
//!
//! A [`Router`] owns the route tree, a [`History`] and an observable
//! [`RouterState`]. Every load resolves the current history location, runs
//! the load pipeline and commits the result atomically:
//!
//! ```text
//! Idle --load--> Pending --loaders settle--> Committing --> Idle
//!                   |
//!                   +--redirect--> Pending (next target)
//! ```
//!
//! A newer load supersedes an older one: the older run's cancellation token
//! is cancelled and its result is dropped before it touches state.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use waypoint_nav::{MemoryHistory, NavigateOptions, RouteDefExt, RouteHooks, Router, RouterConfig};
//! use waypoint_router::{RouteDef, RouteTree};
//!
//! # async fn run() -> Result<(), waypoint_nav::NavError> {
//! let tree = RouteTree::build(RouteDef::root().with_child(
//!     RouteDef::new("posts/$postId").with_hooks(RouteHooks::new().loader(|args| async move {
//!         Ok(json!({ "id": args.params["postId"] }))
//!     })),
//! ))
//! .unwrap();
//!
//! let router = Router::new(tree, Arc::new(MemoryHistory::new("/")), RouterConfig::default());
//! router.load().await?;
//! router.navigate(NavigateOptions::to("/posts/1")).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use waypoint_router::location::{strip_base_path, with_base_path};
use waypoint_router::{
    build_location, match_pathname, parse_href, resolve, BuildLocationOptions, Params, ParsedLocation, Resolution,
    RouteNode, RoutePattern, RouteTree, SearchMap, SearchUpdate,
};

use crate::config::RouterConfig;
use crate::error::{NavError, Redirect};
use crate::history::{History, HistoryAction, HistoryLocation};
use crate::hooks::RouteHooks;
use crate::hydration::{HydrationChannel, HydrationEntry};
use crate::matches::{is_expired, LoadCause, MatchStatus, RouteMatch};
use crate::pipeline::{load_matches, LoadOutcome, LoadRequest, LoaderRegistry, MatchEvent, MatchEventHandler};
use crate::store::{Store, SubscriptionId};
use crate::transformer::{JsonTransformer, Transformer};

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouterStatus {
    Idle,
    Pending,
    Committing,
}

/// Observable router snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterState {
    pub status: RouterStatus,
    pub is_loading: bool,
    /// Location being loaded, or the committed one when idle
    pub location: ParsedLocation,
    /// Location of the committed matches
    pub resolved_location: Option<ParsedLocation>,
    pub matches: Vec<RouteMatch>,
    pub pending_matches: Vec<RouteMatch>,
    pub cached_matches: Vec<RouteMatch>,
    /// 200, 404 when a boundary rendered not-found, 500 on errors
    pub status_code: u16,
    /// Redirect that led to the committed location
    pub redirect: Option<Redirect>,
}

impl RouterState {
    fn new(location: ParsedLocation) -> Self {
        Self {
            status: RouterStatus::Idle,
            is_loading: false,
            location,
            resolved_location: None,
            matches: Vec::new(),
            pending_matches: Vec::new(),
            cached_matches: Vec::new(),
            status_code: 200,
            redirect: None,
        }
    }

    /// Committed match for a route id
    pub fn get_match(&self, route_id: &str) -> Option<&RouteMatch> {
        self.matches.iter().find(|m| m.route_id == route_id)
    }

    /// Deepest committed match
    pub fn leaf(&self) -> Option<&RouteMatch> {
        self.matches.last()
    }

    /// Looks a match up by id across active, pending and cached matches
    pub fn find_match(&self, match_id: &str) -> Option<&RouteMatch> {
        self.matches
            .iter()
            .chain(self.pending_matches.iter())
            .chain(self.cached_matches.iter())
            .find(|m| m.id == match_id)
    }
}

// ============================================================================
// Options
// ============================================================================

/// A navigation request
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    pub location: BuildLocationOptions,
    /// Replace the current history entry instead of pushing
    pub replace: bool,
}

impl NavigateOptions {
    /// Navigates to a path pattern, absolute or relative to the current location
    pub fn to(to: impl Into<String>) -> Self {
        Self {
            location: BuildLocationOptions::to(to),
            replace: false,
        }
    }

    /// Navigates to a concrete href, keeping its query and hash
    pub fn href(href: &str) -> Self {
        let parsed = parse_href(href, None);
        let mut location =
            BuildLocationOptions::to(parsed.pathname.clone()).with_search(SearchUpdate::Replace(parsed.search_map()));
        if !parsed.hash.is_empty() {
            location = location.with_hash(parsed.hash);
        }
        Self {
            location,
            replace: false,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.location = self.location.with_params(params);
        self
    }

    pub fn with_search(mut self, search: SearchUpdate) -> Self {
        self.location = self.location.with_search(search);
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.location = self.location.with_hash(hash);
        self
    }

    pub fn with_state(mut self, state: Map<String, Value>) -> Self {
        self.location = self.location.with_state(state);
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }
}

impl From<&Redirect> for NavigateOptions {
    fn from(redirect: &Redirect) -> Self {
        let mut options = NavigateOptions::href(&redirect.to);
        if let Some(params) = &redirect.params {
            options = options.with_params(params.clone());
        }
        if let Some(search) = &redirect.search {
            options = options.with_search(SearchUpdate::Replace(search.clone()));
        }
        if let Some(hash) = &redirect.hash {
            options = options.with_hash(hash.clone());
        }
        options.replace = redirect.replace;
        options
    }
}

/// Options of [`Router::match_route`]
#[derive(Debug, Clone, Default)]
pub struct MatchRouteOptions {
    /// Match against the location being loaded instead of the committed one
    pub pending: bool,
    pub case_sensitive: Option<bool>,
    /// Accept locations below the pattern
    pub fuzzy: bool,
    /// Every key must be present in the location's search with an equal value
    pub include_search: Option<SearchMap>,
}

/// Result of one resolution + pipeline pass
enum Step {
    Committed,
    Superseded,
    Redirect(Redirect),
}

// ============================================================================
// Router
// ============================================================================

struct RouterInner {
    tree: Arc<RouteTree>,
    history: Arc<dyn History>,
    config: Arc<RouterConfig>,
    store: Store<RouterState>,
    registry: LoaderRegistry,
    context: RwLock<Value>,
    transformer: RwLock<Arc<dyn Transformer>>,
    generation: AtomicU64,
    current_abort: Mutex<Option<CancellationToken>>,
    history_subscription: Mutex<Option<SubscriptionId>>,
}

/// Client-side router; cheap to clone
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new(tree: RouteTree, history: Arc<dyn History>, config: RouterConfig) -> Self {
        let location = parse_history_location(&history.location(), &config.base_path);
        tracing::debug!("Router created at {} with {} routes", location.href, tree.len());

        Self {
            inner: Arc::new(RouterInner {
                tree: Arc::new(tree),
                history,
                config: Arc::new(config),
                store: Store::new(RouterState::new(location)),
                registry: LoaderRegistry::new(),
                context: RwLock::new(Value::Object(Map::new())),
                transformer: RwLock::new(Arc::new(JsonTransformer)),
                generation: AtomicU64::new(0),
                current_abort: Mutex::new(None),
                history_subscription: Mutex::new(None),
            }),
        }
    }

    /// Sets the router context every route context starts from
    pub fn with_context(self, context: Value) -> Self {
        self.set_context(context);
        self
    }

    pub fn set_context(&self, context: Value) {
        *self.inner.context.write() = context;
    }

    pub fn with_transformer(self, transformer: Arc<dyn Transformer>) -> Self {
        *self.inner.transformer.write() = transformer;
        self
    }

    pub fn tree(&self) -> &RouteTree {
        &self.inner.tree
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn history(&self) -> &Arc<dyn History> {
        &self.inner.history
    }

    /// Current snapshot
    pub fn state(&self) -> RouterState {
        self.inner.store.get()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RouterState) + Send + Sync + 'static,
    {
        self.inner.store.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.store.unsubscribe(id)
    }

    /// True while a loader for `match_id` is running
    pub fn is_fetching(&self, match_id: &str) -> bool {
        self.inner.registry.is_loading(match_id)
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    /// Starts loading on back/forward traversals
    ///
    /// Loads are spawned on the current tokio runtime.
    pub fn mount(&self) {
        let mut subscription = self.inner.history_subscription.lock();
        if subscription.is_some() {
            return;
        }

        let weak: Weak<RouterInner> = Arc::downgrade(&self.inner);
        let id = self
            .inner
            .history
            .subscribe(Arc::new(move |location: &HistoryLocation, action: HistoryAction| {
                if !action.is_pop() {
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let router = Router { inner };
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        tracing::debug!("History {:?} to {}", action, location.href);
                        handle.spawn(async move {
                            if let Err(e) = router.load().await {
                                tracing::warn!("Load after history traversal failed: {}", e);
                            }
                        });
                    }
                    Err(_) => tracing::warn!("History changed outside a tokio runtime; call Router::load"),
                }
            }));
        *subscription = Some(id);
    }

    pub fn unmount(&self) {
        if let Some(id) = self.inner.history_subscription.lock().take() {
            self.inner.history.unsubscribe(id);
        }
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Resolves and loads the current history location, following redirects
    pub async fn load(&self) -> Result<(), NavError> {
        self.load_with(false).await
    }

    /// Builds a location relative to the current one
    pub fn build_location(&self, options: BuildLocationOptions) -> Result<ParsedLocation, NavError> {
        let from = self.inner.store.read(|state| state.location.clone());
        Ok(build_location(
            &self.inner.tree,
            &from,
            options,
            &self.inner.config.resolve_options(),
        )?)
    }

    /// Pushes (or replaces) a history entry and loads it
    pub async fn navigate(&self, options: NavigateOptions) -> Result<(), NavError> {
        let location = self.build_location(options.location)?;
        tracing::debug!("Navigating to {}", location.href);
        self.inner.write_history(&location, options.replace);
        self.load().await
    }

    /// Loads a location into the cache without committing it
    ///
    /// Returns the preloaded matches. Redirects are followed; not-found
    /// boundaries are not marked.
    pub async fn preload_route(&self, options: NavigateOptions) -> Result<Vec<RouteMatch>, NavError> {
        let mut location = self.build_location(options.location)?;
        let mut redirects = 0;

        loop {
            let resolution = self.inner.resolve(&location);
            let matches = self.inner.store.read(|state| prepare_matches(&resolution, state, true));
            let events = self.inner.event_handler(None);
            let request = self.inner.request(location.clone(), true, false, CancellationToken::new(), Some(events));

            match load_matches(request, matches, None).await {
                LoadOutcome::Loaded(matches) => {
                    self.inner.store.update(|state| {
                        for loaded in matches.iter().filter(|m| m.is_success()) {
                            if state.matches.iter().any(|m| m.id == loaded.id) {
                                continue;
                            }
                            // a background reload may already have refreshed it
                            if state
                                .cached_matches
                                .iter()
                                .any(|m| m.id == loaded.id && m.updated_at > loaded.updated_at)
                            {
                                continue;
                            }
                            state.cached_matches.retain(|m| m.id != loaded.id);
                            state.cached_matches.push(loaded.clone());
                        }
                    });
                    tracing::debug!("Preloaded {} ({} matches)", location.href, matches.len());
                    return Ok(matches);
                }
                LoadOutcome::Redirect(redirect) => {
                    redirects += 1;
                    if redirects > self.inner.config.max_redirects {
                        return Err(NavError::TooManyRedirects {
                            limit: self.inner.config.max_redirects,
                            last: redirect.to,
                        });
                    }
                    location = self.build_location(NavigateOptions::from(&redirect).location)?;
                }
            }
        }
    }

    /// Marks every match invalid and reloads, waiting for fresh data
    pub async fn invalidate(&self) -> Result<(), NavError> {
        self.invalidate_where(|_| true).await
    }

    /// Marks the matches accepted by `filter` invalid and reloads
    pub async fn invalidate_where<F>(&self, filter: F) -> Result<(), NavError>
    where
        F: Fn(&RouteMatch) -> bool,
    {
        self.inner.store.update(|state| {
            for m in state
                .matches
                .iter_mut()
                .chain(state.pending_matches.iter_mut())
                .chain(state.cached_matches.iter_mut())
            {
                if !filter(m) {
                    continue;
                }
                m.invalid = true;
                if m.status == MatchStatus::Error {
                    m.status = MatchStatus::Pending;
                    m.error = None;
                }
            }
        });
        self.load_with(true).await
    }

    /// Matches a path pattern against the committed (or pending) location
    pub fn match_route(&self, pattern: &str, options: MatchRouteOptions) -> Option<Params> {
        let location = self.inner.store.read(|state| {
            if options.pending || state.resolved_location.is_none() {
                state.location.clone()
            } else {
                state.resolved_location.clone().unwrap_or_else(|| state.location.clone())
            }
        });

        let match_options = waypoint_router::MatchOptions::default()
            .case_sensitive(options.case_sensitive.unwrap_or(self.inner.config.case_sensitive))
            .fuzzy(options.fuzzy);
        let params = match_pathname(&RoutePattern::compile(pattern), &location.pathname, match_options)?;

        if let Some(required) = &options.include_search {
            let search = location.search_map();
            if required.iter().any(|(key, value)| search.get(key) != Some(value)) {
                return None;
            }
        }
        Some(params)
    }

    // ------------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------------

    pub fn clear_cache(&self) {
        self.inner.store.update(|state| state.cached_matches.clear());
    }

    /// Drops cached matches past their gc time
    pub fn clear_expired_cache(&self) {
        let inner = &self.inner;
        inner.store.update(|state| inner.sweep(state));
    }

    // ------------------------------------------------------------------------
    // Hydration
    // ------------------------------------------------------------------------

    /// Serializes the loader data of every successful committed match
    pub fn dehydrate(&self) -> Result<Vec<HydrationEntry>, NavError> {
        let transformer = self.inner.transformer.read().clone();
        self.inner.store.read(|state| {
            state
                .matches
                .iter()
                .filter(|m| m.is_success())
                .filter_map(|m| m.data().map(|data| (m.id.clone(), data)))
                .map(|(match_id, data)| -> Result<HydrationEntry, NavError> {
                    let payload = transformer.stringify(&data).map_err(NavError::Transform)?;
                    Ok(HydrationEntry { match_id, payload })
                })
                .collect()
        })
    }

    /// Dehydrates into a channel; returns the number of entries sent
    pub fn dehydrate_into(&self, channel: &HydrationChannel) -> Result<usize, NavError> {
        let entries = self.dehydrate()?;
        let count = entries.len();
        for entry in entries {
            channel.enqueue(entry)?;
        }
        Ok(count)
    }

    /// Seeds the cache from a hydration channel so the next load skips those loaders
    ///
    /// Returns the number of matches hydrated.
    pub fn hydrate(&self, channel: &HydrationChannel) -> Result<usize, NavError> {
        let entries = channel.drain()?;
        let transformer = self.inner.transformer.read().clone();
        let location = self.inner.store.read(|state| state.location.clone());
        let resolution = self.inner.resolve(&location);

        let mut hydrated = Vec::new();
        for entry in entries {
            let Some(resolved) = resolution.matches.iter().find(|m| m.id == entry.match_id) else {
                tracing::warn!("Dropping hydration entry for unknown match {}", entry.match_id);
                continue;
            };
            let data = transformer.parse(&entry.payload).map_err(NavError::Transform)?;
            let mut route_match = RouteMatch::from_resolved(resolved, LoadCause::Enter);
            route_match.loader_data = Some(data.into());
            route_match.status = MatchStatus::Success;
            route_match.hydrated = true;
            route_match.updated_at = Utc::now();
            hydrated.push(route_match);
        }

        let count = hydrated.len();
        self.inner.store.update(|state| {
            for route_match in hydrated {
                state.cached_matches.retain(|m| m.id != route_match.id);
                state.cached_matches.push(route_match);
            }
        });
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn load_with(&self, sync: bool) -> Result<(), NavError> {
        let max_redirects = self.inner.config.max_redirects;
        let mut redirected_by: Option<Redirect> = None;
        let mut redirects = 0;

        loop {
            let location = parse_history_location(&self.inner.history.location(), &self.inner.config.base_path);
            match self.inner.load_location(location, sync, redirected_by.clone()).await {
                Step::Committed | Step::Superseded => return Ok(()),
                Step::Redirect(redirect) => {
                    redirects += 1;
                    if redirects > max_redirects {
                        tracing::warn!("Giving up after {} redirects (last {})", max_redirects, redirect.to);
                        self.inner.store.update(|state| {
                            state.status = RouterStatus::Idle;
                            state.is_loading = false;
                            state.pending_matches.clear();
                        });
                        return Err(NavError::TooManyRedirects {
                            limit: max_redirects,
                            last: redirect.to,
                        });
                    }

                    tracing::debug!("Redirecting to {}", redirect.to);
                    let next = self.build_location(NavigateOptions::from(&redirect).location)?;
                    self.inner.write_history(&next, redirect.replace);
                    redirected_by = Some(redirect);
                }
            }
        }
    }
}

impl RouterInner {
    fn resolve(&self, location: &ParsedLocation) -> Resolution {
        resolve(&self.tree, location, &self.config.resolve_options())
    }

    fn request(
        &self,
        location: ParsedLocation,
        preload: bool,
        sync: bool,
        abort: CancellationToken,
        events: Option<MatchEventHandler>,
    ) -> LoadRequest {
        LoadRequest {
            tree: Arc::clone(&self.tree),
            config: Arc::clone(&self.config),
            registry: self.registry.clone(),
            router_context: self.context.read().clone(),
            location,
            preload,
            sync,
            abort,
            events,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn write_history(&self, location: &ParsedLocation, replace: bool) {
        let href = history_href(location, &self.config.base_path);
        if replace {
            self.history.replace(&href, location.state.clone());
        } else {
            self.history.push(&href, location.state.clone());
        }
    }

    async fn load_location(self: &Arc<Self>, location: ParsedLocation, sync: bool, redirected_by: Option<Redirect>) -> Step {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let abort = CancellationToken::new();
        if let Some(previous) = self.current_abort.lock().replace(abort.clone()) {
            previous.cancel();
        }

        let resolution = self.resolve(&location);
        let pending = self.store.read(|state| prepare_matches(&resolution, state, false));
        tracing::debug!("Loading {} ({} matches)", location.href, pending.len());

        self.store.try_update(|state| {
            if !self.is_current(generation) {
                return false;
            }
            state.status = RouterStatus::Pending;
            state.is_loading = true;
            state.location = location.clone();
            state.pending_matches = pending.clone();
            true
        });

        let events = self.event_handler(Some(generation));
        let request = self.request(location.clone(), false, sync, abort.clone(), Some(events));
        let outcome = load_matches(request, pending, resolution.not_found).await;

        if abort.is_cancelled() || !self.is_current(generation) {
            tracing::debug!("Load of {} superseded", location.href);
            return Step::Superseded;
        }

        match outcome {
            LoadOutcome::Redirect(redirect) => {
                self.store.try_update(|state| {
                    if !self.is_current(generation) {
                        return false;
                    }
                    state.redirect = Some(redirect.clone());
                    state.status_code = redirect.status_code;
                    true
                });
                Step::Redirect(redirect)
            }
            LoadOutcome::Loaded(matches) => {
                if self.commit(generation, location, matches, redirected_by) {
                    Step::Committed
                } else {
                    Step::Superseded
                }
            }
        }
    }

    fn commit(
        &self,
        generation: u64,
        location: ParsedLocation,
        matches: Vec<RouteMatch>,
        redirected_by: Option<Redirect>,
    ) -> bool {
        let committing = self.store.try_update(|state| {
            if !self.is_current(generation) {
                return false;
            }
            state.status = RouterStatus::Committing;
            state.pending_matches = matches.clone();
            true
        });
        if !committing {
            return false;
        }

        self.store.try_update(|state| {
            if !self.is_current(generation) {
                return false;
            }

            let matches: Vec<RouteMatch> = matches
                .into_iter()
                .map(|next| {
                    let mut next = match state.matches.iter().find(|m| m.id == next.id) {
                        Some(previous) => next.share_with(previous),
                        None => next,
                    };
                    next.apply_deferred();
                    next.preload = false;
                    next.pending_visible = false;
                    next
                })
                .collect();

            let exiting: Vec<RouteMatch> = state
                .matches
                .drain(..)
                .filter(|m| !matches.iter().any(|next| next.id == m.id))
                .collect();
            state.cached_matches.retain(|cached| !matches.iter().any(|m| m.id == cached.id));
            for route_match in exiting {
                state.cached_matches.retain(|cached| cached.id != route_match.id);
                state.cached_matches.push(route_match);
            }
            self.sweep(state);

            state.status_code = if matches.iter().any(|m| m.status == MatchStatus::NotFound) {
                404
            } else if matches.iter().any(|m| m.status == MatchStatus::Error) {
                500
            } else {
                200
            };
            tracing::info!(
                "Committed {} ({} matches, status {})",
                location.href,
                matches.len(),
                state.status_code
            );

            state.resolved_location = Some(location.clone());
            state.location = location;
            state.matches = matches;
            state.pending_matches.clear();
            state.redirect = redirected_by;
            state.status = RouterStatus::Idle;
            state.is_loading = false;
            true
        })
    }

    /// Drops expired cached matches
    fn sweep(&self, state: &mut RouterState) {
        let before = state.cached_matches.len();
        state
            .cached_matches
            .retain(|m| !is_expired(m, self.gc_time(m)));
        let dropped = before - state.cached_matches.len();
        if dropped > 0 {
            tracing::debug!("Evicted {} cached matches", dropped);
        }
    }

    fn gc_time(&self, route_match: &RouteMatch) -> Duration {
        let hooks = self
            .tree
            .node(route_match.node_id)
            .and_then(RouteNode::extension::<RouteHooks>);
        match hooks.and_then(|hooks| hooks.gc_time) {
            Some(gc_time) => gc_time,
            None if route_match.preload => self.config.default_preload_gc_time,
            None => self.config.default_gc_time,
        }
    }

    /// Applies pipeline events to the store
    ///
    /// Events tied to a navigation carry its generation and are dropped once
    /// it is superseded. Preloads pass `None`: only their reloads and
    /// deferred fields reach the store.
    fn event_handler(self: &Arc<Self>, generation: Option<u64>) -> MatchEventHandler {
        let weak = Arc::downgrade(self);
        Arc::new(move |event: MatchEvent| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let current = generation.is_some_and(|generation| inner.is_current(generation));
            match event {
                MatchEvent::PendingVisible { match_id } => {
                    inner.store.try_update(|state| {
                        if !current {
                            return false;
                        }
                        match state.pending_matches.iter_mut().find(|m| m.id == match_id) {
                            Some(m) => {
                                m.pending_visible = true;
                                true
                            }
                            None => false,
                        }
                    });
                }
                MatchEvent::Settled(settled) => {
                    inner.store.try_update(|state| {
                        if !current {
                            return false;
                        }
                        match state.pending_matches.iter_mut().find(|m| m.id == settled.id) {
                            Some(m) => {
                                let mut next = settled;
                                next.pending_visible |= m.pending_visible;
                                next.apply_deferred();
                                *m = next;
                                true
                            }
                            None => false,
                        }
                    });
                }
                MatchEvent::Reloaded(reloaded) => {
                    inner.store.try_update(|state| {
                        let mut applied = false;
                        for m in state
                            .matches
                            .iter_mut()
                            .chain(state.cached_matches.iter_mut())
                            .filter(|m| m.id == reloaded.id)
                        {
                            let mut next = reloaded.clone().share_with(m);
                            next.preload = m.preload;
                            next.apply_deferred();
                            *m = next;
                            applied = true;
                        }
                        applied
                    });
                }
                MatchEvent::DeferredSettled { match_id } => {
                    inner.store.try_update(|state| {
                        let mut changed = false;
                        for m in state
                            .matches
                            .iter_mut()
                            .chain(state.pending_matches.iter_mut())
                            .chain(state.cached_matches.iter_mut())
                            .filter(|m| m.id == match_id)
                        {
                            changed |= m.apply_deferred();
                        }
                        changed
                    });
                }
            }
        })
    }
}

/// Builds the pending matches for a resolution, reusing known matches by id
fn prepare_matches(resolution: &Resolution, state: &RouterState, preload: bool) -> Vec<RouteMatch> {
    resolution
        .matches
        .iter()
        .map(|resolved| {
            let cause = if preload {
                LoadCause::Preload
            } else if state.matches.iter().any(|m| m.route_id == resolved.route_id) {
                LoadCause::Stay
            } else {
                LoadCause::Enter
            };
            let known = state
                .matches
                .iter()
                .chain(state.cached_matches.iter())
                .find(|m| m.id == resolved.id);
            match known {
                Some(previous) => RouteMatch::reuse(previous, resolved, cause),
                None => RouteMatch::from_resolved(resolved, cause),
            }
        })
        .collect()
}

/// Parses a history entry, stripping the base path
fn parse_history_location(entry: &HistoryLocation, base_path: &str) -> ParsedLocation {
    let mut location = parse_href(&entry.href, Some(entry.state.clone()));
    let pathname = strip_base_path(&location.pathname, base_path).to_string();
    if pathname != location.pathname {
        location.href = join_href(&pathname, &location.search_str, &location.hash);
        location.pathname = pathname;
    }
    location
}

/// The href written to history, base path included
fn history_href(location: &ParsedLocation, base_path: &str) -> String {
    join_href(&with_base_path(&location.pathname, base_path), &location.search_str, &location.hash)
}

fn join_href(pathname: &str, search_str: &str, hash: &str) -> String {
    if hash.is_empty() {
        format!("{pathname}{search_str}")
    } else {
        format!("{pathname}{search_str}#{hash}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use waypoint_router::RouteDef;

    fn router(base_path: &str, href: &str) -> Router {
        let tree = RouteTree::build(RouteDef::root().with_children(vec![
            RouteDef::new("/"),
            RouteDef::new("posts/$postId"),
        ]))
        .unwrap();
        let config = RouterConfig {
            base_path: base_path.to_string(),
            ..Default::default()
        };
        Router::new(tree, Arc::new(MemoryHistory::new(href)), config)
    }

    #[test]
    fn test_base_path_is_stripped_and_restored() {
        let router = router("/app", "/app/posts/1?x=1#top");
        let location = router.state().location;
        assert_eq!(location.pathname, "/posts/1");
        assert_eq!(location.href, "/posts/1?x=1#top");
        assert_eq!(history_href(&location, "/app"), "/app/posts/1?x=1#top");
    }

    #[test]
    fn test_match_route_before_first_load() {
        let router = router("/", "/posts/9");
        let params = router.match_route("/posts/$postId", MatchRouteOptions::default()).unwrap();
        assert_eq!(params["postId"], "9");
        assert!(router.match_route("/about", MatchRouteOptions::default()).is_none());
    }

    #[test]
    fn test_navigate_options_from_redirect() {
        let redirect = Redirect::to("/login?next=%2Fposts").push();
        let options = NavigateOptions::from(&redirect);
        assert!(!options.replace);
        assert_eq!(options.location.to.as_deref(), Some("/login"));
        assert!(matches!(options.location.search, SearchUpdate::Replace(ref s) if s["next"] == "/posts"));
    }
}
