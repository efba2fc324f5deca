//! Runtime route matches and their cache bookkeeping

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use waypoint_router::{replace_equal_deep, MatchError, NodeId, Params, ResolvedMatch, SearchMap, Shared};

use crate::deferred::{DeferredState, DeferredValue};
use crate::error::RouteSignal;

/// Lifecycle status of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    Pending,
    Success,
    Error,
    NotFound,
    Redirected,
}

/// Stage a match is currently fetching in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchState {
    #[default]
    Idle,
    BeforeLoad,
    Loader,
}

/// Why a match is being loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadCause {
    /// The route was not part of the previous committed chain
    Enter,
    /// The route stays in the chain across navigations
    Stay,
    Preload,
}

/// A route paired with the state loaded for one location
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatch {
    pub id: String,
    pub route_id: String,
    #[serde(skip)]
    pub node_id: NodeId,
    pub pathname: String,
    pub full_path: String,
    pub params: Shared,
    pub search: Shared,
    pub loader_deps: Value,
    pub status: MatchStatus,
    pub fetching: FetchState,
    /// Router context merged with every ancestor's route and before-load context
    pub context: Shared,
    pub loader_data: Option<Shared>,
    /// Parts of the loader data still arriving, keyed by the field they fill in
    #[serde(skip)]
    pub deferred: BTreeMap<String, DeferredValue<Value>>,
    /// Deferred fields that were rejected, with the reason
    pub deferred_errors: BTreeMap<String, String>,
    #[serde(skip)]
    pub error: Option<RouteSignal>,
    #[serde(skip)]
    pub validation_error: Option<MatchError>,
    pub updated_at: DateTime<Utc>,
    /// Forces the next load to re-run the loader
    pub invalid: bool,
    /// Loaded by a preload and never committed
    pub preload: bool,
    pub cause: LoadCause,
    /// The pending window elapsed while loading
    pub pending_visible: bool,
    /// Loader data came from a hydration channel; the first load skips the loader
    pub hydrated: bool,
}

impl RouteMatch {
    /// A fresh, never loaded match for a resolved route
    pub fn from_resolved(resolved: &ResolvedMatch, cause: LoadCause) -> Self {
        Self {
            id: resolved.id.clone(),
            route_id: resolved.route_id.clone(),
            node_id: resolved.node_id,
            pathname: resolved.pathname.clone(),
            full_path: resolved.full_path.clone(),
            params: Shared::from(serde_json::to_value(&resolved.params).unwrap_or_default()),
            search: Shared::from(Value::Object(resolved.search.clone())),
            loader_deps: resolved.loader_deps.clone(),
            status: MatchStatus::Pending,
            fetching: FetchState::Idle,
            context: Shared::empty_object(),
            loader_data: None,
            deferred: BTreeMap::new(),
            deferred_errors: BTreeMap::new(),
            error: None,
            validation_error: resolved.error().cloned(),
            updated_at: Utc::now(),
            invalid: false,
            preload: cause == LoadCause::Preload,
            cause,
            pending_visible: false,
            hydrated: false,
        }
    }

    /// Carries an earlier match with the same id over to a new resolution
    ///
    /// Loaded state survives; params and search are refreshed.
    pub fn reuse(previous: &RouteMatch, resolved: &ResolvedMatch, cause: LoadCause) -> Self {
        let fresh = Self::from_resolved(resolved, cause);
        let status = match previous.status {
            MatchStatus::Success => MatchStatus::Success,
            _ => MatchStatus::Pending,
        };
        Self {
            params: replace_equal_deep(&previous.params, fresh.params),
            search: replace_equal_deep(&previous.search, fresh.search),
            status,
            loader_data: previous.loader_data.clone(),
            deferred: previous.deferred.clone(),
            deferred_errors: previous.deferred_errors.clone(),
            context: previous.context.clone(),
            updated_at: previous.updated_at,
            invalid: previous.invalid,
            preload: previous.preload && cause == LoadCause::Preload,
            hydrated: previous.hydrated,
            error: None,
            ..fresh
        }
    }

    /// Time since the match last loaded
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.updated_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    pub fn is_success(&self) -> bool {
        self.status == MatchStatus::Success
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(RouteSignal::message)
    }

    /// Params as a plain map
    pub fn params_map(&self) -> Params {
        serde_json::from_value(self.params.to_value()).unwrap_or_default()
    }

    /// Search as a plain JSON object
    pub fn search_map(&self) -> SearchMap {
        match self.search.to_value() {
            Value::Object(map) => map,
            _ => SearchMap::new(),
        }
    }

    /// Loader data as an owned JSON value
    pub fn data(&self) -> Option<Value> {
        self.loader_data.as_ref().map(Shared::to_value)
    }

    /// True while a deferred field has not settled
    pub fn has_pending_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Writes every settled deferred field into the loader data
    ///
    /// Resolved values replace their key; a stream's key holds the chunks
    /// received so far and stays deferred until the stream is done. Loader
    /// data that is not an object becomes one. Returns true when anything
    /// changed.
    pub fn apply_deferred(&mut self) -> bool {
        if self.deferred.is_empty() {
            return false;
        }

        let mut data = match self.data() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let mut changed = false;
        let mut errors = Vec::new();

        self.deferred.retain(|key, value| match value {
            DeferredValue::Resolved(resolved) => {
                data.insert(key.clone(), resolved.clone());
                changed = true;
                false
            }
            DeferredValue::Pending(handle) => match handle.state() {
                DeferredState::Pending => true,
                DeferredState::Resolved(resolved) => {
                    data.insert(key.clone(), resolved);
                    changed = true;
                    false
                }
                DeferredState::Rejected(reason) => {
                    errors.push((key.clone(), reason));
                    false
                }
            },
            DeferredValue::Streaming(handle) => {
                let state = handle.state();
                let chunks = Value::Array(state.chunks);
                if data.get(key) != Some(&chunks) {
                    data.insert(key.clone(), chunks);
                    changed = true;
                }
                if let Some(reason) = state.error {
                    errors.push((key.clone(), reason));
                    return false;
                }
                !state.closed
            }
        });

        changed |= !errors.is_empty();
        self.deferred_errors.extend(errors);
        if changed {
            let next = Shared::from(Value::Object(data));
            self.loader_data = Some(match &self.loader_data {
                Some(previous) => replace_equal_deep(previous, next),
                None => next,
            });
        }
        changed
    }

    /// Reuses every unchanged part of `previous`
    pub fn share_with(mut self, previous: &RouteMatch) -> Self {
        self.params = replace_equal_deep(&previous.params, self.params);
        self.search = replace_equal_deep(&previous.search, self.search);
        self.context = replace_equal_deep(&previous.context, self.context);
        self.loader_data = match (&previous.loader_data, self.loader_data) {
            (Some(prev), Some(next)) => Some(replace_equal_deep(prev, next)),
            (_, next) => next,
        };
        self
    }
}

/// Matches that can be dropped from the cache
///
/// Errored matches always go; others once they outlive their gc time.
pub fn is_expired(route_match: &RouteMatch, gc_time: Duration) -> bool {
    route_match.status == MatchStatus::Error || route_match.age() > gc_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waypoint_router::{parse_href, resolve, ResolveOptions, RouteDef, RouteTree};

    fn resolved(href: &str) -> ResolvedMatch {
        let tree = RouteTree::build(RouteDef::root().with_child(RouteDef::new("posts/$id"))).unwrap();
        resolve(&tree, &parse_href(href, None), &ResolveOptions::default())
            .leaf()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_fresh_match_is_pending() {
        let m = RouteMatch::from_resolved(&resolved("/posts/1"), LoadCause::Enter);
        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.params.to_value(), json!({"id": "1"}));
        assert!(!m.preload);
    }

    #[test]
    fn test_reuse_keeps_loaded_state_and_shares_params() {
        let mut previous = RouteMatch::from_resolved(&resolved("/posts/1"), LoadCause::Enter);
        previous.status = MatchStatus::Success;
        previous.loader_data = Some(Shared::from(json!({"title": "a"})));

        let next = RouteMatch::reuse(&previous, &resolved("/posts/1"), LoadCause::Stay);
        assert_eq!(next.status, MatchStatus::Success);
        assert!(next.params.ptr_eq(&previous.params));
        assert_eq!(next.data(), Some(json!({"title": "a"})));
        assert_eq!(next.cause, LoadCause::Stay);
    }

    #[test]
    fn test_apply_deferred_fills_settled_fields() {
        let mut m = RouteMatch::from_resolved(&resolved("/posts/1"), LoadCause::Enter);
        m.loader_data = Some(Shared::from(json!({"title": "a"})));

        let (comments, comments_handle) = DeferredValue::pending();
        let (views, views_handle) = DeferredValue::streaming();
        m.deferred.insert("comments".into(), comments);
        m.deferred.insert("views".into(), views);

        views_handle.push_chunk(json!(1));
        assert!(m.apply_deferred());
        assert_eq!(m.data(), Some(json!({"title": "a", "views": [1]})));
        assert!(!m.apply_deferred());
        assert!(m.has_pending_deferred());

        comments_handle.resolve(json!(["first"]));
        views_handle.push_chunk(json!(2));
        views_handle.close();
        assert!(m.apply_deferred());
        assert_eq!(
            m.data(),
            Some(json!({"title": "a", "comments": ["first"], "views": [1, 2]}))
        );
        assert!(!m.has_pending_deferred());
    }

    #[test]
    fn test_apply_deferred_records_rejection() {
        let mut m = RouteMatch::from_resolved(&resolved("/posts/1"), LoadCause::Enter);
        let (comments, handle) = DeferredValue::pending();
        m.deferred.insert("comments".into(), comments);

        handle.reject("backend down");
        assert!(m.apply_deferred());
        assert_eq!(m.deferred_errors.get("comments").map(String::as_str), Some("backend down"));
        assert!(!m.has_pending_deferred());
    }

    #[test]
    fn test_errored_match_expires_immediately() {
        let mut m = RouteMatch::from_resolved(&resolved("/posts/1"), LoadCause::Enter);
        assert!(!is_expired(&m, Duration::from_secs(60)));
        m.status = MatchStatus::Error;
        assert!(is_expired(&m, Duration::from_secs(60)));
    }
}
