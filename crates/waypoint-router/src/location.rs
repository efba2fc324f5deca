//! Parsed locations and location building
//!
//! A [`ParsedLocation`] is the engine's view of a URL: pathname, decoded
//! search, hash and the history state entry it came with. Locations are
//! built from navigation intents with [`build_location`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::PathError;
use crate::matcher::{interpolate_path, InterpolateOptions, Params};
use crate::path::{resolve_path, trim_path_right};
use crate::resolver::{find_route, ResolveOptions};
use crate::route::RoutePattern;
use crate::search::{apply_middlewares, parse_search, stringify_search, SearchMap};
use crate::sharing::{replace_equal_deep, Shared};
use crate::tree::RouteTree;

/// History entry state attached to a location
pub type HistoryState = Map<String, Value>;

/// State key holding the entry's unique key
pub const STATE_KEY: &str = "key";

/// A URL as seen by the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLocation {
    pub href: String,
    pub pathname: String,
    /// Raw query string including the leading `?`, or empty
    pub search_str: String,
    pub search: Shared,
    /// Fragment without the leading `#`
    pub hash: String,
    pub state: HistoryState,
    /// Unique key of the history entry
    pub key: String,
}

impl ParsedLocation {
    /// Decoded search as a plain JSON object
    pub fn search_map(&self) -> SearchMap {
        match self.search.to_value() {
            Value::Object(map) => map,
            _ => SearchMap::new(),
        }
    }

    /// Same URL, ignoring state and key
    pub fn same_href(&self, other: &ParsedLocation) -> bool {
        self.href == other.href
    }
}

/// Generates a short random history entry key
pub fn create_key() -> String {
    let mut key = Uuid::new_v4().simple().to_string();
    key.truncate(8);
    key
}

/// Splits an href into pathname, search and hash
///
/// A state without a `key` gets a fresh one.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use waypoint_router::parse_href;
///
/// let location = parse_href("/posts?page=2#comments", None);
/// assert_eq!(location.pathname, "/posts");
/// assert_eq!(location.search_str, "?page=2");
/// assert_eq!(location.search.get("page").unwrap().to_value(), json!(2));
/// assert_eq!(location.hash, "comments");
/// assert_eq!(location.key.len(), 8);
/// ```
pub fn parse_href(href: &str, state: Option<HistoryState>) -> ParsedLocation {
    let (rest, hash) = href.split_once('#').unwrap_or((href, ""));
    let (pathname, search_str) = match rest.find('?') {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };
    let pathname = if pathname.is_empty() { "/" } else { pathname };
    let search_str = if search_str == "?" { "" } else { search_str };

    let mut state = state.unwrap_or_default();
    let key = match state.get(STATE_KEY).and_then(Value::as_str) {
        Some(key) => key.to_string(),
        None => {
            let key = create_key();
            state.insert(STATE_KEY.to_string(), Value::String(key.clone()));
            key
        }
    };

    ParsedLocation {
        href: href.to_string(),
        pathname: pathname.to_string(),
        search_str: search_str.to_string(),
        search: Shared::from(Value::Object(parse_search(search_str))),
        hash: hash.to_string(),
        state,
        key,
    }
}

/// Strips a base path from a pathname, leaving `/` for the base itself
pub fn strip_base_path<'a>(pathname: &'a str, base_path: &str) -> &'a str {
    let base = trim_path_right(base_path);
    if base == "/" || base.is_empty() {
        return pathname;
    }
    match pathname.strip_prefix(base) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => pathname,
    }
}

/// Prepends a base path to a pathname
pub fn with_base_path(pathname: &str, base_path: &str) -> String {
    let base = trim_path_right(base_path);
    if base == "/" || base.is_empty() {
        pathname.to_string()
    } else if pathname == "/" {
        base.to_string()
    } else {
        format!("{base}{pathname}")
    }
}

// ============================================================================
// Building
// ============================================================================

/// How the next params relate to the current ones
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ParamsUpdate {
    #[default]
    Keep,
    Replace(Params),
    Merge(Params),
}

/// How the next search relates to the current one
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchUpdate {
    Keep,
    /// Start from an empty search
    #[default]
    Clear,
    Replace(SearchMap),
    Merge(SearchMap),
}

/// A navigation intent
#[derive(Debug, Clone, Default)]
pub struct BuildLocationOptions {
    /// Destination, absolute or relative to the current pathname (`.` when unset)
    pub to: Option<String>,
    pub params: ParamsUpdate,
    pub search: SearchUpdate,
    /// `None` drops the hash
    pub hash: Option<String>,
    pub state: Option<HistoryState>,
}

impl BuildLocationOptions {
    pub fn to(to: impl Into<String>) -> Self {
        Self {
            to: Some(to.into()),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = ParamsUpdate::Replace(params);
        self
    }

    pub fn with_search(mut self, search: SearchUpdate) -> Self {
        self.search = search;
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_state(mut self, state: HistoryState) -> Self {
        self.state = Some(state);
        self
    }
}

/// Builds the next location from the current one and a navigation intent
///
/// The destination route's search middleware runs root -> leaf, and the
/// resulting search is structurally shared with `from.search`.
///
/// # Examples
///
/// ```
/// use waypoint_router::{build_location, parse_href, BuildLocationOptions, Params, ResolveOptions, RouteDef, RouteTree};
///
/// let tree = RouteTree::build(RouteDef::root().with_child(RouteDef::new("posts/$postId"))).unwrap();
/// let from = parse_href("/", None);
///
/// let mut params = Params::new();
/// params.insert("postId".into(), "a b".into());
/// let next = build_location(
///     &tree,
///     &from,
///     BuildLocationOptions::to("/posts/$postId").with_params(params),
///     &ResolveOptions::default(),
/// )
/// .unwrap();
/// assert_eq!(next.href, "/posts/a%20b");
/// ```
pub fn build_location(
    tree: &RouteTree,
    from: &ParsedLocation,
    options: BuildLocationOptions,
    resolve_options: &ResolveOptions,
) -> Result<ParsedLocation, PathError> {
    let to = options.to.as_deref().unwrap_or(".");
    let destination = resolve_path(&from.pathname, to, resolve_options.trailing_slash);

    let current_params = || {
        find_route(tree, &from.pathname, resolve_options)
            .map(|(_, params)| params)
            .unwrap_or_default()
    };
    let params = match options.params {
        ParamsUpdate::Keep => current_params(),
        ParamsUpdate::Replace(params) => params,
        ParamsUpdate::Merge(params) => {
            let mut merged = current_params();
            merged.extend(params);
            merged
        }
    };

    let pathname = interpolate_path(&RoutePattern::compile(&destination), &params, &InterpolateOptions::default())?.path;

    let current_search = from.search_map();
    let next_search = match options.search {
        SearchUpdate::Keep => current_search.clone(),
        SearchUpdate::Clear => SearchMap::new(),
        SearchUpdate::Replace(search) => search,
        SearchUpdate::Merge(search) => {
            let mut merged = current_search.clone();
            merged.extend(search);
            merged
        }
    };

    let next_search = match find_route(tree, &pathname, resolve_options) {
        Some((node_id, _)) => tree.ancestors(node_id).iter().fold(next_search, |search, node| {
            apply_middlewares(&node.options.search_middlewares, &current_search, search)
        }),
        None => next_search,
    };

    let search_str = stringify_search(&next_search);
    let search = replace_equal_deep(&from.search, Shared::from(Value::Object(next_search)));
    let hash = options.hash.unwrap_or_default();
    let href = if hash.is_empty() {
        format!("{pathname}{search_str}")
    } else {
        format!("{pathname}{search_str}#{hash}")
    };

    let mut state = options.state.unwrap_or_default();
    let key = create_key();
    state.insert(STATE_KEY.to_string(), Value::String(key.clone()));

    Ok(ParsedLocation {
        href,
        pathname,
        search_str,
        search,
        hash,
        state,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchMiddleware;
    use crate::tree::RouteDef;
    use serde_json::json;

    fn tree() -> RouteTree {
        RouteTree::build(RouteDef::root().with_search_middleware(SearchMiddleware::retain(["lang"])).with_children(vec![
            RouteDef::new("posts").with_child(RouteDef::new("$postId").with_child(RouteDef::new("edit"))),
            RouteDef::new("about"),
        ]))
        .unwrap()
    }

    #[test]
    fn test_parse_href_keeps_state_key() {
        let mut state = HistoryState::new();
        state.insert(STATE_KEY.into(), json!("abc"));
        let location = parse_href("/a", Some(state));
        assert_eq!(location.key, "abc");
    }

    #[test]
    fn test_parse_href_empty_query() {
        let location = parse_href("?", None);
        assert_eq!(location.pathname, "/");
        assert_eq!(location.search_str, "");
    }

    #[test]
    fn test_relative_navigation_keeps_params() {
        let from = parse_href("/posts/7", None);
        let next = build_location(&tree(), &from, BuildLocationOptions::to("./edit"), &ResolveOptions::default()).unwrap();
        assert_eq!(next.pathname, "/posts/7/edit");
    }

    #[test]
    fn test_middleware_retains_key() {
        let from = parse_href("/about?lang=fr&page=3", None);
        let next = build_location(&tree(), &from, BuildLocationOptions::to("/posts"), &ResolveOptions::default()).unwrap();
        assert_eq!(next.href, "/posts?lang=fr");
    }

    #[test]
    fn test_unchanged_search_is_shared() {
        let from = parse_href("/about?filter=%7B%22a%22%3A1%7D", None);
        let next = build_location(
            &tree(),
            &from,
            BuildLocationOptions::to("/posts").with_search(SearchUpdate::Keep),
            &ResolveOptions::default(),
        )
        .unwrap();
        assert!(next.search.ptr_eq(&from.search));
    }

    #[test]
    fn test_missing_param_is_error() {
        let from = parse_href("/about", None);
        let err = build_location(&tree(), &from, BuildLocationOptions::to("/posts/$postId"), &ResolveOptions::default())
            .unwrap_err();
        assert!(matches!(err, PathError::MissingParam { .. }));
    }

    #[test]
    fn test_base_path_helpers() {
        assert_eq!(strip_base_path("/app/posts", "/app"), "/posts");
        assert_eq!(strip_base_path("/app", "/app/"), "/");
        assert_eq!(strip_base_path("/application", "/app"), "/application");
        assert_eq!(with_base_path("/posts", "/app"), "/app/posts");
        assert_eq!(with_base_path("/posts", "/"), "/posts");
    }
}
