//! Search string codec, per-route validation and search middleware

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::encoding::{decode_uri_component, encode_uri_component};

/// Decoded search object
pub type SearchMap = Map<String, Value>;

/// Parses a query string into a search object
///
/// Each value that parses as JSON becomes typed (`1`, `true`, `{"a":1}`);
/// anything else stays a string. Repeated keys collect into an array.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use waypoint_router::search::parse_search;
///
/// let search = parse_search("?page=2&q=rust+lang&flag=true");
/// assert_eq!(search.get("page"), Some(&json!(2)));
/// assert_eq!(search.get("q"), Some(&json!("rust lang")));
/// assert_eq!(search.get("flag"), Some(&json!(true)));
/// ```
pub fn parse_search(search_str: &str) -> SearchMap {
    let query = search_str.strip_prefix('?').unwrap_or(search_str);
    let mut search = SearchMap::new();
    let mut repeated: HashSet<String> = HashSet::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_query_part(raw_key);
        let value = parse_value(&decode_query_part(raw_value));

        match search.get_mut(&key) {
            Some(Value::Array(items)) if repeated.contains(&key) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
                repeated.insert(key);
            }
            None => {
                search.insert(key, value);
            }
        }
    }

    search
}

fn decode_query_part(part: &str) -> String {
    decode_uri_component(&part.replace('+', " ")).into_owned()
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Serializes a search object back into a query string
///
/// The inverse of [`parse_search`]: strings that would parse as JSON are
/// quoted so their type survives, non-strings are JSON-encoded. Returns an
/// empty string for an empty object, otherwise a string starting with `?`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use waypoint_router::search::{parse_search, stringify_search};
///
/// let search = json!({"page": 2, "id": "7", "q": "a b"});
/// let query = stringify_search(search.as_object().unwrap());
/// assert_eq!(query, "?id=%227%22&page=2&q=a%20b");
/// assert_eq!(&parse_search(&query), search.as_object().unwrap());
/// ```
pub fn stringify_search(search: &SearchMap) -> String {
    let pairs: Vec<String> = search
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) if serde_json::from_str::<Value>(s).is_ok() => value.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", encode_uri_component(key), encode_uri_component(&text))
        })
        .collect();

    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

/// Validates the search object seen by one route
///
/// Receives the search merged from the route's ancestors and returns the
/// keys this route owns. An `Err` is captured on the match, never thrown.
pub trait SearchValidator: Send + Sync {
    fn validate(&self, search: &SearchMap) -> Result<SearchMap, String>;
}

impl<F> SearchValidator for F
where
    F: Fn(&SearchMap) -> Result<SearchMap, String> + Send + Sync,
{
    fn validate(&self, search: &SearchMap) -> Result<SearchMap, String> {
        self(search)
    }
}

/// Which keys a search middleware acts on
#[derive(Debug, Clone, PartialEq)]
pub enum SearchKeys {
    All,
    Keys(Vec<String>),
}

/// Transformation applied to the next search object when building a location
#[derive(Debug, Clone, PartialEq)]
pub enum SearchMiddleware {
    /// Carry keys over from the current location unless the next search sets them
    Retain(SearchKeys),
    /// Drop the named keys (or everything)
    Strip(SearchKeys),
    /// Drop keys whose next value equals the given default
    StripDefaults(SearchMap),
}

impl SearchMiddleware {
    /// `retain_search_params(true)` or `retain_search_params([keys])`
    pub fn retain<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SearchMiddleware::Retain(SearchKeys::Keys(keys.into_iter().map(Into::into).collect()))
    }

    pub fn retain_all() -> Self {
        SearchMiddleware::Retain(SearchKeys::All)
    }

    pub fn strip<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SearchMiddleware::Strip(SearchKeys::Keys(keys.into_iter().map(Into::into).collect()))
    }

    pub fn strip_all() -> Self {
        SearchMiddleware::Strip(SearchKeys::All)
    }

    pub fn strip_defaults(defaults: SearchMap) -> Self {
        SearchMiddleware::StripDefaults(defaults)
    }

    /// Applies the middleware to `next`, given the `current` search
    pub fn apply(&self, current: &SearchMap, mut next: SearchMap) -> SearchMap {
        match self {
            SearchMiddleware::Retain(SearchKeys::All) => {
                let mut merged = current.clone();
                merged.extend(next);
                merged
            }
            SearchMiddleware::Retain(SearchKeys::Keys(keys)) => {
                for key in keys {
                    if let (false, Some(value)) = (next.contains_key(key), current.get(key)) {
                        next.insert(key.clone(), value.clone());
                    }
                }
                next
            }
            SearchMiddleware::Strip(SearchKeys::All) => SearchMap::new(),
            SearchMiddleware::Strip(SearchKeys::Keys(keys)) => {
                for key in keys {
                    next.remove(key);
                }
                next
            }
            SearchMiddleware::StripDefaults(defaults) => {
                next.retain(|key, value| defaults.get(key) != Some(value));
                next
            }
        }
    }
}

/// Runs a middleware chain in order
pub fn apply_middlewares<'a, I>(middlewares: I, current: &SearchMap, next: SearchMap) -> SearchMap
where
    I: IntoIterator<Item = &'a SearchMiddleware>,
{
    middlewares
        .into_iter()
        .fold(next, |search, middleware| middleware.apply(current, search))
}
