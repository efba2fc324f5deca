//! Match resolution: location -> ordered chain of route matches
//!
//! Resolution is a pure function of the route tree and a location. It never
//! fails as a whole: per-route validation errors are captured on the match
//! they belong to, and an unmatched pathname produces a chain ending at the
//! deepest partially matching route plus a [`NotFoundMatch`].

use serde::Serialize;
use serde_json::Value;

use crate::error::MatchError;
use crate::location::ParsedLocation;
use crate::matcher::{interpolate_path, match_pathname, InterpolateOptions, MatchOptions, Params, FUZZY_KEY};
use crate::path::{split_segments, trim_path_right, TrailingSlash};
use crate::route::RoutePattern;
use crate::search::SearchMap;
use crate::tree::{NodeId, RouteNode, RouteTree};

/// Tree-wide resolution settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Default for routes that don't set their own case sensitivity
    pub case_sensitive: bool,
    pub trailing_slash: TrailingSlash,
}

/// One route of a resolved chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMatch {
    /// Cache identity: interpolated route id plus serialized loader deps
    pub id: String,
    pub route_id: String,
    #[serde(skip)]
    pub node_id: NodeId,
    pub full_path: String,
    /// This route's full path with params filled in
    pub pathname: String,
    pub params: Params,
    /// Search merged from the root down to this route
    pub search: SearchMap,
    pub loader_deps: Value,
    pub params_error: Option<MatchError>,
    pub search_error: Option<MatchError>,
}

impl ResolvedMatch {
    pub fn has_error(&self) -> bool {
        self.params_error.is_some() || self.search_error.is_some()
    }

    /// First validation error captured on this match
    pub fn error(&self) -> Option<&MatchError> {
        self.params_error.as_ref().or(self.search_error.as_ref())
    }
}

/// Where an unmatched pathname is reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundMatch {
    /// Route whose not-found boundary handles the miss
    pub route_id: String,
    /// Part of the pathname no route consumed
    pub leftover: String,
}

/// Result of [`resolve`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub matches: Vec<ResolvedMatch>,
    pub not_found: Option<NotFoundMatch>,
}

impl Resolution {
    /// The deepest match
    pub fn leaf(&self) -> Option<&ResolvedMatch> {
        self.matches.last()
    }

    pub fn is_not_found(&self) -> bool {
        self.not_found.is_some()
    }
}

// ============================================================================
// Route lookup
// ============================================================================

fn match_options(node: &RouteNode, options: &ResolveOptions) -> MatchOptions {
    MatchOptions::default()
        .case_sensitive(node.options.case_sensitive.unwrap_or(options.case_sensitive))
        .allow_empty_splat(node.options.allow_empty_splat)
}

/// Finds the highest ranked route whose full path matches `pathname` exactly
///
/// # Examples
///
/// ```
/// use waypoint_router::{find_route, ResolveOptions, RouteDef, RouteTree};
///
/// let tree = RouteTree::build(
///     RouteDef::root().with_children(vec![RouteDef::new("posts/$postId"), RouteDef::new("posts/new")]),
/// )
/// .unwrap();
///
/// let (node_id, params) = find_route(&tree, "/posts/new", &ResolveOptions::default()).unwrap();
/// assert_eq!(tree.node(node_id).unwrap().id, "/posts/new");
/// assert!(params.is_empty());
/// ```
pub fn find_route(tree: &RouteTree, pathname: &str, options: &ResolveOptions) -> Option<(NodeId, Params)> {
    let trimmed = trim_path_right(pathname);
    tree.flat().find_map(|node| {
        match_pathname(&node.pattern, trimmed, match_options(node, options)).map(|params| (node.node_id, params))
    })
}

/// Finds the route consuming the most leading segments of `pathname`
///
/// Index routes never match fuzzily. Ties go to the higher ranked route.
fn find_fuzzy_route(tree: &RouteTree, pathname: &str, options: &ResolveOptions) -> Option<(NodeId, Params)> {
    let trimmed = trim_path_right(pathname);
    let mut best: Option<(NodeId, Params, usize)> = None;

    for node in tree.flat() {
        let Some(params) = match_pathname(&node.pattern, trimmed, match_options(node, options).fuzzy(true)) else {
            continue;
        };
        let leftover = params.get(FUZZY_KEY).map(|rest| split_segments(rest).len()).unwrap_or(0);
        if best.as_ref().map_or(true, |(_, _, current)| leftover < *current) {
            best = Some((node.node_id, params, leftover));
        }
    }

    best.map(|(node_id, params, _)| (node_id, params))
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves a location into its chain of matches
///
/// # Examples
///
/// ```
/// use waypoint_router::{parse_href, resolve, ResolveOptions, RouteDef, RouteTree};
///
/// let tree = RouteTree::build(RouteDef::root().with_children(vec![
///     RouteDef::new("posts").with_child(RouteDef::new("$postId")),
/// ]))
/// .unwrap();
///
/// let resolution = resolve(&tree, &parse_href("/posts/42", None), &ResolveOptions::default());
/// let ids: Vec<&str> = resolution.matches.iter().map(|m| m.route_id.as_str()).collect();
/// assert_eq!(ids, vec!["__root__", "/posts", "/posts/$postId"]);
/// assert_eq!(resolution.leaf().unwrap().params.get("postId").unwrap(), "42");
/// assert!(resolution.not_found.is_none());
/// ```
pub fn resolve(tree: &RouteTree, location: &ParsedLocation, options: &ResolveOptions) -> Resolution {
    let pathname = location.pathname.as_str();

    let (anchor, raw_params, not_found) = match find_route(tree, pathname, options) {
        Some((node_id, params)) => (node_id, params, None),
        None => {
            let (node_id, mut params) = find_fuzzy_route(tree, pathname, options)
                .unwrap_or_else(|| (tree.root().node_id, Params::new()));
            let leftover = params.remove(FUZZY_KEY).unwrap_or_else(|| {
                if node_id == tree.root().node_id {
                    split_segments(pathname).join("/")
                } else {
                    String::new()
                }
            });
            (node_id, params, Some(leftover))
        }
    };

    let chain = tree.ancestors(anchor);
    let matches = build_matches(&chain, raw_params, location.search_map());

    let not_found = not_found.map(|leftover| {
        let boundary = chain
            .iter()
            .rev()
            .find(|node| node.options.not_found_boundary)
            .copied()
            .unwrap_or_else(|| tree.root());
        tracing::debug!(
            pathname,
            boundary = %boundary.id,
            leftover = %leftover,
            "no route matched pathname"
        );
        NotFoundMatch {
            route_id: boundary.id.clone(),
            leftover,
        }
    });

    Resolution { matches, not_found }
}

fn build_matches(chain: &[&RouteNode], raw_params: Params, location_search: SearchMap) -> Vec<ResolvedMatch> {
    let mut params = raw_params;
    let mut params_errors: Vec<Option<MatchError>> = Vec::with_capacity(chain.len());

    // Params parse root -> leaf; deeper parsers see and override earlier results
    for node in chain {
        let error = node.options.parse_params.as_ref().and_then(|parser| match parser.parse(&params) {
            Ok(parsed) => {
                params.extend(parsed);
                None
            }
            Err(message) => Some(MatchError::PathParam {
                route_id: node.id.clone(),
                message,
            }),
        });
        params_errors.push(error);
    }

    let mut parent_search = location_search;
    chain
        .iter()
        .zip(params_errors)
        .map(|(node, params_error)| {
            let (search, search_error) = validate_search(node, &parent_search);
            parent_search = search.clone();

            let loader_deps = node
                .options
                .loader_deps
                .as_ref()
                .map(|deps| deps.deps(&search))
                .unwrap_or(Value::Null);

            ResolvedMatch {
                id: match_id(node, &params, &loader_deps),
                route_id: node.id.clone(),
                node_id: node.node_id,
                full_path: node.full_path.clone(),
                pathname: interpolate_path(&node.pattern, &params, &InterpolateOptions::default())
                    .map(|built| built.path)
                    .unwrap_or_else(|_| node.full_path.clone()),
                params: params.clone(),
                search,
                loader_deps,
                params_error,
                search_error,
            }
        })
        .collect()
}

fn validate_search(node: &RouteNode, parent: &SearchMap) -> (SearchMap, Option<MatchError>) {
    let Some(validator) = node.options.validate_search.as_ref() else {
        return (parent.clone(), None);
    };

    match validator.validate(parent) {
        Ok(validated) => {
            let mut merged = parent.clone();
            merged.extend(validated);
            (merged, None)
        }
        Err(message) => (
            parent.clone(),
            Some(MatchError::SearchValidation {
                route_id: node.id.clone(),
                message,
            }),
        ),
    }
}

/// Interpolated route id followed by the JSON encoding of the loader deps
fn match_id(node: &RouteNode, params: &Params, loader_deps: &Value) -> String {
    let id = if node.is_root() {
        node.id.clone()
    } else {
        let options = InterpolateOptions {
            leave_wildcards: true,
            ..Default::default()
        };
        interpolate_path(&RoutePattern::compile(&node.id), params, &options)
            .map(|built| built.path)
            .unwrap_or_else(|_| node.id.clone())
    };

    if loader_deps.is_null() {
        id
    } else {
        format!("{id}{loader_deps}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::parse_href;
    use crate::tree::{RouteDef, ROOT_ROUTE_ID};
    use serde_json::json;

    fn ids(resolution: &Resolution) -> Vec<&str> {
        resolution.matches.iter().map(|m| m.route_id.as_str()).collect()
    }

    #[test]
    fn test_root_match_id_is_root_id() {
        let tree = RouteTree::build(RouteDef::root().with_child(RouteDef::new("/"))).unwrap();
        let resolution = resolve(&tree, &parse_href("/", None), &ResolveOptions::default());
        assert_eq!(ids(&resolution), vec![ROOT_ROUTE_ID, "/"]);
        assert_eq!(resolution.matches[0].id, ROOT_ROUTE_ID);
    }

    #[test]
    fn test_unmatched_falls_back_to_root() {
        let tree = RouteTree::build(RouteDef::root().with_child(RouteDef::new("about"))).unwrap();
        let resolution = resolve(&tree, &parse_href("/nope/deeper", None), &ResolveOptions::default());
        assert_eq!(ids(&resolution), vec![ROOT_ROUTE_ID]);
        assert_eq!(
            resolution.not_found,
            Some(NotFoundMatch {
                route_id: ROOT_ROUTE_ID.into(),
                leftover: "nope/deeper".into()
            })
        );
    }

    #[test]
    fn test_match_id_includes_loader_deps() {
        let tree = RouteTree::build(RouteDef::root().with_child(
            RouteDef::new("posts").with_loader_deps(|search: &SearchMap| json!({"page": search.get("page")})),
        ))
        .unwrap();
        let resolution = resolve(&tree, &parse_href("/posts?page=2", None), &ResolveOptions::default());
        assert_eq!(resolution.leaf().unwrap().id, r#"/posts{"page":2}"#);
    }

    #[test]
    fn test_match_id_interpolates_params() {
        let tree = RouteTree::build(RouteDef::root().with_child(RouteDef::new("posts/$postId"))).unwrap();
        let resolution = resolve(&tree, &parse_href("/posts/7", None), &ResolveOptions::default());
        assert_eq!(resolution.leaf().unwrap().id, "/posts/7");
        assert_eq!(resolution.leaf().unwrap().pathname, "/posts/7");
    }
}
