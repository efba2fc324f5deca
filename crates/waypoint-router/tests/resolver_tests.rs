//! Integration tests for the route tree index and match resolution
//!
//! Covers:
//! - Ranking of sibling routes
//! - Ancestor chains and pathless layouts
//! - Not-found anchoring and boundaries
//! - Params parsing precedence and search validation
//! - Location building with search middleware

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use waypoint_router::*;

fn app_tree() -> RouteTree {
    RouteTree::build(RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("posts").with_not_found_boundary().with_children(vec![
            RouteDef::new("/"),
            RouteDef::new("new"),
            RouteDef::new("$postId").with_child(RouteDef::new("edit")),
        ]),
        RouteDef::new("files/{$name}.txt"),
        RouteDef::new("files/$"),
        RouteDef::new("{-$lang}/about"),
        RouteDef::pathless("_auth").with_children(vec![RouteDef::new("dashboard"), RouteDef::new("settings")]),
    ]))
    .unwrap()
}

fn leaf_id(tree: &RouteTree, href: &str) -> String {
    let resolution = resolve(tree, &parse_href(href, None), &ResolveOptions::default());
    resolution.leaf().map(|m| m.route_id.clone()).unwrap_or_default()
}

#[rstest]
#[case("/", "/")]
#[case("/posts", "/posts/")]
#[case("/posts/", "/posts/")]
#[case("/posts/new", "/posts/new")]
#[case("/posts/42", "/posts/$postId")]
#[case("/posts/42/edit", "/posts/$postId/edit")]
#[case("/files/readme.txt", "/files/{$name}.txt")]
#[case("/files/img/logo.png", "/files/$")]
#[case("/about", "/{-$lang}/about")]
#[case("/de/about", "/{-$lang}/about")]
#[case("/dashboard", "/_auth/dashboard")]
fn test_resolves_leaf(#[case] href: &str, #[case] expected: &str) {
    assert_eq!(leaf_id(&app_tree(), href), expected);
}

#[test]
fn test_pathless_layout_in_chain() {
    let tree = app_tree();
    let resolution = resolve(&tree, &parse_href("/settings", None), &ResolveOptions::default());
    let ids: Vec<&str> = resolution.matches.iter().map(|m| m.route_id.as_str()).collect();
    assert_eq!(ids, vec![ROOT_ROUTE_ID, "/_auth", "/_auth/settings"]);
}

#[test]
fn test_not_found_attaches_to_boundary() {
    let tree = app_tree();
    let resolution = resolve(&tree, &parse_href("/posts/42/edit/extra", None), &ResolveOptions::default());

    assert_eq!(resolution.leaf().unwrap().route_id, "/posts/$postId/edit");
    assert_eq!(
        resolution.not_found,
        Some(NotFoundMatch {
            route_id: "/posts".into(),
            leftover: "extra".into(),
        })
    );
}

#[test]
fn test_not_found_defaults_to_root() {
    let tree = app_tree();
    let resolution = resolve(&tree, &parse_href("/optional-params/x", None), &ResolveOptions::default());
    assert_eq!(resolution.not_found.unwrap().route_id, ROOT_ROUTE_ID);
}

#[test]
fn test_rank_order_is_stable() {
    let tree = app_tree();
    let flat: Vec<&str> = tree.flat().map(|n| n.full_path.as_str()).collect();
    let new_at = flat.iter().position(|p| *p == "/posts/new").unwrap();
    let param_at = flat.iter().position(|p| *p == "/posts/$postId").unwrap();
    let affix_at = flat.iter().position(|p| *p == "/files/{$name}.txt").unwrap();
    let splat_at = flat.iter().position(|p| *p == "/files/$").unwrap();
    assert!(new_at < param_at);
    assert!(affix_at < splat_at);
}

#[test]
fn test_deeper_param_parser_wins() {
    let tree = RouteTree::build(RouteDef::root().with_child(
        RouteDef::new("items/$id")
            .with_parse_params(|p: &Params| -> Result<Params, String> {
                let mut out = Params::new();
                out.insert("id".into(), format!("item-{}", p["id"]));
                Ok(out)
            })
            .with_child(RouteDef::new("detail").with_parse_params(|p: &Params| -> Result<Params, String> {
                let mut out = Params::new();
                out.insert("id".into(), p["id"].to_uppercase());
                Ok(out)
            })),
    ))
    .unwrap();

    let resolution = resolve(&tree, &parse_href("/items/7/detail", None), &ResolveOptions::default());
    assert_eq!(resolution.leaf().unwrap().params["id"], "ITEM-7");
}

#[test]
fn test_param_error_is_captured_per_match() {
    let tree = RouteTree::build(RouteDef::root().with_child(
        RouteDef::new("users/$userId").with_parse_params(|p: &Params| {
            p["userId"]
                .parse::<u32>()
                .map(|_| p.clone())
                .map_err(|e| e.to_string())
        }),
    ))
    .unwrap();

    let resolution = resolve(&tree, &parse_href("/users/abc", None), &ResolveOptions::default());
    let leaf = resolution.leaf().unwrap();
    assert!(matches!(leaf.params_error, Some(MatchError::PathParam { .. })));
    assert!(!resolution.matches[0].has_error());
}

#[test]
fn test_search_validation_merges_and_isolates_errors() {
    let tree = RouteTree::build(
        RouteDef::root()
            .with_validate_search(|s: &SearchMap| -> Result<SearchMap, String> {
                let mut out = SearchMap::new();
                out.insert("lang".into(), s.get("lang").cloned().unwrap_or(json!("en")));
                Ok(out)
            })
            .with_child(RouteDef::new("list").with_validate_search(|s: &SearchMap| match s.get("page") {
                Some(Value::Number(_)) => Ok(s.clone()),
                _ => Err("page must be a number".to_string()),
            })),
    )
    .unwrap();

    let ok = resolve(&tree, &parse_href("/list?page=2", None), &ResolveOptions::default());
    assert_eq!(Value::Object(ok.leaf().unwrap().search.clone()), json!({"lang": "en", "page": 2}));

    let bad = resolve(&tree, &parse_href("/list?page=two", None), &ResolveOptions::default());
    let leaf = bad.leaf().unwrap();
    assert_eq!(leaf.search_error.as_ref().map(MatchError::route_id), Some("/list"));
    assert_eq!(Value::Object(leaf.search.clone()), json!({"lang": "en", "page": "two"}));
    assert!(bad.matches[0].search_error.is_none());
}

#[test]
fn test_case_sensitive_route_override() {
    let tree = RouteTree::build(RouteDef::root().with_child(RouteDef::new("Admin").case_sensitive(true))).unwrap();
    assert!(find_route(&tree, "/Admin", &ResolveOptions::default()).is_some());
    assert!(find_route(&tree, "/admin", &ResolveOptions::default()).is_none());
}

#[test]
fn test_allow_empty_splat_route_option() {
    let tree = RouteTree::build(RouteDef::root().with_children(vec![
        RouteDef::new("docs/$").allow_empty_splat(),
        RouteDef::new("blog/$"),
    ]))
    .unwrap();
    assert!(find_route(&tree, "/docs", &ResolveOptions::default()).is_some());
    assert!(find_route(&tree, "/blog", &ResolveOptions::default()).is_none());
}

#[test]
fn test_build_location_strips_defaults() {
    let mut defaults = SearchMap::new();
    defaults.insert("page".into(), json!(1));
    let tree = RouteTree::build(
        RouteDef::root().with_child(RouteDef::new("list").with_search_middleware(SearchMiddleware::strip_defaults(defaults))),
    )
    .unwrap();

    let mut next = SearchMap::new();
    next.insert("page".into(), json!(1));
    next.insert("q".into(), json!("rust"));
    let location = build_location(
        &tree,
        &parse_href("/", None),
        BuildLocationOptions::to("/list").with_search(SearchUpdate::Replace(next)).with_hash("top"),
        &ResolveOptions::default(),
    )
    .unwrap();

    assert_eq!(location.href, "/list?q=rust#top");
}
