//! Integration tests for loading and navigation
//!
//! Covers:
//! - Context flow and parent matches
//! - Supersession of slow navigations
//! - Loader deduplication and freshness
//! - Per-match publishing and deferred fields
//! - Redirects and not-found boundaries
//! - History traversal, invalidation, hydration and the pending window

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use waypoint_nav::*;
use waypoint_router::{RouteDef, RouteTree, ROOT_ROUTE_ID};

fn router_at(tree: RouteDef, href: &str) -> Router {
    Router::new(
        RouteTree::build(tree).unwrap(),
        Arc::new(MemoryHistory::new(href)),
        RouterConfig::default(),
    )
}

/// Loader returning `value` and counting its calls
fn counting_loader(calls: &Arc<AtomicUsize>, value: Value) -> RouteHooks {
    let calls = Arc::clone(calls);
    RouteHooks::new().loader(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        let value = value.clone();
        async move { Ok(value) }
    })
}

async fn wait_until(router: &Router, condition: impl Fn(&RouterState) -> bool) {
    for _ in 0..100 {
        if condition(&router.state()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("router never reached the expected state");
}

fn leaf_route(router: &Router) -> String {
    router.state().leaf().map(|m| m.route_id.clone()).unwrap_or_default()
}

// ============================================================================
// Context and parent matches
// ============================================================================

#[tokio::test]
async fn test_before_load_context_reaches_child_loader() {
    let tree = RouteDef::root()
        .with_hooks(RouteHooks::new().before_load(|_| async { Ok(json!({"a": 1})) }))
        .with_child(
            RouteDef::new("posts")
                .with_hooks(RouteHooks::new().loader(|_| async { Ok(json!({"posts": [1, 2]})) }))
                .with_child(RouteDef::new("$postId").with_hooks(RouteHooks::new().loader(
                    |args: LoaderArgs| async move {
                        let parent = args.parent_match().await.and_then(|m| m.data());
                        Ok(json!({"a": args.context["a"], "parent": parent}))
                    },
                ))),
        );
    let router = router_at(tree, "/posts/3");
    router.load().await.unwrap();

    let state = router.state();
    assert_eq!(state.status, RouterStatus::Idle);
    assert_eq!(
        state.leaf().unwrap().data(),
        Some(json!({"a": 1, "parent": {"posts": [1, 2]}}))
    );
    assert_eq!(state.matches[0].context.to_value(), json!({"a": 1}));
}

#[tokio::test]
async fn test_router_context_and_route_context_merge() {
    let tree = RouteDef::root().with_child(RouteDef::new("admin").with_hooks(
        RouteHooks::new()
            .context(|args| Ok(json!({"section": "admin", "user": args.context["user"]})))
            .loader(|args| async move { Ok(args.context) }),
    ));
    let router = router_at(tree, "/admin").with_context(json!({"user": "ada"}));
    router.load().await.unwrap();

    assert_eq!(
        router.state().leaf().unwrap().data(),
        Some(json!({"user": "ada", "section": "admin"}))
    );
}

// ============================================================================
// Supersession and deduplication
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_newer_navigation_supersedes_slow_one() {
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("slow").with_hooks(RouteHooks::new().loader(|_| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(json!("slow"))
        })),
        RouteDef::new("fast").with_hooks(RouteHooks::new().loader(|_| async { Ok(json!("fast")) })),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();

    let slow_router = router.clone();
    let slow = tokio::spawn(async move { slow_router.navigate(NavigateOptions::to("/slow")).await });
    tokio::task::yield_now().await;

    router.navigate(NavigateOptions::to("/fast")).await.unwrap();
    slow.await.unwrap().unwrap();

    let state = router.state();
    assert_eq!(state.resolved_location.as_ref().unwrap().pathname, "/fast");
    assert_eq!(leaf_route(&router), "/fast");
    assert!(state.find_match("/slow").is_none());
    assert_eq!(state.status, RouterStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_preload_and_navigate_share_one_loader_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("posts/$postId").with_hooks(RouteHooks::new().loader(move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!({"id": args.params["postId"]}))
            }
        })),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();

    let preloader = router.clone();
    let preload = tokio::spawn(async move { preloader.preload_route(NavigateOptions::to("/posts/1")).await });
    tokio::task::yield_now().await;

    router.navigate(NavigateOptions::to("/posts/1")).await.unwrap();
    let preloaded = preload.await.unwrap().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(preloaded.last().unwrap().data(), Some(json!({"id": "1"})));
    assert_eq!(router.state().leaf().unwrap().data(), Some(json!({"id": "1"})));
}

#[tokio::test]
async fn test_preload_fills_cache_without_committing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("about").with_hooks(counting_loader(&calls, json!("about"))),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();

    router.preload_route(NavigateOptions::to("/about")).await.unwrap();
    let state = router.state();
    assert_eq!(leaf_route(&router), "/");
    let cached = state.cached_matches.iter().find(|m| m.route_id == "/about").unwrap();
    assert!(cached.preload);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // the navigation commits the preloaded data without waiting on the loader
    router.navigate(NavigateOptions::to("/about")).await.unwrap();
    assert_eq!(router.state().leaf().unwrap().data(), Some(json!("about")));
}

#[tokio::test(start_paused = true)]
async fn test_superseded_loader_is_not_joined() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("posts/$postId").with_hooks(RouteHooks::new().loader(move |args: LoaderArgs| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::select! {
                    _ = args.abort.cancelled() => Err(anyhow::anyhow!("aborted").into()),
                    _ = tokio::time::sleep(Duration::from_millis(50)) => Ok(json!({"id": args.params["postId"]})),
                }
            }
        })),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();

    let first_router = router.clone();
    let first = tokio::spawn(async move { first_router.navigate(NavigateOptions::to("/posts/1")).await });
    tokio::task::yield_now().await;

    router.navigate(NavigateOptions::to("/posts/1")).await.unwrap();
    first.await.unwrap().unwrap();

    let leaf = router.state().leaf().cloned().unwrap();
    assert_eq!(leaf.status, MatchStatus::Success);
    assert_eq!(leaf.data(), Some(json!({"id": "1"})));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_preload_background_reload_reaches_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("about").with_hooks(
            RouteHooks::new()
                .loader(move |_| {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok(json!({ "n": n })) }
                })
                .should_reload(|_| true),
        ),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();

    router.preload_route(NavigateOptions::to("/about")).await.unwrap();
    let preloaded = router.preload_route(NavigateOptions::to("/about")).await.unwrap();
    // stale entry served while the loader runs again
    assert_eq!(preloaded.last().unwrap().data(), Some(json!({"n": 1})));

    wait_until(&router, |state| {
        state
            .cached_matches
            .iter()
            .any(|m| m.route_id == "/about" && m.data() == Some(json!({"n": 2})))
    })
    .await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Progressive publishing and deferred fields
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_settled_parent_is_published_before_slow_child() {
    let tree = RouteDef::root().with_child(
        RouteDef::new("a")
            .with_hooks(RouteHooks::new().loader(|_| async { Ok(json!("parent")) }))
            .with_child(RouteDef::new("b").with_hooks(RouteHooks::new().loader(|_| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(json!("child"))
            }))),
    );
    let router = router_at(tree, "/a/b");

    let early = Arc::new(Mutex::new(false));
    let seen = Arc::clone(&early);
    router.subscribe(move |state| {
        let parent = state.pending_matches.iter().find(|m| m.route_id == "/a");
        let child = state.pending_matches.iter().find(|m| m.route_id == "/a/b");
        if state.status == RouterStatus::Pending
            && parent.is_some_and(|m| m.status == MatchStatus::Success)
            && child.is_some_and(|m| m.status != MatchStatus::Success)
        {
            *seen.lock() = true;
        }
    });

    router.load().await.unwrap();

    assert!(*early.lock());
    assert_eq!(router.state().leaf().unwrap().data(), Some(json!("child")));
}

#[tokio::test]
async fn test_deferred_field_lands_after_commit() {
    let slot: Arc<Mutex<Option<DeferredHandle<Value>>>> = Arc::default();
    let stash = Arc::clone(&slot);
    let tree = RouteDef::root().with_child(RouteDef::new("post").with_hooks(RouteHooks::new().loader(
        move |args: LoaderArgs| {
            let (comments, handle) = DeferredValue::pending();
            *stash.lock() = Some(handle);
            args.defer("comments", comments);
            async { Ok(json!({"title": "hello"})) }
        },
    )));
    let router = router_at(tree, "/post");
    router.load().await.unwrap();

    let leaf = router.state().leaf().cloned().unwrap();
    assert_eq!(leaf.data(), Some(json!({"title": "hello"})));
    assert!(leaf.has_pending_deferred());

    let handle = slot.lock().take().unwrap();
    assert!(handle.resolve(json!(["first"])));

    wait_until(&router, |state| {
        state.leaf().and_then(|m| m.data()) == Some(json!({"title": "hello", "comments": ["first"]}))
    })
    .await;
    assert!(!router.state().leaf().unwrap().has_pending_deferred());
}

#[tokio::test]
async fn test_deferred_rejection_is_recorded() {
    let tree = RouteDef::root().with_child(RouteDef::new("post").with_hooks(RouteHooks::new().loader(
        |args: LoaderArgs| {
            let (stats, handle) = DeferredValue::pending();
            args.defer("stats", stats);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                handle.reject("stats offline");
            });
            async { Ok(json!({"title": "hello"})) }
        },
    )));
    let router = router_at(tree, "/post");
    router.load().await.unwrap();

    wait_until(&router, |state| {
        state
            .leaf()
            .is_some_and(|m| m.deferred_errors.get("stats").map(String::as_str) == Some("stats offline"))
    })
    .await;
    assert_eq!(router.state().leaf().unwrap().data(), Some(json!({"title": "hello"})));
}

// ============================================================================
// Freshness and invalidation
// ============================================================================

#[tokio::test]
async fn test_fresh_match_is_reused() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("posts").with_hooks(counting_loader(&calls, json!([1])).stale_time(Duration::from_secs(60))),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();

    router.navigate(NavigateOptions::to("/posts")).await.unwrap();
    router.navigate(NavigateOptions::to("/")).await.unwrap();
    router.navigate(NavigateOptions::to("/posts")).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(router.state().leaf().unwrap().cause, LoadCause::Enter);
}

#[tokio::test]
async fn test_stale_match_revalidates_in_background() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("posts").with_hooks(counting_loader(&calls, json!([1]))),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();

    router.navigate(NavigateOptions::to("/posts")).await.unwrap();
    router.navigate(NavigateOptions::to("/")).await.unwrap();
    router.navigate(NavigateOptions::to("/posts")).await.unwrap();

    // the stale data is committed right away
    assert_eq!(router.state().leaf().unwrap().data(), Some(json!([1])));
    for _ in 0..10 {
        if calls.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_reloads_and_shares_equal_data() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = RouteDef::root().with_child(
        RouteDef::new("posts").with_hooks(
            counting_loader(&calls, json!({"items": [{"id": 1}]})).stale_time(Duration::from_secs(60)),
        ),
    );
    let router = router_at(tree, "/posts");
    router.load().await.unwrap();
    let before = router.state().leaf().unwrap().loader_data.clone().unwrap();

    router.invalidate().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let after = router.state().leaf().unwrap().loader_data.clone().unwrap();
    assert!(after.ptr_eq(&before));
    assert!(!router.state().leaf().unwrap().invalid);
}

#[tokio::test]
async fn test_zero_gc_time_evicts_on_exit() {
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("kept").with_hooks(RouteHooks::new().loader(|_| async { Ok(json!(1)) })),
        RouteDef::new("dropped").with_hooks(
            RouteHooks::new()
                .loader(|_| async { Ok(json!(2)) })
                .gc_time(Duration::ZERO),
        ),
    ]);
    let router = router_at(tree, "/kept");
    router.load().await.unwrap();
    router.navigate(NavigateOptions::to("/dropped")).await.unwrap();
    router.navigate(NavigateOptions::to("/")).await.unwrap();

    let cached: Vec<String> = router.state().cached_matches.iter().map(|m| m.route_id.clone()).collect();
    assert!(cached.contains(&"/kept".to_string()));
    assert!(!cached.contains(&"/dropped".to_string()));

    router.clear_cache();
    assert!(router.state().cached_matches.is_empty());
}

// ============================================================================
// Redirects, errors and not-found
// ============================================================================

#[tokio::test]
async fn test_before_load_redirect() {
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("/"),
        RouteDef::new("old").with_hooks(RouteHooks::new().before_load(|_| async { Err(Redirect::to("/new").into()) })),
        RouteDef::new("new"),
    ]);
    let router = router_at(tree, "/");
    router.load().await.unwrap();
    router.navigate(NavigateOptions::to("/old")).await.unwrap();

    let state = router.state();
    assert_eq!(leaf_route(&router), "/new");
    assert_eq!(state.redirect.as_ref().map(|r| r.to.as_str()), Some("/new"));
    assert_eq!(router.history().location().href, "/new");
    assert_eq!(router.history().length(), 2);
}

#[tokio::test]
async fn test_redirect_loop_is_bounded() {
    let tree = RouteDef::root().with_children(vec![
        RouteDef::new("a").with_hooks(RouteHooks::new().loader(|_| async { Err(RouteSignal::redirect("/b")) })),
        RouteDef::new("b").with_hooks(RouteHooks::new().loader(|_| async { Err(RouteSignal::redirect("/a")) })),
    ]);
    let config = RouterConfig {
        max_redirects: 3,
        ..Default::default()
    };
    let router = Router::new(
        RouteTree::build(tree).unwrap(),
        Arc::new(MemoryHistory::new("/a")),
        config,
    );

    let error = router.load().await.unwrap_err();
    assert!(matches!(error, NavError::TooManyRedirects { limit: 3, .. }));
    assert_eq!(router.state().status, RouterStatus::Idle);
}

#[tokio::test]
async fn test_unmatched_path_falls_back_to_root() {
    let tree = RouteDef::root().with_child(RouteDef::new("posts"));
    let router = router_at(tree, "/nope/x");
    router.load().await.unwrap();

    let state = router.state();
    assert_eq!(state.matches.len(), 1);
    assert_eq!(state.matches[0].route_id, ROOT_ROUTE_ID);
    assert_eq!(state.matches[0].status, MatchStatus::NotFound);
    assert_eq!(state.status_code, 404);
    match &state.matches[0].error {
        Some(RouteSignal::NotFound(not_found)) => {
            assert!(not_found.global);
            assert_eq!(not_found.data, json!({"leftover": "nope/x"}));
        }
        other => panic!("expected not-found, got {other:?}"),
    }
}

#[tokio::test]
async fn test_loader_not_found_climbs_to_boundary() {
    let tree = RouteDef::root().with_child(
        RouteDef::new("posts")
            .with_not_found_boundary()
            .with_hooks(RouteHooks::new().loader(|_| async { Ok(json!("list")) }))
            .with_child(
                RouteDef::new("$postId")
                    .with_hooks(RouteHooks::new().loader(|_| async { Err(RouteSignal::not_found()) })),
            ),
    );
    let router = router_at(tree, "/posts/404");
    router.load().await.unwrap();

    let state = router.state();
    let ids: Vec<&str> = state.matches.iter().map(|m| m.route_id.as_str()).collect();
    assert_eq!(ids, vec![ROOT_ROUTE_ID, "/posts"]);
    assert_eq!(state.matches[1].status, MatchStatus::NotFound);
    assert_eq!(state.matches[1].data(), Some(json!("list")));
    assert_eq!(state.status_code, 404);
}

#[tokio::test]
async fn test_on_error_converts_to_not_found() {
    let tree = RouteDef::root().with_child(
        RouteDef::new("users/$id").with_hooks(
            RouteHooks::new()
                .loader(|_| async { Err(anyhow::anyhow!("no such user").into()) })
                .on_error(|_| Some(RouteSignal::not_found())),
        ),
    );
    let router = router_at(tree, "/users/9");
    router.load().await.unwrap();

    let state = router.state();
    assert_eq!(state.matches.len(), 1);
    assert_eq!(state.matches[0].status, MatchStatus::NotFound);
}

#[tokio::test]
async fn test_before_load_error_stops_child_loaders() {
    let calls = Arc::new(AtomicUsize::new(0));
    let tree = RouteDef::root().with_child(
        RouteDef::new("admin")
            .with_hooks(RouteHooks::new().before_load(|_| async { Err(anyhow::anyhow!("forbidden").into()) }))
            .with_child(RouteDef::new("users").with_hooks(counting_loader(&calls, json!([])))),
    );
    let router = router_at(tree, "/admin/users");
    router.load().await.unwrap();

    let state = router.state();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.matches[1].status, MatchStatus::Error);
    assert_eq!(state.matches[1].error_message().as_deref(), Some("forbidden"));
    assert_eq!(state.status_code, 500);
}

#[tokio::test]
async fn test_matches_below_failed_before_load_are_not_committed() {
    let tree = RouteDef::root().with_child(
        RouteDef::new("a")
            .with_hooks(RouteHooks::new().before_load(|_| async { Err(anyhow::anyhow!("no access").into()) }))
            .with_child(RouteDef::new("b").with_child(RouteDef::new("c"))),
    );
    let router = router_at(tree, "/a/b/c");
    router.load().await.unwrap();

    let state = router.state();
    let route_ids: Vec<&str> = state.matches.iter().map(|m| m.route_id.as_str()).collect();
    assert_eq!(route_ids, vec![ROOT_ROUTE_ID, "/a"]);
    assert_eq!(state.matches[1].status, MatchStatus::Error);
    assert!(state.matches.iter().all(|m| m.status != MatchStatus::Pending));
    assert_eq!(state.status_code, 500);
}

// ============================================================================
// History, hydration and pending window
// ============================================================================

#[tokio::test]
async fn test_history_back_triggers_load() {
    let tree = RouteDef::root().with_children(vec![RouteDef::new("a"), RouteDef::new("b")]);
    let router = router_at(tree, "/a");
    router.mount();
    router.load().await.unwrap();
    router.navigate(NavigateOptions::to("/b")).await.unwrap();
    assert_eq!(leaf_route(&router), "/b");

    router.history().back();
    wait_until(&router, |state| {
        state.resolved_location.as_ref().map(|l| l.pathname.as_str()) == Some("/a")
    })
    .await;
    assert_eq!(leaf_route(&router), "/a");
    router.unmount();
}

#[tokio::test]
async fn test_hydrated_matches_skip_their_loader() {
    fn tree(calls: &Arc<AtomicUsize>) -> RouteDef {
        RouteDef::root().with_child(RouteDef::new("posts/$postId").with_hooks(counting_loader(calls, json!({"title": "hi"}))))
    }

    let server_calls = Arc::new(AtomicUsize::new(0));
    let server = router_at(tree(&server_calls), "/posts/1");
    server.load().await.unwrap();

    let channel = HydrationChannel::new();
    channel.init().unwrap();
    assert_eq!(server.dehydrate_into(&channel).unwrap(), 1);

    let client_calls = Arc::new(AtomicUsize::new(0));
    let client = router_at(tree(&client_calls), "/posts/1");
    assert_eq!(client.hydrate(&channel).unwrap(), 1);
    client.load().await.unwrap();

    assert_eq!(server_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client_calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.state().leaf().unwrap().data(), Some(json!({"title": "hi"})));
    assert!(!client.state().leaf().unwrap().hydrated);
}

#[tokio::test(start_paused = true)]
async fn test_pending_window_and_minimum() {
    let tree = RouteDef::root().with_child(RouteDef::new("report").with_hooks(RouteHooks::new().loader(|_| async {
        tokio::time::sleep(Duration::from_millis(1100)).await;
        Ok(json!("done"))
    })));
    let router = router_at(tree, "/report");

    let flagged = Arc::new(Mutex::new(false));
    let seen = Arc::clone(&flagged);
    router.subscribe(move |state| {
        if state.pending_matches.iter().any(|m| m.pending_visible) {
            *seen.lock() = true;
        }
    });

    let started = tokio::time::Instant::now();
    router.load().await.unwrap();

    assert!(*flagged.lock());
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert!(!router.state().leaf().unwrap().pending_visible);
}

#[tokio::test]
async fn test_subscribers_see_pending_then_idle() {
    let tree = RouteDef::root().with_child(RouteDef::new("a"));
    let router = router_at(tree, "/a");
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&statuses);
    let id = router.subscribe(move |state| seen.lock().push(state.status));

    router.load().await.unwrap();
    assert!(router.unsubscribe(id));

    // settled matches publish extra pending states
    let mut statuses = statuses.lock().clone();
    statuses.dedup();
    assert_eq!(
        statuses,
        vec![RouterStatus::Pending, RouterStatus::Committing, RouterStatus::Idle]
    );
}

#[rstest]
#[case("/posts/$postId", false, true)]
#[case("/POSTS/$postId", false, true)]
#[case("/posts", false, false)]
#[case("/posts", true, true)]
#[case("/users/$id", true, false)]
#[tokio::test]
async fn test_match_route_against_committed_location(#[case] pattern: &str, #[case] fuzzy: bool, #[case] expected: bool) {
    let tree = RouteDef::root().with_child(RouteDef::new("posts").with_child(RouteDef::new("$postId")));
    let router = router_at(tree, "/posts/7?tab=comments");
    router.load().await.unwrap();

    let options = MatchRouteOptions {
        fuzzy,
        ..Default::default()
    };
    assert_eq!(router.match_route(pattern, options).is_some(), expected);
}

#[tokio::test]
async fn test_match_route_requires_included_search() {
    let tree = RouteDef::root().with_child(RouteDef::new("posts/$postId"));
    let router = router_at(tree, "/posts/7?tab=comments");
    router.load().await.unwrap();

    let mut search = serde_json::Map::new();
    search.insert("tab".into(), json!("comments"));
    let options = MatchRouteOptions {
        include_search: Some(search.clone()),
        ..Default::default()
    };
    assert_eq!(router.match_route("/posts/$postId", options).unwrap()["postId"], "7");

    search.insert("tab".into(), json!("likes"));
    let options = MatchRouteOptions {
        include_search: Some(search),
        ..Default::default()
    };
    assert!(router.match_route("/posts/$postId", options).is_none());
}
