//! # Waypoint Nav
//!
//! The asynchronous half of the Waypoint navigation engine, built on top of
//! `waypoint-router`:
//! - Per-route data hooks (route context, `before_load`, `loader`)
//! - A load pipeline with a serial context stage, concurrent loaders,
//!   stale-while-revalidate caching and in-flight deduplication
//! - A navigation state machine with supersession, redirects, not-found
//!   boundaries and an observable state store
//! - History adapters, deferred loader values and server to client hydration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use waypoint_nav::{MemoryHistory, NavigateOptions, RouteDefExt, RouteHooks, Router, RouterConfig, WaypointToml};
//! use waypoint_router::{RouteDef, RouteTree};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = WaypointToml::load_default()?.router.to_runtime_config()?;
//!
//! let tree = RouteTree::build(RouteDef::root().with_children(vec![
//!     RouteDef::new("/"),
//!     RouteDef::new("users/$userId").with_hooks(
//!         RouteHooks::new().loader(|args| async move { Ok(json!({ "user": args.params["userId"] })) }),
//!     ),
//! ]))?;
//!
//! let router = Router::new(tree, Arc::new(MemoryHistory::new("/")), config);
//! router.mount();
//! router.load().await?;
//! router.navigate(NavigateOptions::to("/users/7")).await?;
//!
//! let state = router.state();
//! assert_eq!(state.leaf().and_then(|m| m.data()), Some(json!({ "user": "7" })));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
pub mod deferred;
pub mod error;
pub mod history;
pub mod hooks;
pub mod hydration;
pub mod matches;
pub mod pipeline;
pub mod router;
pub mod store;
pub mod transformer;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{RouterConfig, RouterTomlConfig, WaypointToml};
pub use deferred::{DeferredError, DeferredHandle, DeferredState, DeferredValue, StreamHandle, StreamState};
pub use error::{HydrationError, NavError, NotFound, Redirect, RouteSignal};
pub use history::{History, HistoryAction, HistoryListener, HistoryLocation, MemoryHistory};
pub use hooks::{
    AbortSignal, BeforeLoadArgs, BoxFuture, ContextArgs, HookResult, LoaderArgs, ParentMatch, RouteDefExt, RouteHooks,
};
pub use hydration::{HydrationChannel, HydrationEntry};
pub use matches::{is_expired, FetchState, LoadCause, MatchStatus, RouteMatch};
pub use pipeline::{LoaderRegistry, MatchEvent, MatchEventHandler};
pub use router::{MatchRouteOptions, NavigateOptions, Router, RouterState, RouterStatus};
pub use store::{Store, SubscriptionId};
pub use transformer::{JsonTransformer, Transformer};
