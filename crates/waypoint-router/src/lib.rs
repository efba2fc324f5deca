//! # Waypoint Router
//!
//! The synchronous core of the Waypoint navigation engine:
//! - Path patterns with params (`$id`), optional params (`{-$lang}`),
//!   prefixed/suffixed params (`file-{$name}.txt`) and wildcards (`$`)
//! - A ranked route tree index built once at registration
//! - Location parsing, building and JSON-typed search params
//! - Resolution of a location into its chain of route matches
//! - Structural sharing of JSON-shaped values between snapshots
//!
//! Everything here is a pure function of its inputs; data loading and
//! navigation state live in `waypoint-nav`.
//!
//! ## Example
//!
//! ```
//! use waypoint_router::{parse_href, resolve, ResolveOptions, RouteDef, RouteTree};
//!
//! let tree = RouteTree::build(RouteDef::root().with_children(vec![
//!     RouteDef::new("/"),
//!     RouteDef::new("posts").with_children(vec![
//!         RouteDef::new("/"),
//!         RouteDef::new("{-$category}/$postId"),
//!     ]),
//! ]))
//! .unwrap();
//!
//! let resolution = resolve(&tree, &parse_href("/posts/42", None), &ResolveOptions::default());
//! let leaf = resolution.leaf().unwrap();
//! assert_eq!(leaf.route_id, "/posts/{-$category}/$postId");
//! assert_eq!(leaf.params.get("postId").unwrap(), "42");
//! assert_eq!(leaf.params.get("category"), None);
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod encoding;
pub mod error;
pub mod location;
pub mod matcher;
pub mod path;
pub mod resolver;
pub mod route;
pub mod search;
pub mod sharing;
pub mod tree;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{MatchError, PathError, TreeError};
pub use location::{
    build_location, parse_href, BuildLocationOptions, HistoryState, ParamsUpdate, ParsedLocation, SearchUpdate,
};
pub use matcher::{
    interpolate_path, match_pathname, InterpolateOptions, Interpolated, MatchOptions, Params, FUZZY_KEY,
    LEGACY_SPLAT_KEY, SPLAT_KEY,
};
pub use path::TrailingSlash;
pub use resolver::{find_route, resolve, NotFoundMatch, Resolution, ResolveOptions, ResolvedMatch};
pub use route::{RoutePattern, Segment, SegmentKind};
pub use search::{parse_search, stringify_search, SearchMap, SearchMiddleware, SearchValidator};
pub use sharing::{replace_equal_deep, Shared};
pub use tree::{LoaderDeps, NodeId, ParamsParser, RouteDef, RouteNode, RouteOptions, RouteTree, ROOT_ROUTE_ID};
