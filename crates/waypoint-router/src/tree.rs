//! Route declarations and the flattened route tree index
//!
//! A [`RouteDef`] tree is declared once and registered with
//! [`RouteTree::build`], which assigns ids, resolves full paths, compiles
//! patterns and ranks every path-bearing route by specificity. The index is
//! immutable: a changed declaration means building a new tree.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TreeError;
use crate::matcher::Params;
use crate::path::{join_paths, trim_path, trim_path_right};
use crate::route::RoutePattern;
use crate::search::{SearchMap, SearchMiddleware, SearchValidator};

/// Id of the tree root
pub const ROOT_ROUTE_ID: &str = "__root__";

/// Index of a node in the tree's arena
pub type NodeId = usize;

// ============================================================================
// Route Options
// ============================================================================

/// Type-keyed bag of opaque per-route values
///
/// Matching and resolution never look inside; higher layers (data loading,
/// rendering bindings) store and fetch their own option types here.
#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions").field("len", &self.map.len()).finish()
    }
}

/// Parses or validates the params of one route
pub trait ParamsParser: Send + Sync {
    fn parse(&self, params: &Params) -> Result<Params, String>;
}

impl<F> ParamsParser for F
where
    F: Fn(&Params) -> Result<Params, String> + Send + Sync,
{
    fn parse(&self, params: &Params) -> Result<Params, String> {
        self(params)
    }
}

/// Derives the loader dependencies of a route from its validated search
///
/// The JSON encoding of the returned value becomes part of the match id, so
/// two locations with different deps never share a cached match.
pub trait LoaderDeps: Send + Sync {
    fn deps(&self, search: &SearchMap) -> Value;
}

impl<F> LoaderDeps for F
where
    F: Fn(&SearchMap) -> Value + Send + Sync,
{
    fn deps(&self, search: &SearchMap) -> Value {
        self(search)
    }
}

/// Structural options read by the matcher and resolver
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Overrides the tree-wide case sensitivity
    pub case_sensitive: Option<bool>,
    /// Lets this route's wildcard match an empty remainder
    pub allow_empty_splat: bool,
    /// This route renders not-found states for its subtree
    pub not_found_boundary: bool,
    pub validate_search: Option<Arc<dyn SearchValidator>>,
    pub parse_params: Option<Arc<dyn ParamsParser>>,
    pub loader_deps: Option<Arc<dyn LoaderDeps>>,
    pub search_middlewares: Vec<SearchMiddleware>,
    pub extensions: Extensions,
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("case_sensitive", &self.case_sensitive)
            .field("allow_empty_splat", &self.allow_empty_splat)
            .field("not_found_boundary", &self.not_found_boundary)
            .field("validate_search", &self.validate_search.is_some())
            .field("parse_params", &self.parse_params.is_some())
            .field("loader_deps", &self.loader_deps.is_some())
            .field("search_middlewares", &self.search_middlewares)
            .field("extensions", &self.extensions)
            .finish()
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// A declared route and its children
///
/// # Examples
///
/// ```
/// use waypoint_router::{RouteDef, RouteTree};
///
/// let tree = RouteTree::build(
///     RouteDef::root().with_children(vec![
///         RouteDef::new("/"),
///         RouteDef::new("posts").with_children(vec![
///             RouteDef::new("/"),
///             RouteDef::new("$postId"),
///         ]),
///     ]),
/// )
/// .unwrap();
///
/// assert_eq!(tree.get("/posts/$postId").unwrap().full_path, "/posts/$postId");
/// assert_eq!(tree.get("/posts/").unwrap().full_path, "/posts/");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteDef {
    path: Option<String>,
    id: Option<String>,
    is_root: bool,
    children: Vec<RouteDef>,
    options: RouteOptions,
}

impl RouteDef {
    /// The tree root
    pub fn root() -> Self {
        Self {
            is_root: true,
            ..Default::default()
        }
    }

    /// A route matching `path` relative to its parent
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// A layout route that consumes no path
    pub fn pathless(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_children(mut self, children: Vec<RouteDef>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_child(mut self, child: RouteDef) -> Self {
        self.children.push(child);
        self
    }

    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.options.case_sensitive = Some(value);
        self
    }

    pub fn allow_empty_splat(mut self) -> Self {
        self.options.allow_empty_splat = true;
        self
    }

    pub fn with_not_found_boundary(mut self) -> Self {
        self.options.not_found_boundary = true;
        self
    }

    pub fn with_validate_search(mut self, validator: impl SearchValidator + 'static) -> Self {
        self.options.validate_search = Some(Arc::new(validator));
        self
    }

    pub fn with_parse_params(mut self, parser: impl ParamsParser + 'static) -> Self {
        self.options.parse_params = Some(Arc::new(parser));
        self
    }

    pub fn with_loader_deps(mut self, deps: impl LoaderDeps + 'static) -> Self {
        self.options.loader_deps = Some(Arc::new(deps));
        self
    }

    pub fn with_search_middleware(mut self, middleware: SearchMiddleware) -> Self {
        self.options.search_middlewares.push(middleware);
        self
    }

    /// Attaches an opaque option value
    pub fn with_extension<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.options.extensions.insert(value);
        self
    }

    pub fn options_mut(&mut self) -> &mut RouteOptions {
        &mut self.options
    }
}

// ============================================================================
// Index
// ============================================================================

/// A registered route
#[derive(Debug, Clone)]
pub struct RouteNode {
    pub node_id: NodeId,
    pub id: String,
    /// Own path, trimmed (`/` for index routes, `None` for pathless layouts)
    pub path: Option<String>,
    pub full_path: String,
    pub pattern: RoutePattern,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    /// Position in the ranked candidate list, if the route has a path
    pub rank: Option<usize>,
    pub options: RouteOptions,
}

impl RouteNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_pathless(&self) -> bool {
        self.path.is_none()
    }

    /// Fetches an opaque option value
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.options.extensions.get::<T>()
    }
}

/// Flattened, ranked route tree
#[derive(Debug, Clone)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
    by_id: HashMap<String, NodeId>,
    by_path: HashMap<String, NodeId>,
    flat: Vec<NodeId>,
}

impl RouteTree {
    /// Registers a route tree
    ///
    /// Misconfiguration is fatal and reported here, never at navigation time.
    pub fn build(root: RouteDef) -> Result<Self, TreeError> {
        if !root.is_root {
            return Err(TreeError::NotARoot(
                root.id.or(root.path).unwrap_or_default(),
            ));
        }

        let mut tree = Self {
            nodes: Vec::new(),
            by_id: HashMap::new(),
            by_path: HashMap::new(),
            flat: Vec::new(),
        };

        let root_id = tree.push_node(RouteNode {
            node_id: 0,
            id: ROOT_ROUTE_ID.to_string(),
            path: Some("/".to_string()),
            full_path: "/".to_string(),
            pattern: RoutePattern::compile("/"),
            parent: None,
            children: Vec::new(),
            depth: 0,
            rank: None,
            options: root.options,
        })?;

        tree.register_children(root_id, root.children)?;
        tree.rank_routes();

        tracing::debug!(
            routes = tree.nodes.len(),
            ranked = tree.flat.len(),
            "route tree built"
        );
        Ok(tree)
    }

    fn push_node(&mut self, mut node: RouteNode) -> Result<NodeId, TreeError> {
        if self.by_id.contains_key(&node.id) {
            return Err(TreeError::DuplicateId(node.id));
        }
        let node_id = self.nodes.len();
        node.node_id = node_id;
        self.by_id.insert(node.id.clone(), node_id);

        if !node.is_root() && node.path.is_some() {
            let key = trim_path_right(&node.full_path).to_string();
            if !self.by_path.contains_key(&key) || node.full_path.ends_with('/') {
                self.by_path.insert(key, node_id);
            }
        }

        self.nodes.push(node);
        Ok(node_id)
    }

    fn register_children(&mut self, parent_id: NodeId, children: Vec<RouteDef>) -> Result<(), TreeError> {
        for child in children {
            let parent = &self.nodes[parent_id];

            if child.is_root {
                return Err(TreeError::NestedRoot {
                    parent: parent.id.clone(),
                });
            }

            let path = child.path.as_deref().map(|p| {
                if p == "/" {
                    p.to_string()
                } else {
                    trim_path(p).to_string()
                }
            });

            let custom_id = match (child.id.as_deref(), path.as_deref()) {
                (Some(id), _) => trim_path(id).to_string(),
                (None, Some(path)) => path.to_string(),
                (None, None) => {
                    return Err(TreeError::MissingPath {
                        parent: parent.id.clone(),
                    })
                }
            };

            let parent_prefix = if parent.is_root() { "" } else { parent.id.as_str() };
            let id = join_paths(&["/", parent_prefix, custom_id.as_str()]);

            let full_path = match path.as_deref() {
                Some(path) => join_paths(&[parent.full_path.as_str(), path]),
                None => parent.full_path.clone(),
            };

            let node = RouteNode {
                node_id: 0,
                id,
                pattern: RoutePattern::compile(&full_path),
                path,
                full_path,
                parent: Some(parent_id),
                children: Vec::new(),
                depth: parent.depth + 1,
                rank: None,
                options: child.options,
            };

            let node_id = self.push_node(node)?;
            self.nodes[parent_id].children.push(node_id);
            self.register_children(node_id, child.children)?;
        }
        Ok(())
    }

    fn rank_routes(&mut self) {
        let mut ranked: Vec<(NodeId, _)> = self
            .nodes
            .iter()
            .filter(|node| !node.is_root() && !node.is_pathless())
            .map(|node| (node.node_id, node.pattern.rank_key()))
            .collect();

        ranked.sort_by(|(a_id, a_key), (b_id, b_key)| match a_key.compare(b_key) {
            Ordering::Equal => a_id.cmp(b_id),
            other => other,
        });

        self.flat = ranked.into_iter().map(|(node_id, _)| node_id).collect();
        for (rank, node_id) in self.flat.iter().enumerate() {
            self.nodes[*node_id].rank = Some(rank);
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn root(&self) -> &RouteNode {
        &self.nodes[0]
    }

    /// Looks up a route by id
    pub fn get(&self, id: &str) -> Option<&RouteNode> {
        self.by_id.get(id).map(|node_id| &self.nodes[*node_id])
    }

    pub fn node(&self, node_id: NodeId) -> Option<&RouteNode> {
        self.nodes.get(node_id)
    }

    /// Looks up a route by full path (trailing slash ignored; index routes win)
    pub fn get_by_path(&self, path: &str) -> Option<&RouteNode> {
        self.by_path
            .get(trim_path_right(path))
            .map(|node_id| &self.nodes[*node_id])
    }

    /// Path-bearing routes in match order
    pub fn flat(&self) -> impl Iterator<Item = &RouteNode> + '_ {
        self.flat.iter().map(move |node_id| &self.nodes[*node_id])
    }

    /// All routes in declaration (depth-first) order
    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    /// The chain from the root down to `node_id`, inclusive
    pub fn ancestors(&self, node_id: NodeId) -> Vec<&RouteNode> {
        let mut chain: Vec<&RouteNode> =
            std::iter::successors(self.nodes.get(node_id), |node| {
                node.parent.and_then(|parent| self.nodes.get(parent))
            })
            .collect();
        chain.reverse();
        chain
    }

    /// Parent of a route, if any
    pub fn parent_of(&self, node: &RouteNode) -> Option<&RouteNode> {
        node.parent.and_then(|parent| self.nodes.get(parent))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
