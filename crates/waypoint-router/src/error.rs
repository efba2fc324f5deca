//! Error types for pattern interpolation, tree registration and resolution

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a pathname from a pattern
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("missing required param `{param}` while interpolating `{pattern}`")]
    MissingParam { param: String, pattern: String },

    #[error("no route with id `{0}`")]
    UnknownRoute(String),
}

/// Fatal route tree misconfiguration, raised when the tree is registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("duplicate routes found with id `{0}`")]
    DuplicateId(String),

    #[error("route under `{parent}` declares neither a path nor an id")]
    MissingPath { parent: String },

    #[error("only the tree root may be a root route (found one under `{parent}`)")]
    NestedRoot { parent: String },

    #[error("the tree must be registered from a root route, got `{0}`")]
    NotARoot(String),
}

/// Per-match error captured during resolution
///
/// These never abort resolution of sibling or ancestor matches; the
/// affected match carries them and surfaces them through its error boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MatchError {
    #[error("invalid path params for `{route_id}`: {message}")]
    PathParam { route_id: String, message: String },

    #[error("search validation failed for `{route_id}`: {message}")]
    SearchValidation { route_id: String, message: String },
}

impl MatchError {
    /// Id of the route whose validation failed
    pub fn route_id(&self) -> &str {
        match self {
            MatchError::PathParam { route_id, .. } | MatchError::SearchValidation { route_id, .. } => route_id,
        }
    }
}
