//! Hook signals and navigation errors

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use waypoint_router::{Params, PathError, SearchMap};

/// Instruction to navigate elsewhere instead of finishing the current load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub to: String,
    #[serde(default)]
    pub params: Option<Params>,
    #[serde(default)]
    pub search: Option<SearchMap>,
    #[serde(default)]
    pub hash: Option<String>,
    /// Replace the current history entry (default) instead of pushing
    #[serde(default = "default_replace")]
    pub replace: bool,
    /// Status code reported for server renders
    #[serde(default = "default_status")]
    pub status_code: u16,
}

fn default_replace() -> bool {
    true
}

fn default_status() -> u16 {
    307
}

impl Redirect {
    pub fn to(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            params: None,
            search: None,
            hash: None,
            replace: default_replace(),
            status_code: default_status(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_search(mut self, search: SearchMap) -> Self {
        self.search = Some(search);
        self
    }

    pub fn push(mut self) -> Self {
        self.replace = false;
        self
    }
}

/// Instruction to render a not-found state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFound {
    /// Route whose boundary should handle it; defaults to the originating route
    pub route_id: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// Raised because no route matched the pathname
    #[serde(default)]
    pub global: bool,
}

impl NotFound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_route(route_id: impl Into<String>) -> Self {
        Self {
            route_id: Some(route_id.into()),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Outcome of a failed hook: a redirect, a not-found, or an ordinary error
#[derive(Clone)]
pub enum RouteSignal {
    Redirect(Redirect),
    NotFound(NotFound),
    Error(Arc<anyhow::Error>),
}

impl RouteSignal {
    pub fn error(error: impl Into<anyhow::Error>) -> Self {
        RouteSignal::Error(Arc::new(error.into()))
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        RouteSignal::Redirect(Redirect::to(to))
    }

    pub fn not_found() -> Self {
        RouteSignal::NotFound(NotFound::new())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, RouteSignal::Redirect(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RouteSignal::NotFound(_))
    }

    /// Human readable description
    pub fn message(&self) -> String {
        match self {
            RouteSignal::Redirect(redirect) => format!("redirect to {}", redirect.to),
            RouteSignal::NotFound(not_found) => match &not_found.route_id {
                Some(route_id) => format!("not found (handled by {route_id})"),
                None => "not found".to_string(),
            },
            RouteSignal::Error(error) => format!("{error:#}"),
        }
    }
}

impl fmt::Debug for RouteSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSignal::Redirect(redirect) => f.debug_tuple("Redirect").field(redirect).finish(),
            RouteSignal::NotFound(not_found) => f.debug_tuple("NotFound").field(not_found).finish(),
            RouteSignal::Error(error) => f.debug_tuple("Error").field(&format_args!("{error:#}")).finish(),
        }
    }
}

impl fmt::Display for RouteSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<anyhow::Error> for RouteSignal {
    fn from(error: anyhow::Error) -> Self {
        RouteSignal::Error(Arc::new(error))
    }
}

impl From<Redirect> for RouteSignal {
    fn from(redirect: Redirect) -> Self {
        RouteSignal::Redirect(redirect)
    }
}

impl From<NotFound> for RouteSignal {
    fn from(not_found: NotFound) -> Self {
        RouteSignal::NotFound(not_found)
    }
}

/// Errors surfaced by router operations
#[derive(Debug, Error)]
pub enum NavError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("navigation exceeded {limit} redirects (last target `{last}`)")]
    TooManyRedirects { limit: usize, last: String },

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error("transformer failed: {0:#}")]
    Transform(anyhow::Error),
}

/// Misuse of the hydration channel lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    #[error("hydration channel is already initialized")]
    AlreadyInitialized,

    #[error("hydration channel was used before init")]
    NotInitialized,

    #[error("hydration channel was torn down")]
    TornDown,
}
