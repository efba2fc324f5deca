// File: src/config.rs
// Purpose: Router runtime configuration and waypoint.toml parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use waypoint_router::{ResolveOptions, TrailingSlash};

/// Router runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// How long a loaded match stays fresh for navigations
    pub default_stale_time: Duration,

    /// How long a loaded match stays fresh for preloads
    pub default_preload_stale_time: Duration,

    /// How long an inactive match stays in the cache
    pub default_gc_time: Duration,

    /// How long an unused preloaded match stays in the cache
    pub default_preload_gc_time: Duration,

    /// Delay before a slow load is flagged as visibly pending
    pub default_pending_ms: Duration,

    /// Minimum time a visibly pending load stays pending
    pub default_pending_min_ms: Duration,

    pub case_sensitive: bool,

    pub trailing_slash: TrailingSlash,

    /// Redirects followed by one navigation before giving up
    pub max_redirects: usize,

    /// Prefix stripped from every history href (e.g. "/app")
    pub base_path: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_stale_time: Duration::ZERO,
            default_preload_stale_time: Duration::from_millis(default_preload_stale_time()),
            default_gc_time: Duration::from_millis(default_gc_time()),
            default_preload_gc_time: Duration::from_millis(default_gc_time()),
            default_pending_ms: Duration::from_millis(default_pending_ms()),
            default_pending_min_ms: Duration::from_millis(default_pending_min_ms()),
            case_sensitive: false,
            trailing_slash: TrailingSlash::Never,
            max_redirects: default_max_redirects(),
            base_path: default_base_path(),
        }
    }
}

impl RouterConfig {
    /// Options handed to the synchronous resolver
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            case_sensitive: self.case_sensitive,
            trailing_slash: self.trailing_slash,
        }
    }
}

/// `[router]` table of waypoint.toml, times in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouterTomlConfig {
    #[serde(default)]
    pub default_stale_time: u64,

    #[serde(default = "default_preload_stale_time")]
    pub default_preload_stale_time: u64,

    #[serde(default = "default_gc_time")]
    pub default_gc_time: u64,

    #[serde(default = "default_gc_time")]
    pub default_preload_gc_time: u64,

    #[serde(default = "default_pending_ms")]
    pub default_pending_ms: u64,

    #[serde(default = "default_pending_min_ms")]
    pub default_pending_min_ms: u64,

    #[serde(default)]
    pub case_sensitive: bool,

    #[serde(default)]
    pub trailing_slash: TrailingSlash,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_base_path")]
    pub base_path: String,
}

/// Whole waypoint.toml file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WaypointToml {
    #[serde(default)]
    pub router: RouterTomlConfig,
}

// Default values
fn default_preload_stale_time() -> u64 {
    30_000
}

fn default_gc_time() -> u64 {
    30 * 60 * 1000
}

fn default_pending_ms() -> u64 {
    1000
}

fn default_pending_min_ms() -> u64 {
    500
}

fn default_max_redirects() -> usize {
    10
}

fn default_base_path() -> String {
    "/".to_string()
}

impl Default for RouterTomlConfig {
    fn default() -> Self {
        Self {
            default_stale_time: 0,
            default_preload_stale_time: default_preload_stale_time(),
            default_gc_time: default_gc_time(),
            default_preload_gc_time: default_gc_time(),
            default_pending_ms: default_pending_ms(),
            default_pending_min_ms: default_pending_min_ms(),
            case_sensitive: false,
            trailing_slash: TrailingSlash::default(),
            max_redirects: default_max_redirects(),
            base_path: default_base_path(),
        }
    }
}

impl RouterTomlConfig {
    /// Convert TOML config to runtime config
    pub fn to_runtime_config(&self) -> Result<RouterConfig> {
        if !self.base_path.starts_with('/') {
            anyhow::bail!("base_path must start with '/', got {:?}", self.base_path);
        }

        Ok(RouterConfig {
            default_stale_time: Duration::from_millis(self.default_stale_time),
            default_preload_stale_time: Duration::from_millis(self.default_preload_stale_time),
            default_gc_time: Duration::from_millis(self.default_gc_time),
            default_preload_gc_time: Duration::from_millis(self.default_preload_gc_time),
            default_pending_ms: Duration::from_millis(self.default_pending_ms),
            default_pending_min_ms: Duration::from_millis(self.default_pending_min_ms),
            case_sensitive: self.case_sensitive,
            trailing_slash: self.trailing_slash,
            max_redirects: self.max_redirects,
            base_path: self.base_path.clone(),
        })
    }
}

impl WaypointToml {
    /// Load configuration from waypoint.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: WaypointToml = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./waypoint.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("waypoint.toml")
    }
}
