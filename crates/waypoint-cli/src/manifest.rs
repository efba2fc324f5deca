use serde::{Deserialize, Serialize};
use waypoint_router::{RouteDef, RouteTree};

/// Route manifest structure (routes.toml)
///
/// ```toml
/// [[routes]]
/// path = "/"
///
/// [[routes]]
/// path = "posts"
/// not_found_boundary = true
///
///   [[routes.children]]
///   path = "$postId"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteManifest {
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Path relative to the parent; omit for a pathless layout
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
    #[serde(default)]
    pub not_found_boundary: bool,
    #[serde(default)]
    pub allow_empty_splat: bool,
    #[serde(default)]
    pub children: Vec<RouteEntry>,
}

impl RouteManifest {
    /// Parse route manifest from TOML string
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load route manifest from file
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&content)?)
    }

    /// Registers the manifest under a root route
    pub fn to_tree(&self) -> anyhow::Result<RouteTree> {
        let root = RouteDef::root().with_children(self.routes.iter().map(RouteEntry::to_def).collect());
        Ok(RouteTree::build(root)?)
    }
}

impl RouteEntry {
    pub fn to_def(&self) -> RouteDef {
        let mut def = match (&self.path, &self.id) {
            (Some(path), Some(id)) => RouteDef::new(path).with_id(id),
            (Some(path), None) => RouteDef::new(path),
            (None, Some(id)) => RouteDef::pathless(id),
            // Rejected by the tree builder with a MissingPath error
            (None, None) => RouteDef::default(),
        };

        if let Some(case_sensitive) = self.case_sensitive {
            def = def.case_sensitive(case_sensitive);
        }
        if self.not_found_boundary {
            def = def.with_not_found_boundary();
        }
        if self.allow_empty_splat {
            def = def.allow_empty_splat();
        }

        def.with_children(self.children.iter().map(RouteEntry::to_def).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
[[routes]]
path = "/"

[[routes]]
path = "posts"
not_found_boundary = true

  [[routes.children]]
  path = "/"

  [[routes.children]]
  path = "$postId"

[[routes]]
id = "_auth"

  [[routes.children]]
  path = "settings"
  case_sensitive = true
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = RouteManifest::from_str(MANIFEST).unwrap();
        assert_eq!(manifest.routes.len(), 3);
        assert!(manifest.routes[1].not_found_boundary);
        assert_eq!(manifest.routes[1].children.len(), 2);
        assert_eq!(manifest.routes[2].id.as_deref(), Some("_auth"));
        assert_eq!(manifest.routes[2].children[0].case_sensitive, Some(true));
    }

    #[test]
    fn test_manifest_to_tree() {
        let tree = RouteManifest::from_str(MANIFEST).unwrap().to_tree().unwrap();

        let posts = tree.get("/posts").unwrap();
        assert!(posts.options.not_found_boundary);
        assert_eq!(tree.get("/posts/$postId").unwrap().full_path, "/posts/$postId");
        assert_eq!(tree.get("/_auth/settings").unwrap().full_path, "/settings");
        assert_eq!(tree.get("/_auth/settings").unwrap().options.case_sensitive, Some(true));
    }

    #[test]
    fn test_entry_without_path_or_id_is_rejected() {
        let manifest = RouteManifest::from_str("[[routes]]\nnot_found_boundary = true\n").unwrap();
        assert!(manifest.to_tree().is_err());
    }
}
