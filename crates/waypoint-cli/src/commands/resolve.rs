use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use waypoint_nav::WaypointToml;
use waypoint_router::{location::strip_base_path, parse_href, resolve};

use crate::manifest::RouteManifest;

pub fn execute(manifest: &Path, href: &str, config: Option<&Path>) -> Result<()> {
    let tree = RouteManifest::from_file(manifest)?.to_tree()?;
    let toml = match config {
        Some(path) => WaypointToml::load(path)?,
        None => WaypointToml::load_default()?,
    };
    let config = toml.router.to_runtime_config()?;

    let mut location = parse_href(href, None);
    location.pathname = strip_base_path(&location.pathname, &config.base_path).to_string();
    tracing::debug!("Resolving {} against {} routes", location.pathname, tree.len());

    let resolution = resolve(&tree, &location, &config.resolve_options());

    println!("{}", format!("Resolving {}", href).green().bold());
    println!();

    for resolved in &resolution.matches {
        println!("{}  {}", resolved.route_id.cyan(), resolved.pathname.dimmed());
        for (name, value) in &resolved.params {
            println!("    {} = {}", name, value);
        }
        if let Some(error) = resolved.error() {
            println!("    {} {}", "error:".red(), error);
        }
    }

    if !location.search_map().is_empty() {
        println!();
        println!("Search: {}", serde_json::to_string(&location.search_map())?);
    }

    println!();
    match &resolution.not_found {
        Some(not_found) => {
            println!(
                "{} handled by {} (unmatched: {})",
                "✗ Not found,".red().bold(),
                not_found.route_id.cyan(),
                not_found.leftover
            );
        }
        None => {
            let leaf = resolution.leaf().map(|m| m.route_id.as_str()).unwrap_or_default();
            println!("{} {}", "✓ Matched".green().bold(), leaf.cyan());
        }
    }

    Ok(())
}
