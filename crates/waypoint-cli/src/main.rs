mod commands;
mod manifest;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(version, about = "Waypoint CLI - inspect route trees, resolve hrefs and build paths", long_about = None)]
struct Cli {
    /// Print debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the routes of a manifest
    Routes {
        /// Route manifest (TOML)
        #[arg(default_value = "routes.toml")]
        manifest: PathBuf,

        /// Show the declaration tree instead of the matching order
        #[arg(short, long)]
        tree: bool,
    },

    /// Resolve an href into its chain of matched routes
    Match {
        /// Route manifest (TOML)
        manifest: PathBuf,

        /// Href to resolve, e.g. "/posts/42?page=2"
        href: String,

        /// Router config (defaults to ./waypoint.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Build a pathname from a route pattern
    Interpolate {
        /// Route pattern, e.g. "/posts/$postId"
        pattern: String,

        /// Params as key=value
        params: Vec<String>,

        /// Keep `$name` placeholders next to their values
        #[arg(long)]
        leave_params: bool,

        /// Keep wildcard placeholders next to their values
        #[arg(long)]
        leave_wildcards: bool,
    },
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Execute command
    match cli.command {
        Commands::Routes { manifest, tree } => {
            commands::routes::execute(&manifest, tree)?;
        }
        Commands::Match { manifest, href, config } => {
            commands::resolve::execute(&manifest, &href, config.as_deref())?;
        }
        Commands::Interpolate {
            pattern,
            params,
            leave_params,
            leave_wildcards,
        } => {
            commands::interpolate::execute(&pattern, &params, leave_params, leave_wildcards)?;
        }
    }

    Ok(())
}
