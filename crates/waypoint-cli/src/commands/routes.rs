use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use waypoint_router::{NodeId, RouteTree};

use crate::manifest::RouteManifest;

pub fn execute(manifest: &Path, as_tree: bool) -> Result<()> {
    let tree = RouteManifest::from_file(manifest)?.to_tree()?;

    println!("{}", format!("Routes in {}", manifest.display()).green().bold());
    println!();

    if as_tree {
        print_node(&tree, tree.root().node_id, 0);
    } else {
        // Matching order, most specific first
        for (rank, node) in tree.flat().enumerate() {
            println!("{:>4}  {}  {}", rank, node.full_path.cyan(), node.id.dimmed());
        }
    }

    println!();
    println!("Total: {} routes", tree.len().to_string().cyan());
    Ok(())
}

fn print_node(tree: &RouteTree, node_id: NodeId, indent: usize) {
    let Some(node) = tree.node(node_id) else {
        return;
    };

    let label = match &node.path {
        _ if node.is_root() => "(root)".to_string(),
        Some(path) => path.clone(),
        None => format!("({})", node.id),
    };

    let mut flags = Vec::new();
    if node.options.not_found_boundary {
        flags.push("not-found boundary");
    }
    if node.options.allow_empty_splat {
        flags.push("empty splat");
    }
    if node.options.case_sensitive == Some(true) {
        flags.push("case sensitive");
    }

    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };

    println!(
        "{}{}  {}{}",
        "  ".repeat(indent),
        label.cyan(),
        node.full_path.dimmed(),
        flags.yellow()
    );

    for child in &node.children {
        print_node(tree, *child, indent + 1);
    }
}
