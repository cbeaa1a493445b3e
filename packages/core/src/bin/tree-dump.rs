//! Partial tree dump
//!
//! Loads a JSON store snapshot into a `MemoryStore`, marks a partial tree
//! below one root and prints it, either as nested JSON entries or as an
//! indented outline.
//!
//! # Usage
//!
//! ```bash
//! HIERARCHY_SNAPSHOT=./site.json cargo run --bin tree-dump -- 1
//! HIERARCHY_SNAPSHOT=./site.json cargo run --bin tree-dump -- 1 --outline --threshold 0
//! ```
//!
//! # Environment
//!
//! - `HIERARCHY_SNAPSHOT` - snapshot file (`{"draft": [...], "live": [...]}`), required
//! - `HIERARCHY_CONFIG` - optional `HierarchyConfig` JSON file
//! - `RUST_LOG` - log filter, defaults to `info`
//!
//! # Arguments
//!
//! `<root-id> [--outline] [--threshold N] [--expose ID]...`

use anyhow::{anyhow, bail, Context};
use nodespace_hierarchy::db::MemoryStore;
use nodespace_hierarchy::services::{HierarchyService, OutlineFormatter, RenderOptions};
use nodespace_hierarchy::{HierarchyConfig, NodeId};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    root: u64,
    outline: bool,
    threshold: Option<usize>,
    expose: Vec<u64>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut root = None;
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--outline" => args.outline = true,
            "--threshold" => {
                let value = iter.next().ok_or_else(|| anyhow!("--threshold needs a value"))?;
                args.threshold = Some(value.parse().context("--threshold must be a number")?);
            }
            "--expose" => {
                let value = iter.next().ok_or_else(|| anyhow!("--expose needs a node id"))?;
                args.expose.push(value.parse().context("--expose must be a node id")?);
            }
            other if root.is_none() => {
                root = Some(other.parse().context("root id must be a number")?);
            }
            other => bail!("unexpected argument: {}", other),
        }
    }

    args.root = root.ok_or_else(|| anyhow!("usage: tree-dump <root-id> [--outline] [--threshold N] [--expose ID]..."))?;
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    let config = match std::env::var("HIERARCHY_CONFIG") {
        Ok(path) => HierarchyConfig::load(&path)?,
        Err(_) => HierarchyConfig::default(),
    };
    let snapshot_path =
        std::env::var("HIERARCHY_SNAPSHOT").context("HIERARCHY_SNAPSHOT is not set")?;

    let store = Arc::new(
        MemoryStore::load_snapshot(&snapshot_path)
            .with_context(|| format!("Failed to load snapshot {}", snapshot_path))?,
    );
    tracing::info!("Loaded snapshot from {}", snapshot_path);

    let service = HierarchyService::with_config(store, config);
    let root = service
        .get_node(NodeId(args.root))
        .await?
        .ok_or_else(|| anyhow!("Node {} not found", args.root))?;

    for id in &args.expose {
        match service.get_node(NodeId(*id)).await? {
            Some(node) => service.mark_to_expose(&node).await?,
            None => tracing::warn!("Cannot expose {}: not found", id),
        }
    }

    let threshold = args
        .threshold
        .unwrap_or(service.config().node_count_threshold);
    let marked = service.mark_partial_tree(&root, threshold).await?;
    tracing::info!("Marked {} nodes below {} ({})", marked, root.id, root.title);

    if args.outline {
        let options = RenderOptions::from(service.marking_options());
        let outline = service
            .render_tree(&root, &OutlineFormatter::default(), options)
            .await?;
        println!("{}", outline);
    } else {
        let tree = service.marked_tree(&root).await?;
        println!("{}", serde_json::to_string_pretty(&tree)?);
    }

    Ok(())
}
