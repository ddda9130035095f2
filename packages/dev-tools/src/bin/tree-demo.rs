//! Materialized Path Demo
//!
//! Builds a small category tree in memory, moves a subtree, removes two trees
//! and prints the stored rows (including computed columns) after each step.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tree-demo
//!
//! # Custom configuration
//! TREE_CONFIG=./tree.json cargo run --bin tree-demo
//! TREE_PATH_SEPARATOR=/ RUST_LOG=debug cargo run --bin tree-demo
//! ```
//!
//! # Environment Variables
//!
//! - `TREE_CONFIG`: Path to a JSON `TreeConfig` file (default: built-in defaults)
//! - `TREE_PATH_SEPARATOR`: Overrides the separator character
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::env;

use anyhow::Context;
use serde_json::{json, Value};
use treepath_core::db::MemoryTreeStore;
use treepath_core::models::{TreeConfig, TreeNode};
use treepath_core::operations::UnitOfWork;
use treepath_core::services::TreeService;

fn load_config() -> anyhow::Result<TreeConfig> {
    let mut config = match env::var("TREE_CONFIG") {
        Ok(path) => TreeConfig::from_file(&path)
            .with_context(|| format!("Failed to load tree config from {}", path))?,
        Err(_) => TreeConfig::default(),
    };

    if let Some(separator) = env::var("TREE_PATH_SEPARATOR")
        .ok()
        .and_then(|s| s.chars().next())
    {
        config.path_separator = separator;
    }

    Ok(config)
}

fn category(field: &str, value: &str) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(field.to_string(), json!(value));
    Value::Object(properties)
}

/// A stored node as one flat row: id, parent, properties and computed columns
fn row(node: &TreeNode, config: &TreeConfig) -> Value {
    let mut columns = serde_json::Map::new();
    columns.insert("id".to_string(), json!(node.id));
    columns.insert("parentId".to_string(), json!(node.parent_id));
    if let Some(properties) = node.properties.as_object() {
        columns.extend(properties.clone());
    }
    if let Some(fields) = node.computed_fields() {
        columns.extend(fields.to_columns(config));
    }
    Value::Object(columns)
}

async fn print_rows(service: &TreeService<MemoryTreeStore>, step: &str) -> anyhow::Result<()> {
    let config = service.maintainer().config().clone();
    let rows: Vec<Value> = service
        .with_store(|store| store.all_nodes())
        .await
        .iter()
        .map(|node| row(node, &config))
        .collect();

    println!("== {} ==", step);
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(
        "Separator '{}', path source field '{}'",
        config.path_separator,
        config.path_source_field
    );

    let service = TreeService::new(MemoryTreeStore::new(), config)?;

    let mut rx = service.subscribe_to_events();
    let listener = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            tracing::debug!("Event {}: {:?}", event.event_type(), event);
        }
    });

    // Insert: staged as 4, 3, 2, 1 so the store hands out ids in that order
    let field = service.maintainer().config().path_source_field.clone();
    let mut uow = UnitOfWork::new();
    let c4 = uow.insert(category(&field, "4"));
    let c3 = uow.insert(category(&field, "3"));
    let c2 = uow.insert(category(&field, "2"));
    let c1 = uow.insert(category(&field, "1"));
    uow.set_parent(c2, Some(c1.into()));
    uow.set_parent(c3, Some(c2.into()));

    let report = service.commit(uow).await?;
    let id = |handle| {
        report
            .id_of(handle)
            .cloned()
            .context("commit report is missing a staged node")
    };
    let (id1, id2) = (id(c1)?, id(c2)?);
    print_rows(&service, "insert").await?;

    // Update: detach "2" (and its subtree) into its own tree
    let mut uow = UnitOfWork::new();
    uow.set_parent(id2.clone(), None);
    service.commit(uow).await?;
    print_rows(&service, "move").await?;

    // Remove
    let mut uow = UnitOfWork::new();
    uow.remove(id1);
    uow.remove(id2);
    service.commit(uow).await?;
    print_rows(&service, "remove").await?;

    drop(service);
    listener.await?;
    Ok(())
}
