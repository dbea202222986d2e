pub mod config;
pub mod edit;
pub mod layout;
pub mod resolve;

use std::collections::BTreeSet;
use std::path::Path;

use chrono::DateTime;
use chronolane_core::{ComponentSource, EntityGraph, EntityId, Interval, LayoutConfig, Timeline};

use crate::document::DocumentStore;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the layout config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<LayoutConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => LayoutConfig::load_from(path)?,
        None => LayoutConfig::load()?,
    };
    Ok(config)
}

/// Open a scenario document and build an un-laid-out timeline from it.
pub fn open_timeline(
    file: &Path,
    config: &LayoutConfig,
    dry_run: bool,
) -> Result<(DocumentStore, Timeline), Box<dyn std::error::Error>> {
    let store = DocumentStore::open(file, dry_run)?;
    let (graph, roots) = store.document().to_graph()?;
    Ok((store, Timeline::new(graph, roots, config)))
}

/// Render an instant, optionally as a UTC timestamp in milliseconds.
pub fn format_instant(at: i64, dates: bool) -> String {
    if dates {
        if let Some(dt) = DateTime::from_timestamp_millis(at) {
            return dt.to_rfc3339();
        }
    }
    at.to_string()
}

pub fn format_interval(interval: &Interval, dates: bool) -> String {
    format!(
        "[{}, {})",
        format_instant(interval.start(), dates),
        format_instant(interval.end(), dates)
    )
}

/// Keys of `changed`, in id order.
pub fn changed_keys(graph: &EntityGraph, changed: &BTreeSet<EntityId>) -> Vec<String> {
    changed
        .iter()
        .filter_map(|id| graph.key(*id).map(str::to_owned))
        .collect()
}

/// `key [start, end)` lines for every changed entity.
pub fn print_changes(graph: &EntityGraph, changed: &BTreeSet<EntityId>, dates: bool) {
    for id in changed {
        let (Some(key), Some(interval)) = (graph.key(*id), graph.interval(*id)) else {
            continue;
        };
        println!("  {key} {}", format_interval(&interval, dates));
    }
}
