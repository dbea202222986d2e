use std::path::{Path, PathBuf};

use chronolane_core::Persist;
use clap::Args;

use super::{changed_keys, load_config, open_timeline, print_changes, CliResult};

#[derive(Args)]
pub struct ResolveArgs {
    /// Scenario document (JSON)
    pub file: PathBuf,
    /// Report changes without saving the document
    #[arg(long)]
    pub dry_run: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
    /// Show instants as UTC timestamps (milliseconds since the Unix epoch)
    #[arg(long)]
    pub dates: bool,
}

pub fn run(args: ResolveArgs, config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    let (mut store, mut timeline) = open_timeline(&args.file, &config, args.dry_run)?;

    let report = timeline.rebuild();
    store.persist(timeline.graph(), &report.changed)?;

    if args.json {
        let out = serde_json::json!({
            "changed": changed_keys(timeline.graph(), &report.changed),
            "lanes": report.lanes,
            "placements": report.placements,
            "saved": !args.dry_run && !report.changed.is_empty(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if report.changed.is_empty() {
        println!("all constraints satisfied");
        return Ok(());
    }
    println!("{} interval(s) changed:", report.changed.len());
    print_changes(timeline.graph(), &report.changed, args.dates);
    if args.dry_run {
        println!("dry run: document not saved");
    }
    Ok(())
}
