use std::path::{Path, PathBuf};

use chronolane_core::{Interval, Persist};
use clap::Args;

use super::{changed_keys, load_config, open_timeline, print_changes, CliResult};

#[derive(Args)]
pub struct EditArgs {
    /// Scenario document (JSON)
    pub file: PathBuf,
    /// Key of the entity to edit
    pub key: String,
    /// New start instant
    #[arg(allow_negative_numbers = true)]
    pub start: i64,
    /// New end instant
    #[arg(allow_negative_numbers = true)]
    pub end: i64,
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

pub fn run(args: EditArgs, config_path: Option<&Path>) -> CliResult {
    let interval = Interval::new(args.start, args.end)?;
    let config = load_config(config_path)?;
    let (mut store, mut timeline) = open_timeline(&args.file, &config, args.dry_run)?;

    let id = timeline.graph().require(&args.key)?;
    let mut changed = timeline.rebuild().changed;
    let report = timeline.edit_duration(id, interval)?;
    changed.extend(report.changed.iter().copied());
    store.persist(timeline.graph(), &changed)?;

    if args.json {
        let out = serde_json::json!({
            "changed": changed_keys(timeline.graph(), &changed),
            "lanes": report.lanes,
            "overlap": timeline.controller().find_overlap(timeline.graph()).is_some(),
            "saved": !args.dry_run && !changed.is_empty(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if changed.is_empty() {
        println!("{} unchanged", args.key);
        return Ok(());
    }
    println!("{} interval(s) changed:", changed.len());
    print_changes(timeline.graph(), &changed, args.dates);
    println!("{} lane(s)", report.lanes);
    if args.dry_run {
        println!("dry run: document not saved");
    }
    Ok(())
}
