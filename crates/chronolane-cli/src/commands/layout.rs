use std::path::{Path, PathBuf};

use chronolane_core::{ComponentSource, Persist, ViewWindow};
use clap::Args;
use serde::Serialize;

use super::{format_interval, load_config, open_timeline, CliResult};

#[derive(Args)]
pub struct LayoutArgs {
    /// Scenario document (JSON)
    pub file: PathBuf,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
    /// Fit the whole timeline into this many pixels
    #[arg(long)]
    pub width: Option<i64>,
    /// Show instants as UTC timestamps (milliseconds since the Unix epoch)
    #[arg(long)]
    pub dates: bool,
    /// Save intervals that changed while resolving constraints
    #[arg(long)]
    pub save: bool,
}

#[derive(Serialize)]
struct SpanRow<'a> {
    lane: usize,
    row: usize,
    key: &'a str,
    name: &'a str,
    start: i64,
    end: i64,
    x: i64,
    width: i64,
    y: i64,
}

pub fn run(args: LayoutArgs, config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    let (mut store, mut timeline) = open_timeline(&args.file, &config, !args.save)?;

    let report = timeline.rebuild();
    store.persist(timeline.graph(), &report.changed)?;

    if let Some(width) = args.width {
        let range = timeline
            .layout()
            .iter()
            .map(|e| e.interval)
            .reduce(|acc, iv| acc.union(&iv));
        if let Some(range) = range {
            timeline.set_view(ViewWindow::fit(
                &range,
                width,
                config.view.left_padding,
                config.view.right_padding,
            ));
        }
    }

    let spans = timeline.spans()?;
    let graph = timeline.graph();

    if args.json {
        let rows: Vec<SpanRow> = spans
            .iter()
            .filter_map(|s| {
                let entity = graph.get(s.entry.entity)?;
                Some(SpanRow {
                    lane: s.entry.lane,
                    row: s.entry.row,
                    key: &entity.key,
                    name: &entity.name,
                    start: s.entry.interval.start(),
                    end: s.entry.interval.end(),
                    x: s.span.x,
                    width: s.span.width,
                    y: s.y,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if spans.is_empty() {
        println!("no temporal entities");
        return Ok(());
    }

    let mut current: Option<(usize, usize)> = None;
    for s in &spans {
        let key = graph.key(s.entry.entity).unwrap_or("?");
        if current.map(|(lane, _)| lane) != Some(s.entry.lane) {
            println!("lane {}", s.entry.lane);
        }
        if current != Some((s.entry.lane, s.entry.row)) {
            println!("  row {}", s.entry.row);
        }
        current = Some((s.entry.lane, s.entry.row));
        println!(
            "    {key} {} x={} w={} y={}",
            format_interval(&s.entry.interval, args.dates),
            s.span.x,
            s.span.width,
            s.y
        );
    }
    if !report.changed.is_empty() && !args.save {
        println!(
            "note: {} interval(s) changed by constraints; rerun with --save to keep them",
            report.changed.len()
        );
    }
    Ok(())
}
