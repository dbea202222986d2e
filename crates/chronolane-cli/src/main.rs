use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod document;

#[derive(Parser)]
#[command(name = "chronolane", version, about = "Chronolane timeline layout CLI")]
struct Cli {
    /// Config file to use instead of ~/.config/chronolane/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a scenario document and print lanes, rows and pixel spans
    Layout(commands::layout::LayoutArgs),
    /// Resolve all constraints in a scenario document and save the changes
    Resolve(commands::resolve::ResolveArgs),
    /// Change one entity's interval, propagate it and save the changes
    Edit(commands::edit::EditArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Layout(args) => commands::layout::run(args, config),
        Commands::Resolve(args) => commands::resolve::run(args, config),
        Commands::Edit(args) => commands::edit::run(args, config),
        Commands::Config { action } => commands::config::run(action, config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
