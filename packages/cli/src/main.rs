mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{conflicts, merge, validate, ConflictsArgs, MergeArgs, ValidateArgs};
use config::Config;
use tracing_subscriber::EnvFilter;

/// Sitediff - three-way merge for site documents
#[derive(Parser, Debug)]
#[command(name = "sitediff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log merge decisions at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge two branches of a document against their ancestor
    Merge(MergeArgs),

    /// List conflicts that still need a pick
    Conflicts(ConflictsArgs),

    /// Check a document's structural invariants
    Validate(ValidateArgs),
}

fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();
    let config = Config::load(&cwd)?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Command::Merge(args) => merge(args, &config, &cwd),
        Command::Conflicts(args) => conflicts(args, &config, &cwd),
        Command::Validate(args) => validate(args, &config),
    }
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
