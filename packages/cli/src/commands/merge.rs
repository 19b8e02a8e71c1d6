use super::MergeInputs;
use crate::config::{Config, OutputFormat};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use sitediff_merge::{merge as merge_documents, MergeOutcome};
use sitediff_model::to_json;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct MergeArgs {
    #[command(flatten)]
    pub inputs: MergeInputs,

    /// Write the merged document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format (overrides config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

pub fn merge(args: MergeArgs, config: &Config, cwd: &str) -> Result<()> {
    let inputs = args.inputs.load(config, cwd)?;
    let outcome = merge_documents(
        &inputs.ancestor,
        &inputs.left,
        &inputs.right,
        inputs.picks.as_ref(),
    )?;
    info!(
        conflicts = outcome.conflicts.len(),
        auto_fixes = outcome.auto_fixes.len(),
        "Merge finished"
    );

    if let Some(output) = &args.output {
        fs::write(output, to_json(&outcome.merged)?)?;
    }

    match args.format.unwrap_or(config.output_format) {
        OutputFormat::Json => print_json(&outcome, args.output.is_none())?,
        OutputFormat::Text => {
            if args.output.is_none() {
                println!("{}", to_json(&outcome.merged)?);
            }
            print_report(&outcome, args.output.as_ref());
        }
    }

    if config.fail_on_conflict && !outcome.is_clean() {
        return Err(anyhow!(
            "{} conflict(s) left unresolved",
            outcome.conflicts.len()
        ));
    }
    Ok(())
}

fn print_json(outcome: &MergeOutcome, include_document: bool) -> Result<()> {
    let mut report = serde_json::to_value(outcome)?;
    if !include_document {
        if let Some(fields) = report.as_object_mut() {
            fields.remove("merged");
        }
    }
    if let Some(fields) = report.as_object_mut() {
        fields.insert("status".to_string(), serde_json::to_value(outcome.status())?);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Human-readable summary, on stderr so stdout stays a clean document
fn print_report(outcome: &MergeOutcome, output: Option<&PathBuf>) {
    eprintln!();
    if let Some(output) = output {
        eprintln!("{} Merged document written to {}", "✓".green(), output.display());
    }

    for fix in &outcome.auto_fixes {
        let line = serde_json::to_string(fix).unwrap_or_default();
        eprintln!("  {} {}", "fixed".cyan(), line.dimmed());
    }

    if outcome.is_clean() {
        eprintln!("{} Merged without conflicts", "✅".green());
        return;
    }

    eprintln!(
        "{} {} conflict(s) need a pick:",
        "⚠️".yellow(),
        outcome.conflicts.len()
    );
    for conflict in &outcome.conflicts {
        eprintln!("  {} {}", "✗".red(), conflict.path.bold());
        eprintln!("      left:  {}", conflict.left_value);
        eprintln!("      right: {}", conflict.right_value);
    }
}
