use super::read_document;
use crate::config::{Config, OutputFormat};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use sitediff_model::check_document;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Document to check
    pub input: PathBuf,

    /// Report format (overrides config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

pub fn validate(args: ValidateArgs, config: &Config) -> Result<()> {
    let doc = read_document(&args.input)?;
    let violations = check_document(&doc);

    match args.format.unwrap_or(config.output_format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&violations)?),
        OutputFormat::Text => {
            if violations.is_empty() {
                println!(
                    "{} {} ({} components, {} nodes)",
                    "✓".green(),
                    args.input.display(),
                    doc.components.len(),
                    doc.nodes.len()
                );
            }
            for violation in &violations {
                println!("  {} {}", "✗".red(), violation);
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} has {} invariant violation(s)",
            args.input.display(),
            violations.len()
        ))
    }
}
