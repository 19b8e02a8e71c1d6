use super::MergeInputs;
use crate::config::{Config, OutputFormat};
use anyhow::Result;
use clap::Args;
use sitediff_merge::MergeSession;

#[derive(Debug, Args)]
pub struct ConflictsArgs {
    #[command(flatten)]
    pub inputs: MergeInputs,

    /// Report format (overrides config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Print the paths still needing a pick, one per line
pub fn conflicts(args: ConflictsArgs, config: &Config, cwd: &str) -> Result<()> {
    let inputs = args.inputs.load(config, cwd)?;
    let mut session = MergeSession::new(&inputs.ancestor, &inputs.left, &inputs.right);
    if let Some(picks) = inputs.picks {
        session = session.with_picks(picks);
    }
    session.run()?;

    let pending = session.conflicts();
    match args.format.unwrap_or(config.output_format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&pending)?),
        OutputFormat::Text => {
            for conflict in &pending {
                println!("{}", conflict.path);
            }
        }
    }
    Ok(())
}
