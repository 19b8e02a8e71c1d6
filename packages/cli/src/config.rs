use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_NAME: &str = "sitediff.config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Sitediff configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// How reports are printed when `--format` is not given
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Default tracing filter, e.g. "info" or "sitediff_merge=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Exit with an error when a merge leaves conflicts pending
    #[serde(default)]
    pub fail_on_conflict: bool,

    /// Picks applied when `--picks` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picks_file: Option<String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Absolute path of the configured picks file
    pub fn get_picks_file(&self, cwd: &str) -> Option<PathBuf> {
        self.picks_file
            .as_ref()
            .map(|file| PathBuf::from(cwd).join(file))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Text,
            log_level: default_log_level(),
            fail_on_conflict: false,
            picks_file: None,
        }
    }
}
