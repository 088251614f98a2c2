//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.scorestat.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".scorestat.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input dataset settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Field catalog settings.
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Where and how to read the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Dataset path.
    #[serde(default = "default_input_path")]
    pub path: PathBuf,

    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Encoding label understood by `encoding_rs`.
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
            delimiter: default_delimiter(),
            encoding: default_encoding(),
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from("gtepu.csv")
}

fn default_delimiter() -> char {
    ';'
}

fn default_encoding() -> String {
    "windows-1251".to_string()
}

/// Which columns make up the score catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    /// Questionnaire prefixes, in report order.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Suffix of the baseline column.
    #[serde(default = "default_baseline_suffix")]
    pub baseline_suffix: String,

    /// Suffix of the follow-up column.
    #[serde(default = "default_followup_suffix")]
    pub followup_suffix: String,

    /// Categorical column counted per distinct value.
    #[serde(default = "default_sex_column")]
    pub sex_column: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            baseline_suffix: default_baseline_suffix(),
            followup_suffix: default_followup_suffix(),
            sex_column: default_sex_column(),
        }
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["PCL5", "BDI", "BAI", "WHO5", "BRS", "Symptomslist"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_baseline_suffix() -> String {
    "_T0".to_string()
}

fn default_followup_suffix() -> String {
    "_T1".to_string()
}

fn default_sex_column() -> String {
    "Sex".to_string()
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Decimal places for averages.
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            format: OutputFormat::default(),
        }
    }
}

fn default_precision() -> usize {
    2
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.scorestat.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; only
    /// explicitly provided values override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.input.path = input.clone();
        }
        if let Some(delimiter) = args.delimiter {
            self.input.delimiter = delimiter;
        }
        if let Some(ref encoding) = args.encoding {
            self.input.encoding = encoding.clone();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(precision) = args.precision {
            self.report.precision = precision;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
