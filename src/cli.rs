//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Scorestat - summary statistics for questionnaire score datasets
///
/// Reads a delimited dataset of baseline (T0) and follow-up (T1) scores,
/// averages every score column and the per-respondent T1 - T0 change.
///
/// Examples:
///   scorestat
///   scorestat data/gtepu.csv
///   scorestat data/gtepu.csv --format json --output summary.json
///   scorestat --encoding utf-8 --delimiter ',' export.csv
///   scorestat --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Dataset to summarize
    ///
    /// Defaults to the `[input] path` from the config file, else gtepu.csv.
    #[arg(value_name = "FILE", env = "SCORESTAT_INPUT")]
    pub input: Option<PathBuf>,

    /// Field delimiter (a single ASCII character)
    #[arg(short, long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Text encoding label of the dataset (e.g. windows-1251, utf-8)
    #[arg(short, long, value_name = "LABEL", env = "SCORESTAT_ENCODING")]
    pub encoding: Option<String>,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Decimal places for averages
    #[arg(long, value_name = "DIGITS")]
    pub precision: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .scorestat.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Show a row counter on stderr while reading
    #[arg(long)]
    pub progress: bool,

    /// Generate a default .scorestat.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Highest accepted `--precision`.
pub const MAX_PRECISION: usize = 10;

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err(format!(
                    "Delimiter must be a single ASCII character, got '{}'",
                    delimiter
                ));
            }
            if delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
                return Err("Delimiter cannot be a quote or line break".to_string());
            }
        }

        if let Some(precision) = self.precision {
            if precision > MAX_PRECISION {
                return Err(format!("Precision must be at most {}", MAX_PRECISION));
            }
        }

        if let Some(ref encoding) = self.encoding {
            if encoding.trim().is_empty() {
                return Err("Encoding label cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// The report owns stdout, so the default stays at WARN.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}
