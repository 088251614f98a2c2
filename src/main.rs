//! Scorestat - questionnaire score summary
//!
//! A CLI tool that reads a delimited dataset of baseline (T0) and
//! follow-up (T1) questionnaire scores and reports per-column averages
//! and the average T1 - T0 change per questionnaire.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (arguments, config, unreadable or malformed dataset)

mod analysis;
mod cli;
mod config;
mod input;
mod models;
mod report;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use input::{DatasetReader, ReadOptions};
use models::{FieldCatalog, Report};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Scorestat v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("Report failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .scorestat.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over the verbosity flags when set. Logs go
/// to stderr; stdout carries only the report.
fn init_logging(args: &Args) {
    let level = LevelFilter::from_level(args.log_level());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Load config, summarize the dataset and write the rendered report.
fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let report = build_report(&config, args.progress)?;
    let output = report::render(&report, config.report.format, config.report.precision)?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.as_bytes())
                .and_then(|_| stdout.flush())
                .context("Failed to write report to stdout")?;
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Open the configured dataset and aggregate it into a report.
fn build_report(config: &Config, show_progress: bool) -> Result<Report> {
    let options = ReadOptions::new(config.input.delimiter, &config.input.encoding)?;
    let path = &config.input.path;

    let mut reader = DatasetReader::open(path, &options)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let progress = show_progress.then(new_spinner);
    let catalog = FieldCatalog::from(&config.fields);

    analysis::summarize(&mut reader, catalog, progress.as_ref())
        .with_context(|| format!("Failed to summarize {}", path.display()))
}

/// Row counter spinner drawn on stderr.
fn new_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} rows")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AggregateError;
    use crate::cli::OutputFormat;
    use std::path::Path;

    const HEADER: &str = "№;Пол;Sex;PCL5_T0;BDI_T0;BAI_T0;WHO5_T0;BRS_T0;Symptomslist_T0;\
                          PCL5_T1;BDI_T1;BAI_T1;WHO5_T1;BRS_T1;Symptomslist_T1";

    /// Write `lines` as a Windows-1251 dataset and return a config pointing at it.
    fn write_dataset(dir: &Path, lines: &[&str]) -> Config {
        let text = lines.join("\r\n") + "\r\n";
        let (bytes, _, unmappable) = encoding_rs::WINDOWS_1251.encode(&text);
        assert!(!unmappable);

        let path = dir.join("gtepu.csv");
        std::fs::write(&path, bytes).unwrap();

        let mut config = Config::default();
        config.input.path = path;
        config
    }

    fn sample_lines() -> Vec<&'static str> {
        vec![
            HEADER,
            "1;x;Ж;10;20;;5;3,5;1;12;18;;7;4;",
            "2;x;М;5; ;;abc;;2;;15;;9;;",
            "3;x;Ж;8;;;;2,5;;6;;;;3,5;",
            "4;x; ;;;;;;;;;;;;",
        ]
    }

    #[test]
    fn test_end_to_end_text_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_dataset(dir.path(), &sample_lines());

        let report = build_report(&config, false).unwrap();
        let text = report::render(&report, OutputFormat::Text, 2).unwrap();

        assert_eq!(
            text,
            "Total entries: 4\n\
             Sex Ж: 2\n\
             Sex М: 1\n\
             Sex : 1\n\
             \n\
             Average PCL5_T0: 7.67\n\
             Average BDI_T0: 20.00\n\
             Average WHO5_T0: 5.00\n\
             Average BRS_T0: 3.00\n\
             Average Symptomslist_T0: 1.50\n\
             Average PCL5_T1: 9.00\n\
             Average BDI_T1: 16.50\n\
             Average WHO5_T1: 8.00\n\
             Average BRS_T1: 3.75\n\
             \n\
             Average change PCL5: 0.00\n\
             Average change BDI: -2.00\n\
             Average change WHO5: 2.00\n\
             Average change BRS: 0.75\n"
        );
    }

    #[test]
    fn test_report_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_dataset(dir.path(), &sample_lines());

        let first = report::render(&build_report(&config, false).unwrap(), OutputFormat::Text, 2);
        let second = report::render(&build_report(&config, false).unwrap(), OutputFormat::Text, 2);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_json_matches_text_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_dataset(dir.path(), &sample_lines());

        let report = build_report(&config, false).unwrap();
        let json = report::render(&report, OutputFormat::Json, 2).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_short_row_fails_without_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines = sample_lines();
        lines.push("5;x;Ж;1;2");
        let config = write_dataset(dir.path(), &lines);

        let err = build_report(&config, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AggregateError>(),
            Some(AggregateError::ShortRow { line: 6, .. })
        ));
    }

    #[test]
    fn test_blank_line_fails_without_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines = sample_lines();
        lines.insert(2, "");
        let config = write_dataset(dir.path(), &lines);

        let err = build_report(&config, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AggregateError>(),
            Some(AggregateError::ShortRow {
                line: 3,
                expected: 14,
                found: 0
            })
        ));
    }

    #[test]
    fn test_trailing_blank_line_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut lines = sample_lines();
        lines.push("");
        let config = write_dataset(dir.path(), &lines);

        assert!(matches!(
            build_report(&config, false).unwrap_err().downcast_ref::<AggregateError>(),
            Some(AggregateError::ShortRow { line: 6, found: 0, .. })
        ));
    }

    #[test]
    fn test_non_finite_cells_in_text_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_dataset(
            dir.path(),
            &[
                HEADER,
                "1;x;М;nan;0,125;2,675;inf;1_0;;;;;;;",
                "2;x;Ж;3;;;;;;;;;;;",
            ],
        );

        let report = build_report(&config, false).unwrap();
        let text = report::render(&report, OutputFormat::Text, 2).unwrap();
        assert_eq!(
            text,
            "Total entries: 2\n\
             Sex М: 1\n\
             Sex Ж: 1\n\
             \n\
             Average PCL5_T0: nan\n\
             Average BDI_T0: 0.12\n\
             Average BAI_T0: 2.67\n\
             Average WHO5_T0: inf\n\
             Average BRS_T0: 10.00\n\
             \n"
        );
    }

    #[test]
    fn test_missing_column_fails_before_rows() {
        let dir = tempfile::tempdir().unwrap();
        let header = HEADER.replace("BRS_T1", "BRS_T2");
        let config = write_dataset(dir.path(), &[header.as_str(), "1;x;Ж"]);

        let err = build_report(&config, false).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AggregateError>(),
            Some(&AggregateError::MissingColumn {
                column: "BRS_T1".to_string()
            })
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.input.path = dir.path().join("nope.csv");

        let err = build_report(&config, false).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open dataset"));
    }

    #[test]
    fn test_wrong_encoding_label() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_dataset(dir.path(), &sample_lines());
        config.input.encoding = "no-such-encoding".to_string();

        assert!(build_report(&config, false).is_err());
    }
}
