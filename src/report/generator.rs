//! Text and JSON report generation.
//!
//! Rendering is a pure function of the finished [`Report`]; the same
//! report always renders to the same bytes.

use crate::cli::OutputFormat;
use crate::models::{non_finite_name, Report};
use anyhow::Result;

/// Render the report in the requested format.
pub fn render(report: &Report, format: OutputFormat, precision: usize) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(generate_text_report(report, precision)),
        OutputFormat::Json => generate_json_report(report),
    }
}

/// Generate the plain text report.
///
/// Layout: totals per category, a blank line, per-field averages, a blank
/// line, per-questionnaire average changes.
pub fn generate_text_report(report: &Report, precision: usize) -> String {
    let mut output = String::new();

    output.push_str(&generate_counts_section(report));
    output.push('\n');
    output.push_str(&generate_averages_section(report, precision));
    output.push('\n');
    output.push_str(&generate_changes_section(report, precision));

    output
}

fn generate_counts_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str(&format!("Total entries: {}\n", report.total_entries));
    for entry in &report.sex_counts {
        section.push_str(&format!("Sex {}: {}\n", entry.category, entry.count));
    }

    section
}

fn generate_averages_section(report: &Report, precision: usize) -> String {
    let mut section = String::new();

    for avg in &report.averages {
        section.push_str(&format!(
            "Average {}: {}\n",
            avg.field,
            format_mean(avg.mean, precision)
        ));
    }

    section
}

fn generate_changes_section(report: &Report, precision: usize) -> String {
    let mut section = String::new();

    for change in &report.changes {
        section.push_str(&format!(
            "Average change {}: {}\n",
            change.prefix,
            format_mean(change.mean, precision)
        ));
    }

    section
}

/// Fixed-point mean; non-finite values are spelled `nan`, `inf`, `-inf`.
fn format_mean(mean: f64, precision: usize) -> String {
    match non_finite_name(mean) {
        Some(name) => name.to_string(),
        None => format!("{:.*}", precision, mean),
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}
