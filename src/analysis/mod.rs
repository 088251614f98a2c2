//! Score analysis.
//!
//! Cell parsing, the single-pass row aggregator and the loop that drives
//! it over a dataset reader.

pub mod aggregator;
pub mod value;

pub use aggregator::*;
pub use value::parse_score;

use crate::input::DatasetReader;
use crate::models::{FieldCatalog, Report};
use anyhow::Result;
use indicatif::ProgressBar;
use std::io::BufRead;
use tracing::info;

/// Read the header and every data row, then build the report.
///
/// Any structural or decoding error aborts the pass; no partial report is
/// produced.
pub fn summarize<R: BufRead>(
    reader: &mut DatasetReader<R>,
    catalog: FieldCatalog,
    progress: Option<&ProgressBar>,
) -> Result<Report> {
    let header = reader.next_row()?.ok_or(AggregateError::EmptyInput)?;
    let mut aggregator = Aggregator::new(catalog, &header.cells)?;

    while let Some(row) = reader.next_row()? {
        aggregator.process_row(&row.cells, row.line)?;

        if let Some(pb) = progress {
            pb.set_position(aggregator.rows() as u64);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    info!("Processed {} rows", aggregator.rows());
    Ok(aggregator.finish())
}
