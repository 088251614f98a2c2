//! Row aggregation.
//!
//! This module maps header names to column positions once, then folds
//! each data row into the running accumulators.

use crate::analysis::parse_score;
use crate::models::{Accumulators, FieldCatalog, Report, TimePoint};
use thiserror::Error;
use tracing::debug;

/// Structural problems that abort a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// The header has no column with this name.
    #[error("header is missing required column '{column}'")]
    MissingColumn { column: String },

    /// A data row has fewer cells than the header.
    #[error("line {line}: row has {found} data cells, header declares {expected}")]
    ShortRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// The input has no header line.
    #[error("input is empty, expected a header line")]
    EmptyInput,
}

/// Positions of the catalog columns within a row, identifier column excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    /// One position per catalog field, in catalog order.
    fields: Vec<usize>,
    sex: usize,
    width: usize,
}

impl ColumnLayout {
    /// Resolve every catalog column against a header row.
    ///
    /// Header cells are trimmed and the first (identifier) cell is dropped.
    /// When a name repeats, the first occurrence is used.
    pub fn from_header<S: AsRef<str>>(
        catalog: &FieldCatalog,
        header: &[S],
    ) -> Result<Self, AggregateError> {
        let names: Vec<&str> = header.iter().skip(1).map(|h| h.as_ref().trim()).collect();

        let find = |column: &str| {
            names
                .iter()
                .position(|name| *name == column)
                .ok_or_else(|| AggregateError::MissingColumn {
                    column: column.to_string(),
                })
        };

        let fields = catalog
            .fields()
            .iter()
            .map(|field| find(&field.name))
            .collect::<Result<Vec<_>, _>>()?;
        let sex = find(catalog.sex_column())?;

        for (field, position) in catalog.fields().iter().zip(&fields) {
            debug!(
                "Column {} ({} {:?}) at position {}",
                field.name,
                catalog.prefixes()[field.prefix],
                field.time_point,
                position
            );
        }

        Ok(Self {
            fields,
            sex,
            width: names.len(),
        })
    }

    /// Number of data cells every row must carry.
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Single-pass aggregator over data rows.
#[derive(Debug)]
pub struct Aggregator {
    catalog: FieldCatalog,
    layout: ColumnLayout,
    acc: Accumulators,
}

impl Aggregator {
    /// Create an aggregator for a dataset with the given header row.
    pub fn new<S: AsRef<str>>(
        catalog: FieldCatalog,
        header: &[S],
    ) -> Result<Self, AggregateError> {
        let layout = ColumnLayout::from_header(&catalog, header)?;
        let acc = Accumulators::new(&catalog);
        Ok(Self {
            catalog,
            layout,
            acc,
        })
    }

    /// Fold one data row (identifier cell included) into the accumulators.
    ///
    /// `line` is only used for error messages.
    pub fn process_row<S: AsRef<str>>(
        &mut self,
        row: &[S],
        line: u64,
    ) -> Result<(), AggregateError> {
        let cells = row.get(1..).unwrap_or(&[]);
        if cells.len() < self.layout.width() {
            return Err(AggregateError::ShortRow {
                line,
                expected: self.layout.width(),
                found: cells.len(),
            });
        }

        self.acc
            .sex_counts
            .increment(cells[self.layout.sex].as_ref().trim());

        for (running, &position) in self.acc.fields.iter_mut().zip(&self.layout.fields) {
            if let Some(value) = parse_score(cells[position].as_ref()) {
                running.push(value);
            }
        }

        for prefix in 0..self.catalog.prefixes().len() {
            let baseline = self.catalog.field_index(prefix, TimePoint::Baseline);
            let followup = self.catalog.field_index(prefix, TimePoint::FollowUp);
            let baseline = self.layout.fields[baseline];
            let followup = self.layout.fields[followup];

            let t0 = parse_score(cells[baseline].as_ref());
            let t1 = parse_score(cells[followup].as_ref());
            if let (Some(t0), Some(t1)) = (t0, t1) {
                self.acc.changes[prefix].push(t1 - t0);
            }
        }

        Ok(())
    }

    /// Current accumulator state.
    #[cfg(test)]
    pub fn accumulators(&self) -> &Accumulators {
        &self.acc
    }

    /// Rows processed so far.
    pub fn rows(&self) -> usize {
        self.acc.rows()
    }

    /// Finish the pass and build the report.
    pub fn finish(self) -> Report {
        debug!(
            "Aggregated {} rows across {} categories",
            self.acc.rows(),
            self.acc.sex_counts.len()
        );
        Report::from_accumulators(&self.catalog, &self.acc)
    }
}
