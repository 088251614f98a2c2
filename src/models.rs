//! Data models for the score summary.
//!
//! This module contains the field catalog, the running accumulators
//! and the finished report structure shared by the renderers.

use crate::config::FieldsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Time point of a score column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePoint {
    /// Baseline measurement (T0).
    Baseline,
    /// Follow-up measurement (T1).
    FollowUp,
}

/// A single numeric column of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreField {
    /// Full column name, e.g. `PCL5_T0`.
    pub name: String,
    /// Index into [`FieldCatalog::prefixes`].
    pub prefix: usize,
    /// Which measurement this column holds.
    pub time_point: TimePoint,
}

/// The fixed set of columns the report is computed over.
///
/// Fields are ordered baseline-first: every `<prefix>_T0` in prefix order,
/// then every `<prefix>_T1` in prefix order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    prefixes: Vec<String>,
    fields: Vec<ScoreField>,
    sex_column: String,
}

impl FieldCatalog {
    /// Build a catalog from prefixes and the two column suffixes.
    pub fn new(
        prefixes: Vec<String>,
        baseline_suffix: &str,
        followup_suffix: &str,
        sex_column: impl Into<String>,
    ) -> Self {
        let mut fields = Vec::with_capacity(prefixes.len() * 2);
        for (time_point, suffix) in [
            (TimePoint::Baseline, baseline_suffix),
            (TimePoint::FollowUp, followup_suffix),
        ] {
            for (idx, prefix) in prefixes.iter().enumerate() {
                fields.push(ScoreField {
                    name: format!("{}{}", prefix, suffix),
                    prefix: idx,
                    time_point,
                });
            }
        }

        Self {
            prefixes,
            fields,
            sex_column: sex_column.into(),
        }
    }

    /// Questionnaire prefixes in report order.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Numeric fields in catalog order.
    pub fn fields(&self) -> &[ScoreField] {
        &self.fields
    }

    /// Name of the categorical column.
    pub fn sex_column(&self) -> &str {
        &self.sex_column
    }

    /// Catalog index of the field for `prefix` at `time_point`.
    pub fn field_index(&self, prefix: usize, time_point: TimePoint) -> usize {
        match time_point {
            TimePoint::Baseline => prefix,
            TimePoint::FollowUp => self.prefixes.len() + prefix,
        }
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::from(&FieldsConfig::default())
    }
}

impl From<&FieldsConfig> for FieldCatalog {
    fn from(config: &FieldsConfig) -> Self {
        Self::new(
            config.prefixes.clone(),
            &config.baseline_suffix,
            &config.followup_suffix,
            config.sex_column.clone(),
        )
    }
}

/// Running sum and count of observed values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    /// Sum of all observed values, in observation order.
    pub sum: f64,
    /// Number of observed values.
    pub count: usize,
}

impl RunningMean {
    /// Add one observation.
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// The mean, or `None` when nothing was observed.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Per-category row counts, kept in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CategoryCounts {
    order: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl CategoryCounts {
    /// Count one row for `category`.
    pub fn increment(&mut self, category: &str) {
        match self.index.get(category) {
            Some(&pos) => self.order[pos].1 += 1,
            None => {
                self.index.insert(category.to_string(), self.order.len());
                self.order.push((category.to_string(), 1));
            }
        }
    }

    /// Count for `category`, zero if never seen.
    #[cfg(test)]
    pub fn get(&self, category: &str) -> usize {
        self.index
            .get(category)
            .map(|&pos| self.order[pos].1)
            .unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.order.iter().map(|(_, count)| count).sum()
    }

    /// Categories with counts in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.order.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Number of distinct categories.
    pub fn len(&self) -> usize {
        self.order.len()
    }
}

/// All accumulators of one run.
#[derive(Debug, Clone)]
pub struct Accumulators {
    /// One entry per catalog field, in catalog order.
    pub fields: Vec<RunningMean>,
    /// One entry per prefix: T1 - T0 over rows where both parse.
    pub changes: Vec<RunningMean>,
    /// Rows per categorical value.
    pub sex_counts: CategoryCounts,
}

impl Accumulators {
    /// Zeroed accumulators sized for `catalog`.
    pub fn new(catalog: &FieldCatalog) -> Self {
        Self {
            fields: vec![RunningMean::default(); catalog.fields().len()],
            changes: vec![RunningMean::default(); catalog.prefixes().len()],
            sex_counts: CategoryCounts::default(),
        }
    }

    /// Total number of rows processed.
    pub fn rows(&self) -> usize {
        self.sex_counts.total()
    }
}

/// Spelling of a non-finite mean, `None` for finite values.
pub fn non_finite_name(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("nan")
    } else if value == f64::INFINITY {
        Some("inf")
    } else if value == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}

/// Means as JSON numbers, non-finite ones as their names since JSON
/// numbers cannot carry them.
mod mean_repr {
    use super::non_finite_name;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        match non_finite_name(*value) {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_f64(*value),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Name(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

/// Row count of one categorical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Mean of one score column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAverage {
    pub field: String,
    #[serde(with = "mean_repr")]
    pub mean: f64,
    /// Number of values the mean is taken over.
    pub count: usize,
}

/// Mean T1 - T0 change of one questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixChange {
    pub prefix: String,
    #[serde(with = "mean_repr")]
    pub mean: f64,
    /// Number of rows with both time points present.
    pub count: usize,
}

/// The finished summary, ready for rendering.
///
/// Entries with nothing observed are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub total_entries: usize,
    pub sex_counts: Vec<CategoryCount>,
    pub averages: Vec<FieldAverage>,
    pub changes: Vec<PrefixChange>,
}

impl Report {
    /// Build the report from final accumulator state.
    pub fn from_accumulators(catalog: &FieldCatalog, acc: &Accumulators) -> Self {
        let sex_counts = acc
            .sex_counts
            .iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();

        let averages = catalog
            .fields()
            .iter()
            .zip(&acc.fields)
            .filter_map(|(field, running)| {
                running.mean().map(|mean| FieldAverage {
                    field: field.name.clone(),
                    mean,
                    count: running.count,
                })
            })
            .collect();

        let changes = catalog
            .prefixes()
            .iter()
            .zip(&acc.changes)
            .filter_map(|(prefix, running)| {
                running.mean().map(|mean| PrefixChange {
                    prefix: prefix.clone(),
                    mean,
                    count: running.count,
                })
            })
            .collect();

        Self {
            total_entries: acc.rows(),
            sex_counts,
            averages,
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let catalog = FieldCatalog::default();
        let names: Vec<_> = catalog.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "PCL5_T0",
                "BDI_T0",
                "BAI_T0",
                "WHO5_T0",
                "BRS_T0",
                "Symptomslist_T0",
                "PCL5_T1",
                "BDI_T1",
                "BAI_T1",
                "WHO5_T1",
                "BRS_T1",
                "Symptomslist_T1",
            ]
        );
        assert_eq!(catalog.sex_column(), "Sex");
    }

    #[test]
    fn test_field_index() {
        let catalog = FieldCatalog::default();
        let t0 = catalog.field_index(3, TimePoint::Baseline);
        let t1 = catalog.field_index(3, TimePoint::FollowUp);
        assert_eq!(catalog.fields()[t0].name, "WHO5_T0");
        assert_eq!(catalog.fields()[t1].name, "WHO5_T1");
        assert_eq!(catalog.fields()[t1].time_point, TimePoint::FollowUp);
    }

    #[test]
    fn test_running_mean() {
        let mut running = RunningMean::default();
        assert_eq!(running.mean(), None);

        for v in [1.0, 2.0, 3.0] {
            running.push(v);
        }
        assert_eq!(running.count, 3);
        assert_eq!(running.mean(), Some(2.0));
    }

    #[test]
    fn test_category_counts_keep_first_seen_order() {
        let mut counts = CategoryCounts::default();
        counts.increment("Ж");
        counts.increment("M");
        counts.increment("");
        counts.increment("M");

        let seen: Vec<_> = counts.iter().collect();
        assert_eq!(seen, vec![("Ж", 1), ("M", 2), ("", 1)]);
        assert_eq!(counts.get("M"), 2);
        assert_eq!(counts.get("F"), 0);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_report_omits_empty_entries() {
        let catalog = FieldCatalog::default();
        let mut acc = Accumulators::new(&catalog);
        acc.sex_counts.increment("F");
        acc.fields[0].push(4.0);
        acc.changes[5].push(-1.5);

        let report = Report::from_accumulators(&catalog, &acc);
        assert_eq!(report.total_entries, 1);
        assert_eq!(report.averages.len(), 1);
        assert_eq!(report.averages[0].field, "PCL5_T0");
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].prefix, "Symptomslist");
        assert_eq!(report.changes[0].mean, -1.5);
    }

    #[test]
    fn test_non_finite_means_in_json() {
        let change = PrefixChange {
            prefix: "BDI".to_string(),
            mean: f64::NEG_INFINITY,
            count: 1,
        };
        let average = FieldAverage {
            field: "PCL5_T0".to_string(),
            mean: f64::NAN,
            count: 2,
        };

        let json = serde_json::to_string(&change).unwrap();
        assert_eq!(json, r#"{"prefix":"BDI","mean":"-inf","count":1}"#);
        assert_eq!(serde_json::from_str::<PrefixChange>(&json).unwrap(), change);

        let json = serde_json::to_string(&average).unwrap();
        assert!(json.contains(r#""mean":"nan""#));
        let back: FieldAverage = serde_json::from_str(&json).unwrap();
        assert!(back.mean.is_nan());

        let finite: FieldAverage =
            serde_json::from_str(r#"{"field":"BDI_T0","mean":1.5,"count":2}"#).unwrap();
        assert_eq!(finite.mean, 1.5);
    }
}
