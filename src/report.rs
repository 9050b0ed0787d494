//
// report.rs
// Seg-Audit
//
// Writes the metric and feature tables as CSV and reads metric tables back for model comparison.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::{AuditError, AuditResult};
use crate::models::{FeatureRecord, MetricRecord};

pub const METRIC_COLUMNS: [&str; 15] = [
    "ID",
    "model",
    "region",
    "TP",
    "TN",
    "FP",
    "FN",
    "SENS",
    "SPEC",
    "PREC",
    "ACC",
    "DICE",
    "JACC",
    "HAUS",
    "LESION_SIZE",
];

/// Numeric cell; NaN is written as an empty field.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{value}")
    }
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))
}

/// Writes one row per subject, model and region.
pub fn write_metric_table(path: &Path, records: &[MetricRecord]) -> Result<()> {
    let mut w = create_writer(path)?;
    w.write_record(METRIC_COLUMNS)?;
    for record in records {
        let m = &record.metrics;
        let numbers = [
            m.counts.tp as f64,
            m.counts.tn as f64,
            m.counts.fp as f64,
            m.counts.fn_ as f64,
            m.sensitivity,
            m.specificity,
            m.precision,
            m.accuracy,
            m.dice,
            m.jaccard,
            m.hausdorff,
            m.lesion_size,
        ];
        let mut fields = vec![record.id.clone(), record.model.clone(), record.region.clone()];
        fields.extend(numbers.iter().map(|&v| format_value(v)));
        w.write_record(&fields)
            .with_context(|| format!("Failed to write row for {}", record.id))?;
    }
    w.flush()?;
    Ok(())
}

/// Writes `ID`, `set` and the union of feature columns in first-seen order.
pub fn write_feature_table(path: &Path, records: &[FeatureRecord]) -> Result<()> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for key in record.features.keys() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
    }

    let mut w = create_writer(path)?;
    w.write_record(["ID", "set"].into_iter().chain(columns.iter().copied()))?;
    for record in records {
        let mut fields = vec![record.id.clone(), record.set.clone()];
        fields.extend(columns.iter().map(|&column| {
            record
                .features
                .get(column)
                .map(format_value)
                .unwrap_or_default()
        }));
        w.write_record(&fields)
            .with_context(|| format!("Failed to write row for {}", record.id))?;
    }
    w.flush()?;
    Ok(())
}

/// One row of a metric table read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub id: String,
    pub model: String,
    pub region: String,
    /// Every other column parsed as a number; empty or unparsable cells are NaN.
    pub values: BTreeMap<String, f64>,
}

impl MetricRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    fn from_cells(mut cells: HashMap<String, String>, path: &Path) -> AuditResult<Self> {
        let mut take = |name: &str| {
            cells.remove(name).ok_or_else(|| {
                AuditError::Invalid(format!("metric table {:?} has no column {name}", path))
            })
        };
        let (id, model, region) = (take("ID")?, take("model")?, take("region")?);
        let values = cells
            .into_iter()
            .map(|(name, cell)| (name, parse_value(&cell)))
            .collect();
        Ok(MetricRow {
            id,
            model,
            region,
            values,
        })
    }
}

fn parse_value(cell: &str) -> f64 {
    let cell = cell.trim();
    if cell.is_empty() {
        return f64::NAN;
    }
    cell.parse().unwrap_or(f64::NAN)
}

/// Reads a table produced by [`write_metric_table`].
pub fn read_metric_table(path: &Path) -> Result<Vec<MetricRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {:?}", path))?;
    for column in ["ID", "model", "region"] {
        if !headers.iter().any(|h| h == column) {
            return Err(
                AuditError::Invalid(format!("metric table {:?} has no column {column}", path)).into(),
            );
        }
    }

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let cells: HashMap<String, String> =
            result.with_context(|| format!("Malformed row in metric table {:?}", path))?;
        rows.push(MetricRow::from_cells(cells, path)?);
    }
    Ok(rows)
}
