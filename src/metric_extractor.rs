//
// metric_extractor.rs
// Seg-Audit
//
// Runs every model's predictions against the ground truth, subject by subject, and exports one metric table.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::Axis;
use tracing::{info, warn};

use crate::config::MetricExtractorConfig;
use crate::labels::LabelMap;
use crate::models::MetricRecord;
use crate::one_hot::one_hot_encoding;
use crate::report::write_metric_table;
use crate::segmentation_metrics::calculate_metrics;
use crate::sequences::{list_subjects, load_sequence};

/// Where one model's predictions live and how files are named.
struct Sources<'a> {
    ground_truth_root: &'a Path,
    prediction_root: &'a Path,
    ground_truth_suffix: &'a str,
    prediction_suffix: &'a str,
}

/// Metric rows of one subject, one per non-background region.
fn subject_metrics(
    subject: &str,
    model: &str,
    sources: &Sources<'_>,
    labels: &LabelMap,
) -> Result<Vec<MetricRecord>> {
    let ground_truth = load_sequence(sources.ground_truth_root, subject, sources.ground_truth_suffix)
        .context("Failed to load ground truth")?;
    let prediction = load_sequence(sources.prediction_root, subject, sources.prediction_suffix)
        .context("Failed to load prediction")?;
    if ground_truth.shape() != prediction.shape() {
        bail!(
            "ground truth shape {:?} differs from prediction shape {:?}",
            ground_truth.shape(),
            prediction.shape()
        );
    }

    let regions = labels.regions();
    let values: Vec<f64> = regions.iter().map(|(value, _)| *value).collect();
    let ground_truth_masks = one_hot_encoding(ground_truth.view(), &values, true);
    let prediction_masks = one_hot_encoding(prediction.view(), &values, true);

    regions
        .iter()
        .enumerate()
        .map(|(channel, (_, region))| -> Result<MetricRecord> {
            let metrics = calculate_metrics(
                ground_truth_masks.index_axis(Axis(0), channel),
                prediction_masks.index_axis(Axis(0), channel),
                prediction.spacing,
            )?;
            Ok(MetricRecord {
                id: subject.to_string(),
                model: model.to_string(),
                region: region.to_string(),
                metrics,
            })
        })
        .collect()
}

/// Computes the metric rows for every configured model and every subject of `data_path`.
///
/// A subject that fails to load or process is logged and skipped.
pub fn extract_metrics(config: &MetricExtractorConfig) -> Result<Vec<MetricRecord>> {
    let labels = config.label_map();
    let subjects = list_subjects(&config.data_path)
        .with_context(|| format!("Failed to list subjects in {:?}", config.data_path))?;
    info!("Found {} subjects in {:?}", subjects.len(), config.data_path);

    let mut records = Vec::new();
    for (model, prediction_root) in &config.model_predictions_paths {
        info!("Starting metric extraction for model {model}");
        let sources = Sources {
            ground_truth_root: &config.data_path,
            prediction_root,
            ground_truth_suffix: &config.ground_truth_suffix,
            prediction_suffix: &config.prediction_suffix,
        };

        for (n, subject) in subjects.iter().enumerate() {
            if n % 10 == 0 && n > 0 {
                info!("Processed {n} patients");
            }
            match subject_metrics(subject, model, &sources, &labels) {
                Ok(rows) => records.extend(rows),
                Err(e) => warn!("Skipping subject {subject} for model {model}: {:#}", e),
            }
        }
        info!("Finishing metric extraction for model {model}");
    }
    Ok(records)
}

/// Full run: extraction followed by a single export. Returns the table path.
pub fn run(config: &MetricExtractorConfig) -> Result<PathBuf> {
    info!("Starting metric extraction process");
    info!("Config: {:#?}", config);
    let records = extract_metrics(config)?;
    let output = config.output_file();
    write_metric_table(&output, &records)?;
    info!("Results exported to {:?} ({} rows)", output, records.len());
    Ok(output)
}
