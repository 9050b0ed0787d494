//
// config.rs
// Seg-Audit
//
// Loads the JSON run configurations, resolving ${name} references against top-level scalar values.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuditError, AuditResult};
use crate::labels::LabelMap;

pub const DEFAULT_METRIC_CONFIG: &str = "./configs/metric_extractor.json";
pub const DEFAULT_FEATURE_CONFIG: &str = "./configs/feature_extractor.json";

/// Settings of the metric extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricExtractorConfig {
    /// Root holding the ground-truth segmentations, one directory per subject.
    pub data_path: PathBuf,
    /// Model name -> root holding that model's predictions.
    pub model_predictions_paths: BTreeMap<String, PathBuf>,
    /// Region name -> label value.
    pub labels: BTreeMap<String, f64>,
    pub output_path: PathBuf,
    pub filename: String,
    #[serde(default)]
    pub logs_path: Option<PathBuf>,
    #[serde(default = "default_segmentation_suffix")]
    pub ground_truth_suffix: String,
    #[serde(default = "default_prediction_suffix")]
    pub prediction_suffix: String,
}

impl MetricExtractorConfig {
    pub fn label_map(&self) -> LabelMap {
        LabelMap::from_names(&self.labels)
    }

    pub fn output_file(&self) -> PathBuf {
        self.output_path
            .join(format!("extracted_information_{}.csv", self.filename))
    }
}

/// Which feature families the feature pipeline computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    pub statistical: bool,
    pub texture: bool,
    pub spatial: bool,
    pub tumor: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            statistical: true,
            texture: true,
            spatial: true,
            tumor: true,
        }
    }
}

/// Settings of the feature extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractorConfig {
    /// Dataset name -> root directory.
    pub data_paths: BTreeMap<String, PathBuf>,
    pub labels: BTreeMap<String, f64>,
    /// Sequence suffixes such as `_t1`.
    pub sequences: Vec<String>,
    #[serde(default = "default_segmentation_suffix")]
    pub segmentation: String,
    #[serde(default)]
    pub features: FeatureToggles,
    #[serde(default)]
    pub remove_empty_planes: bool,
    pub output_path: PathBuf,
    #[serde(default)]
    pub logs_path: Option<PathBuf>,
}

impl FeatureExtractorConfig {
    pub fn label_map(&self) -> LabelMap {
        LabelMap::from_names(&self.labels)
    }

    pub fn output_file(&self, dataset: &str) -> PathBuf {
        self.output_path
            .join(format!("extracted_information_{dataset}.csv"))
    }
}

fn default_segmentation_suffix() -> String {
    "_seg".to_string()
}

fn default_prediction_suffix() -> String {
    "_pred".to_string()
}

/// Reads and deserialises a configuration file.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> AuditResult<T> {
    if !path.is_file() {
        return Err(AuditError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| AuditError::InvalidConfig(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&contents)
}

/// Parses configuration text, substituting variables before deserialising.
pub fn parse_config<T: DeserializeOwned>(contents: &str) -> AuditResult<T> {
    let mut document: Value =
        serde_json::from_str(contents).map_err(|e| AuditError::InvalidConfig(e.to_string()))?;
    let variables = match &document {
        Value::Object(map) => scalar_variables(map),
        _ => {
            return Err(AuditError::InvalidConfig(
                "top level must be a JSON object".into(),
            ))
        }
    };
    substitute(&mut document, &variables);
    serde_json::from_value(document).map_err(|e| AuditError::InvalidConfig(e.to_string()))
}

fn scalar_variables(map: &Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect()
}

fn substitute(value: &mut Value, variables: &BTreeMap<String, String>) {
    match value {
        Value::String(s) => *s = expand(s, variables),
        Value::Array(items) => items.iter_mut().for_each(|v| substitute(v, variables)),
        Value::Object(map) => map.values_mut().for_each(|v| substitute(v, variables)),
        _ => {}
    }
}

/// Replaces every `${name}` whose name is a word (`[A-Za-z0-9_]+`) and a known variable.
fn expand(text: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let resolved = after.find('}').and_then(|end| {
            let name = &after[..end];
            let is_word = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if is_word {
                variables.get(name).map(|v| (v, end))
            } else {
                None
            }
        });
        match resolved {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
