//
// models.rs
// Seg-Audit
//
// Defines the ordered feature maps and the metric/feature rows written by the pipelines.
//
// Thales Matheus Mendonça Santos - November 2025

use serde::{Deserialize, Serialize};

use crate::segmentation_metrics::RegionMetrics;

/// Insertion-ordered `name -> value` map; NaN marks an undefined feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features(Vec<(String, f64)>);

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: Features) {
        for (name, value) in other.0 {
            self.insert(name, value);
        }
    }

    /// Renames every entry to `{prefix}_{name}`.
    pub fn with_prefix(self, prefix: &str) -> Features {
        Features(
            self.0
                .into_iter()
                .map(|(name, value)| (format!("{prefix}_{name}"), value))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Features {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut features = Features::new();
        for (name, value) in iter {
            features.insert(name, value);
        }
        features
    }
}

/// One row of the metric table: a region of a subject as segmented by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: String,
    pub model: String,
    pub region: String,
    pub metrics: RegionMetrics,
}

/// One row of the feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    pub set: String,
    pub features: Features,
}
