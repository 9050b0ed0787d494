use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

/// Canonical string form of a voxel label: `2` for 2.0, `-1` for -1.0, `2.5` for 2.5.
///
/// Printed at the voxel's own precision, so `0.1_f32` reads `0.1`.
pub fn voxel_key(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Immutable label value -> lower-cased region name mapping.
///
/// Labels are compared by value, so `1` and `1.0` address the same entry and
/// negative or non-contiguous values are valid keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    entries: BTreeMap<OrderedFloat<f64>, String>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from `(value, name)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, S)>,
        S: AsRef<str>,
    {
        let entries = pairs
            .into_iter()
            .map(|(value, name)| (OrderedFloat(value), name.as_ref().to_lowercase()))
            .collect();
        Self { entries }
    }

    /// Builds the map from the `name -> value` layout used by configuration files.
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a f64)>,
    {
        Self::from_pairs(names.into_iter().map(|(name, value)| (*value, name)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn name(&self, label: f64) -> Option<&str> {
        self.entries.get(&OrderedFloat(label)).map(String::as_str)
    }

    /// Name of the label a stored voxel value encodes. Voxels are `f32`, so labels compare at that precision.
    pub fn voxel_name(&self, value: f32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(label, _)| label.0 as f32 == value)
            .map(|(_, name)| name.as_str())
    }

    /// Mapped name of a voxel value, or its string form when unmapped.
    pub fn voxel_key(&self, value: f32) -> String {
        self.voxel_name(value)
            .map(str::to_owned)
            .unwrap_or_else(|| voxel_key(value))
    }

    /// All mapped label values in ascending order.
    pub fn labels(&self) -> Vec<f64> {
        self.entries.keys().map(|k| k.0).collect()
    }

    /// Mapped names in ascending label order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// `(value, name)` pairs for every non-zero label, ascending.
    pub fn regions(&self) -> Vec<(f64, &str)> {
        self.entries
            .iter()
            .filter(|(k, _)| k.0 != 0.0)
            .map(|(k, v)| (k.0, v.as_str()))
            .collect()
    }
}
