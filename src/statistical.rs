use ndarray::{ArrayView, Dimension};

use crate::models::Features;

/// Distributional descriptors of the voxel intensities of a volume.
///
/// Intensities are flattened and sorted once; every descriptor is NaN for a missing or empty volume.
/// A single NaN voxel makes every descriptor NaN, order statistics included.
#[derive(Debug, Clone)]
pub struct StatisticalFeatures {
    sorted: Vec<f64>,
    has_nan: bool,
}

impl StatisticalFeatures {
    pub fn new<D: Dimension>(sequence: Option<ArrayView<f32, D>>) -> Self {
        let mut sorted: Vec<f64> = sequence
            .map(|s| s.iter().map(|&v| v as f64).collect())
            .unwrap_or_default();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let has_nan = sorted.iter().any(|v| v.is_nan());
        Self { sorted, has_nan }
    }

    /// Value at `rank` of the sorted intensities, NaN when undefined.
    fn order_statistic(&self, rank: Option<usize>) -> f64 {
        if self.has_nan {
            return f64::NAN;
        }
        rank.and_then(|r| self.sorted.get(r)).copied().unwrap_or(f64::NAN)
    }

    fn count(&self) -> f64 {
        self.sorted.len() as f64
    }

    pub fn get_max_intensity(&self) -> f64 {
        self.order_statistic(self.sorted.len().checked_sub(1))
    }

    pub fn get_min_intensity(&self) -> f64 {
        self.order_statistic(Some(0))
    }

    pub fn get_mean_intensity(&self) -> f64 {
        if self.sorted.is_empty() {
            return f64::NAN;
        }
        self.sorted.iter().sum::<f64>() / self.count()
    }

    pub fn get_median_intensity(&self) -> f64 {
        self.get_percentile_n(50.0)
    }

    /// Percentile with linear interpolation between the closest ranks.
    pub fn get_percentile_n(&self, percentile: f64) -> f64 {
        let n = self.sorted.len();
        if n == 0 || self.has_nan {
            return f64::NAN;
        }
        let position = (percentile / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
        let lower = position.floor() as usize;
        let upper = position.ceil() as usize;
        let weight = position - lower as f64;
        self.sorted[lower] + (self.sorted[upper] - self.sorted[lower]) * weight
    }

    fn central_moment(&self, order: i32) -> f64 {
        let mean = self.get_mean_intensity();
        self.sorted
            .iter()
            .map(|v| (v - mean).powi(order))
            .sum::<f64>()
            / self.count()
    }

    /// Population standard deviation.
    pub fn get_std_intensity(&self) -> f64 {
        if self.sorted.is_empty() {
            return f64::NAN;
        }
        self.central_moment(2).sqrt()
    }

    pub fn get_range_intensity(&self) -> f64 {
        self.get_max_intensity() - self.get_min_intensity()
    }

    /// Fisher-Pearson coefficient without bias correction.
    pub fn get_skewness(&self) -> f64 {
        if self.sorted.is_empty() {
            return f64::NAN;
        }
        let m2 = self.central_moment(2);
        self.central_moment(3) / m2.powf(1.5)
    }

    /// Excess (Fisher) kurtosis without bias correction.
    pub fn get_kurtosis(&self) -> f64 {
        if self.sorted.is_empty() {
            return f64::NAN;
        }
        let m2 = self.central_moment(2);
        self.central_moment(4) / (m2 * m2) - 3.0
    }

    pub fn extract_features(&self) -> Features {
        let mut features = Features::new();
        features.insert("max_intensity", self.get_max_intensity());
        features.insert("min_intensity", self.get_min_intensity());
        features.insert("mean_intensity", self.get_mean_intensity());
        features.insert("median_intensity", self.get_median_intensity());
        features.insert("10_perc_intensity", self.get_percentile_n(10.0));
        features.insert("90_perc_intensity", self.get_percentile_n(90.0));
        features.insert("std_intensity", self.get_std_intensity());
        features.insert("range_intensity", self.get_range_intensity());
        features.insert("skewness", self.get_skewness());
        features.insert("kurtosis", self.get_kurtosis());
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn ramp() -> Array3<f32> {
        Array3::from_shape_fn((3, 3, 3), |(z, y, x)| (z * 9 + y * 3 + x) as f32)
    }

    #[test]
    fn descriptors_of_a_ramp() {
        let volume = ramp();
        let features = StatisticalFeatures::new(Some(volume.view())).extract_features();
        assert_eq!(features.get("max_intensity"), Some(26.0));
        assert_eq!(features.get("min_intensity"), Some(0.0));
        assert_eq!(features.get("range_intensity"), Some(26.0));
        assert!(close(features.get("mean_intensity").unwrap_or(f64::NAN), 13.0));
        assert!(close(features.get("median_intensity").unwrap_or(f64::NAN), 13.0));
        assert!(close(features.get("10_perc_intensity").unwrap_or(f64::NAN), 2.6));
        assert!(close(features.get("90_perc_intensity").unwrap_or(f64::NAN), 23.4));
        assert!(close(
            features.get("std_intensity").unwrap_or(f64::NAN),
            (728.0_f64 / 12.0).sqrt()
        ));
        assert!(close(features.get("skewness").unwrap_or(f64::NAN), 0.0));
        assert!(close(
            features.get("kurtosis").unwrap_or(f64::NAN),
            -6.0 * 730.0 / (5.0 * 728.0)
        ));
    }

    #[test]
    fn descriptors_of_a_flat_sequence() {
        let values = Array1::from(vec![1.0_f32, 2.0, 3.0, 4.0, 5.0]);
        let stats = StatisticalFeatures::new(Some(values.view()));
        assert!(close(stats.get_percentile_n(10.0), 1.4));
        assert!(close(stats.get_percentile_n(90.0), 4.6));
        assert!(close(stats.get_std_intensity(), 2.0_f64.sqrt()));
        assert!(close(stats.get_kurtosis(), -1.3));
    }

    #[test]
    fn nan_voxel_propagates_to_every_descriptor() {
        let mut volume = ramp();
        volume[[1, 1, 1]] = f32::NAN;
        let features = StatisticalFeatures::new(Some(volume.view())).extract_features();
        assert_eq!(features.len(), 10);
        for (name, value) in features.iter() {
            assert!(value.is_nan(), "{name} should be NaN, got {value}");
        }
    }

    #[test]
    fn skewness_sign_follows_tail() {
        let values = Array1::from(vec![0.0_f32, 0.0, 0.0, 1.0, 10.0]);
        let stats = StatisticalFeatures::new(Some(values.view()));
        assert!(stats.get_skewness() > 0.0);
    }

    #[test]
    fn missing_or_constant_volume_is_undefined() {
        let stats = StatisticalFeatures::new::<ndarray::Ix3>(None);
        assert!(stats.extract_features().iter().all(|(_, v)| v.is_nan()));

        let constant = Array3::<f32>::from_elem((2, 2, 2), 4.0);
        let stats = StatisticalFeatures::new(Some(constant.view()));
        assert_eq!(stats.get_std_intensity(), 0.0);
        assert!(stats.get_skewness().is_nan());
        assert!(stats.get_kurtosis().is_nan());
    }
}
