use ndarray::ArrayView3;

use crate::models::Features;
use crate::spacing::Spacing;

const PLANES: [&str; 3] = ["axial", "coronal", "sagittal"];

/// Volume shape and intensity-weighted centre of mass.
#[derive(Debug, Clone)]
pub struct SpatialFeatures<'a> {
    sequence: Option<ArrayView3<'a, f32>>,
    spacing: Spacing,
}

impl<'a> SpatialFeatures<'a> {
    pub fn new(sequence: Option<ArrayView3<'a, f32>>, spacing: Spacing) -> Self {
        Self { sequence, spacing }
    }

    pub fn get_shape(&self) -> Features {
        let dims = match &self.sequence {
            Some(sequence) => {
                let (a, c, s) = sequence.dim();
                [a as f64, c as f64, s as f64]
            }
            None => [f64::NAN; 3],
        };
        PLANES
            .iter()
            .zip(dims)
            .map(|(plane, dim)| (format!("{plane}_dim"), dim))
            .collect()
    }

    /// Intensity-weighted centroid per axis, scaled by spacing.
    ///
    /// NaN when the volume is missing or its intensities sum to zero.
    pub fn brain_center_mass(&self) -> [f64; 3] {
        let Some(sequence) = &self.sequence else {
            return [f64::NAN; 3];
        };
        let mut total = 0.0;
        let mut weighted = [0.0; 3];
        for ((a, c, s), &v) in sequence.indexed_iter() {
            let v = v as f64;
            total += v;
            weighted[0] += v * a as f64;
            weighted[1] += v * c as f64;
            weighted[2] += v * s as f64;
        }
        self.spacing.scale(weighted.map(|w| w / total))
    }

    pub fn calculate_brain_center_mass(&self) -> Features {
        PLANES
            .iter()
            .zip(self.brain_center_mass())
            .map(|(plane, value)| (format!("{plane}_brain_centre_mass"), value))
            .collect()
    }

    pub fn extract_features(&self) -> Features {
        let mut features = self.get_shape();
        features.extend(self.calculate_brain_center_mass());
        features
    }
}
