use serde::{Deserialize, Serialize};
use tracing::warn;

/// Physical voxel size along the (axial, coronal, sagittal) axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    pub axial: f64,
    pub coronal: f64,
    pub sagittal: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self::isotropic()
    }
}

impl From<[f64; 3]> for Spacing {
    fn from(value: [f64; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl Spacing {
    pub fn new(axial: f64, coronal: f64, sagittal: f64) -> Self {
        Self {
            axial,
            coronal,
            sagittal,
        }
    }

    pub fn isotropic() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Replaces non-finite or non-positive components with 1.0.
    pub fn sanitized(self) -> Self {
        let fix = |v: f64, axis: &str| {
            if v.is_finite() && v > 0.0 {
                v
            } else {
                warn!("Invalid {axis} spacing {v}, falling back to 1.0");
                1.0
            }
        };
        Self::new(
            fix(self.axial, "axial"),
            fix(self.coronal, "coronal"),
            fix(self.sagittal, "sagittal"),
        )
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.axial, self.coronal, self.sagittal]
    }

    pub fn voxel_volume(&self) -> f64 {
        self.axial * self.coronal * self.sagittal
    }

    /// Physical volume covered by `count` voxels.
    pub fn physical_volume(&self, count: usize) -> f64 {
        count as f64 * self.voxel_volume()
    }

    /// Converts a voxel coordinate into physical units, componentwise.
    pub fn scale(&self, coords: [f64; 3]) -> [f64; 3] {
        [
            coords[0] * self.axial,
            coords[1] * self.coronal,
            coords[2] * self.sagittal,
        ]
    }

    /// Euclidean distance between two voxel coordinates in physical units.
    pub fn distance(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        let a = self.scale(a);
        let b = self.scale(b);
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}

/// Spacing to use for a possibly absent volume.
pub fn resolve_spacing(spacing: Option<Spacing>) -> Spacing {
    match spacing {
        Some(spacing) => spacing,
        None => {
            warn!("Sequence empty. Assuming isotropic spacing (1, 1, 1).");
            Spacing::isotropic()
        }
    }
}
