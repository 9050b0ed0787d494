//
// texture.rs
// Seg-Audit
//
// Gray-level co-occurrence texture descriptors computed per axial plane and aggregated over the volume.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

use crate::error::AuditError;
use crate::models::Features;

const LEVELS: usize = 256;

/// Co-occurrence descriptors available for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Texture {
    Contrast,
    Dissimilarity,
    Homogeneity,
    Asm,
    Energy,
    Correlation,
}

impl Texture {
    pub const ALL: [Texture; 6] = [
        Texture::Contrast,
        Texture::Dissimilarity,
        Texture::Homogeneity,
        Texture::Asm,
        Texture::Energy,
        Texture::Correlation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Texture::Contrast => "contrast",
            Texture::Dissimilarity => "dissimilarity",
            Texture::Homogeneity => "homogeneity",
            Texture::Asm => "ASM",
            Texture::Energy => "energy",
            Texture::Correlation => "correlation",
        }
    }
}

impl fmt::Display for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Texture {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Texture::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| AuditError::Invalid(format!("unknown texture: {s}")))
    }
}

/// All descriptors of one plane. Every field is NaN for a plane without co-occurrences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlcmProperties {
    pub contrast: f64,
    pub dissimilarity: f64,
    pub homogeneity: f64,
    pub asm: f64,
    pub energy: f64,
    pub correlation: f64,
}

impl GlcmProperties {
    fn undefined() -> Self {
        Self {
            contrast: f64::NAN,
            dissimilarity: f64::NAN,
            homogeneity: f64::NAN,
            asm: f64::NAN,
            energy: f64::NAN,
            correlation: f64::NAN,
        }
    }

    pub fn get(&self, texture: Texture) -> f64 {
        match texture {
            Texture::Contrast => self.contrast,
            Texture::Dissimilarity => self.dissimilarity,
            Texture::Homogeneity => self.homogeneity,
            Texture::Asm => self.asm,
            Texture::Energy => self.energy,
            Texture::Correlation => self.correlation,
        }
    }

    /// Symmetric, normalised co-occurrence of horizontally adjacent pixels (distance 1, angle 0).
    pub fn from_levels(levels: ArrayView2<u8>) -> Self {
        let mut glcm = vec![0.0_f64; LEVELS * LEVELS];
        let mut pairs = 0usize;
        for row in levels.rows() {
            for window in row.windows(2) {
                let i = window[0] as usize;
                let j = window[1] as usize;
                glcm[i * LEVELS + j] += 1.0;
                glcm[j * LEVELS + i] += 1.0;
                pairs += 2;
            }
        }
        if pairs == 0 {
            return Self::undefined();
        }
        let total = pairs as f64;

        let mut contrast = 0.0;
        let mut dissimilarity = 0.0;
        let mut homogeneity = 0.0;
        let mut asm = 0.0;
        let mut mean_i = 0.0;
        let mut mean_j = 0.0;
        let occupied: Vec<(f64, f64, f64)> = glcm
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0.0)
            .map(|(idx, &c)| ((idx / LEVELS) as f64, (idx % LEVELS) as f64, c / total))
            .collect();
        for &(i, j, p) in &occupied {
            let diff = i - j;
            contrast += p * diff * diff;
            dissimilarity += p * diff.abs();
            homogeneity += p / (1.0 + diff * diff);
            asm += p * p;
            mean_i += p * i;
            mean_j += p * j;
        }

        let mut var_i = 0.0;
        let mut var_j = 0.0;
        let mut covariance = 0.0;
        for &(i, j, p) in &occupied {
            var_i += p * (i - mean_i) * (i - mean_i);
            var_j += p * (j - mean_j) * (j - mean_j);
            covariance += p * (i - mean_i) * (j - mean_j);
        }
        let correlation = if var_i * var_j < 1e-15 {
            1.0
        } else {
            covariance / (var_i * var_j).sqrt()
        };

        Self {
            contrast,
            dissimilarity,
            homogeneity,
            asm,
            energy: asm.sqrt(),
            correlation,
        }
    }
}

/// One axial plane: its raw intensities and their quantised gray levels.
#[derive(Debug, Clone)]
pub struct Plane<'a> {
    pub index: usize,
    pub intensities: ArrayView2<'a, f32>,
    pub levels: ArrayView2<'a, u8>,
}

impl Plane<'_> {
    pub fn is_empty(&self) -> bool {
        self.intensities.iter().all(|&v| v == 0.0)
    }

    pub fn properties(&self) -> GlcmProperties {
        if self.is_empty() {
            return GlcmProperties::undefined();
        }
        GlcmProperties::from_levels(self.levels)
    }
}

/// Linear rescale of the volume range onto 256 gray levels; a constant volume maps to level 0.
pub fn quantize(volume: ArrayView3<f32>) -> Array3<u8> {
    let (min, max) = volume
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = (max - min) as f64;
    if !(range > 0.0) {
        return Array3::zeros(volume.raw_dim());
    }
    let top = (LEVELS - 1) as f64;
    volume.mapv(|v| (((v - min) as f64 / range) * top).round().clamp(0.0, top) as u8)
}

/// Texture descriptors over the axial planes of a volume.
#[derive(Debug, Clone)]
pub struct TextureFeatures<'a> {
    sequence: Option<ArrayView3<'a, f32>>,
    levels: Array3<u8>,
    remove_empty_planes: bool,
}

impl<'a> TextureFeatures<'a> {
    pub fn new(sequence: Option<ArrayView3<'a, f32>>, remove_empty_planes: bool) -> Self {
        let levels = sequence
            .as_ref()
            .map(|s| quantize(s.view()))
            .unwrap_or_else(|| Array3::zeros((0, 0, 0)));
        Self {
            sequence,
            levels,
            remove_empty_planes,
        }
    }

    /// Every axial plane in order.
    pub fn planes(&self) -> Vec<Plane<'_>> {
        let Some(sequence) = &self.sequence else {
            return Vec::new();
        };
        sequence
            .axis_iter(Axis(0))
            .zip(self.levels.axis_iter(Axis(0)))
            .enumerate()
            .map(|(index, (intensities, levels))| Plane {
                index,
                intensities,
                levels,
            })
            .collect()
    }

    /// Planes left after the optional empty-plane filter.
    pub fn selected_planes(&self) -> Vec<Plane<'_>> {
        let mut planes = self.planes();
        if self.remove_empty_planes {
            planes.retain(|plane| !plane.is_empty());
        }
        planes
    }

    pub fn plane_properties(&self) -> Vec<GlcmProperties> {
        self.selected_planes().iter().map(Plane::properties).collect()
    }

    /// One value per selected plane.
    pub fn compute_texture_values(&self, texture: Texture) -> Vec<f64> {
        self.plane_properties()
            .iter()
            .map(|props| props.get(texture))
            .collect()
    }

    /// `mean_<texture>` and `std_<texture>` for each requested texture, all six by default.
    pub fn extract_features(&self, textures: Option<&[Texture]>) -> Features {
        let textures = textures.unwrap_or(&Texture::ALL);
        let properties = self.plane_properties();
        let mut features = Features::new();
        for &texture in textures {
            let values: Vec<f64> = properties.iter().map(|p| p.get(texture)).collect();
            let (mean, std) = mean_and_std(&values);
            features.insert(format!("mean_{texture}"), mean);
            features.insert(format!("std_{texture}"), std);
        }
        features
    }
}

/// Population mean and standard deviation; NaN for an empty slice or any NaN entry.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
