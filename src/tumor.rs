//
// tumor.rs
// Seg-Audit
//
// Label counts, lesion volume, centroids and slice extents of a segmentation volume.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;

use ndarray::{ArrayView3, Axis};
use ordered_float::OrderedFloat;

use crate::labels::{voxel_key, LabelMap};
use crate::models::Features;
use crate::spacing::Spacing;

const PLANES: [&str; 3] = ["axial", "coronal", "sagittal"];

/// Tumour descriptors of a possibly missing segmentation.
#[derive(Debug, Clone)]
pub struct TumorFeatures<'a> {
    segmentation: Option<ArrayView3<'a, f32>>,
    spacing: Spacing,
    mapping: Option<&'a LabelMap>,
}

impl<'a> TumorFeatures<'a> {
    pub fn new(
        segmentation: Option<ArrayView3<'a, f32>>,
        spacing: Spacing,
        mapping: Option<&'a LabelMap>,
    ) -> Self {
        Self {
            segmentation,
            spacing,
            mapping,
        }
    }

    fn key(&self, label: f32) -> String {
        match self.mapping {
            Some(mapping) => mapping.voxel_key(label),
            None => voxel_key(label),
        }
    }

    /// Voxel count of every distinct label value, the background included.
    fn label_counts(&self) -> BTreeMap<OrderedFloat<f32>, usize> {
        let mut counts = BTreeMap::new();
        if let Some(segmentation) = &self.segmentation {
            for &v in segmentation.iter() {
                *counts.entry(OrderedFloat(v)).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Voxels per label present, keyed by mapped name or the label's string form.
    pub fn count_tumor_pixels(&self) -> Features {
        if self.segmentation.is_none() {
            return self
                .mapping
                .map(|mapping| mapping.names().map(|name| (name.to_string(), f64::NAN)).collect())
                .unwrap_or_default();
        }
        self.label_counts()
            .into_iter()
            .map(|(label, count)| (self.key(label.0), count as f64))
            .collect()
    }

    /// Physical volume of all non-zero voxels.
    pub fn calculate_lesion_size(&self) -> Features {
        let size = match &self.segmentation {
            None => f64::NAN,
            Some(segmentation) => {
                let count = segmentation.iter().filter(|&&v| v != 0.0).count();
                self.spacing.physical_volume(count)
            }
        };
        [("lesion_size", size)].into_iter().collect()
    }

    /// Spacing-scaled centroid of the voxels equal to `label`, or of every non-zero voxel.
    pub fn get_tumor_center_mass(&self, label: Option<f64>) -> [f64; 3] {
        let Some(segmentation) = &self.segmentation else {
            return [f64::NAN; 3];
        };
        let mut count = 0usize;
        let mut sum = [0.0; 3];
        for ((a, c, s), &v) in segmentation.indexed_iter() {
            let hit = match label {
                Some(label) => v == label as f32,
                None => v != 0.0,
            };
            if hit {
                count += 1;
                sum[0] += a as f64;
                sum[1] += c as f64;
                sum[2] += s as f64;
            }
        }
        if count == 0 {
            return [f64::NAN; 3];
        }
        self.spacing.scale(sum.map(|v| v / count as f64))
    }

    /// Sorted indices of the planes holding tumour, per anatomical axis; `None` without segmentation.
    pub fn get_tumor_slices(&self) -> Option<[Vec<usize>; 3]> {
        let segmentation = self.segmentation.as_ref()?;
        let per_axis = |axis: usize| -> Vec<usize> {
            segmentation
                .axis_iter(Axis(axis))
                .enumerate()
                .filter(|(_, plane)| plane.iter().any(|&v| v != 0.0))
                .map(|(index, _)| index)
                .collect()
        };
        Some([per_axis(0), per_axis(1), per_axis(2)])
    }

    /// Number of tumour-bearing planes per axis.
    pub fn calculate_tumor_slices(&self) -> Features {
        let counts = match self.get_tumor_slices() {
            Some(slices) => slices.map(|s| s.len() as f64),
            None => [f64::NAN; 3],
        };
        PLANES
            .iter()
            .zip(counts)
            .map(|(plane, count)| (format!("{plane}_tumor_slice"), count))
            .collect()
    }

    /// First and last tumour-bearing plane per axis; NaN when there is none.
    pub fn calculate_position_tumor_slices(&self) -> Features {
        let slices = self.get_tumor_slices();
        let mut features = Features::new();
        for (axis, plane) in PLANES.iter().enumerate() {
            let indices = slices.as_ref().map(|s| s[axis].as_slice()).unwrap_or(&[]);
            let lower = indices.first().map_or(f64::NAN, |&i| i as f64);
            let upper = indices.last().map_or(f64::NAN, |&i| i as f64);
            features.insert(format!("lower_{plane}_tumor_slice"), lower);
            features.insert(format!("upper_{plane}_tumor_slice"), upper);
        }
        features
    }

    /// Physical volume of every non-zero label, keyed `lesion_size_<label>`.
    pub fn calculate_tumor_pixel(&self) -> Features {
        if self.segmentation.is_none() {
            return self
                .mapping
                .map(|mapping| {
                    mapping
                        .regions()
                        .into_iter()
                        .map(|(_, name)| (format!("lesion_size_{name}"), f64::NAN))
                        .collect()
                })
                .unwrap_or_default();
        }
        self.label_counts()
            .into_iter()
            .filter(|(label, _)| label.0 != 0.0)
            .map(|(label, count)| {
                (
                    format!("lesion_size_{}", self.key(label.0)),
                    self.spacing.physical_volume(count),
                )
            })
            .collect()
    }

    /// Physical distance between the tumour centroid and a brain centre of mass.
    pub fn calculate_tumor_distance(&self, brain_centre_mass: [f64; 3]) -> Features {
        let tumor = self.get_tumor_center_mass(None);
        let distance = tumor
            .iter()
            .zip(brain_centre_mass.iter())
            .map(|(t, b)| (t - b) * (t - b))
            .sum::<f64>()
            .sqrt();
        [("tumor_distance", distance)].into_iter().collect()
    }

    pub fn extract_features(&self, brain_centre_mass: Option<[f64; 3]>) -> Features {
        let mut features = self.calculate_lesion_size();
        features.extend(self.calculate_tumor_pixel());
        features.extend(self.calculate_tumor_slices());
        features.extend(self.calculate_position_tumor_slices());
        let centre = self.get_tumor_center_mass(None);
        for (plane, value) in PLANES.iter().zip(centre) {
            features.insert(format!("{plane}_tumor_centre_mass"), value);
        }
        features.extend(self.calculate_tumor_distance(brain_centre_mass.unwrap_or([f64::NAN; 3])));
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr3, Array3};

    fn segmentation() -> Array3<f32> {
        arr3(&[
            [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
            [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
            [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
        ])
    }

    fn multiple_labels() -> Array3<f32> {
        arr3(&[
            [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
            [[1.0, 2.0, 2.0], [2.0, 2.0, 0.0], [0.0, 0.0, 0.0]],
            [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
        ])
    }

    fn approx(a: [f64; 3], b: [f64; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn counts_include_background() {
        let seg = segmentation();
        let counts = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), None).count_tumor_pixels();
        assert_eq!(counts.get("0"), Some(22.0));
        assert_eq!(counts.get("1"), Some(5.0));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn counts_without_segmentation() {
        let mapping = LabelMap::from_pairs([(1.0, "Tumor"), (2.0, "Edema")]);
        let counts = TumorFeatures::new(None, Spacing::isotropic(), Some(&mapping)).count_tumor_pixels();
        assert_eq!(counts.len(), 2);
        assert!(counts.get("tumor").unwrap_or(0.0).is_nan());
        assert!(counts.get("edema").unwrap_or(0.0).is_nan());

        let counts = TumorFeatures::new(None, Spacing::isotropic(), None).count_tumor_pixels();
        assert!(counts.is_empty());
    }

    #[test]
    fn counts_with_full_and_partial_mapping() {
        let seg = multiple_labels();
        let mapping = LabelMap::from_pairs([(0.0, "BKG"), (1.0, "Tumor"), (2.0, "Edema")]);
        let counts = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), Some(&mapping))
            .count_tumor_pixels();
        assert_eq!(counts.get("bkg"), Some(21.0));
        assert_eq!(counts.get("tumor"), Some(2.0));
        assert_eq!(counts.get("edema"), Some(4.0));

        let partial = LabelMap::from_pairs([(0.0, "Background"), (1.0, "Tumor")]);
        let counts = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), Some(&partial))
            .count_tumor_pixels();
        assert_eq!(counts.get("background"), Some(21.0));
        assert_eq!(counts.get("2"), Some(4.0));
    }

    #[test]
    fn counts_for_empty_and_background_only_volumes() {
        let empty = Array3::<f32>::zeros((0, 0, 0));
        let counts = TumorFeatures::new(Some(empty.view()), Spacing::isotropic(), None).count_tumor_pixels();
        assert!(counts.is_empty());

        let zeros = Array3::<f32>::zeros((3, 3, 3));
        let mapping = LabelMap::from_pairs([(0.0, "Background")]);
        let counts = TumorFeatures::new(Some(zeros.view()), Spacing::isotropic(), Some(&mapping))
            .count_tumor_pixels();
        assert_eq!(counts.iter().collect::<Vec<_>>(), vec![("background", 27.0)]);
    }

    #[test]
    fn counts_negative_and_float_labels() {
        let seg = arr3(&[[[0.0, -1.0, -1.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.0]]]);
        let mapping = LabelMap::from_pairs([(-1.0, "Artifact"), (1.0, "Tumor"), (0.0, "Background")]);
        let counts = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), Some(&mapping))
            .count_tumor_pixels();
        assert_eq!(counts.get("background"), Some(5.0));
        assert_eq!(counts.get("artifact"), Some(2.0));
        assert_eq!(counts.get("tumor"), Some(2.0));

        let seg = arr3(&[[[0.0, 1.5, 1.5], [2.5, 2.5, 0.0], [0.0, 0.0, 0.0]]]);
        let counts = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), None).count_tumor_pixels();
        assert_eq!(counts.get("1.5"), Some(2.0));
        assert_eq!(counts.get("2.5"), Some(2.0));
    }

    #[test]
    fn counts_non_integer_labels_with_mapping() {
        let seg = arr3(&[[[0.0, 1.0, 1.0], [2.0, 2.0, 0.0], [0.0, 0.0, 0.0]]]);
        let mapping = LabelMap::from_pairs([(0.0, "Background"), (1.0, "Tumor1"), (2.0, "Tumor2")]);
        let counts = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), Some(&mapping))
            .count_tumor_pixels();
        assert_eq!(
            counts.iter().collect::<Vec<_>>(),
            vec![("background", 5.0), ("tumor1", 2.0), ("tumor2", 2.0)]
        );

        let seg = arr3(&[[[0.0, 0.1, 0.1], [2.7, 2.7, 0.0], [0.0, 0.1, 0.0]]]);
        let mapping = LabelMap::from_pairs([(0.0, "Background"), (0.1, "Core"), (2.7, "Rim")]);
        let tumor = TumorFeatures::new(Some(seg.view()), Spacing::new(2.0, 1.0, 1.0), Some(&mapping));
        let counts = tumor.count_tumor_pixels();
        assert_eq!(counts.get("background"), Some(4.0));
        assert_eq!(counts.get("core"), Some(3.0));
        assert_eq!(counts.get("rim"), Some(2.0));
        assert_eq!(counts.len(), 3);

        let sizes = tumor.calculate_tumor_pixel();
        assert_eq!(sizes.get("lesion_size_core"), Some(6.0));
        assert_eq!(sizes.get("lesion_size_rim"), Some(4.0));
        assert!(approx(tumor.get_tumor_center_mass(Some(2.7)), [0.0, 1.0, 0.5]));

        let unmapped = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), None).count_tumor_pixels();
        assert_eq!(unmapped.get("0.1"), Some(3.0));
        assert_eq!(unmapped.get("2.7"), Some(2.0));
    }

    #[test]
    fn lesion_size_edge_cases() {
        let none = TumorFeatures::new(None, Spacing::isotropic(), None).calculate_lesion_size();
        assert!(none.get("lesion_size").unwrap_or(0.0).is_nan());

        let empty = Array3::<f32>::zeros((0, 0, 0));
        let size = TumorFeatures::new(Some(empty.view()), Spacing::isotropic(), None).calculate_lesion_size();
        assert_eq!(size.get("lesion_size"), Some(0.0));

        let zeros = Array3::<f32>::zeros((3, 3, 3));
        let size = TumorFeatures::new(Some(zeros.view()), Spacing::isotropic(), None).calculate_lesion_size();
        assert_eq!(size.get("lesion_size"), Some(0.0));

        let seg = segmentation();
        let size = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), None).calculate_lesion_size();
        assert_eq!(size.get("lesion_size"), Some(5.0));

        let labels = multiple_labels();
        let size = TumorFeatures::new(Some(labels.view()), Spacing::isotropic(), None).calculate_lesion_size();
        assert_eq!(size.get("lesion_size"), Some(6.0));
    }

    #[test]
    fn lesion_size_scales_with_spacing() {
        let full = Array3::<f32>::ones((10, 10, 10));
        let iso = TumorFeatures::new(Some(full.view()), Spacing::new(2.0, 2.0, 2.0), None);
        assert_eq!(iso.calculate_lesion_size().get("lesion_size"), Some(8000.0));
        let aniso = TumorFeatures::new(Some(full.view()), Spacing::new(0.5, 4.0, 0.5), None);
        assert_eq!(aniso.calculate_lesion_size().get("lesion_size"), Some(1000.0));
    }

    #[test]
    fn centre_of_mass_per_label() {
        let seg = segmentation();
        let tumor = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), None);
        assert!(approx(tumor.get_tumor_center_mass(Some(1.0)), [1.0, 1.4, 1.2]));
        assert!(tumor.get_tumor_center_mass(Some(3.0)).iter().all(|v| v.is_nan()));

        let scaled = TumorFeatures::new(Some(seg.view()), Spacing::new(2.0, 2.0, 2.0), None);
        assert!(approx(scaled.get_tumor_center_mass(Some(1.0)), [2.0, 2.8, 2.4]));

        let labels = multiple_labels();
        let tumor = TumorFeatures::new(Some(labels.view()), Spacing::isotropic(), None);
        assert!(approx(tumor.get_tumor_center_mass(Some(2.0)), [1.0, 0.5, 1.0]));
        let tumor = TumorFeatures::new(Some(labels.view()), Spacing::new(1.0, 2.0, 4.0), None);
        assert!(approx(tumor.get_tumor_center_mass(Some(2.0)), [1.0, 1.0, 4.0]));

        let mut partial = multiple_labels();
        partial[[0, 0, 0]] = 4.0;
        let tumor = TumorFeatures::new(Some(partial.view()), Spacing::isotropic(), None);
        assert!(approx(tumor.get_tumor_center_mass(Some(4.0)), [0.0, 0.0, 0.0]));

        let cube = Array3::<f32>::ones((10, 10, 10));
        let tumor = TumorFeatures::new(Some(cube.view()), Spacing::isotropic(), None);
        assert!(approx(tumor.get_tumor_center_mass(Some(1.0)), [4.5, 4.5, 4.5]));
    }

    #[test]
    fn centre_of_mass_undefined_without_tumour() {
        let none = TumorFeatures::new(None, Spacing::isotropic(), None);
        assert!(none.get_tumor_center_mass(None).iter().all(|v| v.is_nan()));
        let zeros = Array3::<f32>::zeros((3, 3, 3));
        let empty = TumorFeatures::new(Some(zeros.view()), Spacing::isotropic(), None);
        assert!(empty.get_tumor_center_mass(None).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn tumour_slices_per_plane() {
        let seg = segmentation();
        let tumor = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), None);
        let [axial, coronal, sagittal] = tumor.get_tumor_slices().expect("slices");
        assert_eq!(axial, vec![1]);
        assert_eq!(coronal, vec![1, 2]);
        assert_eq!(sagittal, vec![0, 1, 2]);

        let counts = tumor.calculate_tumor_slices();
        assert_eq!(counts.get("axial_tumor_slice"), Some(1.0));
        assert_eq!(counts.get("coronal_tumor_slice"), Some(2.0));
        assert_eq!(counts.get("sagittal_tumor_slice"), Some(3.0));

        let positions = tumor.calculate_position_tumor_slices();
        assert_eq!(positions.get("lower_coronal_tumor_slice"), Some(1.0));
        assert_eq!(positions.get("upper_coronal_tumor_slice"), Some(2.0));
        assert_eq!(positions.get("upper_sagittal_tumor_slice"), Some(2.0));
    }

    #[test]
    fn tumour_slices_without_tumour() {
        assert!(TumorFeatures::new(None, Spacing::isotropic(), None)
            .get_tumor_slices()
            .is_none());
        let zeros = Array3::<f32>::zeros((3, 3, 3));
        let tumor = TumorFeatures::new(Some(zeros.view()), Spacing::isotropic(), None);
        let slices = tumor.get_tumor_slices().expect("slices");
        assert!(slices.iter().all(|s| s.is_empty()));
        assert!(tumor
            .calculate_position_tumor_slices()
            .iter()
            .all(|(_, v)| v.is_nan()));
        assert_eq!(tumor.calculate_tumor_slices().get("axial_tumor_slice"), Some(0.0));
    }

    #[test]
    fn per_label_lesion_size() {
        let labels = multiple_labels();
        let tumor = TumorFeatures::new(Some(labels.view()), Spacing::new(2.0, 1.0, 1.0), None);
        let sizes = tumor.calculate_tumor_pixel();
        assert_eq!(sizes.get("lesion_size_1"), Some(4.0));
        assert_eq!(sizes.get("lesion_size_2"), Some(8.0));
        assert!(!sizes.contains("lesion_size_0"));
    }

    #[test]
    fn distance_to_brain_centre() {
        let seg = segmentation();
        let tumor = TumorFeatures::new(Some(seg.view()), Spacing::isotropic(), None);
        let d = tumor.calculate_tumor_distance([1.0, 1.4, 0.2]);
        assert!((d.get("tumor_distance").unwrap_or(f64::NAN) - 1.0).abs() < 1e-9);

        let features = tumor.extract_features(None);
        assert!(features.get("tumor_distance").unwrap_or(0.0).is_nan());
        assert_eq!(features.get("lesion_size"), Some(5.0));
        assert!(features.contains("axial_tumor_centre_mass"));
    }
}
