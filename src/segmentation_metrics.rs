//
// segmentation_metrics.rs
// Seg-Audit
//
// Confusion counts between binary masks and the overlap, rate and distance metrics derived from them.
//
// Thales Matheus Mendonça Santos - November 2025

use ndarray::{ArrayView, ArrayView3, Dimension};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};
use crate::spacing::Spacing;

/// Voxel tallies between a ground-truth and a predicted binary mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }
}

/// Every metric computed for one region of one subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionMetrics {
    pub counts: ConfusionCounts,
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    pub accuracy: f64,
    pub dice: f64,
    pub jaccard: f64,
    pub hausdorff: f64,
    pub lesion_size: f64,
}

/// Elementwise comparison of two binary masks; empty input yields all zeros.
pub fn calculate_confusion_matrix_elements<D: Dimension>(
    ground_truth: ArrayView<u8, D>,
    prediction: ArrayView<u8, D>,
) -> AuditResult<ConfusionCounts> {
    if ground_truth.shape() != prediction.shape() {
        return Err(AuditError::ShapeMismatch {
            left: ground_truth.shape().to_vec(),
            right: prediction.shape().to_vec(),
        });
    }
    let mut counts = ConfusionCounts::default();
    for (&g, &p) in ground_truth.iter().zip(prediction.iter()) {
        match (g != 0, p != 0) {
            (true, true) => counts.tp += 1,
            (false, false) => counts.tn += 1,
            (false, true) => counts.fp += 1,
            (true, false) => counts.fn_ += 1,
        }
    }
    Ok(counts)
}

/// NaN whenever there are no true positives.
pub fn sensitivity(tp: usize, fn_: usize) -> f64 {
    if tp == 0 {
        return f64::NAN;
    }
    if fn_ == 0 {
        return 1.0;
    }
    tp as f64 / (tp + fn_) as f64
}

/// 0.0 whenever there are no true negatives, including the degenerate TN = FP = 0 case.
pub fn specificity(tn: usize, fp: usize) -> f64 {
    if tn == 0 {
        return 0.0;
    }
    if fp == 0 {
        return 1.0;
    }
    tn as f64 / (tn + fp) as f64
}

/// NaN whenever there are no true positives.
pub fn precision(tp: usize, fp: usize) -> f64 {
    if tp == 0 {
        return f64::NAN;
    }
    if fp == 0 {
        return 1.0;
    }
    tp as f64 / (tp + fp) as f64
}

pub fn accuracy(tp: usize, tn: usize, fp: usize, fn_: usize) -> f64 {
    let total = tp + tn + fp + fn_;
    if total == 0 {
        return f64::NAN;
    }
    (tp + tn) as f64 / total as f64
}

fn is_empty_mask<D: Dimension>(mask: &ArrayView<u8, D>) -> bool {
    mask.iter().all(|&v| v == 0)
}

/// Overlap rule shared by Dice and Jaccard: both masks empty is a perfect match, one empty is none.
fn overlap_edge_case<D: Dimension>(
    ground_truth: &ArrayView<u8, D>,
    prediction: &ArrayView<u8, D>,
) -> Option<f64> {
    match (is_empty_mask(ground_truth), is_empty_mask(prediction)) {
        (true, true) => Some(1.0),
        (true, false) | (false, true) => Some(0.0),
        (false, false) => None,
    }
}

pub fn dice_score<D: Dimension>(
    tp: usize,
    fp: usize,
    fn_: usize,
    ground_truth: ArrayView<u8, D>,
    prediction: ArrayView<u8, D>,
) -> f64 {
    if let Some(value) = overlap_edge_case(&ground_truth, &prediction) {
        return value;
    }
    let denominator = 2 * tp + fp + fn_;
    if denominator == 0 {
        return f64::NAN;
    }
    (2 * tp) as f64 / denominator as f64
}

pub fn jaccard_index<D: Dimension>(
    tp: usize,
    fp: usize,
    fn_: usize,
    ground_truth: ArrayView<u8, D>,
    prediction: ArrayView<u8, D>,
) -> f64 {
    if let Some(value) = overlap_edge_case(&ground_truth, &prediction) {
        return value;
    }
    let denominator = tp + fp + fn_;
    if denominator == 0 {
        return f64::NAN;
    }
    tp as f64 / denominator as f64
}

/// Symmetric Hausdorff distance between the foreground voxels of two masks, in voxel units.
pub fn hausdorff_distance<D: Dimension>(
    ground_truth: ArrayView<u8, D>,
    prediction: ArrayView<u8, D>,
) -> f64 {
    let unit = vec![1.0; ground_truth.ndim()];
    hausdorff_distance_scaled(ground_truth, prediction, &unit)
}

/// Symmetric Hausdorff distance with per-axis voxel sizes.
///
/// Both masks empty gives 0.0, exactly one empty gives NaN. Masks of different shape give NaN.
pub fn hausdorff_distance_scaled<D: Dimension>(
    ground_truth: ArrayView<u8, D>,
    prediction: ArrayView<u8, D>,
    voxel_size: &[f64],
) -> f64 {
    if ground_truth.shape() != prediction.shape() || voxel_size.len() != ground_truth.ndim() {
        return f64::NAN;
    }
    match (is_empty_mask(&ground_truth), is_empty_mask(&prediction)) {
        (true, true) => return 0.0,
        (true, false) | (false, true) => return f64::NAN,
        (false, false) => {}
    }

    let forward = directed_hausdorff(&ground_truth, &prediction, voxel_size);
    let backward = directed_hausdorff(&prediction, &ground_truth, voxel_size);
    forward.max(backward)
}

/// Largest distance from a foreground voxel of `from` to the nearest foreground voxel of `to`.
///
/// Voxels shared by both masks contribute zero, and the nearest voxel of `to` for any
/// other voxel always lies on the boundary of `to`, so only those are searched.
fn directed_hausdorff<D: Dimension>(
    from: &ArrayView<u8, D>,
    to: &ArrayView<u8, D>,
    voxel_size: &[f64],
) -> f64 {
    let from = from.view().into_dyn();
    let to = to.view().into_dyn();

    let sources: Vec<Vec<f64>> = from
        .indexed_iter()
        .filter(|(idx, v)| **v != 0 && to[idx.clone()] == 0)
        .map(|(idx, _)| scale_index(idx.slice(), voxel_size))
        .collect();
    if sources.is_empty() {
        return 0.0;
    }

    let shape = to.shape().to_vec();
    let targets: Vec<Vec<f64>> = to
        .indexed_iter()
        .filter(|(idx, v)| **v != 0 && is_boundary(&to, idx.slice(), &shape))
        .map(|(idx, _)| scale_index(idx.slice(), voxel_size))
        .collect();

    sources
        .par_iter()
        .map(|source| {
            targets
                .iter()
                .map(|target| squared_distance(source, target))
                .fold(f64::INFINITY, f64::min)
        })
        .reduce(|| 0.0, f64::max)
        .sqrt()
}

fn scale_index(index: &[usize], voxel_size: &[f64]) -> Vec<f64> {
    index
        .iter()
        .zip(voxel_size)
        .map(|(&i, &s)| i as f64 * s)
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// A foreground voxel with at least one face neighbour outside the mask or the array.
fn is_boundary(mask: &ndarray::ArrayViewD<u8>, index: &[usize], shape: &[usize]) -> bool {
    let mut neighbour = index.to_vec();
    for axis in 0..index.len() {
        let i = index[axis];
        if i == 0 || i + 1 >= shape[axis] {
            return true;
        }
        for candidate in [i - 1, i + 1] {
            neighbour[axis] = candidate;
            if mask[neighbour.as_slice()] == 0 {
                return true;
            }
        }
        neighbour[axis] = i;
    }
    false
}

/// Computes all metrics for one region of a one-hot encoded pair.
pub fn calculate_metrics(
    ground_truth: ArrayView3<u8>,
    prediction: ArrayView3<u8>,
    spacing: Spacing,
) -> AuditResult<RegionMetrics> {
    let counts = calculate_confusion_matrix_elements(ground_truth, prediction)?;
    let ConfusionCounts { tp, tn, fp, fn_ } = counts;
    let lesion_size = spacing.physical_volume(tp + fn_);

    Ok(RegionMetrics {
        counts,
        sensitivity: sensitivity(tp, fn_),
        specificity: specificity(tn, fp),
        precision: precision(tp, fp),
        accuracy: accuracy(tp, tn, fp, fn_),
        dice: dice_score(tp, fp, fn_, ground_truth, prediction),
        jaccard: jaccard_index(tp, fp, fn_, ground_truth, prediction),
        hausdorff: hausdorff_distance_scaled(ground_truth, prediction, &spacing.as_array()),
        lesion_size,
    })
}
