use ndarray::{Array2, ArrayView2, Axis};

/// Misclassification counts: `m[i][j]` counts items of class `classes[i]` predicted as `classes[j]`.
///
/// Correct predictions are not errors, so the diagonal stays 0. Items whose truth or
/// prediction is not listed in `classes` are ignored.
pub fn errors_per_class(ground_truth: &[f64], predicted: &[f64], classes: &[f64]) -> Array2<u64> {
    let n = classes.len();
    let mut matrix = Array2::<u64>::zeros((n, n));
    let position = |value: f64| classes.iter().position(|&c| c == value);
    for (&truth, &guess) in ground_truth.iter().zip(predicted) {
        if let (Some(i), Some(j)) = (position(truth), position(guess)) {
            if i != j {
                matrix[[i, j]] += 1;
            }
        }
    }
    matrix
}

/// Scales each row to percentages; rows summing to zero become zeros.
pub fn normalize_matrix_per_row(matrix: ArrayView2<u64>) -> Array2<f64> {
    let mut normalized = matrix.mapv(|v| v as f64);
    for mut row in normalized.axis_iter_mut(Axis(0)) {
        let total: f64 = row.sum();
        if total > 0.0 {
            row.mapv_inplace(|v| v * 100.0 / total);
        }
    }
    normalized
}
