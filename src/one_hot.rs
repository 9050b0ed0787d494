use ndarray::{Array4, ArrayView3, Axis};

/// Splits a label volume into one binary mask per label, stacked along axis 0.
///
/// With `skip_background` the label equal to 0 gets no channel. Labels are compared at voxel (`f32`) precision.
pub fn one_hot_encoding(volume: ArrayView3<f32>, labels: &[f64], skip_background: bool) -> Array4<u8> {
    let kept: Vec<f32> = labels
        .iter()
        .filter(|&&label| !(skip_background && label == 0.0))
        .map(|&label| label as f32)
        .collect();

    let (d0, d1, d2) = volume.dim();
    let mut encoded = Array4::<u8>::zeros((kept.len(), d0, d1, d2));
    for (mut channel, &label) in encoded.axis_iter_mut(Axis(0)).zip(kept.iter()) {
        channel.zip_mut_with(&volume, |mask, &v| {
            *mask = u8::from(v == label);
        });
    }
    encoded
}
