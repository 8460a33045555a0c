use ndarray::{ArrayView2, Axis};

/// Coordinate wise mean of the rows.
pub(super) fn mean(samples: ArrayView2<f32>) -> Vec<f32> {
    samples
        .mean_axis(Axis(0))
        .map(|m| m.to_vec())
        .unwrap_or_default()
}
