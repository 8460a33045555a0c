use ndarray::{ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

/// Coordinate wise median of the rows, averaging the middle pair for an even amount.
pub(super) fn coordinate_median(samples: ArrayView2<f32>) -> Vec<f32> {
    samples
        .axis_iter(Axis(1))
        .into_par_iter()
        .map(median)
        .collect()
}

pub(super) fn sorted(column: ArrayView1<f32>) -> Vec<f32> {
    let mut values = column.to_vec();
    values.sort_unstable_by(f32::total_cmp);
    values
}

fn median(column: ArrayView1<f32>) -> f32 {
    let values = sorted(column);
    let n = values.len();

    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}
