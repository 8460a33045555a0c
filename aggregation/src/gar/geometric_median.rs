use ndarray::{Array1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::{AggErr, Result};

pub(super) fn validate(max_iter: usize, tol: f32, nu: f32) -> Result<()> {
    if max_iter == 0 {
        return Err(AggErr::invalid("geometric median max_iter", "must be positive"));
    }

    if !tol.is_finite() || tol < 0.0 {
        return Err(AggErr::invalid(
            "geometric median tol",
            format!("{tol} must be finite and non negative"),
        ));
    }

    if !nu.is_finite() || nu <= 0.0 {
        return Err(AggErr::invalid(
            "geometric median nu",
            format!("{nu} must be finite and positive"),
        ));
    }

    Ok(())
}

/// Approximates the geometric median of the rows with smoothed Weiszfeld iterations.
///
/// Starts from the coordinate wise mean and stops once an iteration moves the estimate
/// less than `tol·max(‖z‖, 1)`, or after `max_iter` iterations. Distances are floored at
/// `nu`, so rows lying on the estimate don't blow up their weight.
///
/// # Returns
/// The estimate and the amount of iterations performed.
pub(super) fn geometric_median(
    samples: ArrayView2<f32>,
    max_iter: usize,
    tol: f32,
    nu: f32,
) -> (Vec<f32>, usize) {
    let Some(mut z) = samples.mean_axis(Axis(0)) else {
        return (Vec::new(), 0);
    };

    let mut iters = 0;
    while iters < max_iter {
        iters += 1;

        let weights: Vec<f32> = samples
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                let dist = row
                    .iter()
                    .zip(z.iter())
                    .map(|(&x, &c)| (x - c).powi(2))
                    .sum::<f32>()
                    .sqrt();
                1.0 / dist.max(nu)
            })
            .collect();

        let total: f32 = weights.iter().sum();
        let mut next = Array1::<f32>::zeros(z.len());
        for (row, &w) in samples.axis_iter(Axis(0)).zip(&weights) {
            next.scaled_add(w / total, &row);
        }

        let step = (&next - &z).mapv(|v| v.powi(2)).sum().sqrt();
        let norm = z.mapv(|v| v.powi(2)).sum().sqrt();
        z = next;

        if step <= tol * norm.max(1.0) {
            break;
        }
    }

    (z.to_vec(), iters)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn ignores_a_far_outlier() {
        let samples = array![
            [1.0, 1.0],
            [1.1, 0.9],
            [0.9, 1.1],
            [1.0, 1.05],
            [1000.0, -1000.0]
        ];

        let (z, iters) = geometric_median(samples.view(), 200, 1e-6, 1e-6);
        assert!(iters > 1);
        assert!((z[0] - 1.0).abs() < 0.2, "{z:?}");
        assert!((z[1] - 1.0).abs() < 0.2, "{z:?}");
    }

    #[test]
    fn identical_rows_converge_at_once() {
        let samples = array![[2.0, -1.0], [2.0, -1.0], [2.0, -1.0]];
        let (z, iters) = geometric_median(samples.view(), 10, 1e-6, 1e-6);

        assert_eq!(iters, 1);
        assert!((z[0] - 2.0).abs() < 1e-5 && (z[1] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn stops_at_max_iter() {
        let samples = array![[0.0], [1.0], [5.0], [100.0]];
        let (_, iters) = geometric_median(samples.view(), 3, 0.0, 1e-6);
        assert_eq!(iters, 3);
    }
}
