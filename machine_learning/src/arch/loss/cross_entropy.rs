use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;

/// Softmax cross entropy loss function.
///
/// The model's output is taken as unnormalized logits and the targets as class
/// probabilities (usually one-hot rows).
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

/// Row-wise numerically stable softmax.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();

    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |acc, &z| acc.max(z));
        row.mapv_inplace(|z| (z - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|e| e / sum);
    }

    out
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let nrows = y_pred.nrows().max(1) as f32;
        let probs = softmax(y_pred);

        let total: f32 = probs
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| -t * p.max(f32::MIN_POSITIVE).ln())
            .sum();

        total / nrows
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let nrows = y_pred.nrows().max(1) as f32;
        (softmax(y_pred) - &y) / nrows
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let probs = softmax(array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 0.0]].view());

        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!((probs[[1, 0]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn loss_prime_matches_finite_differences() {
        const H: f32 = 1e-2;

        let loss_fn = CrossEntropy::new();
        let logits = array![[0.2, -0.4, 1.1], [0.0, 0.3, -0.7]];
        let y = array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]];
        let analytic = loss_fn.loss_prime(logits.view(), y.view());

        for ((i, j), &d) in analytic.indexed_iter() {
            let mut plus = logits.clone();
            let mut minus = logits.clone();
            plus[[i, j]] += H;
            minus[[i, j]] -= H;

            let numeric = (loss_fn.loss(plus.view(), y.view())
                - loss_fn.loss(minus.view(), y.view()))
                / (2.0 * H);
            assert!((numeric - d).abs() < 1e-3, "{numeric} vs {d}");
        }
    }
}
