//! Sparse approximations of the gradient matrix.
//!
//! Every compressor keeps a subset of the matrix's columns (coordinates of the gradient)
//! and reports how much of the matrix was lost doing so.

mod error_feedback;
mod random_k;
mod top_k;

use ndarray::{Array2, ArrayView2, Axis};

pub use error_feedback::ErrorFeedback;
pub use random_k::RandomK;
pub use top_k::TopK;

use crate::{AggErr, Result};

/// The output of a compression round.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    /// The retained columns, sorted ascending.
    pub indices: Vec<usize>,
    /// The retained values, column `j` holding the original column `indices[j]`.
    pub sparse: Array2<f32>,
    /// The axis of `sparse` along which the samples (workers) are laid out.
    pub axis: Axis,
    /// `‖R - densify()‖ / ‖R‖` with `R` the matrix the compressor approximated.
    pub normalized_residual: f32,
}

impl CompressionResult {
    /// Scatters the retained columns back into a zero filled `rows × dim` matrix.
    ///
    /// # Arguments
    /// * `dim` - The width of the uncompressed matrix.
    ///
    /// # Returns
    /// The dense matrix or an error if any retained index doesn't fit in `dim`.
    pub fn densify(&self, dim: usize) -> Result<Array2<f32>> {
        let samples = self.samples();
        let mut dense = Array2::zeros((samples.nrows(), dim));

        for (column, &index) in samples.columns().into_iter().zip(&self.indices) {
            if index >= dim {
                return Err(AggErr::IndexOutOfBounds { index, len: dim });
            }

            dense.column_mut(index).assign(&column);
        }

        Ok(dense)
    }

    /// Views `sparse` with one sample per row.
    pub fn samples(&self) -> ArrayView2<'_, f32> {
        match self.axis {
            Axis(0) => self.sparse.view(),
            _ => self.sparse.t(),
        }
    }
}

/// The compression rules that can be selected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionRule {
    /// Keeps the `ratio` of columns with the largest norm.
    TopK { ratio: f32 },
    /// Keeps a random `ratio` of the columns.
    RandomK { ratio: f32 },
    /// Top k with the dropped values carried over to the next round.
    ErrorFeedback { ratio: f32 },
}

/// A gradient matrix compressor.
#[derive(Debug, Clone)]
pub enum Compressor {
    TopK(TopK),
    RandomK(RandomK),
    ErrorFeedback(ErrorFeedback),
}

impl Compressor {
    /// Creates a new `Compressor`.
    ///
    /// # Arguments
    /// * `rule` - The compression rule.
    /// * `seed` - The seed of the randomized rules.
    ///
    /// # Returns
    /// The compressor or an error if the rule's ratio isn't in `(0, 1]`.
    pub fn new(rule: CompressionRule, seed: u64) -> Result<Self> {
        let compressor = match rule {
            CompressionRule::TopK { ratio } => Self::TopK(TopK::new(ratio)?),
            CompressionRule::RandomK { ratio } => Self::RandomK(RandomK::new(ratio, seed)?),
            CompressionRule::ErrorFeedback { ratio } => {
                Self::ErrorFeedback(ErrorFeedback::new(ratio)?)
            }
        };

        Ok(compressor)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TopK(_) => "top_k",
            Self::RandomK(_) => "random_k",
            Self::ErrorFeedback(_) => "error_feedback",
        }
    }

    /// Compresses `matrix`, one sample per row.
    ///
    /// # Arguments
    /// * `matrix` - The gradient matrix.
    /// * `learning_rate` - The optimizer's current learning rate, only used by error feedback.
    ///
    /// # Returns
    /// The compressed matrix or an error if the matrix is empty.
    pub fn compress(
        &mut self,
        matrix: ArrayView2<f32>,
        learning_rate: f32,
    ) -> Result<CompressionResult> {
        if matrix.is_empty() {
            return Err(AggErr::EmptyMatrix);
        }

        match self {
            Self::TopK(c) => Ok(c.compress(matrix)),
            Self::RandomK(c) => Ok(c.compress(matrix)),
            Self::ErrorFeedback(c) => c.compress(matrix, learning_rate),
        }
    }
}

pub(crate) fn check_ratio(ratio: f32) -> Result<f32> {
    if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
        Ok(ratio)
    } else {
        Err(AggErr::invalid(
            "compression ratio",
            format!("{ratio} is not in (0, 1]"),
        ))
    }
}

/// The amount of columns kept out of `dim`, never zero.
pub(crate) fn retained_count(ratio: f32, dim: usize) -> usize {
    if ratio >= 1.0 {
        return dim;
    }

    ((f64::from(ratio) * dim as f64).ceil() as usize).clamp(1, dim)
}

pub(crate) fn squared_column_norms(matrix: ArrayView2<f32>) -> Vec<f64> {
    matrix
        .columns()
        .into_iter()
        .map(|c| c.iter().map(|&v| (v as f64).powi(2)).sum())
        .collect()
}

/// Returns the `k` columns of largest norm, sorted ascending. Ties keep the lower index.
pub(crate) fn top_k_indices(sq_norms: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..sq_norms.len()).collect();
    let by_norm = |&a: &usize, &b: &usize| sq_norms[b].total_cmp(&sq_norms[a]).then(a.cmp(&b));

    if k < order.len() {
        order.select_nth_unstable_by(k, by_norm);
        order.truncate(k);
    }

    order.sort_unstable();
    order
}

/// The norm of the dropped columns relative to the whole matrix.
pub(crate) fn normalized_residual(sq_norms: &[f64], kept: &[usize]) -> f32 {
    let total: f64 = sq_norms.iter().sum();
    if total == 0.0 {
        return 0.0;
    }

    let mut is_kept = vec![false; sq_norms.len()];
    for &i in kept {
        is_kept[i] = true;
    }

    let dropped: f64 = sq_norms
        .iter()
        .zip(&is_kept)
        .filter(|&(_, &k)| !k)
        .map(|(&n, _)| n)
        .sum();

    let residual = (dropped / total).sqrt() as f32;
    if dropped > 0.0 && residual == 0.0 {
        // Too small for f32, but a nonzero column was still dropped.
        return f32::MIN_POSITIVE;
    }

    residual
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn retained_count_is_clamped() {
        assert_eq!(retained_count(0.001, 10), 1);
        assert_eq!(retained_count(0.25, 10), 3);
        assert_eq!(retained_count(1.0, 10), 10);
        assert_eq!(retained_count(1.0, 16_777_217), 16_777_217);
        assert_eq!(retained_count(0.5, 16_777_217), 8_388_609);
    }

    #[test]
    fn tiny_dropped_column_still_leaves_a_residual() {
        let matrix = array![[1e10, 1e-10], [1e10, 1e-10]];
        let result = Compressor::new(CompressionRule::TopK { ratio: 0.5 }, 0)
            .unwrap()
            .compress(matrix.view(), 1.0)
            .unwrap();

        assert_eq!(result.indices, vec![0]);
        assert!(result.normalized_residual > 0.0);
    }

    #[test]
    fn residual_only_counts_dropped_columns() {
        let sq_norms = [9.0, 0.0, 16.0];
        assert_eq!(normalized_residual(&sq_norms, &[0, 1, 2]), 0.0);
        assert!((normalized_residual(&sq_norms, &[2]) - 0.6).abs() < 1e-6);
        assert_eq!(normalized_residual(&[0.0, 0.0], &[0]), 0.0);
    }

    #[test]
    fn ratio_must_be_in_unit_interval() {
        assert!(check_ratio(0.5).is_ok());
        assert!(check_ratio(1.0).is_ok());
        assert!(check_ratio(0.0).is_err());
        assert!(check_ratio(1.5).is_err());
        assert!(check_ratio(f32::NAN).is_err());
        assert!(Compressor::new(CompressionRule::TopK { ratio: -1.0 }, 0).is_err());
    }

    #[test]
    fn top_k_prefers_lower_index_on_ties() {
        assert_eq!(top_k_indices(&[1.0, 4.0, 4.0, 0.0, 4.0], 2), vec![1, 2]);
        assert_eq!(top_k_indices(&[1.0, 2.0], 5), vec![0, 1]);
    }

    #[test]
    fn densify_scatters_retained_columns() {
        let result = CompressionResult {
            indices: vec![0, 3],
            sparse: array![[1.0, 2.0], [3.0, 4.0]],
            axis: Axis(0),
            normalized_residual: 0.0,
        };

        let dense = result.densify(4).unwrap();
        assert_eq!(dense, array![[1.0, 0.0, 0.0, 2.0], [3.0, 0.0, 0.0, 4.0]]);
        assert!(result.densify(3).is_err());
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let mut compressor = Compressor::new(CompressionRule::TopK { ratio: 0.5 }, 0).unwrap();
        let empty = Array2::<f32>::zeros((2, 0));
        assert_eq!(
            compressor.compress(empty.view(), 1.0),
            Err(AggErr::EmptyMatrix)
        );
    }
}
