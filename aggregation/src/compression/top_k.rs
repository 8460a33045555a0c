use ndarray::{ArrayView2, Axis};

use super::{
    CompressionResult, check_ratio, normalized_residual, retained_count, squared_column_norms,
    top_k_indices,
};
use crate::Result;

/// Keeps the columns with the largest L2 norm.
#[derive(Debug, Clone)]
pub struct TopK {
    ratio: f32,
}

impl TopK {
    pub fn new(ratio: f32) -> Result<Self> {
        Ok(Self {
            ratio: check_ratio(ratio)?,
        })
    }

    pub fn compress(&self, matrix: ArrayView2<f32>) -> CompressionResult {
        let sq_norms = squared_column_norms(matrix);
        let indices = top_k_indices(&sq_norms, retained_count(self.ratio, matrix.ncols()));

        CompressionResult {
            sparse: matrix.select(Axis(1), &indices),
            normalized_residual: normalized_residual(&sq_norms, &indices),
            axis: Axis(0),
            indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn keeps_largest_columns() {
        let matrix = array![[0.1, 5.0, 0.0, -3.0], [0.2, 5.0, 0.0, 3.0]];
        let result = TopK::new(0.5).unwrap().compress(matrix.view());

        assert_eq!(result.indices, vec![1, 3]);
        assert_eq!(result.sparse, array![[5.0, -3.0], [5.0, 3.0]]);
        assert!(result.normalized_residual > 0.0);
        assert_eq!(result.densify(4).unwrap().column(0).sum(), 0.0);
    }

    #[test]
    fn keeping_everything_leaves_no_residual() {
        let matrix = array![[1.0, -2.0, 3.0], [4.0, 5.0, -6.0]];
        let result = TopK::new(1.0).unwrap().compress(matrix.view());

        assert_eq!(result.indices, vec![0, 1, 2]);
        assert_eq!(result.normalized_residual, 0.0);
        assert_eq!(result.densify(3).unwrap(), matrix);
    }

    #[test]
    fn zero_matrix_has_no_residual() {
        let matrix = ndarray::Array2::<f32>::zeros((3, 4));
        let result = TopK::new(0.25).unwrap().compress(matrix.view());

        assert_eq!(result.indices, vec![0]);
        assert_eq!(result.normalized_residual, 0.0);
    }

    #[test]
    fn residual_matches_dropped_energy() {
        // Columns norms are 3 and 4, dropping the first leaves 3 / 5 of the norm.
        let matrix = array![[3.0, 0.0], [0.0, 4.0]];
        let result = TopK::new(0.5).unwrap().compress(matrix.view());

        assert_eq!(result.indices, vec![1]);
        assert!((result.normalized_residual - 0.6).abs() < 1e-6);
    }
}
