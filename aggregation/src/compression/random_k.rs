use ndarray::{ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::index};

use super::{
    CompressionResult, check_ratio, normalized_residual, retained_count, squared_column_norms,
};
use crate::Result;

/// Keeps a uniformly sampled subset of the columns.
#[derive(Debug, Clone)]
pub struct RandomK {
    ratio: f32,
    rng: StdRng,
}

impl RandomK {
    /// Creates a new `RandomK` compressor.
    ///
    /// # Arguments
    /// * `ratio` - The fraction of columns to keep, in `(0, 1]`.
    /// * `seed` - The seed of the column sampling.
    pub fn new(ratio: f32, seed: u64) -> Result<Self> {
        Ok(Self {
            ratio: check_ratio(ratio)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn compress(&mut self, matrix: ArrayView2<f32>) -> CompressionResult {
        let dim = matrix.ncols();
        let k = retained_count(self.ratio, dim);

        let mut indices = index::sample(&mut self.rng, dim, k).into_vec();
        indices.sort_unstable();

        let sq_norms = squared_column_norms(matrix);

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
    use ndarray::Array2;

    use super::*;

    fn matrix() -> Array2<f32> {
        Array2::from_shape_fn((3, 20), |(i, j)| (i * 20 + j) as f32 + 1.0)
    }

    #[test]
    fn same_seed_same_columns() {
        let matrix = matrix();
        let mut a = RandomK::new(0.3, 11).unwrap();
        let mut b = RandomK::new(0.3, 11).unwrap();

        for _ in 0..3 {
            assert_eq!(a.compress(matrix.view()), b.compress(matrix.view()));
        }
    }

    #[test]
    fn keeps_k_distinct_sorted_columns() {
        let matrix = matrix();
        let result = RandomK::new(0.3, 1).unwrap().compress(matrix.view());

        assert_eq!(result.indices.len(), 6);
        assert!(result.indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(result.sparse.dim(), (3, 6));
        assert!(result.normalized_residual > 0.0);

        for (j, &index) in result.indices.iter().enumerate() {
            assert_eq!(result.sparse.column(j), matrix.column(index));
        }
    }
}
