use ndarray::{Array2, ArrayView2, Axis};

use super::{
    CompressionResult, check_ratio, normalized_residual, retained_count, squared_column_norms,
    top_k_indices,
};
use crate::{AggErr, Result};

/// Top k compression that remembers what it dropped.
///
/// Each round compresses `P = lr·G + E`, where `E` is the part of `P` dropped in the
/// previous round, and returns the kept columns of `P / lr`. Nothing is ever lost, only
/// delayed.
#[derive(Debug, Clone)]
pub struct ErrorFeedback {
    ratio: f32,
    memory: Option<Array2<f32>>,
}

impl ErrorFeedback {
    pub fn new(ratio: f32) -> Result<Self> {
        Ok(Self {
            ratio: check_ratio(ratio)?,
            memory: None,
        })
    }

    /// Returns the values carried over to the next round, if any round happened.
    pub fn memory(&self) -> Option<&Array2<f32>> {
        self.memory.as_ref()
    }

    pub fn compress(
        &mut self,
        matrix: ArrayView2<f32>,
        learning_rate: f32,
    ) -> Result<CompressionResult> {
        let scale = if learning_rate.is_finite() && learning_rate > 0.0 {
            learning_rate
        } else {
            1.0
        };

        let mut p = &matrix * scale;
        if let Some(memory) = &self.memory {
            if memory.dim() != p.dim() {
                return Err(AggErr::MemoryMismatch {
                    expected: memory.dim(),
                    got: p.dim(),
                });
            }

            p += memory;
        }

        let sq_norms = squared_column_norms(p.view());
        let indices = top_k_indices(&sq_norms, retained_count(self.ratio, p.ncols()));
        let sparse = p.select(Axis(1), &indices) / scale;

        for &index in &indices {
            p.column_mut(index).fill(0.0);
        }
        self.memory = Some(p);

        Ok(CompressionResult {
            sparse,
            normalized_residual: normalized_residual(&sq_norms, &indices),
            axis: Axis(0),
            indices,
        })
    }
}
