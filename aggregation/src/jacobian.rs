use std::num::NonZeroUsize;

use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::{AggErr, Result};

/// A `window × d` matrix holding the last `window` flat gradients.
///
/// Row `step mod window` holds the gradient recorded at `step`, older gradients are
/// overwritten round robin. The matrix is allocated on the first `record`, once the
/// gradient's width `d` is known, and its width never changes afterwards.
#[derive(Debug, Clone)]
pub struct JacobianBuffer {
    window: NonZeroUsize,
    matrix: Option<Array2<f32>>,
}

impl JacobianBuffer {
    /// Creates a new empty `JacobianBuffer`.
    ///
    /// # Arguments
    /// * `window` - The amount of gradients kept, one per simulated worker.
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window,
            matrix: None,
        }
    }

    pub fn window(&self) -> usize {
        self.window.get()
    }

    /// Returns the width of the buffered gradients, if any has been recorded.
    pub fn dim(&self) -> Option<usize> {
        self.matrix.as_ref().map(|m| m.ncols())
    }

    pub fn is_allocated(&self) -> bool {
        self.matrix.is_some()
    }

    /// Stores `gradient` in the row assigned to `step`.
    ///
    /// # Arguments
    /// * `step` - The index of the batch that produced the gradient.
    /// * `gradient` - The flat gradient.
    ///
    /// # Returns
    /// The written row or an error if the gradient is empty or its length differs from
    /// the previously recorded ones.
    pub fn record(&mut self, step: usize, gradient: &[f32]) -> Result<usize> {
        let window = self.window.get();
        let slot = step % window;

        if self.matrix.is_none() && gradient.is_empty() {
            return Err(AggErr::EmptyGradient);
        }

        let matrix = self.matrix.get_or_insert_with(|| {
            debug!(window = window, dim = gradient.len(); "allocating jacobian");
            Array2::zeros((window, gradient.len()))
        });

        if gradient.len() != matrix.ncols() {
            return Err(AggErr::GradientLengthMismatch {
                expected: matrix.ncols(),
                got: gradient.len(),
            });
        }

        matrix.row_mut(slot).assign(&ArrayView1::from(gradient));
        Ok(slot)
    }

    /// Whether `step` closes a full window of gradients, triggering an aggregation.
    ///
    /// Step 0 never closes a window, even with a window of one.
    pub fn is_full_cycle(&self, step: usize) -> bool {
        (step + 1) % self.window.get() == 0 && step != 0
    }

    /// Views the whole buffer, one gradient per row.
    pub fn view(&self) -> Option<ArrayView2<'_, f32>> {
        self.matrix.as_ref().map(|m| m.view())
    }

    pub fn row(&self, slot: usize) -> Option<ArrayView1<'_, f32>> {
        let matrix = self.matrix.as_ref()?;
        (slot < matrix.nrows()).then(|| matrix.row(slot))
    }
}
