use ndarray::ArrayView2;

use super::{Model, layers::Layer, loss::LossFn};
use crate::{
    MlErr, Result,
    training::{ParamManager, ParamSlot},
};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the input and output widths of the whole model.
    pub fn io_dims(&self) -> Option<(usize, usize)> {
        let first = self.layers.first()?.dim().0;
        let last = self.layers.last()?.dim().1;
        Some((first, last))
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn slots(&self) -> Vec<ParamSlot> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| layer.slots(i))
            .collect()
    }

    fn forward<'a>(
        &'a mut self,
        params: &ParamManager,
        mut x: ArrayView2<'a, f32>,
    ) -> Result<ArrayView2<'a, f32>> {
        let mut front = params.front();
        let nlayers = self.layers.len();

        for (i, layer) in self.layers.iter_mut().enumerate() {
            let layer_params = front.take(layer.size()).ok_or(MlErr::SizeMismatch {
                what: "layers",
                got: i,
                expected: nlayers,
            })?;

            x = layer.forward(layer_params, x)?;
        }

        Ok(x)
    }

    fn backprop<L: LossFn>(
        &mut self,
        params: &mut ParamManager,
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32> {
        params.zero_grad();

        let y_pred = self.forward(params, x)?;
        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "prediction",
                got: y_pred.len(),
                expected: y.len(),
            });
        }

        let loss = loss_fn.loss(y_pred, y);
        let mut d_last = loss_fn.loss_prime(y_pred, y);
        let mut d = d_last.view_mut();

        let nlayers = self.layers.len();
        let mut back = params.back();

        for (i, layer) in self.layers.iter_mut().rev().enumerate() {
            let (layer_params, grad) = back.take(layer.size()).ok_or(MlErr::SizeMismatch {
                what: "layers",
                got: i,
                expected: nlayers,
            })?;

            d = layer.backward(layer_params, grad, d)?;
        }

        Ok(loss)
    }
}
