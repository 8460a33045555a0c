use ndarray::ArrayView2;

use crate::{Result, arch::loss::LossFn, training::{ParamManager, ParamSlot}};

pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Describes every trainable tensor of the model, in the order they are laid out in
    /// the flat parameter buffer.
    fn slots(&self) -> Vec<ParamSlot>;

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input.
    fn forward<'a>(
        &'a mut self,
        params: &ParamManager,
        x: ArrayView2<'a, f32>,
    ) -> Result<ArrayView2<'a, f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model
    /// over a single batch. The gradient buffer of `params` is **overwritten**.
    ///
    /// # Arguments
    /// * `params` - The model's parameters and gradient.
    /// * `loss_fn` - The loss function.
    /// * `x` - The batch's input.
    /// * `y` - The batch's expected output.
    ///
    /// # Returns
    /// The batch loss.
    fn backprop<L: LossFn>(
        &mut self,
        params: &mut ParamManager,
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<f32>;
}
