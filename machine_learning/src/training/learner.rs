use super::GradientSlots;
use crate::Result;

/// The model side metrics measured at the end of an epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// The mean loss over the whole training set.
    pub train_loss: f32,
    /// The mean loss over the test set, if there is one.
    pub test_loss: Option<f32>,
    /// The fraction of correctly classified test samples, if there is a test set.
    pub test_accuracy: Option<f32>,
}

/// Everything a training loop needs from a model, its optimizer and its data.
///
/// The gradient of the last `backward` call lives in the learner's gradient slots, where
/// it can be read, replaced and finally applied by `optimizer_step`.
pub trait Learner: GradientSlots {
    /// Returns the amount of trainable parameters.
    fn num_params(&self) -> usize;

    /// Returns the amount of batches in one epoch.
    fn num_batches(&self) -> usize;

    /// Prepares a new epoch, reshuffling the batches if needed.
    fn begin_epoch(&mut self);

    /// Computes the gradient of the loss over a single batch, overwriting the gradient slots.
    ///
    /// # Arguments
    /// * `batch_ix` - The index of the batch within the current epoch.
    ///
    /// # Returns
    /// The batch loss.
    fn backward(&mut self, batch_ix: usize) -> Result<f32>;

    /// Applies the current content of the gradient slots onto the parameters.
    fn optimizer_step(&mut self) -> Result<()>;

    /// Returns the optimizer's current learning rate.
    fn learning_rate(&self) -> f32;

    /// Advances the learning rate schedule by one epoch, if there is one.
    fn schedule_step(&mut self);

    /// Measures the model over the whole train and test sets.
    fn evaluate(&mut self) -> Result<Evaluation>;
}

impl<T: GradientSlots + ?Sized> GradientSlots for Box<T> {
    fn grad_slots(&self) -> Vec<&[f32]> {
        (**self).grad_slots()
    }

    fn grad_slots_mut(&mut self) -> Vec<&mut [f32]> {
        (**self).grad_slots_mut()
    }
}

impl<T: Learner + ?Sized> Learner for Box<T> {
    fn num_params(&self) -> usize {
        (**self).num_params()
    }

    fn num_batches(&self) -> usize {
        (**self).num_batches()
    }

    fn begin_epoch(&mut self) {
        (**self).begin_epoch()
    }

    fn backward(&mut self, batch_ix: usize) -> Result<f32> {
        (**self).backward(batch_ix)
    }

    fn optimizer_step(&mut self) -> Result<()> {
        (**self).optimizer_step()
    }

    fn learning_rate(&self) -> f32 {
        (**self).learning_rate()
    }

    fn schedule_step(&mut self) {
        (**self).schedule_step()
    }

    fn evaluate(&mut self) -> Result<Evaluation> {
        (**self).evaluate()
    }
}
