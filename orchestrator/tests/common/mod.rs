#![allow(dead_code)]

use machine_learning::{
    Result,
    training::{Evaluation, GradientSlots, Learner},
};

/// A learner whose batch gradients and epoch losses are fixed up front.
///
/// Batch `b` produces a gradient with every entry equal to `b + 1`, unless overridden
/// with `with_grads`. Every gradient reaching `optimizer_step` is recorded.
pub struct ScriptedLearner {
    dim: usize,
    num_batches: usize,
    grad: Vec<f32>,
    grads: Option<Vec<Vec<f32>>>,
    losses: Vec<f32>,
    lr: f32,

    pub epochs_begun: usize,
    pub backward_calls: usize,
    pub applied: Vec<Vec<f32>>,
    pub schedule_steps: usize,
}

impl ScriptedLearner {
    pub fn new(dim: usize, num_batches: usize) -> Self {
        Self {
            dim,
            num_batches,
            grad: vec![0.0; dim],
            grads: None,
            losses: Vec::new(),
            lr: 0.1,
            epochs_begun: 0,
            backward_calls: 0,
            applied: Vec::new(),
            schedule_steps: 0,
        }
    }

    /// The train loss reported at the end of each epoch, `0.1` once the script runs out.
    pub fn with_losses(mut self, losses: Vec<f32>) -> Self {
        self.losses = losses;
        self
    }

    pub fn with_grads(mut self, grads: Vec<Vec<f32>>) -> Self {
        self.grads = Some(grads);
        self
    }
}

impl GradientSlots for ScriptedLearner {
    fn grad_slots(&self) -> Vec<&[f32]> {
        let (head, tail) = self.grad.split_at(self.dim / 2);
        vec![head, tail]
    }

    fn grad_slots_mut(&mut self) -> Vec<&mut [f32]> {
        let (head, tail) = self.grad.split_at_mut(self.dim / 2);
        vec![head, tail]
    }
}

impl Learner for ScriptedLearner {
    fn num_params(&self) -> usize {
        self.dim
    }

    fn num_batches(&self) -> usize {
        self.num_batches
    }

    fn begin_epoch(&mut self) {
        self.epochs_begun += 1;
    }

    fn backward(&mut self, batch_ix: usize) -> Result<f32> {
        self.backward_calls += 1;

        match &self.grads {
            Some(grads) => self.grad.copy_from_slice(&grads[batch_ix % grads.len()]),
            None => self.grad.fill(batch_ix as f32 + 1.0),
        }

        Ok(0.0)
    }

    fn optimizer_step(&mut self) -> Result<()> {
        self.applied.push(self.grad.clone());
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn schedule_step(&mut self) {
        self.schedule_steps += 1;
        self.lr *= 0.5;
    }

    fn evaluate(&mut self) -> Result<Evaluation> {
        let epoch = self.epochs_begun.saturating_sub(1);

        Ok(Evaluation {
            train_loss: self.losses.get(epoch).copied().unwrap_or(0.1),
            test_loss: None,
            test_accuracy: None,
        })
    }
}
