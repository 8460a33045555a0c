use std::num::NonZeroUsize;

use log::trace;
use ndarray::{ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Evaluation, GradientSlots, Learner, ParamManager};
use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::{LrSchedule, LrScheduler, Optimizer},
};

/// A `Learner` that trains a model over an in memory dataset split in mini batches.
///
/// Batch `i` of an epoch holds the samples `order[i * batch_size..]`, where `order` is
/// reshuffled at the start of every epoch when shuffling is enabled. The last batch may
/// be smaller than the rest.
pub struct SupervisedLearner<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    model: M,
    params: ParamManager,
    optimizer: O,
    loss_fn: L,
    scheduler: Option<LrScheduler>,

    train: Dataset,
    test: Option<Dataset>,
    batch_size: NonZeroUsize,
    order: Vec<usize>,
    shuffle: bool,
    rng: StdRng,
}

impl<M, O, L> SupervisedLearner<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    /// Creates a new `SupervisedLearner`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `params` - The model's initial parameters.
    /// * `optimizer` - The optimizer that applies the gradient.
    /// * `loss_fn` - The loss function to minimize.
    /// * `train` - The training set.
    /// * `test` - An optional held out set used only for evaluation.
    /// * `batch_size` - The amount of samples per batch.
    /// * `seed` - The seed of the batch shuffling.
    ///
    /// # Returns
    /// A new `SupervisedLearner` or an error if `params` doesn't fit the model.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: M,
        params: Vec<f32>,
        optimizer: O,
        loss_fn: L,
        train: Dataset,
        test: Option<Dataset>,
        batch_size: NonZeroUsize,
        seed: u64,
    ) -> Result<Self> {
        let params = ParamManager::new(model.slots(), params)?;

        Ok(Self {
            model,
            params,
            optimizer,
            loss_fn,
            scheduler: None,
            order: (0..train.len()).collect(),
            train,
            test,
            batch_size,
            shuffle: true,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Decays the learning rate following `schedule`, starting from the optimizer's current one.
    pub fn with_schedule(mut self, schedule: LrSchedule) -> Self {
        self.scheduler = Some(LrScheduler::new(schedule, self.optimizer.learning_rate()));
        self
    }

    /// Enables or disables reshuffling the samples every epoch.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn params(&self) -> &[f32] {
        self.params.params()
    }

    fn batch_rows(&self, batch_ix: usize) -> Result<&[usize]> {
        let len = self.order.len();
        let start = batch_ix * self.batch_size.get();

        if start >= len {
            return Err(MlErr::IndexOutOfBounds {
                what: "batches",
                index: batch_ix,
                len: self.num_batches(),
            });
        }

        let end = (start + self.batch_size.get()).min(len);
        Ok(&self.order[start..end])
    }
}

/// The fraction of rows where the prediction matches the target.
///
/// Single column targets are binary labels thresholded at 0.5, wider ones are compared
/// by their argmax.
fn accuracy(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
    let nrows = y.nrows();
    if nrows == 0 {
        return 0.0;
    }

    let hits = if y.ncols() == 1 {
        y_pred
            .iter()
            .zip(y.iter())
            .filter(|&(&p, &t)| (p >= 0.5) == (t >= 0.5))
            .count()
    } else {
        y_pred
            .axis_iter(Axis(0))
            .zip(y.axis_iter(Axis(0)))
            .filter(|(p, t)| argmax(p.iter()) == argmax(t.iter()))
            .count()
    };

    hits as f32 / nrows as f32
}

fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> Option<usize> {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

impl<M, O, L> GradientSlots for SupervisedLearner<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    fn grad_slots(&self) -> Vec<&[f32]> {
        self.params.grad_slots()
    }

    fn grad_slots_mut(&mut self) -> Vec<&mut [f32]> {
        self.params.grad_slots_mut()
    }
}

impl<M, O, L> Learner for SupervisedLearner<M, O, L>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
{
    fn num_params(&self) -> usize {
        self.params.len()
    }

    fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size.get())
    }

    fn begin_epoch(&mut self) {
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    fn backward(&mut self, batch_ix: usize) -> Result<f32> {
        let (x, y) = self.train.gather(self.batch_rows(batch_ix)?)?;
        let loss = self
            .model
            .backprop(&mut self.params, &self.loss_fn, x.view(), y.view())?;

        trace!(batch = batch_ix, loss = loss; "backward pass");
        Ok(loss)
    }

    fn optimizer_step(&mut self) -> Result<()> {
        self.params.optimize(&mut self.optimizer)
    }

    fn learning_rate(&self) -> f32 {
        self.optimizer.learning_rate()
    }

    fn schedule_step(&mut self) {
        if let Some(scheduler) = &mut self.scheduler {
            scheduler.step(&mut self.optimizer);
        }
    }

    fn evaluate(&mut self) -> Result<Evaluation> {
        let (x, y) = self.train.view();
        let y_pred = self.model.forward(&self.params, x)?;
        let train_loss = self.loss_fn.loss(y_pred, y);

        let (test_loss, test_accuracy) = match &self.test {
            Some(test) => {
                let (x, y) = test.view();
                let y_pred = self.model.forward(&self.params, x)?;
                (
                    Some(self.loss_fn.loss(y_pred, y)),
                    Some(accuracy(y_pred, y)),
                )
            }
            None => (None, None),
        };

        Ok(Evaluation {
            train_loss,
            test_loss,
            test_accuracy,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        arch::{Sequential, activations::ActFn, layers::Layer, loss::Mse},
        optimization::GradientDescent,
        training::flatten_grads,
    };

    fn learner(batch_size: usize) -> SupervisedLearner<Sequential, GradientDescent, Mse> {
        let data = Dataset::new(
            vec![
                0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                1.0, 0.0, 0.0, //
                1.0, 1.0, 1.0, //
                0.5, 0.5, 0.0, //
            ],
            2,
            1,
        )
        .unwrap();

        let model = Sequential::new([Layer::dense((2, 1), ActFn::sigmoid(1.))]);
        let params = vec![0.1, -0.2, 0.05];

        SupervisedLearner::new(
            model,
            params,
            GradientDescent::new(1.0),
            Mse,
            data,
            None,
            NonZeroUsize::new(batch_size).unwrap(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn batches_cover_the_dataset() {
        let learner = learner(2);
        assert_eq!(learner.num_batches(), 3);
        assert_eq!(learner.batch_rows(2).unwrap(), &[4]);
        assert!(learner.batch_rows(3).is_err());
    }

    #[test]
    fn backward_overwrites_gradient() {
        let mut learner = learner(2).with_shuffle(false);

        learner.backward(0).unwrap();
        let first = flatten_grads(&learner);
        learner.backward(0).unwrap();

        assert_eq!(flatten_grads(&learner), first);
        assert!(first.iter().any(|&g| g != 0.0));
    }

    #[test]
    fn training_lowers_the_loss() {
        let mut learner = learner(5);
        let before = learner.evaluate().unwrap().train_loss;

        for _ in 0..50 {
            learner.begin_epoch();
            learner.backward(0).unwrap();
            learner.optimizer_step().unwrap();
        }

        let after = learner.evaluate().unwrap();
        assert!(after.train_loss < before);
        assert!(after.test_loss.is_none());
    }

    #[test]
    fn schedule_decays_learning_rate() {
        let mut learner = learner(2).with_schedule(LrSchedule::Exponential { gamma: 0.5 });

        learner.schedule_step();
        learner.schedule_step();
        assert_eq!(learner.learning_rate(), 0.25);
    }

    #[test]
    fn accuracy_handles_binary_and_one_hot_targets() {
        let binary = accuracy(
            array![[0.9], [0.2], [0.6]].view(),
            array![[1.0], [0.0], [0.0]].view(),
        );
        assert!((binary - 2.0 / 3.0).abs() < 1e-6);

        let one_hot = accuracy(
            array![[0.1, 2.0], [3.0, -1.0]].view(),
            array![[0.0, 1.0], [0.0, 1.0]].view(),
        );
        assert_eq!(one_hot, 0.5);
    }
}
