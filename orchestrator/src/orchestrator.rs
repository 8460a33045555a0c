use std::num::NonZeroUsize;

use aggregation::{
    JacobianBuffer, adversary::Adversary, compression::Compressor, gar::Aggregator,
};
use log::{debug, info, trace, warn};
use machine_learning::training::{
    Learner, distribute_grads, distribute_sparse_grads, flatten_grads_into,
};
use ndarray::Axis;

use crate::{
    OrchestratorError, Result,
    configs::TrainMode,
    context::RunContext,
    metrics::Metrics,
    state::{Phase, Termination},
};

/// Train losses above this are considered divergent.
pub const DIVERGENCE_THRESHOLD: f32 = 1e3;

/// The costs accumulated during one epoch.
#[derive(Debug, Default)]
struct EpochCosts {
    grad: f64,
    agg: f64,
    gm_iter: usize,
    compression: f64,
}

/// What the aggregation rule produced, either for every parameter or only for some.
enum Aggregate {
    Dense(Vec<f32>),
    Sparse { values: Vec<f32>, indices: Vec<usize> },
}

/// Drives the training of a `Learner` epoch after epoch.
///
/// In distributed mode every batch gradient is recorded into a `JacobianBuffer` and,
/// once a full window of `W` batches is buffered, the window is (optionally corrupted
/// and compressed and) aggregated into the single gradient the optimizer applies.
/// In vanilla mode every batch gradient is applied right away.
pub struct TrainingOrchestrator<L: Learner> {
    learner: L,
    mode: TrainMode,
    jacobian: JacobianBuffer,
    aggregator: Aggregator,
    compressor: Option<Compressor>,
    adversary: Option<Adversary>,
    ctx: RunContext,

    grad: Vec<f32>,
    epoch: usize,
    num_epochs: usize,
    phase: Phase,
}

impl<L: Learner> TrainingOrchestrator<L> {
    /// Creates a new `TrainingOrchestrator`.
    ///
    /// # Arguments
    /// * `learner` - The model, optimizer and data to train.
    /// * `mode` - How the batch gradients reach the optimizer.
    /// * `window` - The amount of batches aggregated together.
    /// * `aggregator` - The aggregation rule.
    /// * `num_epochs` - The amount of epochs to run.
    /// * `ctx` - The run's clock and metrics.
    ///
    /// # Returns
    /// A new orchestrator or an error if `mode` isn't supported.
    pub fn new(
        learner: L,
        mode: TrainMode,
        window: NonZeroUsize,
        aggregator: Aggregator,
        num_epochs: usize,
        ctx: RunContext,
    ) -> Result<Self> {
        if mode == TrainMode::Federated {
            return Err(OrchestratorError::Unimplemented("federated training".into()));
        }

        Ok(Self {
            learner,
            mode,
            jacobian: JacobianBuffer::new(window),
            aggregator,
            compressor: None,
            adversary: None,
            ctx,
            grad: Vec::new(),
            epoch: 0,
            num_epochs,
            phase: Phase::AwaitingBatch,
        })
    }

    pub fn with_compressor(mut self, compressor: Option<Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_adversary(mut self, adversary: Option<Adversary>) -> Self {
        self.adversary = adversary;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn metrics(&self) -> &Metrics {
        &self.ctx.metrics
    }

    pub fn into_metrics(self) -> Metrics {
        self.ctx.metrics
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn jacobian(&self) -> &JacobianBuffer {
        &self.jacobian
    }

    /// Runs every remaining epoch.
    ///
    /// # Returns
    /// How the run ended, or an error if training failed. Running an already terminated
    /// orchestrator does nothing and returns the recorded termination.
    pub fn run(&mut self) -> Result<Termination> {
        while self.phase.termination().is_none() {
            if self.epoch >= self.num_epochs {
                self.transition(Phase::Terminated(Termination::Completed));
                break;
            }

            self.run_epoch()?;
        }

        Ok(self.phase.termination().unwrap_or(Termination::Completed))
    }

    fn transition(&mut self, next: Phase) {
        trace!(from = self.phase.name(), to = next.name(); "phase transition");
        self.phase = next;
    }

    fn run_epoch(&mut self) -> Result<()> {
        info!(
            epoch = self.epoch,
            num_epochs = self.num_epochs,
            lr = self.learner.learning_rate();
            "starting epoch"
        );

        self.learner.begin_epoch();
        let mut costs = EpochCosts::default();

        for batch_ix in 0..self.learner.num_batches() {
            self.transition(Phase::AccumulatingGradient);

            match self.mode {
                TrainMode::Vanilla => self.vanilla_step(batch_ix, &mut costs)?,
                _ => self.distributed_step(batch_ix, &mut costs)?,
            }

            self.transition(Phase::AwaitingBatch);
        }

        self.end_epoch(costs)
    }

    fn vanilla_step(&mut self, batch_ix: usize, costs: &mut EpochCosts) -> Result<()> {
        self.ctx.metrics.num_iter += 1;
        let start = self.ctx.clock.now();

        self.learner.backward(batch_ix)?;
        self.ctx.metrics.num_grad_steps += 1;
        self.ctx.metrics.num_param = self.learner.num_params();
        costs.grad += self.ctx.clock.since(start);

        self.transition(Phase::OptimizerStep);
        self.learner.optimizer_step()?;
        self.ctx.metrics.num_opt_steps += 1;

        Ok(())
    }

    fn distributed_step(&mut self, batch_ix: usize, costs: &mut EpochCosts) -> Result<()> {
        self.ctx.metrics.num_iter += 1;
        let start = self.ctx.clock.now();

        self.learner.backward(batch_ix)?;
        self.ctx.metrics.num_grad_steps += 1;

        flatten_grads_into(&self.learner, &mut self.grad);
        if !self.jacobian.is_allocated() {
            info!(num_param = self.grad.len(); "buffering gradients");
            self.ctx.metrics.num_param = self.grad.len();
        }

        self.jacobian.record(batch_ix, &self.grad)?;
        costs.grad += self.ctx.clock.since(start);

        if self.jacobian.is_full_cycle(batch_ix) {
            self.aggregate(costs)?;
        }

        Ok(())
    }

    fn aggregate(&mut self, costs: &mut EpochCosts) -> Result<()> {
        self.transition(Phase::Aggregation);

        let lr = self.learner.learning_rate();
        let clock = self.ctx.clock.as_ref();
        let Some(window) = self.jacobian.view() else {
            return Ok(());
        };

        let corrupted = self.adversary.as_mut().map(|a| a.corrupt(window));
        let window = match &corrupted {
            Some(matrix) => matrix.view(),
            None => window,
        };

        let aggregate = match &mut self.compressor {
            Some(compressor) => {
                let start = clock.now();
                let compressed = compressor.compress(window, lr)?;
                costs.compression += clock.since(start);
                self.ctx
                    .metrics
                    .jacobian_residual
                    .push(compressed.normalized_residual);

                let values = self.aggregator.aggregate(
                    compressed.sparse.view(),
                    Some(compressed.indices.as_slice()),
                    compressed.axis,
                    clock,
                )?;

                Aggregate::Sparse {
                    values,
                    indices: compressed.indices,
                }
            }
            None => Aggregate::Dense(self.aggregator.aggregate(window, None, Axis(0), clock)?),
        };

        debug!(
            residual = self.ctx.metrics.jacobian_residual.last().copied().unwrap_or(0.0),
            iters = self.aggregator.num_iter(),
            secs = self.aggregator.agg_time();
            "aggregation round"
        );

        costs.agg += self.aggregator.agg_time();
        costs.gm_iter += self.aggregator.num_iter();
        self.aggregator.reset_stats();

        match aggregate {
            Aggregate::Dense(values) => distribute_grads(&values, &mut self.learner)?,
            Aggregate::Sparse { values, indices } => {
                distribute_sparse_grads(&values, &indices, &mut self.learner)?
            }
        }

        self.transition(Phase::OptimizerStep);
        self.learner.optimizer_step()?;
        self.ctx.metrics.num_opt_steps += 1;

        Ok(())
    }

    fn end_epoch(&mut self, costs: EpochCosts) -> Result<()> {
        self.transition(Phase::DivergenceCheck);

        let eval = self.learner.evaluate()?;
        let lr = self.learner.learning_rate();
        let metrics = &mut self.ctx.metrics;

        metrics.epoch_grad_cost.push(costs.grad);
        metrics.epoch_agg_cost.push(costs.agg);
        metrics.epoch_gm_iter.push(costs.gm_iter);
        metrics.epoch_compression_cost.push(costs.compression);
        metrics.train_loss.push(eval.train_loss);
        metrics.test_loss.extend(eval.test_loss);
        metrics.test_acc.extend(eval.test_accuracy);
        metrics.lr.push(lr);

        let loss = eval.train_loss;
        info!(epoch = self.epoch, train_loss = loss, lr = lr; "finished epoch");

        if loss > DIVERGENCE_THRESHOLD || !loss.is_finite() {
            warn!(epoch = self.epoch, train_loss = loss; "training diverged, stopping");

            let termination = Termination::Diverged {
                epoch: self.epoch,
                loss,
            };

            metrics.diverged = true;
            metrics.update_totals();
            self.epoch = self.num_epochs;
            self.transition(Phase::Terminated(termination));
            return Ok(());
        }

        metrics.update_totals();
        self.epoch += 1;
        self.learner.schedule_step();

        if self.epoch == self.num_epochs {
            self.transition(Phase::Terminated(Termination::Completed));
        } else {
            self.transition(Phase::AwaitingBatch);
        }

        Ok(())
    }
}
