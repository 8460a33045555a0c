use aggregation::clock::{Clock, WallClock};
use log::info;

use crate::{
    Metrics, OrchestratorError, Result, TrainingOrchestrator,
    configs::{Builder, Config, TrainMode},
    context::RunContext,
};

type ClockFactory = Box<dyn Fn() -> Box<dyn Clock>>;

/// An experiment: `n_repeat` independent runs of the same configuration.
pub struct Session {
    config: Config,
    clock: ClockFactory,
}

impl Session {
    /// Creates a new `Session`, measuring time with the wall clock.
    ///
    /// # Arguments
    /// * `config` - The configuration of the experiment.
    ///
    /// # Returns
    /// A new `Session` or an error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        Builder::new(&config)?;

        Ok(Self {
            config,
            clock: Box::new(|| Box::new(WallClock::new()) as Box<dyn Clock>),
        })
    }

    /// Replaces the clock every run measures its costs with.
    ///
    /// # Arguments
    /// * `clock` - Creates a fresh clock for each run.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Box<dyn Clock> + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs every repetition, one after the other.
    ///
    /// # Returns
    /// The metrics of each run, in seed order.
    pub fn run(&self) -> Result<Vec<Metrics>> {
        if self.config.train_mode == TrainMode::Federated {
            return Err(OrchestratorError::Unimplemented("federated training".into()));
        }

        let n_repeat = self.config.n_repeat.get() as u64;
        (0..n_repeat)
            .map(|r| self.run_once(self.config.seed.wrapping_add(r)))
            .collect()
    }

    /// Runs a single repetition.
    ///
    /// # Arguments
    /// * `seed` - The seed every random stream of the run derives from.
    ///
    /// # Returns
    /// The metrics of the run, also when it diverged.
    pub fn run_once(&self, seed: u64) -> Result<Metrics> {
        let config = &self.config;
        let builder = Builder::new(config)?;

        info!(
            seed = seed,
            rule = builder.build_aggregator().gar().name();
            "starting {:?} run", config.train_mode
        );

        let ctx = RunContext::new((self.clock)());
        let mut orchestrator = TrainingOrchestrator::new(
            builder.build_learner(seed)?,
            config.train_mode,
            config.num_batches,
            builder.build_aggregator(),
            config.num_epochs,
            ctx,
        )?
        .with_compressor(builder.build_compressor(seed)?)
        .with_adversary(builder.build_adversary(seed)?);

        let termination = orchestrator.run()?;
        info!(seed = seed; "run finished: {termination:?}");

        Ok(orchestrator.into_metrics())
    }
}
