use aggregation::{
    adversary::Adversary,
    compression::{CompressionRule, Compressor},
    gar::{Aggregator, Gar},
};
use machine_learning::{
    arch::{
        Model, Sequential,
        activations::ActFn,
        layers::Layer,
        loss::{CrossEntropy, LossFn, Mse},
    },
    dataset::Dataset,
    initialization::{ParamInit, init_params},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
    training::{Learner, SupervisedLearner},
};
use rand::{SeedableRng, rngs::StdRng};

use super::{Config, DataConfig, LossConfig, OptimizerConfig, TrainMode};
use crate::{OrchestratorError, Result};

// Every random stream of a run is seeded from the run's seed and its own stream id.
const DATA_STREAM: u64 = 1;
const INIT_STREAM: u64 = 2;
const SHUFFLE_STREAM: u64 = 3;
const COMPRESSION_STREAM: u64 = 4;
const ADVERSARY_STREAM: u64 = 5;

fn stream_seed(seed: u64, stream: u64) -> u64 {
    seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn invalid(msg: impl Into<String>) -> OrchestratorError {
    OrchestratorError::InvalidConfig(msg.into())
}

/// Validates a `Config` and builds the pieces of a run out of it.
pub struct Builder<'a> {
    config: &'a Config,
}

impl<'a> Builder<'a> {
    /// Creates a new `Builder`.
    ///
    /// # Arguments
    /// * `config` - The configuration of the experiment.
    ///
    /// # Returns
    /// A new `Builder` or an error if the configuration is invalid.
    pub fn new(config: &'a Config) -> Result<Self> {
        let builder = Self { config };
        builder.validate_model()?;
        builder.validate_data()?;
        builder.validate_strategies()?;
        Ok(builder)
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate_model(&self) -> Result<()> {
        let layers = &self.config.model.layers;

        if layers.is_empty() {
            return Err(invalid("model must have at least one layer"));
        }

        for (i, layer) in layers.iter().enumerate() {
            let (n, m) = layer.dim;
            if n == 0 || m == 0 {
                return Err(invalid(format!("layer {i}: dimensions must be positive")));
            }
        }

        for (i, pair) in layers.windows(2).enumerate() {
            let prev_m = pair[0].dim.1;
            let curr_n = pair[1].dim.0;

            if prev_m != curr_n {
                return Err(invalid(format!(
                    "layer {}: input size ({curr_n}) does not match \
                     previous layer output size ({prev_m})",
                    i + 1
                )));
            }
        }

        Ok(())
    }

    fn validate_data(&self) -> Result<()> {
        let config = self.config;
        let (x_size, y_size) = config.data.io_dims();

        let samples = match &config.data {
            DataConfig::Inline { data, .. } => {
                let row_size = x_size + y_size;
                if x_size == 0 || y_size == 0 {
                    return Err(invalid("x_size and y_size must be positive"));
                }

                if data.len() % row_size != 0 {
                    return Err(invalid(format!(
                        "inline data length ({}) is not a multiple of x_size + y_size ({row_size})",
                        data.len()
                    )));
                }

                data.len() / row_size
            }
            DataConfig::Regression { samples, .. } => *samples,
            DataConfig::Blobs {
                samples, classes, ..
            } => {
                if *classes == 0 {
                    return Err(invalid("blobs need at least one class"));
                }
                *samples
            }
        };

        if samples == 0 {
            return Err(invalid("dataset must have at least one sample"));
        }

        let first = config.model.layers[0].dim.0;
        let last = config.model.layers[config.model.layers.len() - 1].dim.1;

        if (first, last) != (x_size, y_size) {
            return Err(invalid(format!(
                "model maps {first} inputs to {last} outputs \
                 but samples have {x_size} inputs and {y_size} outputs"
            )));
        }

        if !(0.0..1.0).contains(&config.test_fraction) {
            return Err(invalid(format!(
                "test_fraction ({}) must be in [0, 1)",
                config.test_fraction
            )));
        }

        let test = (samples as f32 * config.test_fraction).floor() as usize;
        if test >= samples {
            return Err(invalid("test_fraction leaves no training samples"));
        }

        let batches = (samples - test).div_ceil(config.batch_size.get());
        let window = config.num_batches.get();
        // The first batch of an epoch never closes a window, so a single batch can't either.
        let never_aggregates = window > batches || batches == 1;
        if config.train_mode == TrainMode::Distributed && never_aggregates {
            return Err(invalid(format!(
                "num_batches ({window}) never fits in the {batches} batch(es) of an epoch, \
                 so no gradient would ever be aggregated"
            )));
        }

        Ok(())
    }

    fn validate_strategies(&self) -> Result<()> {
        let config = self.config;

        let lr = config.optimizer.lr();
        if !lr.is_finite() || lr <= 0.0 {
            return Err(invalid(format!("learning rate ({lr}) must be positive")));
        }

        Gar::from(&config.aggregation_rule)
            .validate(config.num_batches.get())
            .map_err(|e| invalid(format!("aggregation_rule: {e}")))?;

        if let Some(rule) = config.compression_rule {
            Compressor::new(rule.into(), 0)
                .map_err(|e| invalid(format!("compression_rule: {e}")))?;
        }

        if let Some(adversary) = config.adversary {
            Adversary::new(adversary.fraction, adversary.attack.into(), 0)
                .map_err(|e| invalid(format!("adversary: {e}")))?;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Strategies
    // -------------------------------------------------------------------------

    pub fn build_aggregator(&self) -> Aggregator {
        Aggregator::new(Gar::from(&self.config.aggregation_rule))
    }

    pub fn build_compressor(&self, seed: u64) -> Result<Option<Compressor>> {
        let Some(rule) = self.config.compression_rule else {
            return Ok(None);
        };

        let rule = CompressionRule::from(rule);
        let compressor = Compressor::new(rule, stream_seed(seed, COMPRESSION_STREAM))?;
        Ok(Some(compressor))
    }

    pub fn build_adversary(&self, seed: u64) -> Result<Option<Adversary>> {
        let Some(config) = self.config.adversary else {
            return Ok(None);
        };

        let seed = stream_seed(seed, ADVERSARY_STREAM);
        let adversary = Adversary::new(config.fraction, config.attack.into(), seed)?;
        Ok(Some(adversary))
    }

    // -------------------------------------------------------------------------
    // Learner
    // -------------------------------------------------------------------------

    /// Builds the model, its optimizer and its data for a single run.
    ///
    /// # Arguments
    /// * `seed` - The seed of the run.
    pub fn build_learner(&self, seed: u64) -> Result<Box<dyn Learner>> {
        let layers: Vec<Layer> = self
            .config
            .model
            .layers
            .iter()
            .map(|l| Layer::dense(l.dim, l.act_fn.map(ActFn::from)))
            .collect();

        let mut rng = StdRng::seed_from_u64(stream_seed(seed, INIT_STREAM));
        let inits = self.config.model.layers.iter().map(|l| ParamInit::from(l.init));
        let params = init_params(layers.iter().zip(inits), &mut rng)?;

        let model = Sequential::new(layers);
        self.resolve_optimizer(seed, model, params)
    }

    fn resolve_optimizer<M>(
        &self,
        seed: u64,
        model: M,
        params: Vec<f32>,
    ) -> Result<Box<dyn Learner>>
    where
        M: Model + 'static,
    {
        let len = params.len();

        match self.config.optimizer {
            OptimizerConfig::GradientDescent { lr } => {
                let optimizer = GradientDescent::new(lr);
                self.resolve_loss(seed, model, params, optimizer)
            }
            OptimizerConfig::Momentum { lr, momentum } => {
                let optimizer = GradientDescentWithMomentum::new(len, lr, momentum);
                self.resolve_loss(seed, model, params, optimizer)
            }
            OptimizerConfig::Adam {
                lr,
                beta1,
                beta2,
                epsilon,
            } => {
                let optimizer = Adam::new(len, lr, beta1, beta2, epsilon);
                self.resolve_loss(seed, model, params, optimizer)
            }
        }
    }

    fn resolve_loss<M, O>(
        &self,
        seed: u64,
        model: M,
        params: Vec<f32>,
        optimizer: O,
    ) -> Result<Box<dyn Learner>>
    where
        M: Model + 'static,
        O: Optimizer + 'static,
    {
        match self.config.loss {
            LossConfig::Mse => self.terminate_build(seed, model, params, optimizer, Mse::new()),
            LossConfig::CrossEntropy => {
                self.terminate_build(seed, model, params, optimizer, CrossEntropy::new())
            }
        }
    }

    fn terminate_build<M, O, L>(
        &self,
        seed: u64,
        model: M,
        params: Vec<f32>,
        optimizer: O,
        loss_fn: L,
    ) -> Result<Box<dyn Learner>>
    where
        M: Model + 'static,
        O: Optimizer + 'static,
        L: LossFn + 'static,
    {
        let (train, test) = self.resolve_dataset(seed)?;

        let mut learner = SupervisedLearner::new(
            model,
            params,
            optimizer,
            loss_fn,
            train,
            test,
            self.config.batch_size,
            stream_seed(seed, SHUFFLE_STREAM),
        )?
        .with_shuffle(self.config.shuffle);

        if let Some(schedule) = &self.config.lr_schedule {
            learner = learner.with_schedule(schedule.into());
        }

        Ok(Box::new(learner))
    }

    fn resolve_dataset(&self, seed: u64) -> Result<(Dataset, Option<Dataset>)> {
        let mut rng = StdRng::seed_from_u64(stream_seed(seed, DATA_STREAM));

        let dataset = match &self.config.data {
            DataConfig::Inline {
                data,
                x_size,
                y_size,
            } => Dataset::new(data.clone(), *x_size, *y_size)?,
            DataConfig::Regression {
                samples,
                features,
                noise,
            } => Dataset::regression(*samples, *features, *noise, &mut rng)?,
            DataConfig::Blobs {
                samples,
                features,
                classes,
                spread,
            } => Dataset::blobs(*samples, *features, *classes, *spread, &mut rng)?,
        };

        Ok(dataset.split(self.config.test_fraction)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::{AggregationConfig, CompressionConfig};

    fn config() -> Config {
        Config::from_json(
            r#"{
                "num_epochs": 2,
                "num_batches": 4,
                "batch_size": 2,
                "aggregation_rule": { "rule": "coordinate_median" },
                "optimizer": { "kind": "gradient_descent", "lr": 0.1 },
                "model": { "layers": [
                    { "dim": [2, 3], "act_fn": { "kind": "sigmoid" } },
                    { "dim": [3, 1] }
                ] },
                "loss": "mse",
                "data": { "source": "inline", "x_size": 2, "y_size": 1, "data": [
                    0, 0, 0,  0, 1, 1,  1, 0, 1,  1, 1, 0,
                    0, 0, 0,  0, 1, 1,  1, 0, 1,  1, 1, 0
                ] }
            }"#,
        )
        .unwrap()
    }

    fn assert_invalid(config: &Config) {
        assert!(matches!(
            Builder::new(config),
            Err(OrchestratorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builds_a_learner() {
        let config = config();
        let builder = Builder::new(&config).unwrap();
        let learner = builder.build_learner(0).unwrap();

        assert_eq!(learner.num_params(), 2 * 3 + 3 + 3 + 1);
        assert_eq!(learner.num_batches(), 4);
        assert!(builder.build_compressor(0).unwrap().is_none());
        assert!(builder.build_adversary(0).unwrap().is_none());
    }

    #[test]
    fn same_seed_same_initial_params() {
        let config = config();
        let builder = Builder::new(&config).unwrap();

        let mut a = builder.build_learner(3).unwrap();
        let mut b = builder.build_learner(3).unwrap();
        let mut c = builder.build_learner(4).unwrap();

        let (a, b, c) = (
            a.evaluate().unwrap().train_loss,
            b.evaluate().unwrap().train_loss,
            c.evaluate().unwrap().train_loss,
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_a_window_longer_than_an_epoch() {
        // 8 samples in batches of 2 make 4 batches per epoch.
        let mut config = config();
        config.num_batches = 5.try_into().unwrap();
        assert_invalid(&config);

        config.test_fraction = 0.25;
        config.num_batches = 4.try_into().unwrap();
        assert_invalid(&config);

        config.num_batches = 3.try_into().unwrap();
        assert!(Builder::new(&config).is_ok());

        config.batch_size = 6.try_into().unwrap();
        config.num_batches = 1.try_into().unwrap();
        assert_invalid(&config);
        config.batch_size = 2.try_into().unwrap();

        config.num_batches = 5.try_into().unwrap();
        config.train_mode = TrainMode::Vanilla;
        assert!(Builder::new(&config).is_ok());
    }

    #[test]
    fn rejects_incompatible_layers() {
        let mut config = config();
        config.model.layers[1].dim = (4, 1);
        assert_invalid(&config);

        config.model.layers.clear();
        assert_invalid(&config);
    }

    #[test]
    fn rejects_data_that_does_not_fit_the_model() {
        let mut config = config();
        config.data = DataConfig::Inline {
            data: vec![0.0; 8],
            x_size: 3,
            y_size: 1,
        };
        assert_invalid(&config);

        let mut config = self::config();
        config.data = DataConfig::Inline {
            data: vec![0.0; 7],
            x_size: 2,
            y_size: 1,
        };
        assert_invalid(&config);

        let mut config = self::config();
        config.data = DataConfig::Inline {
            data: vec![],
            x_size: 2,
            y_size: 1,
        };
        assert_invalid(&config);
    }

    #[test]
    fn rejects_rules_that_do_not_fit_the_window() {
        let mut config = config();
        config.aggregation_rule = AggregationConfig::Krum {
            byzantine: 1,
            select: 1,
        };
        assert_invalid(&config);

        let mut config = self::config();
        config.compression_rule = Some(CompressionConfig::TopK { ratio: 0.0 });
        assert_invalid(&config);

        let mut config = self::config();
        config.test_fraction = 1.0;
        assert_invalid(&config);
    }
}
