use std::{fs, num::NonZeroUsize, path::Path};

use aggregation::{adversary::Attack, compression::CompressionRule, gar::Gar};
use machine_learning::optimization::LrSchedule;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use super::{LossConfig, ModelConfig};
use crate::{OrchestratorError, Result};

/// How the gradients of each batch reach the optimizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainMode {
    /// Gradients are buffered and robustly aggregated every `num_batches` batches.
    #[default]
    Distributed,
    /// Plain mini batch SGD, one optimizer step per batch.
    Vanilla,
    /// Not supported.
    Federated,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case", deny_unknown_fields)]
pub enum AggregationConfig {
    Mean,
    CoordinateMedian,
    TrimmedMean {
        beta: f32,
    },
    GeometricMedian {
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_tol")]
        tol: f32,
        #[serde(default = "default_nu")]
        nu: f32,
    },
    Krum {
        byzantine: usize,
        #[serde(default = "default_select")]
        select: usize,
    },
}

fn default_max_iter() -> usize {
    100
}

fn default_tol() -> f32 {
    1e-5
}

fn default_nu() -> f32 {
    1e-6
}

fn default_select() -> usize {
    1
}

impl From<&AggregationConfig> for Gar {
    fn from(config: &AggregationConfig) -> Self {
        match *config {
            AggregationConfig::Mean => Gar::Mean,
            AggregationConfig::CoordinateMedian => Gar::CoordinateMedian,
            AggregationConfig::TrimmedMean { beta } => Gar::TrimmedMean { beta },
            AggregationConfig::GeometricMedian { max_iter, tol, nu } => {
                Gar::GeometricMedian { max_iter, tol, nu }
            }
            AggregationConfig::Krum { byzantine, select } => Gar::Krum { byzantine, select },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case", deny_unknown_fields)]
pub enum CompressionConfig {
    TopK { ratio: f32 },
    RandomK { ratio: f32 },
    ErrorFeedback { ratio: f32 },
}

impl From<CompressionConfig> for CompressionRule {
    fn from(config: CompressionConfig) -> Self {
        match config {
            CompressionConfig::TopK { ratio } => CompressionRule::TopK { ratio },
            CompressionConfig::RandomK { ratio } => CompressionRule::RandomK { ratio },
            CompressionConfig::ErrorFeedback { ratio } => CompressionRule::ErrorFeedback { ratio },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum AttackConfig {
    Gaussian {
        std: f32,
    },
    SignFlip {
        #[serde(default = "default_scale")]
        scale: f32,
    },
    Constant {
        value: f32,
    },
}

fn default_scale() -> f32 {
    1.0
}

impl From<AttackConfig> for Attack {
    fn from(config: AttackConfig) -> Self {
        match config {
            AttackConfig::Gaussian { std } => Attack::Gaussian { std },
            AttackConfig::SignFlip { scale } => Attack::SignFlip { scale },
            AttackConfig::Constant { value } => Attack::Constant { value },
        }
    }
}

/// Simulated Byzantine workers.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdversaryConfig {
    /// The fraction of every window's gradients that gets corrupted.
    pub fraction: f32,
    pub attack: AttackConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum OptimizerConfig {
    GradientDescent {
        lr: f32,
    },
    Momentum {
        lr: f32,
        momentum: f32,
    },
    Adam {
        lr: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

impl OptimizerConfig {
    pub fn lr(&self) -> f32 {
        match *self {
            OptimizerConfig::GradientDescent { lr }
            | OptimizerConfig::Momentum { lr, .. }
            | OptimizerConfig::Adam { lr, .. } => lr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum LrScheduleConfig {
    Step { step_size: usize, gamma: f32 },
    MultiStep { milestones: Vec<usize>, gamma: f32 },
    Exponential { gamma: f32 },
}

impl From<&LrScheduleConfig> for LrSchedule {
    fn from(config: &LrScheduleConfig) -> Self {
        match config {
            LrScheduleConfig::Step { step_size, gamma } => LrSchedule::Step {
                step_size: *step_size,
                gamma: *gamma,
            },
            LrScheduleConfig::MultiStep { milestones, gamma } => LrSchedule::MultiStep {
                milestones: milestones.clone(),
                gamma: *gamma,
            },
            LrScheduleConfig::Exponential { gamma } => LrSchedule::Exponential { gamma: *gamma },
        }
    }
}

/// Where the samples come from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "snake_case", deny_unknown_fields)]
pub enum DataConfig {
    /// Row major samples, each one `x_size` inputs followed by `y_size` outputs.
    Inline {
        data: Vec<f32>,
        x_size: usize,
        y_size: usize,
    },
    /// A noisy linear regression problem with a single output.
    Regression {
        samples: usize,
        features: usize,
        #[serde(default = "default_noise")]
        noise: f32,
    },
    /// Gaussian blobs, one-hot labeled.
    Blobs {
        samples: usize,
        features: usize,
        classes: usize,
        #[serde(default = "default_spread")]
        spread: f32,
    },
}

fn default_noise() -> f32 {
    0.1
}

fn default_spread() -> f32 {
    0.5
}

impl DataConfig {
    /// Returns the amount of inputs and outputs of every sample.
    pub fn io_dims(&self) -> (usize, usize) {
        match *self {
            DataConfig::Inline { x_size, y_size, .. } => (x_size, y_size),
            DataConfig::Regression { features, .. } => (features, 1),
            DataConfig::Blobs {
                features, classes, ..
            } => (features, classes),
        }
    }
}

/// A whole experiment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub train_mode: TrainMode,
    /// The seed of the first run, run `r` uses `seed + r`.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_n_repeat")]
    pub n_repeat: NonZeroUsize,

    pub num_epochs: usize,
    /// The window size: the amount of batches aggregated together.
    pub num_batches: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,

    pub aggregation_rule: AggregationConfig,
    #[serde(default)]
    pub compression_rule: Option<CompressionConfig>,
    #[serde(default)]
    pub adversary: Option<AdversaryConfig>,

    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub lr_schedule: Option<LrScheduleConfig>,
    pub model: ModelConfig,
    pub loss: LossConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub test_fraction: f32,
}

fn default_n_repeat() -> NonZeroUsize {
    NonZeroUsize::MIN
}

fn default_shuffle() -> bool {
    true
}

impl Config {
    /// Parses a JSON config.
    ///
    /// # Returns
    /// The config, an `InvalidConfig` error if the document doesn't describe a valid
    /// config (unknown fields or rule names, wrong types, missing keys) or a `Json` error
    /// if it isn't valid JSON at all.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| match e.classify() {
            Category::Data => OrchestratorError::InvalidConfig(e.to_string()),
            _ => OrchestratorError::Json(e),
        })
    }

    /// Reads and parses a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
