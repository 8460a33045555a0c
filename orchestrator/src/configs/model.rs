use machine_learning::{arch::activations::ActFn, initialization::ParamInit};
use serde::{Deserialize, Serialize};

/// An activation function, as written in a config.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ActFnConfig {
    Sigmoid {
        #[serde(default = "default_amp")]
        amp: f32,
    },
    Relu,
    Tanh,
}

fn default_amp() -> f32 {
    1.0
}

impl From<ActFnConfig> for ActFn {
    fn from(config: ActFnConfig) -> Self {
        match config {
            ActFnConfig::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnConfig::Relu => ActFn::relu(),
            ActFnConfig::Tanh => ActFn::tanh(),
        }
    }
}

/// How a layer's weights are initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ParamInitConfig {
    Constant {
        value: f32,
    },
    Uniform {
        low: f32,
        high: f32,
    },
    Normal {
        mean: f32,
        std_dev: f32,
    },
    #[default]
    XavierUniform,
    Kaiming,
}

impl From<ParamInitConfig> for ParamInit {
    fn from(config: ParamInitConfig) -> Self {
        match config {
            ParamInitConfig::Constant { value } => ParamInit::Constant { value },
            ParamInitConfig::Uniform { low, high } => ParamInit::Uniform { low, high },
            ParamInitConfig::Normal { mean, std_dev } => ParamInit::Normal { mean, std_dev },
            ParamInitConfig::XavierUniform => ParamInit::XavierUniform,
            ParamInitConfig::Kaiming => ParamInit::Kaiming,
        }
    }
}

/// A fully connected layer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LayerConfig {
    /// The amount of inputs and outputs.
    pub dim: (usize, usize),
    #[serde(default)]
    pub act_fn: Option<ActFnConfig>,
    #[serde(default)]
    pub init: ParamInitConfig,
}

/// A sequential stack of layers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LossConfig {
    Mse,
    CrossEntropy,
}
