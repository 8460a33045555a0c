mod builder;
mod model;
mod training;

pub use builder::Builder;
pub use model::{ActFnConfig, LayerConfig, LossConfig, ModelConfig, ParamInitConfig};
pub use training::{
    AdversaryConfig, AggregationConfig, AttackConfig, CompressionConfig, Config, DataConfig,
    LrScheduleConfig, OptimizerConfig, TrainMode,
};
