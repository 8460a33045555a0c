//! Robust distributed SGD: batch gradients are buffered into a Jacobian, optionally
//! compressed, robustly aggregated and applied by a `TrainingOrchestrator`.

pub mod configs;
pub mod context;
mod error;
mod metrics;
mod orchestrator;
mod session;
pub mod state;

pub use configs::Config;
pub use context::RunContext;
pub use error::{OrchestratorError, Result};
pub use metrics::Metrics;
pub use orchestrator::{DIVERGENCE_THRESHOLD, TrainingOrchestrator};
pub use session::Session;
pub use state::{Phase, Termination};

/// Validates `config` and runs every repetition of it with the wall clock.
///
/// # Errors
/// Returns an `OrchestratorError` if the config is invalid, its train mode isn't
/// supported or a run fails.
pub fn train(config: Config) -> Result<Vec<Metrics>> {
    log::info!("validating config");
    Session::new(config)?.run()
}
