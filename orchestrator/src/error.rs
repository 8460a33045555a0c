use std::fmt;

use aggregation::AggErr;
use machine_learning::MlErr;

/// The result type used in the entire orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before training.
    InvalidConfig(String),
    /// A training path that isn't supported.
    Unimplemented(String),
    /// The model side failed during training.
    Ml(MlErr),
    /// Buffering, compressing or aggregating the gradients failed.
    Aggregation(AggErr),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Unimplemented(what) => write!(f, "{what} is not implemented"),
            Self::Ml(e) => write!(f, "model error: {e}"),
            Self::Aggregation(e) => write!(f, "aggregation error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            Self::Aggregation(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<AggErr> for OrchestratorError {
    fn from(e: AggErr) -> Self {
        match e {
            // The model's width changed mid run, which only a misconfigured model can do.
            AggErr::GradientLengthMismatch { .. } => Self::InvalidConfig(e.to_string()),
            e => Self::Aggregation(e),
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
