/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Termination {
    /// Every epoch ran.
    Completed,
    /// The train loss blew up at the end of `epoch`.
    Diverged { epoch: usize, loss: f32 },
}

/// The phases a `TrainingOrchestrator` goes through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    AwaitingBatch,
    AccumulatingGradient,
    Aggregation,
    OptimizerStep,
    DivergenceCheck,
    Terminated(Termination),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingBatch => "awaiting_batch",
            Phase::AccumulatingGradient => "accumulating_gradient",
            Phase::Aggregation => "aggregation",
            Phase::OptimizerStep => "optimizer_step",
            Phase::DivergenceCheck => "divergence_check",
            Phase::Terminated(_) => "terminated",
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        match *self {
            Phase::Terminated(termination) => Some(termination),
            _ => None,
        }
    }
}
