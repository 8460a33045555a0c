use aggregation::clock::Clock;

use crate::Metrics;

/// The state a single run owns besides its model: its time source and its measurements.
pub struct RunContext {
    pub clock: Box<dyn Clock>,
    pub metrics: Metrics,
}

impl RunContext {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            metrics: Metrics::new(),
        }
    }
}
