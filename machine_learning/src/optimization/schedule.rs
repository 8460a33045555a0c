use super::Optimizer;

/// How the learning rate decays over the epochs.
#[derive(Debug, Clone, PartialEq)]
pub enum LrSchedule {
    /// Multiplies the learning rate by `gamma` every `step_size` epochs.
    Step { step_size: usize, gamma: f32 },
    /// Multiplies the learning rate by `gamma` once each milestone epoch is reached.
    MultiStep { milestones: Vec<usize>, gamma: f32 },
    /// Multiplies the learning rate by `gamma` every epoch.
    Exponential { gamma: f32 },
}

/// Drives an optimizer's learning rate following a `LrSchedule`.
///
/// The learning rate is always recomputed from the base one, so repeated calls to
/// `step` never accumulate rounding errors.
#[derive(Debug, Clone)]
pub struct LrScheduler {
    schedule: LrSchedule,
    base_lr: f32,
    epoch: usize,
}

impl LrScheduler {
    /// Creates a new `LrScheduler`.
    ///
    /// # Arguments
    /// * `schedule` - The decay rule.
    /// * `base_lr` - The learning rate at epoch 0.
    pub fn new(schedule: LrSchedule, base_lr: f32) -> Self {
        Self {
            schedule,
            base_lr,
            epoch: 0,
        }
    }

    /// Returns the learning rate for the current epoch.
    pub fn current(&self) -> f32 {
        let decays = match &self.schedule {
            LrSchedule::Step { step_size, .. } => self.epoch / (*step_size).max(1),
            LrSchedule::MultiStep { milestones, .. } => {
                milestones.iter().filter(|&&m| m <= self.epoch).count()
            }
            LrSchedule::Exponential { .. } => self.epoch,
        };

        let gamma = match &self.schedule {
            LrSchedule::Step { gamma, .. }
            | LrSchedule::MultiStep { gamma, .. }
            | LrSchedule::Exponential { gamma } => *gamma,
        };

        self.base_lr * gamma.powi(decays as i32)
    }

    /// Advances one epoch and writes the new learning rate into `optimizer`.
    pub fn step<O: Optimizer + ?Sized>(&mut self, optimizer: &mut O) {
        self.epoch += 1;
        optimizer.set_learning_rate(self.current());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::GradientDescent;

    fn lrs(schedule: LrSchedule, epochs: usize) -> Vec<f32> {
        let mut optimizer = GradientDescent::new(1.0);
        let mut scheduler = LrScheduler::new(schedule, 1.0);

        (0..epochs)
            .map(|_| {
                scheduler.step(&mut optimizer);
                optimizer.learning_rate()
            })
            .collect()
    }

    #[test]
    fn step_decay() {
        let got = lrs(
            LrSchedule::Step {
                step_size: 2,
                gamma: 0.5,
            },
            5,
        );
        assert_eq!(got, vec![1.0, 0.5, 0.5, 0.25, 0.25]);
    }

    #[test]
    fn multi_step_decay() {
        let got = lrs(
            LrSchedule::MultiStep {
                milestones: vec![1, 3],
                gamma: 0.1,
            },
            4,
        );
        assert_eq!(got[0], 0.1);
        assert_eq!(got[1], 0.1);
        assert!((got[2] - 0.01).abs() < 1e-9);
        assert!((got[3] - 0.01).abs() < 1e-9);
    }

    #[test]
    fn exponential_decay() {
        let got = lrs(LrSchedule::Exponential { gamma: 0.5 }, 3);
        assert_eq!(got, vec![0.5, 0.25, 0.125]);
    }
}
