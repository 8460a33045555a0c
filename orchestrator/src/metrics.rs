use serde::Serialize;

use crate::Result;

/// Everything measured during a single run.
///
/// Counters and per epoch series are appended as training goes, the totals are
/// recomputed at the end of every epoch. Costs are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub num_iter: usize,
    pub num_grad_steps: usize,
    pub num_opt_steps: usize,
    pub num_param: usize,

    pub epoch_grad_cost: Vec<f64>,
    pub epoch_agg_cost: Vec<f64>,
    pub epoch_gm_iter: Vec<usize>,
    pub epoch_compression_cost: Vec<f64>,
    /// One entry per compressed aggregation round.
    pub jacobian_residual: Vec<f32>,

    pub train_loss: Vec<f32>,
    pub test_loss: Vec<f32>,
    pub test_acc: Vec<f32>,
    pub lr: Vec<f32>,

    pub total_grad_cost: f64,
    pub total_agg_cost: f64,
    pub total_compression_cost: f64,
    pub total_gm_iter: usize,
    pub total_cost: f64,
    /// Only present once an iterative rule consumed at least one iteration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_gm_cost: Option<f64>,

    pub diverged: bool,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes every total out of the per epoch series.
    pub fn update_totals(&mut self) {
        self.total_grad_cost = self.epoch_grad_cost.iter().sum();
        self.total_agg_cost = self.epoch_agg_cost.iter().sum();
        self.total_compression_cost = self.epoch_compression_cost.iter().sum();
        self.total_gm_iter = self.epoch_gm_iter.iter().sum();
        self.total_cost = self.total_grad_cost + self.total_agg_cost + self.total_compression_cost;

        if self.total_gm_iter != 0 {
            self.avg_gm_cost = Some(self.total_agg_cost / self.total_gm_iter as f64);
        }
    }

    /// Serializes a list of runs as a pretty printed JSON array.
    pub fn to_json(runs: &[Metrics]) -> Result<String> {
        Ok(serde_json::to_string_pretty(runs)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_follow_the_series() {
        let mut metrics = Metrics {
            epoch_grad_cost: vec![1.0, 2.0],
            epoch_agg_cost: vec![0.5, 0.5],
            epoch_compression_cost: vec![0.25, 0.0],
            epoch_gm_iter: vec![0, 0],
            ..Default::default()
        };

        metrics.update_totals();
        assert_eq!(metrics.total_grad_cost, 3.0);
        assert_eq!(metrics.total_cost, 4.25);
        assert_eq!(metrics.avg_gm_cost, None);

        metrics.epoch_gm_iter = vec![2, 2];
        metrics.update_totals();
        assert_eq!(metrics.avg_gm_cost, Some(0.25));
    }

    #[test]
    fn avg_gm_cost_is_omitted_without_iterations() {
        let json = Metrics::to_json(&[Metrics::new()]).unwrap();
        assert!(!json.contains("avg_gm_cost"));
        assert!(json.contains("\"diverged\": false"));
    }

    #[test]
    fn non_finite_losses_serialize_as_null() {
        let metrics = Metrics {
            train_loss: vec![0.5, f32::NAN],
            ..Default::default()
        };

        let value: serde_json::Value =
            serde_json::from_str(&Metrics::to_json(&[metrics]).unwrap()).unwrap();
        assert_eq!(value[0]["train_loss"][1], serde_json::Value::Null);
    }
}
