//! Gradient aggregation rules (GARs).
//!
//! A GAR collapses a matrix holding one gradient per row into a single gradient,
//! ideally without letting a minority of corrupted rows steer the result.

mod geometric_median;
mod krum;
mod mean;
mod median;
mod trimmed_mean;

use log::debug;
use ndarray::{ArrayView2, Axis};

use crate::{AggErr, Result, clock::Clock};

/// The aggregation rules that can be selected.
#[derive(Debug, Clone, PartialEq)]
pub enum Gar {
    /// Coordinate wise mean. Not robust at all, used as a baseline.
    Mean,
    /// Coordinate wise median.
    CoordinateMedian,
    /// Coordinate wise mean after dropping the `⌊beta·n⌋` lowest and highest values.
    TrimmedMean { beta: f32 },
    /// Smoothed Weiszfeld iterations towards the geometric median.
    GeometricMedian { max_iter: usize, tol: f32, nu: f32 },
    /// The average of the `select` rows closest to their `n - byzantine - 2` neighbours.
    Krum { byzantine: usize, select: usize },
}

impl Gar {
    pub fn name(&self) -> &'static str {
        match self {
            Gar::Mean => "mean",
            Gar::CoordinateMedian => "coordinate_median",
            Gar::TrimmedMean { .. } => "trimmed_mean",
            Gar::GeometricMedian { .. } => "geometric_median",
            Gar::Krum { .. } => "krum",
        }
    }

    /// Checks the rule's parameters against the amount of rows it's going to aggregate.
    ///
    /// # Arguments
    /// * `rows` - The amount of gradients per aggregation.
    ///
    /// # Returns
    /// An error if the parameters are invalid or can't work with `rows` gradients.
    pub fn validate(&self, rows: usize) -> Result<()> {
        if rows == 0 {
            return Err(AggErr::EmptyMatrix);
        }

        match *self {
            Gar::Mean | Gar::CoordinateMedian => Ok(()),
            Gar::TrimmedMean { beta } => trimmed_mean::validate(beta, rows).map(|_| ()),
            Gar::GeometricMedian { max_iter, tol, nu } => {
                geometric_median::validate(max_iter, tol, nu)
            }
            Gar::Krum { byzantine, select } => krum::validate(byzantine, select, rows),
        }
    }

    /// Aggregates `samples`, one gradient per row.
    ///
    /// # Returns
    /// The aggregate and the amount of iterations it took.
    fn apply(&self, samples: ArrayView2<f32>) -> Result<(Vec<f32>, usize)> {
        self.validate(samples.nrows())?;

        let out = match *self {
            Gar::Mean => (mean::mean(samples), 0),
            Gar::CoordinateMedian => (median::coordinate_median(samples), 0),
            Gar::TrimmedMean { beta } => (trimmed_mean::trimmed_mean(samples, beta)?, 0),
            Gar::GeometricMedian { max_iter, tol, nu } => {
                geometric_median::geometric_median(samples, max_iter, tol, nu)
            }
            Gar::Krum { byzantine, select } => (krum::krum(samples, byzantine, select), 0),
        };

        Ok(out)
    }
}

/// Runs a `Gar` and keeps track of how much it costs.
///
/// The counters accumulate over calls until `reset_stats`.
#[derive(Debug, Clone)]
pub struct Aggregator {
    gar: Gar,
    num_iter: usize,
    agg_time: f64,
}

impl Aggregator {
    pub fn new(gar: Gar) -> Self {
        Self {
            gar,
            num_iter: 0,
            agg_time: 0.0,
        }
    }

    pub fn gar(&self) -> &Gar {
        &self.gar
    }

    /// Aggregates a gradient matrix into a single gradient.
    ///
    /// # Arguments
    /// * `matrix` - The gradients.
    /// * `retained` - The original column of each feature of `matrix`, if it was compressed.
    /// * `axis` - The axis along which the gradients are laid out.
    /// * `clock` - The clock the aggregation time is measured with.
    ///
    /// # Returns
    /// One value per feature column of `matrix`, or an error if the matrix is empty or
    /// doesn't fit the rule.
    pub fn aggregate<C: Clock + ?Sized>(
        &mut self,
        matrix: ArrayView2<f32>,
        retained: Option<&[usize]>,
        axis: Axis,
        clock: &C,
    ) -> Result<Vec<f32>> {
        let samples = match axis {
            Axis(0) => matrix,
            Axis(1) => matrix.reversed_axes(),
            Axis(other) => {
                return Err(AggErr::invalid(
                    "sample axis",
                    format!("a matrix has no axis {other}"),
                ));
            }
        };

        if samples.is_empty() {
            return Err(AggErr::EmptyMatrix);
        }

        if let Some(indices) = retained
            && indices.len() != samples.ncols()
        {
            return Err(AggErr::RetainedIndicesMismatch {
                got: indices.len(),
                expected: samples.ncols(),
            });
        }

        let start = clock.now();
        let (aggregate, iters) = self.gar.apply(samples)?;
        let elapsed = clock.since(start);

        self.num_iter += iters;
        self.agg_time += elapsed;

        debug!(
            rule = self.gar.name(),
            rows = samples.nrows(),
            cols = samples.ncols(),
            iters = iters,
            secs = elapsed;
            "aggregated gradients"
        );

        Ok(aggregate)
    }

    /// The iterations consumed since the last reset. Always zero for non iterative rules.
    pub fn num_iter(&self) -> usize {
        self.num_iter
    }

    /// The seconds spent aggregating since the last reset.
    pub fn agg_time(&self) -> f64 {
        self.agg_time
    }

    pub fn reset_stats(&mut self) {
        self.num_iter = 0;
        self.agg_time = 0.0;
    }
}
