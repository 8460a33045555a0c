//! Simulated Byzantine workers.

use ndarray::{Array2, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};

use crate::{AggErr, Result};

/// What a corrupted worker sends instead of its gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attack {
    /// Pure gaussian noise of standard deviation `std`.
    Gaussian { std: f32 },
    /// The honest gradient, flipped and scaled by `scale`.
    SignFlip { scale: f32 },
    /// Every coordinate set to `value`.
    Constant { value: f32 },
}

/// Corrupts a fixed fraction of the gradients of every window.
#[derive(Debug, Clone)]
pub struct Adversary {
    fraction: f32,
    attack: Attack,
    rng: StdRng,
}

impl Adversary {
    /// Creates a new `Adversary`.
    ///
    /// # Arguments
    /// * `fraction` - The fraction of rows to corrupt, in `[0, 1]`.
    /// * `attack` - How the rows are corrupted.
    /// * `seed` - The seed of the noise.
    ///
    /// # Returns
    /// The adversary or an error if its parameters are invalid.
    pub fn new(fraction: f32, attack: Attack, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(AggErr::invalid(
                "adversary fraction",
                format!("{fraction} is not in [0, 1]"),
            ));
        }

        if let Attack::Gaussian { std } = attack
            && !(std.is_finite() && std >= 0.0)
        {
            return Err(AggErr::invalid(
                "gaussian attack std",
                format!("{std} must be finite and non negative"),
            ));
        }

        Ok(Self {
            fraction,
            attack,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The amount of rows corrupted out of `rows`.
    pub fn num_corrupted(&self, rows: usize) -> usize {
        ((self.fraction * rows as f32).floor() as usize).min(rows)
    }

    /// Returns a copy of `matrix` with its first `num_corrupted` rows corrupted.
    pub fn corrupt(&mut self, matrix: ArrayView2<f32>) -> Array2<f32> {
        let mut corrupted = matrix.to_owned();
        let n = self.num_corrupted(corrupted.nrows());

        for mut row in corrupted.rows_mut().into_iter().take(n) {
            match self.attack {
                Attack::Gaussian { std } => {
                    for v in row.iter_mut() {
                        let z: f32 = StandardNormal.sample(&mut self.rng);
                        *v = std * z;
                    }
                }
                Attack::SignFlip { scale } => row.mapv_inplace(|v| -scale * v),
                Attack::Constant { value } => row.fill(value),
            }
        }

        corrupted
    }
}
