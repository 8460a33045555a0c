//! Initial values for a model's flat parameter buffer.

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::{MlErr, Result, arch::layers::Layer};

/// How the weights of a layer are drawn. Biases always start at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamInit {
    Constant { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    /// Uniform in `±sqrt(6 / (fan_in + fan_out))`.
    XavierUniform,
    /// Normal with standard deviation `sqrt(2 / fan_in)`.
    Kaiming,
}

impl ParamInit {
    /// Samples `n` weights for a layer of the given fan in and fan out.
    ///
    /// # Arguments
    /// * `n` - The amount of weights.
    /// * `fan_in` - The number of input units of the layer.
    /// * `fan_out` - The number of output units of the layer.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// The sampled weights or an error if the distribution is invalid.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Result<Vec<f32>> {
        let weights = match *self {
            ParamInit::Constant { value } => vec![value; n],
            ParamInit::Uniform { low, high } => sample_uniform(n, low, high, rng)?,
            ParamInit::Normal { mean, std_dev } => sample_normal(n, mean, std_dev, rng)?,
            ParamInit::XavierUniform => {
                let range = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
                sample_uniform(n, -range, range, rng)?
            }
            ParamInit::Kaiming => {
                let std_dev = (2. / fan_in.max(1) as f32).sqrt();
                sample_normal(n, 0., std_dev, rng)?
            }
        };

        Ok(weights)
    }
}

fn sample_uniform<R: Rng + ?Sized>(n: usize, low: f32, high: f32, rng: &mut R) -> Result<Vec<f32>> {
    let distribution = Uniform::new_inclusive(low, high)
        .map_err(|e| MlErr::InvalidInput(format!("uniform({low}, {high}): {e}")))?;

    Ok((0..n).map(|_| distribution.sample(rng)).collect())
}

fn sample_normal<R: Rng + ?Sized>(
    n: usize,
    mean: f32,
    std_dev: f32,
    rng: &mut R,
) -> Result<Vec<f32>> {
    let distribution = Normal::new(mean, std_dev)
        .map_err(|e| MlErr::InvalidInput(format!("normal({mean}, {std_dev}): {e}")))?;

    Ok((0..n).map(|_| distribution.sample(rng)).collect())
}

/// Builds the initial flat parameter buffer of a stack of layers.
///
/// The buffer follows the layers' slot layout: every layer's weights followed by its biases.
///
/// # Arguments
/// * `layers` - The layers paired with the initialization of their weights.
/// * `rng` - A random number generator.
///
/// # Returns
/// The parameters or an error if any distribution is invalid.
pub fn init_params<'a, I, R>(layers: I, rng: &mut R) -> Result<Vec<f32>>
where
    I: IntoIterator<Item = (&'a Layer, ParamInit)>,
    R: Rng + ?Sized,
{
    let mut params = Vec::new();

    for (layer, init) in layers {
        let (fan_in, fan_out) = layer.dim();
        let weights = init.sample(fan_in * fan_out, fan_in, fan_out, rng)?;

        params.extend(weights);
        params.resize(params.len() + layer.size() - fan_in * fan_out, 0.0);
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::activations::ActFn;

    #[test]
    fn biases_start_at_zero() {
        let layers = [
            Layer::dense((2, 3), ActFn::sigmoid(1.)),
            Layer::dense((3, 1), None),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let params = init_params(
            layers.iter().map(|l| (l, ParamInit::Constant { value: 0.5 })),
            &mut rng,
        )
        .unwrap();

        assert_eq!(params.len(), 13);
        assert!(params[..6].iter().all(|&w| w == 0.5));
        assert!(params[6..9].iter().all(|&b| b == 0.0));
        assert!(params[9..12].iter().all(|&w| w == 0.5));
        assert_eq!(params[12], 0.0);
    }

    #[test]
    fn xavier_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let range = (6f32 / 8.).sqrt();
        let weights = ParamInit::XavierUniform
            .sample(100, 4, 4, &mut rng)
            .unwrap();

        assert!(weights.iter().all(|w| w.abs() <= range));
    }

    #[test]
    fn invalid_distribution_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);

        assert!(
            ParamInit::Uniform {
                low: 1.0,
                high: 0.0
            }
            .sample(3, 1, 1, &mut rng)
            .is_err()
        );
        assert!(
            ParamInit::Normal {
                mean: 0.0,
                std_dev: f32::NAN
            }
            .sample(3, 1, 1, &mut rng)
            .is_err()
        );
    }

    #[test]
    fn same_seed_same_params() {
        let init = ParamInit::Kaiming;
        let a = init.sample(10, 3, 2, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = init.sample(10, 3, 2, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }
}
