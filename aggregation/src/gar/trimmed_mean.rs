use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;

use super::median::sorted;
use crate::{AggErr, Result};

/// Returns the amount of values dropped from each end of a column of `rows` values.
pub(super) fn validate(beta: f32, rows: usize) -> Result<usize> {
    if !(0.0..0.5).contains(&beta) {
        return Err(AggErr::invalid(
            "trimmed mean beta",
            format!("{beta} is not in [0, 0.5)"),
        ));
    }

    let trim = (beta * rows as f32).floor() as usize;
    if 2 * trim >= rows {
        return Err(AggErr::NotEnoughRows {
            rule: "trimmed_mean",
            got: rows,
            required: 2 * trim + 1,
        });
    }

    Ok(trim)
}

/// Coordinate wise mean of the rows after dropping the `⌊beta·n⌋` extremes at each end.
pub(super) fn trimmed_mean(samples: ArrayView2<f32>, beta: f32) -> Result<Vec<f32>> {
    let rows = samples.nrows();
    let trim = validate(beta, rows)?;
    let kept = (rows - 2 * trim) as f32;

    let out = samples
        .axis_iter(Axis(1))
        .into_par_iter()
        .map(|column| sorted(column)[trim..rows - trim].iter().sum::<f32>() / kept)
        .collect();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn drops_extremes() {
        let samples = array![[1.0], [2.0], [3.0], [1000.0], [-1000.0]];
        assert_eq!(trimmed_mean(samples.view(), 0.2).unwrap(), vec![2.0]);
    }

    #[test]
    fn zero_beta_is_the_mean() {
        let samples = array![[1.0, 2.0], [3.0, 6.0]];
        assert_eq!(trimmed_mean(samples.view(), 0.0).unwrap(), vec![2.0, 4.0]);
    }
}
