use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;

use crate::{AggErr, Result};

pub(super) fn validate(byzantine: usize, select: usize, rows: usize) -> Result<()> {
    let required = 2 * byzantine + 3;
    if rows < required {
        return Err(AggErr::NotEnoughRows {
            rule: "krum",
            got: rows,
            required,
        });
    }

    if select == 0 || select > rows {
        return Err(AggErr::invalid(
            "krum select",
            format!("{select} is not in [1, {rows}]"),
        ));
    }

    Ok(())
}

/// (Multi) Krum.
///
/// Every row is scored by the sum of its squared distances to its `n - f - 2` nearest
/// rows. The result is the average of the `select` rows with the lowest score, ties
/// going to the lower index.
pub(super) fn krum(samples: ArrayView2<f32>, byzantine: usize, select: usize) -> Vec<f32> {
    let n = samples.nrows();
    let neighbours = n - byzantine - 2;

    let scores: Vec<f32> = (0..n)
        .into_par_iter()
        .map(|i| {
            let row = samples.row(i);
            let mut dists: Vec<f32> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    row.iter()
                        .zip(samples.row(j))
                        .map(|(&a, &b)| (a - b).powi(2))
                        .sum()
                })
                .collect();

            dists.sort_unstable_by(f32::total_cmp);
            dists[..neighbours].iter().sum()
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));
    order.truncate(select);
    order.sort_unstable();

    samples
        .select(Axis(0), &order)
        .mean_axis(Axis(0))
        .map(|m| m.to_vec())
        .unwrap_or_default()
}
