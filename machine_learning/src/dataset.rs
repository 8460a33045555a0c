use ndarray::{Array2, ArrayView2, Axis, concatenate, s};
use ndarray_rand::{
    RandomExt,
    rand_distr::{Distribution, StandardNormal},
};
use rand::Rng;

use crate::{MlErr, Result};

/// An in memory supervised dataset.
///
/// Samples are stored row major, each row holding `x_size` inputs followed by `y_size`
/// expected outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x_size: usize,
    y_size: usize,
    data: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `data` - The raw samples.
    /// * `x_size` - The amount of inputs per sample.
    /// * `y_size` - The amount of outputs per sample.
    ///
    /// # Returns
    /// A new `Dataset` or an error if `data` can't be split in whole samples.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row = x_size + y_size;

        if x_size == 0 || y_size == 0 {
            return Err(MlErr::InvalidInput(format!(
                "x_size ({x_size}) and y_size ({y_size}) must be positive"
            )));
        }

        if data.len() % row != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset",
                got: data.len(),
                expected: data.len() - data.len() % row,
            });
        }

        if data.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let data = Array2::from_shape_vec((data.len() / row, row), data)
            .map_err(|e| MlErr::InvalidInput(e.to_string()))?;

        Ok(Self {
            x_size,
            y_size,
            data,
        })
    }

    /// Builds a dataset out of an input and an output matrix with the same amount of rows.
    pub fn from_arrays(x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset outputs",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        if x.nrows() == 0 {
            return Err(MlErr::EmptyDataset);
        }

        let data =
            concatenate(Axis(1), &[x, y]).map_err(|e| MlErr::InvalidInput(e.to_string()))?;

        Ok(Self {
            x_size: x.ncols(),
            y_size: y.ncols(),
            data,
        })
    }

    /// Returns the amount of samples.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Views the whole dataset as an input and an output matrix.
    pub fn view(&self) -> (ArrayView2<'_, f32>, ArrayView2<'_, f32>) {
        self.data.view().split_at(Axis(1), self.x_size)
    }

    /// Copies the selected samples into owned input and output matrices.
    ///
    /// # Arguments
    /// * `rows` - The indices of the samples, in the order they should appear.
    ///
    /// # Returns
    /// The selected `(x, y)` or an error if any index is out of bounds.
    pub fn gather(&self, rows: &[usize]) -> Result<(Array2<f32>, Array2<f32>)> {
        let len = self.len();

        if let Some(&index) = rows.iter().find(|&&i| i >= len) {
            return Err(MlErr::IndexOutOfBounds {
                what: "dataset",
                index,
                len,
            });
        }

        let (x, y) = self.view();
        Ok((x.select(Axis(0), rows), y.select(Axis(0), rows)))
    }

    /// Splits off the trailing `test_fraction` of the samples into a second dataset.
    ///
    /// # Returns
    /// The train dataset and the test dataset, if it has at least one sample.
    pub fn split(self, test_fraction: f32) -> Result<(Dataset, Option<Dataset>)> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(MlErr::InvalidInput(format!(
                "test fraction must be in [0, 1), got {test_fraction}"
            )));
        }

        let len = self.len();
        let test_len = (len as f32 * test_fraction).floor() as usize;
        if test_len == 0 {
            return Ok((self, None));
        }

        if test_len == len {
            return Err(MlErr::EmptyDataset);
        }

        let cut = len - test_len;
        let train = Self {
            data: self.data.slice(s![..cut, ..]).to_owned(),
            ..self
        };
        let test = Self {
            data: self.data.slice(s![cut.., ..]).to_owned(),
            ..self
        };

        Ok((train, Some(test)))
    }

    /// Generates a noisy linear regression problem `y = x·w + 0.5 + noise`.
    ///
    /// # Arguments
    /// * `samples` - The amount of samples.
    /// * `x_size` - The amount of features.
    /// * `noise` - The standard deviation of the additive noise.
    /// * `rng` - The source of randomness.
    pub fn regression<R: Rng + ?Sized>(
        samples: usize,
        x_size: usize,
        noise: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let w = Array2::<f32>::random_using((x_size, 1), StandardNormal, rng);
        let x = Array2::<f32>::random_using((samples, x_size), StandardNormal, rng);
        let eps = Array2::<f32>::random_using((samples, 1), StandardNormal, rng);

        let y = x.dot(&w) + 0.5 + eps * noise;
        Self::from_arrays(x.view(), y.view())
    }

    /// Generates a classification problem of gaussian blobs around random centers.
    ///
    /// Labels are one-hot encoded and assigned round robin, so every class has the
    /// same amount of samples (up to one).
    ///
    /// # Arguments
    /// * `samples` - The amount of samples.
    /// * `x_size` - The amount of features.
    /// * `classes` - The amount of classes.
    /// * `spread` - The standard deviation of each blob.
    /// * `rng` - The source of randomness.
    pub fn blobs<R: Rng + ?Sized>(
        samples: usize,
        x_size: usize,
        classes: usize,
        spread: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if classes == 0 {
            return Err(MlErr::InvalidInput("blobs need at least one class".into()));
        }

        let centers = Array2::<f32>::random_using((classes, x_size), StandardNormal, rng) * 4.0;
        let mut x = Array2::<f32>::zeros((samples, x_size));
        let mut y = Array2::<f32>::zeros((samples, classes));

        for (i, (mut x_row, mut y_row)) in x.rows_mut().into_iter().zip(y.rows_mut()).enumerate() {
            let label = i % classes;
            y_row[label] = 1.0;

            for (xi, &c) in x_row.iter_mut().zip(centers.row(label)) {
                let z: f32 = StandardNormal.sample(rng);
                *xi = c + spread * z;
            }
        }

        Self::from_arrays(x.view(), y.view())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn xor() -> Dataset {
        Dataset::new(
            vec![
                0.0, 0.0, 0.0, //
                0.0, 1.0, 1.0, //
                1.0, 0.0, 1.0, //
                1.0, 1.0, 0.0, //
            ],
            2,
            1,
        )
        .unwrap()
    }

    #[test]
    fn new_validates_shape() {
        assert!(Dataset::new(vec![0.0; 5], 2, 1).is_err());
        assert!(matches!(
            Dataset::new(vec![], 2, 1),
            Err(MlErr::EmptyDataset)
        ));
        assert_eq!(xor().len(), 4);
    }

    #[test]
    fn gather_selects_rows_in_order() {
        let (x, y) = xor().gather(&[3, 1]).unwrap();

        assert_eq!(x, ndarray::array![[1.0, 1.0], [0.0, 1.0]]);
        assert_eq!(y, ndarray::array![[0.0], [1.0]]);
        assert!(xor().gather(&[4]).is_err());
    }

    #[test]
    fn split_keeps_trailing_samples_for_test() {
        let (train, test) = xor().split(0.5).unwrap();
        let test = test.unwrap();

        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 2);
        assert_eq!(test.view().0.row(0).to_vec(), vec![1.0, 0.0]);

        let (train, test) = xor().split(0.1).unwrap();
        assert_eq!(train.len(), 4);
        assert!(test.is_none());
    }

    #[test]
    fn generators_are_seeded() {
        let a = Dataset::regression(16, 3, 0.1, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = Dataset::regression(16, 3, 0.1, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!((a.len(), a.x_size(), a.y_size()), (16, 3, 1));

        let blobs = Dataset::blobs(10, 2, 3, 0.5, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!((blobs.len(), blobs.y_size()), (10, 3));
        for row in blobs.view().1.rows() {
            assert_eq!(row.sum(), 1.0);
        }
    }
}
