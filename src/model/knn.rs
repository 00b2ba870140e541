//! K-Nearest Neighbors regression
//!
//! Uniform weights, Euclidean distance. Rounding the regression output gives a
//! class code, which is how the price-range analysis uses it.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{ModelError, Result, check_features, check_xy};

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnRegressor {
    pub k: usize,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KnnRegressor {
    fn default() -> Self {
        Self::with_k(5)
    }
}

impl KnnRegressor {
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            x_train: None,
            y_train: None,
        }
    }

    /// Fit the regressor (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x.nrows(), y.len())?;
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(self)
    }

    fn training(&self) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(ModelError::NotFitted),
        }
    }

    fn check_k(&self, k: usize, n_train: usize) -> Result<()> {
        if k == 0 || k > n_train {
            return Err(ModelError::invalid(
                "n_neighbors",
                k,
                &format!("must be in 1..={n_train}"),
            ));
        }
        Ok(())
    }

    /// Indices of the `k` nearest training rows for every row of `x`, nearest first.
    /// Equal distances are ordered by training-row index.
    pub fn kneighbors(&self, x: &Array2<f64>, k: usize) -> Result<Vec<Vec<usize>>> {
        let (x_train, _) = self.training()?;
        check_features(x_train.ncols(), x.ncols())?;
        self.check_k(k, x_train.nrows())?;

        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| nearest(x.row(i), x_train, k))
            .collect())
    }

    /// Predict target values (parallelized over rows)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (_, y_train) = self.training()?;
        let neighbors = self.kneighbors(x, self.k)?;
        Ok(neighbors
            .iter()
            .map(|idx| idx.iter().map(|&j| y_train[j]).sum::<f64>() / idx.len() as f64)
            .collect())
    }

    /// Predictions for each `k` in `ks` from one neighbour search.
    ///
    /// Equivalent to calling [`predict`](Self::predict) once per `k`.
    pub fn predict_sweep(&self, x: &Array2<f64>, ks: &[usize]) -> Result<Vec<Array1<f64>>> {
        let (x_train, y_train) = self.training()?;
        for &k in ks {
            self.check_k(k, x_train.nrows())?;
        }
        let Some(&k_max) = ks.iter().max() else {
            return Ok(Vec::new());
        };
        let neighbors = self.kneighbors(x, k_max)?;

        // prefix[i][m] = sum of the m nearest targets of row i
        let prefix: Vec<Vec<f64>> = neighbors
            .iter()
            .map(|idx| {
                let mut acc = 0.0;
                std::iter::once(0.0)
                    .chain(idx.iter().map(|&j| {
                        acc += y_train[j];
                        acc
                    }))
                    .collect()
            })
            .collect();

        Ok(ks
            .iter()
            .map(|&k| prefix.iter().map(|p| p[k] / k as f64).collect())
            .collect())
    }
}

fn nearest(sample: ArrayView1<'_, f64>, x_train: &Array2<f64>, k: usize) -> Vec<usize> {
    let mut dists: Vec<(f64, usize)> = x_train
        .outer_iter()
        .enumerate()
        .map(|(j, row)| {
            let d: f64 = row
                .iter()
                .zip(sample.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (d, j)
        })
        .collect();

    let by_distance = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
    if k < dists.len() {
        dists.select_nth_unstable_by(k - 1, by_distance);
        dists.truncate(k);
    }
    dists.sort_by(by_distance);
    dists.into_iter().map(|(_, j)| j).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fitted() -> KnnRegressor {
        let x = array![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [10.0, 0.0], [11.0, 0.0]];
        let y = array![0.0, 1.0, 1.0, 3.0, 3.0];
        let mut knn = KnnRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();
        knn
    }

    #[test]
    fn test_predict_averages_neighbours() {
        let knn = fitted();
        let pred = knn.predict(&array![[0.9, 0.0], [10.6, 0.0]]).unwrap();
        assert!((pred[0] - 2.0 / 3.0).abs() < 1e-12);
        // neighbours 11, 10, 2
        assert!((pred[1] - 7.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ties_break_by_training_order() {
        let knn = fitted();
        let nn = knn.kneighbors(&array![[1.5, 0.0]], 2).unwrap();
        assert_eq!(nn[0], vec![1, 2]);
    }

    #[test]
    fn test_sweep_matches_individual_fits() {
        let knn = fitted();
        let x = array![[0.2, 0.1], [5.0, 1.0], [12.0, -1.0]];
        let ks = [1, 2, 4, 5];
        let sweep = knn.predict_sweep(&x, &ks).unwrap();
        for (pred, &k) in sweep.iter().zip(ks.iter()) {
            let mut single = knn.clone();
            single.k = k;
            let expected = single.predict(&x).unwrap();
            for (a, b) in pred.iter().zip(expected.iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_invalid_k() {
        let knn = fitted();
        assert!(knn.kneighbors(&array![[0.0, 0.0]], 0).is_err());
        assert!(knn.predict_sweep(&array![[0.0, 0.0]], &[6]).is_err());
        assert!(KnnRegressor::with_k(1).predict(&array![[0.0]]).is_err());
    }
}
