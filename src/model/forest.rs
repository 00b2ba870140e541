//! Random forest regression

use ndarray::{Array1, Array2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{ModelError, Result, check_features, check_xy};
use super::tree::DecisionTree;

/// Bagged MSE trees over all features.
///
/// Per-tree seeds are drawn in order from `random_state`, so with a fixed seed
/// the first `n` trees of a larger forest are exactly a forest of `n` trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub random_state: Option<u64>,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: None,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fit all trees in parallel.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x.nrows(), y.len())?;
        if self.n_estimators == 0 {
            return Err(ModelError::invalid("n_estimators", 0, "must be at least 1"));
        }

        let mut master = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| master.next_u64()).collect();
        let n = x.nrows();

        let trees = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let indices: Vec<usize> = if self.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let mut tree = DecisionTree::regressor().with_min_samples_leaf(self.min_samples_leaf);
                tree.max_depth = self.max_depth;
                tree.fit_samples(x, y, None, indices)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("fitted random forest with {} trees", trees.len());
        self.trees = trees;
        self.n_features = x.ncols();
        Ok(self)
    }

    /// Per-tree predictions, `n_trees x n_rows`.
    fn tree_predictions(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_features(self.n_features, x.ncols())?;

        let rows = self
            .trees
            .par_iter()
            .map(|t| t.predict(x))
            .collect::<Result<Vec<Array1<f64>>>>()?;
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Array2::from_shape_vec((self.trees.len(), x.nrows()), flat).map_err(|e| {
            ModelError::ShapeError {
                expected: format!("{} x {}", self.trees.len(), x.nrows()),
                actual: e.to_string(),
            }
        })
    }

    /// Mean prediction of all trees.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let n = self.trees.len();
        Ok(self.staged_predict(x, &[n.max(1)])?.remove(0))
    }

    /// Predictions of the forests made of the first `count` trees, for each
    /// requested `count` (each in `1..=n_trees`).
    pub fn staged_predict(&self, x: &Array2<f64>, counts: &[usize]) -> Result<Vec<Array1<f64>>> {
        let per_tree = self.tree_predictions(x)?;
        let n_trees = per_tree.nrows();
        if let Some(&bad) = counts.iter().find(|&&c| c == 0 || c > n_trees) {
            return Err(ModelError::invalid(
                "n_estimators",
                bad,
                &format!("must be in 1..={n_trees}"),
            ));
        }

        let mut staged: Vec<Option<Array1<f64>>> = vec![None; n_trees + 1];
        let mut running = Array1::<f64>::zeros(x.nrows());
        for (t, row) in per_tree.outer_iter().enumerate() {
            running += &row;
            let count = t + 1;
            if counts.contains(&count) {
                staged[count] = Some(&running / count as f64);
            }
        }

        counts
            .iter()
            .map(|&c| staged[c].clone().ok_or(ModelError::NotFitted))
            .collect()
    }

    /// Mean of the per-tree feature importances.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += &Array1::from(imp.to_vec());
            }
        }
        Some(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.3], [2.0, 0.1], [3.0, 0.7], [4.0, 0.2], [5.0, 0.9],
            [6.0, 0.4], [7.0, 0.8], [8.0, 0.6], [9.0, 0.5], [10.0, 0.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 3.0];
        (x, y)
    }

    #[test]
    fn test_fit_predict_is_reproducible() {
        let (x, y) = data();
        let mut a = RandomForestRegressor::new(20).with_max_depth(4).with_random_state(55);
        let mut b = a.clone();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        let pa = a.predict(&x).unwrap();
        assert_eq!(pa, b.predict(&x).unwrap());
        assert!(pa.iter().all(|&v| (0.0..=3.0).contains(&v)));
        assert!(pa[0] < pa[9]);
    }

    #[test]
    fn test_staged_prefix_equals_smaller_forest() {
        let (x, y) = data();
        let mut big = RandomForestRegressor::new(12).with_max_depth(3).with_random_state(7);
        big.fit(&x, &y).unwrap();
        let staged = big.staged_predict(&x, &[5, 12]).unwrap();

        let mut small = RandomForestRegressor::new(5).with_max_depth(3).with_random_state(7);
        small.fit(&x, &y).unwrap();
        let expected = small.predict(&x).unwrap();
        for (a, b) in staged[0].iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(staged[1], big.predict(&x).unwrap());
    }

    #[test]
    fn test_importances_favour_informative_feature() {
        let (x, y) = data();
        let mut forest = RandomForestRegressor::new(30).with_random_state(1);
        forest.fit(&x, &y).unwrap();
        let imp = forest.feature_importances().unwrap();
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_errors() {
        let (x, y) = data();
        let forest = RandomForestRegressor::new(3);
        assert!(matches!(forest.predict(&x), Err(ModelError::NotFitted)));

        let mut forest = RandomForestRegressor::new(0);
        assert!(forest.fit(&x, &y).is_err());

        let mut forest = RandomForestRegressor::new(3).with_random_state(0);
        forest.fit(&x, &y).unwrap();
        assert!(forest.staged_predict(&x, &[4]).is_err());
    }
}
