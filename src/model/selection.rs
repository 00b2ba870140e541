//! Train/validation splitting, stratified folds and the boosting grid search.

use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::boosting::{AdaBoostClassifier, BoostingAlgorithm};
use super::error::{ModelError, Result, check_xy};
use super::metrics::accuracy;

/// Row indices of a train/validation split.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..n` and hold out `ceil(test_size * n)` rows for validation.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ModelError::invalid("test_size", test_size, "must be in (0, 1)"));
    }
    let n_val = (test_size * n as f64).ceil() as usize;
    if n_val == 0 || n_val >= n {
        return Err(ModelError::EmptyInput(format!(
            "{n} rows cannot be split with test_size {test_size}"
        )));
    }

    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    let train = perm.split_off(n_val);
    Ok(Split {
        train,
        validation: perm,
    })
}

/// Unshuffled stratified folds: each class's rows, in order, are cut into
/// `n_splits` near-equal contiguous chunks and chunk `f` joins fold `f`.
/// Returns `(train, test)` index lists, both sorted.
pub fn stratified_k_fold(y: &Array1<f64>, n_splits: usize) -> Result<Vec<Split>> {
    if n_splits < 2 {
        return Err(ModelError::invalid("n_splits", n_splits, "must be at least 2"));
    }
    if y.len() < n_splits {
        return Err(ModelError::invalid(
            "n_splits",
            n_splits,
            &format!("cannot exceed the number of samples ({})", y.len()),
        ));
    }

    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();

    let mut fold_of = vec![0usize; y.len()];
    for class in classes {
        let members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        let base = members.len() / n_splits;
        let extra = members.len() % n_splits;
        let mut start = 0;
        for fold in 0..n_splits {
            let size = base + usize::from(fold < extra);
            for &i in &members[start..start + size] {
                fold_of[i] = fold;
            }
            start += size;
        }
    }

    Ok((0..n_splits)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| fold_of[i] == fold);
            Split { train, validation }
        })
        .collect())
}

/// Hyperparameters searched for the boosted stumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingGrid {
    pub n_estimators: Vec<usize>,
    pub learning_rates: Vec<f64>,
}

impl Default for BoostingGrid {
    fn default() -> Self {
        Self {
            n_estimators: (1..50).collect(),
            learning_rates: vec![0.001, 0.01, 0.05, 0.1, 0.15, 0.2],
        }
    }
}

impl BoostingGrid {
    pub fn len(&self) -> usize {
        self.n_estimators.len() * self.learning_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One evaluated grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub params: BoostingParams,
    /// Validation accuracy of each fold; NaN where the fold could not be fitted.
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSearchResult {
    /// Learning rate outer, estimator count inner.
    pub cells: Vec<GridCell>,
    pub best: GridCell,
}

/// Exhaustive cross-validated search over `grid`, scored by accuracy.
///
/// A single boosted fit per (learning rate, fold) is evaluated at every stage,
/// since the ensemble after `m` rounds is exactly the model fitted with
/// `n_estimators = m`. The first cell with the highest mean score wins.
/// A fold that cannot be fitted scores NaN, which keeps its cells out of the
/// running.
pub fn grid_search_adaboost(
    x: &Array2<f64>,
    y: &Array1<f64>,
    grid: &BoostingGrid,
    algorithm: BoostingAlgorithm,
    n_splits: usize,
) -> Result<GridSearchResult> {
    check_xy(x.nrows(), y.len())?;
    if grid.is_empty() {
        return Err(ModelError::invalid("grid", "empty", "needs at least one point"));
    }
    if let Some(&bad) = grid.n_estimators.iter().find(|&&n| n == 0) {
        return Err(ModelError::invalid("n_estimators", bad, "must be at least 1"));
    }
    let folds = stratified_k_fold(y, n_splits)?;
    let max_rounds = grid.n_estimators.iter().copied().max().unwrap_or(1);

    let jobs: Vec<(usize, usize)> = (0..grid.learning_rates.len())
        .flat_map(|lr| (0..folds.len()).map(move |f| (lr, f)))
        .collect();

    // scores[(lr, fold)][n_estimators index]
    let scores: Vec<Vec<f64>> = jobs
        .par_iter()
        .map(|&(lr_idx, fold_idx)| {
            let fold = &folds[fold_idx];
            let lr = grid.learning_rates[lr_idx];
            let model = AdaBoostClassifier::new(max_rounds, lr).with_algorithm(algorithm);
            score_fold(x, y, fold, model, &grid.n_estimators).unwrap_or_else(|e| {
                log::warn!("grid fold {fold_idx} at learning_rate {lr} failed: {e}");
                vec![f64::NAN; grid.n_estimators.len()]
            })
        })
        .collect();

    let mut cells = Vec::with_capacity(grid.len());
    for (lr_idx, &learning_rate) in grid.learning_rates.iter().enumerate() {
        for (n_idx, &n_estimators) in grid.n_estimators.iter().enumerate() {
            let fold_scores: Vec<f64> = (0..folds.len())
                .map(|f| scores[lr_idx * folds.len() + f][n_idx])
                .collect();
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            cells.push(GridCell {
                params: BoostingParams {
                    n_estimators,
                    learning_rate,
                },
                fold_scores,
                mean_score,
            });
        }
    }

    let best = cells
        .iter()
        .filter(|c| !c.mean_score.is_nan())
        .fold(None, |best: Option<&GridCell>, c| match best {
            Some(b) if b.mean_score >= c.mean_score => Some(b),
            _ => Some(c),
        })
        .cloned()
        .ok_or_else(|| ModelError::TrainingError("every grid point failed".to_string()))?;

    Ok(GridSearchResult { cells, best })
}

fn score_fold(
    x: &Array2<f64>,
    y: &Array1<f64>,
    fold: &Split,
    mut model: AdaBoostClassifier,
    n_estimators: &[usize],
) -> Result<Vec<f64>> {
    let x_train = x.select(Axis(0), &fold.train);
    let y_train = y.select(Axis(0), &fold.train);
    let x_val = x.select(Axis(0), &fold.validation);
    let y_val = y.select(Axis(0), &fold.validation);

    model.fit(&x_train, &y_train)?;
    let stages = model.staged_predict(&x_val)?;

    n_estimators
        .iter()
        .map(|&n| {
            // Boosting that stopped early behaves the same for any larger n.
            let stage = &stages[n.min(stages.len()) - 1];
            accuracy(&y_val, stage)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_split_is_disjoint_covering_and_reproducible() {
        let split = train_test_split(10, 0.3, 51).unwrap();
        assert_eq!(split.validation.len(), 3);
        assert_eq!(split.train.len(), 7);

        let mut all: Vec<usize> = split.train.iter().chain(split.validation.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(split, train_test_split(10, 0.3, 51).unwrap());
        assert_ne!(split, train_test_split(10, 0.3, 52).unwrap());
    }

    #[test]
    fn test_split_rejects_bad_sizes() {
        assert!(train_test_split(10, 0.0, 1).is_err());
        assert!(train_test_split(10, 1.0, 1).is_err());
        assert!(train_test_split(1, 0.5, 1).is_err());
    }

    #[test]
    fn test_stratified_folds_balance_classes() {
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let folds = stratified_k_fold(&y, 2).unwrap();
        assert_eq!(folds[0].validation, vec![0, 1, 4, 5, 6]);
        assert_eq!(folds[1].validation, vec![2, 3, 7, 8, 9]);
        assert_eq!(folds[0].train, folds[1].validation);
        assert!(stratified_k_fold(&y, 1).is_err());
        assert!(stratified_k_fold(&y, 11).is_err());
    }

    #[test]
    fn test_grid_search_matches_direct_fits() {
        let x = array![
            [1.0, 9.0], [2.0, 8.0], [3.0, 9.5], [1.5, 8.5],
            [4.0, 1.0], [5.0, 2.0], [6.0, 1.5], [5.5, 1.2],
            [7.0, 5.0], [8.0, 4.5], [9.0, 5.5], [8.5, 5.2],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let grid = BoostingGrid {
            n_estimators: vec![1, 2, 4],
            learning_rates: vec![0.1, 1.0],
        };
        let folds = stratified_k_fold(&y, 2).unwrap();
        for algorithm in BoostingAlgorithm::ALL {
            let result = grid_search_adaboost(&x, &y, &grid, algorithm, 2).unwrap();
            assert_eq!(result.cells.len(), 6);
            assert_eq!(result.cells[0].params.learning_rate, 0.1);
            assert_eq!(result.cells[3].params.n_estimators, 1);

            for cell in &result.cells {
                for (fold, &score) in folds.iter().zip(cell.fold_scores.iter()) {
                    let xt = x.select(Axis(0), &fold.train);
                    let yt = y.select(Axis(0), &fold.train);
                    let mut m = AdaBoostClassifier::new(cell.params.n_estimators, cell.params.learning_rate)
                        .with_algorithm(algorithm);
                    m.fit(&xt, &yt).unwrap();
                    let pred = m.predict(&x.select(Axis(0), &fold.validation)).unwrap();
                    let direct = accuracy(&y.select(Axis(0), &fold.validation), &pred).unwrap();
                    assert!((direct - score).abs() < 1e-12, "{algorithm} {:?}", cell.params);
                }
            }

            let top = result
                .cells
                .iter()
                .map(|c| c.mean_score)
                .fold(f64::MIN, f64::max);
            assert_eq!(result.best.mean_score, top);
        }
    }

    #[test]
    fn test_failed_folds_leave_nan_cells_out_of_the_best() {
        let x = array![[0.0], [1.0], [2.0], [5.0], [6.0], [7.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        // A zero learning rate cannot be fitted, so every fold of that row fails.
        let grid = BoostingGrid {
            n_estimators: vec![1, 2],
            learning_rates: vec![0.0, 1.0],
        };
        let result = grid_search_adaboost(&x, &y, &grid, BoostingAlgorithm::Samme, 3).unwrap();
        assert!(result.cells[..2].iter().all(|c| c.mean_score.is_nan()));
        assert!(result.cells[0].fold_scores.iter().all(|s| s.is_nan()));
        assert_eq!(result.best.params.learning_rate, 1.0);
        assert_eq!(result.best.params.n_estimators, 1);
        assert_eq!(result.best.mean_score, 1.0);

        let hopeless = BoostingGrid {
            n_estimators: vec![1],
            learning_rates: vec![0.0],
        };
        assert!(grid_search_adaboost(&x, &y, &hopeless, BoostingAlgorithm::Samme, 3).is_err());
    }
}
