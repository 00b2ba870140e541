//! AdaBoost (Adaptive Boosting) over decision stumps
//!
//! Two multi-class variants share the same loop. Discrete SAMME weights each
//! stump's vote by `alpha` and boosts the samples it got wrong. SAMME.R (the
//! default) uses the stumps' leaf class probabilities instead: every round adds
//! `(K-1) * (log p - mean_k log p)` to the class scores and reweights samples by
//! how little probability their true class received.

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::error::{ModelError, Result, check_features, check_xy};
use super::tree::DecisionTree;

/// Which boosting update to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostingAlgorithm {
    /// Discrete SAMME: hard stump votes weighted by `alpha`.
    Samme,
    /// Real SAMME.R: log class probabilities of every stump.
    #[default]
    SammeR,
}

impl BoostingAlgorithm {
    pub const ALL: [BoostingAlgorithm; 2] = [BoostingAlgorithm::Samme, BoostingAlgorithm::SammeR];
}

impl fmt::Display for BoostingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoostingAlgorithm::Samme => write!(f, "SAMME"),
            BoostingAlgorithm::SammeR => write!(f, "SAMME.R"),
        }
    }
}

/// Outcome of one boosting round.
enum Round {
    Keep(f64),
    KeepAndStop(f64),
    Stop,
}

/// AdaBoost Classifier (SAMME / SAMME.R, supports multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub algorithm: BoostingAlgorithm,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            algorithm: BoostingAlgorithm::default(),
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_algorithm(mut self, algorithm: BoostingAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Rounds actually kept; fewer than `n_estimators` when boosting stopped early.
    pub fn n_stages(&self) -> usize {
        self.stumps.len()
    }

    /// Weight of each kept stump (always 1 under SAMME.R).
    pub fn estimator_weights(&self) -> &[f64] {
        &self.alphas
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x.nrows(), y.len())?;
        if self.n_estimators == 0 {
            return Err(ModelError::invalid("n_estimators", 0, "must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ModelError::invalid(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        if classes.len() < 2 {
            return Err(ModelError::TrainingError(
                "boosting needs at least two classes".to_string(),
            ));
        }

        let n_samples = x.nrows();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);
        self.stumps.clear();
        self.alphas.clear();
        self.classes = classes;
        self.n_features = x.ncols();

        for round in 0..self.n_estimators {
            let mut stump = DecisionTree::stump();
            stump.fit_weighted(x, y, &weights)?;
            let last = round + 1 == self.n_estimators;

            let outcome = match self.algorithm {
                BoostingAlgorithm::Samme => self.samme_round(&stump, x, y, &mut weights, last)?,
                BoostingAlgorithm::SammeR => self.samme_r_round(&stump, x, y, &mut weights, last)?,
            };
            match outcome {
                Round::Keep(alpha) => {
                    self.stumps.push(stump);
                    self.alphas.push(alpha);
                }
                Round::KeepAndStop(alpha) => {
                    self.stumps.push(stump);
                    self.alphas.push(alpha);
                    break;
                }
                Round::Stop => {
                    log::debug!("boosting stopped after {round} rounds");
                    break;
                }
            }
        }

        Ok(self)
    }

    fn samme_round(
        &self,
        stump: &DecisionTree,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &mut Array1<f64>,
        last: bool,
    ) -> Result<Round> {
        let n_classes = self.classes.len() as f64;
        let predictions = stump.predict(x)?;
        let incorrect: Vec<bool> = predictions.iter().zip(y.iter()).map(|(p, t)| p != t).collect();
        let error = weighted_error(&incorrect, weights);

        if error <= 0.0 {
            // Perfect fit: keep it and stop.
            return Ok(Round::KeepAndStop(1.0));
        }
        if error >= 1.0 - 1.0 / n_classes {
            if self.stumps.is_empty() {
                return Err(ModelError::TrainingError(format!(
                    "first stump is no better than chance (error {error:.3})"
                )));
            }
            log::debug!("stump error {error:.3} is no better than chance");
            return Ok(Round::Stop);
        }

        let alpha = self.learning_rate * (((1.0 - error) / error).ln() + (n_classes - 1.0).ln());
        if !last {
            for (w, &miss) in weights.iter_mut().zip(incorrect.iter()) {
                if miss && *w > 0.0 {
                    *w *= alpha.exp();
                }
            }
            normalize(weights);
        }
        Ok(Round::Keep(alpha))
    }

    fn samme_r_round(
        &self,
        stump: &DecisionTree,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &mut Array1<f64>,
        last: bool,
    ) -> Result<Round> {
        let proba = self.class_proba(stump, x)?;
        let predictions = self.argmax_labels(&proba);
        let incorrect: Vec<bool> = predictions.iter().zip(y.iter()).map(|(p, t)| p != t).collect();
        if weighted_error(&incorrect, weights) <= 0.0 {
            return Ok(Round::KeepAndStop(1.0));
        }

        if !last {
            let k = self.classes.len() as f64;
            let other = -1.0 / (k - 1.0);
            for ((w, row), &target) in weights.iter_mut().zip(proba.outer_iter()).zip(y.iter()) {
                let agreement: f64 = row
                    .iter()
                    .zip(self.classes.iter())
                    .map(|(&p, &c)| if c == target { p.ln() } else { other * p.ln() })
                    .sum();
                if *w > 0.0 {
                    *w *= (-self.learning_rate * (k - 1.0) / k * agreement).exp();
                }
            }
            normalize(weights);
        }
        Ok(Round::Keep(1.0))
    }

    fn class_index(&self, label: f64) -> Option<usize> {
        self.classes.iter().position(|&c| c == label)
    }

    /// Stump leaf probabilities in `self.classes` order, floored at machine
    /// epsilon so their logs stay finite.
    fn class_proba(&self, stump: &DecisionTree, x: &Array2<f64>) -> Result<Array2<f64>> {
        let raw = stump.predict_proba(x)?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (j, &label) in stump.classes().iter().enumerate() {
            if let Some(k) = self.class_index(label) {
                proba.column_mut(k).assign(&raw.column(j));
            }
        }
        proba.mapv_inplace(|p| p.max(f64::EPSILON));
        Ok(proba)
    }

    fn argmax_labels(&self, scores: &Array2<f64>) -> Array1<f64> {
        scores
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                for (k, &s) in row.iter().enumerate() {
                    if s > row[best] {
                        best = k;
                    }
                }
                self.classes[best]
            })
            .collect()
    }

    /// Add one stump's contribution to the running class scores.
    fn accumulate(
        &self,
        scores: &mut Array2<f64>,
        stump: &DecisionTree,
        alpha: f64,
        x: &Array2<f64>,
    ) -> Result<()> {
        match self.algorithm {
            BoostingAlgorithm::Samme => {
                for (i, &p) in stump.predict(x)?.iter().enumerate() {
                    if let Some(k) = self.class_index(p) {
                        scores[[i, k]] += alpha;
                    }
                }
            }
            BoostingAlgorithm::SammeR => {
                let k = self.classes.len() as f64;
                let log_proba = self.class_proba(stump, x)?.mapv(f64::ln);
                for (mut out, row) in scores.outer_iter_mut().zip(log_proba.outer_iter()) {
                    let mean = row.sum() / k;
                    for (o, &lp) in out.iter_mut().zip(row.iter()) {
                        *o += (k - 1.0) * (lp - mean);
                    }
                }
            }
        }
        Ok(())
    }

    /// Predictions after each kept round: element `m` is the ensemble of the
    /// first `m + 1` stumps.
    pub fn staged_predict(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        if self.stumps.is_empty() {
            return Err(ModelError::NotFitted);
        }
        check_features(self.n_features, x.ncols())?;
        let mut scores = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        let mut stages = Vec::with_capacity(self.stumps.len());

        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            self.accumulate(&mut scores, stump, alpha, x)?;
            stages.push(self.argmax_labels(&scores));
        }
        Ok(stages)
    }

    /// Ensemble prediction of all kept stumps; ties go to the lowest class.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.staged_predict(x)?
            .pop()
            .ok_or(ModelError::NotFitted)
    }

    /// Normalised stump weight per feature.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.stumps.is_empty() {
            return None;
        }
        let mut total = Array1::<f64>::zeros(self.n_features);
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            if let Some(imp) = stump.feature_importances() {
                for (t, &v) in total.iter_mut().zip(imp.iter()) {
                    *t += alpha * v;
                }
            }
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        Some(total)
    }
}

fn weighted_error(incorrect: &[bool], weights: &Array1<f64>) -> f64 {
    let missed: f64 = incorrect
        .iter()
        .zip(weights.iter())
        .filter(|(miss, _)| **miss)
        .map(|(_, w)| w)
        .sum();
    missed / weights.sum()
}

fn normalize(weights: &mut Array1<f64>) {
    let total = weights.sum();
    if total > 0.0 {
        *weights /= total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::metrics::accuracy;
    use ndarray::array;

    fn three_classes() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 9.0], [2.0, 8.0], [3.0, 9.5],
            [4.0, 1.0], [5.0, 2.0], [6.0, 1.5],
            [7.0, 5.0], [8.0, 4.5], [9.0, 5.5],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        (x, y)
    }

    fn stump_accuracy(x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let mut stump = DecisionTree::stump();
        stump.fit(x, y).unwrap();
        accuracy(y, &stump.predict(x).unwrap()).unwrap()
    }

    #[test]
    fn test_multiclass_boosting_beats_a_single_stump() {
        let (x, y) = three_classes();
        let stump_acc = stump_accuracy(&x, &y);
        assert!(stump_acc < 1.0);

        let mut model = AdaBoostClassifier::new(3, 1.0).with_algorithm(BoostingAlgorithm::Samme);
        model.fit(&x, &y).unwrap();
        let acc = accuracy(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(acc > stump_acc, "boosted {acc} vs stump {stump_acc}");
    }

    #[test]
    fn test_real_boosting_beats_a_single_stump() {
        let (x, y) = three_classes();
        let stump_acc = stump_accuracy(&x, &y);

        let mut model = AdaBoostClassifier::new(2, 1.0);
        assert_eq!(model.algorithm, BoostingAlgorithm::SammeR);
        model.fit(&x, &y).unwrap();
        let acc = accuracy(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(acc > stump_acc, "boosted {acc} vs stump {stump_acc}");
        assert!(model.estimator_weights().iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_staged_predict_matches_shorter_fits() {
        let (x, y) = three_classes();
        for algorithm in BoostingAlgorithm::ALL {
            let mut long = AdaBoostClassifier::new(6, 0.5).with_algorithm(algorithm);
            long.fit(&x, &y).unwrap();
            let stages = long.staged_predict(&x).unwrap();
            assert_eq!(stages.len(), long.n_stages());

            for n in 1..=long.n_stages() {
                let mut short = AdaBoostClassifier::new(n, 0.5).with_algorithm(algorithm);
                short.fit(&x, &y).unwrap();
                assert_eq!(short.predict(&x).unwrap(), stages[n - 1], "{algorithm} stage {n}");
            }
        }
    }

    #[test]
    fn test_perfect_stump_stops_early() {
        let x = array![[0.0], [1.0], [5.0], [6.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        for algorithm in BoostingAlgorithm::ALL {
            let mut model = AdaBoostClassifier::new(20, 1.0).with_algorithm(algorithm);
            model.fit(&x, &y).unwrap();
            assert_eq!(model.n_stages(), 1);
            assert_eq!(model.estimator_weights(), &[1.0]);
            assert_eq!(model.predict(&x).unwrap(), y);
        }
    }

    #[test]
    fn test_chance_level_first_stump_is_an_error() {
        // One constant feature and balanced labels: the stump can only guess.
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let mut model = AdaBoostClassifier::new(5, 1.0).with_algorithm(BoostingAlgorithm::Samme);
        let err = model.fit(&x, &y).unwrap_err();
        assert!(matches!(&err, ModelError::TrainingError(msg) if msg.contains("chance")));
    }

    #[test]
    fn test_chance_level_later_stump_ends_boosting() {
        // After one round the lone label-1 sample carries as much weight as
        // the rest, so the next stump cannot beat a coin flip.
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0];
        let mut model = AdaBoostClassifier::new(10, 1.0).with_algorithm(BoostingAlgorithm::Samme);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_stages(), 1);
        assert!(model.n_stages() < model.n_estimators);
        assert_eq!(model.predict(&x).unwrap(), array![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_importances_follow_the_split_feature() {
        let (x, y) = three_classes();
        let mut model = AdaBoostClassifier::new(4, 1.0);
        assert!(model.feature_importances().is_none());
        model.fit(&x, &y).unwrap();
        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.len(), 2);
        assert!((imp.sum() - 1.0).abs() < 1e-12);

        // A feature that never varies is never split on.
        let flat = array![[0.0, 1.0], [0.0, 2.0], [0.0, 5.0], [0.0, 6.0]];
        let mut model = AdaBoostClassifier::new(3, 1.0);
        model.fit(&flat, &array![0.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(model.feature_importances().unwrap().to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_errors() {
        let x = array![[0.0], [1.0]];
        assert!(AdaBoostClassifier::new(5, 1.0).fit(&x, &array![1.0, 1.0]).is_err());
        assert!(AdaBoostClassifier::new(5, 0.0).fit(&x, &array![0.0, 1.0]).is_err());
        assert!(matches!(
            AdaBoostClassifier::default().predict(&x),
            Err(ModelError::NotFitted)
        ));
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(BoostingAlgorithm::SammeR.to_string(), "SAMME.R");
        let parsed: BoostingAlgorithm = serde_json::from_str("\"samme\"").unwrap();
        assert_eq!(parsed, BoostingAlgorithm::Samme);
    }
}
