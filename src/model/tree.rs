//! CART decision tree for classification (Gini) and regression (MSE).
//!
//! Splits are found with one sorted sweep per feature; thresholds sit halfway
//! between consecutive distinct values. Sample weights are supported so the
//! same tree serves as the boosting base learner, and a tree can be grown on an
//! index multiset so the forest can pass bootstrap samples without copying rows.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{ModelError, Result, check_features, check_xy};

/// Nodes with fewer samples scan features sequentially.
const PARALLEL_MIN_SAMPLES: usize = 256;
const MIN_GAIN: f64 = 1e-12;

/// Impurity criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    Mse,
}

/// Terminal node: the prediction and, for classifiers, the weighted class
/// distribution of its training samples (in `DecisionTree::classes` order).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Leaf {
    value: f64,
    proba: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf(Leaf),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn leaf(&self, sample: ArrayView1<'_, f64>) -> &Leaf {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(leaf) => return leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Weighted target statistics of a set of samples.
#[derive(Debug, Clone)]
struct NodeStats {
    weight: f64,
    class_weights: Vec<f64>,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn empty(n_classes: usize) -> Self {
        Self {
            weight: 0.0,
            class_weights: vec![0.0; n_classes],
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add(&mut self, target: f64, w: f64) {
        self.weight += w;
        self.sum += w * target;
        self.sq_sum += w * target * target;
        if let Some(slot) = self.class_weights.get_mut(target as usize) {
            *slot += w;
        }
    }

    fn remove(&mut self, target: f64, w: f64) {
        self.weight -= w;
        self.sum -= w * target;
        self.sq_sum -= w * target * target;
        if let Some(slot) = self.class_weights.get_mut(target as usize) {
            *slot -= w;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        match criterion {
            Criterion::Gini => {
                let sum_sq: f64 = self
                    .class_weights
                    .iter()
                    .map(|&c| (c / self.weight).powi(2))
                    .sum();
                (1.0 - sum_sq).max(0.0)
            }
            Criterion::Mse => {
                let mean = self.sum / self.weight;
                (self.sq_sum / self.weight - mean * mean).max(0.0)
            }
        }
    }

    /// Index of the heaviest class; ties go to the lowest index.
    fn majority(&self) -> usize {
        let mut best = 0;
        for (i, &w) in self.class_weights.iter().enumerate() {
            if w > self.class_weights[best] {
                best = i;
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Borrowed training inputs shared by the recursive builder.
struct Training<'a> {
    x: &'a Array2<f64>,
    /// Encoded targets: class index for Gini, raw value for MSE.
    targets: Vec<f64>,
    weights: Vec<f64>,
    n_classes: usize,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    root: Option<Node>,
    classes: Vec<f64>,
    n_features: usize,
    importances: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::classifier()
    }
}

impl DecisionTree {
    fn with_criterion(criterion: Criterion) -> Self {
        Self {
            criterion,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            root: None,
            classes: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
        }
    }

    pub fn classifier() -> Self {
        Self::with_criterion(Criterion::Gini)
    }

    pub fn regressor() -> Self {
        Self::with_criterion(Criterion::Mse)
    }

    /// Depth-1 Gini classifier: the weak learner used for boosting.
    pub fn stump() -> Self {
        Self::classifier().with_max_depth(1)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    /// Sorted class labels seen during fitting (empty for regression).
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Depth of the fitted tree (0 for a single leaf).
    pub fn depth(&self) -> Option<usize> {
        self.root.as_ref().map(Node::depth)
    }

    /// Fit with unit sample weights.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x.nrows(), y.len())?;
        self.fit_samples(x, y, None, (0..x.nrows()).collect())
    }

    /// Fit with per-sample weights (non-negative, positive total).
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &Array1<f64>,
    ) -> Result<&mut Self> {
        check_xy(x.nrows(), y.len())?;
        self.fit_samples(x, y, Some(weights), (0..x.nrows()).collect())
    }

    /// Fit on the rows named by `indices`; repeated indices count repeatedly.
    pub(crate) fn fit_samples(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: Option<&Array1<f64>>,
        indices: Vec<usize>,
    ) -> Result<&mut Self> {
        check_xy(x.nrows(), y.len())?;
        if indices.is_empty() {
            return Err(ModelError::EmptyInput("no samples to grow a tree on".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::invalid(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }

        let weights: Vec<f64> = match weights {
            Some(w) => {
                if w.len() != y.len() {
                    return Err(ModelError::ShapeError {
                        expected: format!("{} sample weights", y.len()),
                        actual: format!("{} sample weights", w.len()),
                    });
                }
                if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(ModelError::invalid(
                        "sample_weight",
                        "negative or non-finite",
                        "weights must be finite and >= 0",
                    ));
                }
                w.to_vec()
            }
            None => vec![1.0; y.len()],
        };

        let (targets, n_classes) = match self.criterion {
            Criterion::Gini => {
                let mut classes: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
                classes.sort_by(|a, b| a.total_cmp(b));
                classes.dedup();
                let encoded = y
                    .iter()
                    .map(|v| {
                        classes
                            .binary_search_by(|c| c.total_cmp(v))
                            .map(|pos| pos as f64)
                            .unwrap_or(f64::NAN)
                    })
                    .collect();
                let k = classes.len();
                self.classes = classes;
                (encoded, k)
            }
            Criterion::Mse => {
                self.classes.clear();
                (y.to_vec(), 0)
            }
        };

        let data = Training {
            x,
            targets,
            weights,
            n_classes,
        };

        let total_weight: f64 = indices.iter().map(|&i| data.weights[i]).sum();
        if total_weight <= 0.0 {
            return Err(ModelError::TrainingError("sample weights sum to zero".to_string()));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; x.ncols()];
        let root = self.build(&data, indices, 0, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.importances = importances;
        self.root = Some(root);
        Ok(self)
    }

    fn node_stats(&self, data: &Training<'_>, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::empty(data.n_classes);
        for &i in indices {
            stats.add(data.targets[i], data.weights[i]);
        }
        stats
    }

    fn make_leaf(&self, stats: &NodeStats) -> Node {
        let leaf = match self.criterion {
            Criterion::Gini => Leaf {
                value: self.classes.get(stats.majority()).copied().unwrap_or(0.0),
                proba: stats
                    .class_weights
                    .iter()
                    .map(|&w| if stats.weight > 0.0 { w / stats.weight } else { 0.0 })
                    .collect(),
            },
            Criterion::Mse => Leaf {
                value: stats.sum / stats.weight,
                proba: Vec::new(),
            },
        };
        Node::Leaf(leaf)
    }

    fn build(
        &self,
        data: &Training<'_>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
    ) -> Node {
        let stats = self.node_stats(data, &indices);
        let impurity = stats.impurity(self.criterion);
        let n = indices.len();

        let should_stop = n < self.min_samples_split
            || n < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || impurity <= MIN_GAIN
            || stats.weight <= 0.0;
        if should_stop {
            return self.make_leaf(&stats);
        }

        let Some(best) = self.best_split(data, &indices, &stats) else {
            return self.make_leaf(&stats);
        };

        importances[best.feature] += best.gain;

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data.x[[i, best.feature]] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(data, left, depth + 1, importances)),
            right: Box::new(self.build(data, right, depth + 1, importances)),
        }
    }

    fn best_split(
        &self,
        data: &Training<'_>,
        indices: &[usize],
        parent: &NodeStats,
    ) -> Option<SplitCandidate> {
        let n_features = data.x.ncols();
        let scan = |feature: usize| self.scan_feature(data, indices, parent, feature);

        let candidates: Vec<Option<SplitCandidate>> = if indices.len() >= PARALLEL_MIN_SAMPLES {
            (0..n_features).into_par_iter().map(scan).collect()
        } else {
            (0..n_features).map(scan).collect()
        };

        // Strictly-greater keeps the lowest feature index on ties.
        candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, c| match best {
                Some(b) if b.gain >= c.gain => Some(b),
                _ => Some(c),
            })
    }

    fn scan_feature(
        &self,
        data: &Training<'_>,
        indices: &[usize],
        parent: &NodeStats,
        feature: usize,
    ) -> Option<SplitCandidate> {
        let x = data.x;
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let n = order.len();
        let parent_cost = parent.weight * parent.impurity(self.criterion);
        let mut left = NodeStats::empty(data.n_classes);
        let mut right = parent.clone();
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n - 1 {
            let i = order[pos];
            left.add(data.targets[i], data.weights[i]);
            right.remove(data.targets[i], data.weights[i]);

            let value = x[[i, feature]];
            let next = x[[order[pos + 1], feature]];
            if next <= value {
                continue;
            }
            let n_left = pos + 1;
            if n_left < self.min_samples_leaf || n - n_left < self.min_samples_leaf {
                continue;
            }
            if left.weight <= 0.0 || right.weight <= 0.0 {
                continue;
            }

            let gain = parent_cost
                - left.weight * left.impurity(self.criterion)
                - right.weight * right.impurity(self.criterion);
            if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: value + (next - value) / 2.0,
                    gain,
                });
            }
        }
        best
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        check_features(self.n_features, x.ncols())?;
        Ok(x.outer_iter().map(|row| root.leaf(row).value).collect())
    }

    /// Weighted class distribution of the leaf each row lands in, one column
    /// per entry of [`classes`](Self::classes). Classification trees only.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        if self.criterion != Criterion::Gini {
            return Err(ModelError::invalid(
                "criterion",
                "Mse",
                "class probabilities need a classification tree",
            ));
        }
        check_features(self.n_features, x.ncols())?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (mut out, row) in proba.outer_iter_mut().zip(x.outer_iter()) {
            for (o, &p) in out.iter_mut().zip(root.leaf(row).proba.iter()) {
                *o = p;
            }
        }
        Ok(proba)
    }

    /// Normalised total impurity decrease contributed by each feature.
    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.root.as_ref().map(|_| self.importances.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_classes() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [7.0, 5.0], [8.0, 5.0], [9.0, 5.0]];
        let y = array![0.0, 0.0, 0.0, 3.0, 3.0, 3.0];
        let mut tree = DecisionTree::classifier();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), Some(1));
        assert_eq!(tree.classes(), &[0.0, 3.0]);
        assert_eq!(tree.feature_importances().unwrap(), &[1.0, 0.0]);
        assert_eq!(tree.predict(&array![[5.1, 0.0]]).unwrap()[0], 3.0);
    }

    #[test]
    fn test_regressor_leaf_means() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let y = array![1.0, 3.0, 10.0, 12.0];
        let mut tree = DecisionTree::regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[0.5], [10.5]]).unwrap(), array![2.0, 11.0]);
    }

    #[test]
    fn test_weights_change_the_stump() {
        // Unweighted, label 1 wins the right-hand leaf; heavy weight on the
        // lone label-2 sample flips it.
        let x = array![[0.0], [1.0], [2.0], [2.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0];
        let mut stump = DecisionTree::stump();
        stump.fit(&x, &y).unwrap();
        assert_eq!(stump.predict(&array![[2.0]]).unwrap()[0], 1.0);

        let w = array![1.0, 1.0, 1.0, 1.0, 5.0];
        stump.fit_weighted(&x, &y, &w).unwrap();
        assert_eq!(stump.predict(&array![[2.0]]).unwrap()[0], 2.0);
    }

    #[test]
    fn test_stump_leaves_carry_weighted_class_shares() {
        let x = array![[0.0], [0.0], [0.0], [5.0], [5.0]];
        let y = array![0.0, 0.0, 1.0, 2.0, 2.0];
        let mut stump = DecisionTree::stump();
        stump.fit_weighted(&x, &y, &array![1.0, 1.0, 2.0, 1.0, 1.0]).unwrap();

        let proba = stump.predict_proba(&array![[0.0], [9.0]]).unwrap();
        assert_eq!(proba.row(0).to_vec(), vec![0.5, 0.5, 0.0]);
        assert_eq!(proba.row(1).to_vec(), vec![0.0, 0.0, 1.0]);
        assert!(proba.outer_iter().all(|r| (r.sum() - 1.0).abs() < 1e-12));

        let mut reg = DecisionTree::regressor();
        reg.fit(&x, &y).unwrap();
        assert!(reg.predict_proba(&x).is_err());
    }

    #[test]
    fn test_bootstrap_indices_repeat_rows() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 4.0];
        let mut tree = DecisionTree::regressor().with_max_depth(0);
        tree.fit_samples(&x, &y, None, vec![1, 1, 1, 0]).unwrap();
        assert_eq!(tree.predict(&array![[0.0]]).unwrap()[0], 3.0);
    }

    #[test]
    fn test_errors() {
        let tree = DecisionTree::classifier();
        assert_eq!(tree.predict(&array![[1.0]]), Err(ModelError::NotFitted));

        let mut tree = DecisionTree::classifier();
        assert!(tree.fit(&array![[1.0], [2.0]], &array![0.0]).is_err());
        tree.fit(&array![[1.0], [2.0]], &array![0.0, 1.0]).unwrap();
        assert!(tree.predict(&array![[1.0, 2.0]]).is_err());

        let negative = array![1.0, -1.0];
        assert!(tree.fit_weighted(&array![[1.0], [2.0]], &array![0.0, 1.0], &negative).is_err());
    }
}
