//! Estimators, metrics and model selection.
//!
//! - [`knn`] - nearest-neighbour regression with a one-search `k` sweep
//! - [`tree`] - CART trees (Gini / MSE) with sample weights
//! - [`forest`] - bagged regression trees with staged predictions
//! - [`boosting`] - SAMME / SAMME.R AdaBoost over stumps with staged predictions
//! - [`selection`] - train/validation split, stratified folds, grid search
//! - [`metrics`] - MSE, accuracy, macro F1, confusion matrix
//! - [`scaler`] - min-max / standard feature scaling

pub mod boosting;
pub mod error;
pub mod forest;
pub mod knn;
pub mod metrics;
pub mod scaler;
pub mod selection;
pub mod tree;

pub use boosting::{AdaBoostClassifier, BoostingAlgorithm};
pub use error::{ModelError, Result};
pub use forest::RandomForestRegressor;
pub use knn::KnnRegressor;
pub use scaler::{Scaler, ScalerKind};
pub use selection::{BoostingGrid, BoostingParams, GridSearchResult, Split};
pub use tree::{Criterion, DecisionTree};
