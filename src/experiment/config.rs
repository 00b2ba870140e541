use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::model::{BoostingAlgorithm, BoostingGrid, BoostingParams, ScalerKind};

/// The three compared estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Knn,
    RandomForest,
    Boosting,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Knn, ModelKind::RandomForest, ModelKind::Boosting];
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelKind::Knn => "KNN",
            ModelKind::RandomForest => "RandomForest",
            ModelKind::Boosting => "Boosting",
        })
    }
}

/// Every knob of the analysis. Missing JSON fields take the defaults below.
///
/// A `None` chosen hyperparameter (`knn_k`, `forest_size`, `boosting`) means
/// "use the best point of the sweep or grid".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory holding `train.*` and `test.*`.
    pub data_dir: PathBuf,
    /// Target column, present in train only.
    pub label: String,
    /// Columns in which a zero means "not recorded".
    pub sentinel_columns: Vec<String>,
    /// Drop the test table's leading `id` column.
    pub drop_test_index: bool,
    pub scaling: ScalerKind,

    pub test_size: f64,
    pub split_seed: u64,

    pub knn_k_values: Vec<usize>,
    pub knn_k: Option<usize>,

    pub forest_sizes: Vec<usize>,
    pub forest_max_depth: usize,
    pub forest_seed: u64,
    pub forest_size: Option<usize>,

    pub boosting_algorithm: BoostingAlgorithm,
    pub boosting_grid: BoostingGrid,
    pub cv_folds: usize,
    pub boosting: Option<BoostingParams>,

    /// Model used for the test predictions; `None` picks the best validation accuracy.
    pub final_model: Option<ModelKind>,
    /// Where to write the test table with predicted price ranges.
    pub predictions_path: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            label: "price_range".to_string(),
            sentinel_columns: vec!["px_height".to_string(), "sc_w".to_string()],
            drop_test_index: true,
            scaling: ScalerKind::None,
            test_size: 0.3,
            split_seed: 51,
            knn_k_values: (1..40).collect(),
            knn_k: Some(21),
            forest_sizes: (25..1000).step_by(25).collect(),
            forest_max_depth: 8,
            forest_seed: 55,
            forest_size: Some(100),
            boosting_algorithm: BoostingAlgorithm::SammeR,
            boosting_grid: BoostingGrid::default(),
            cv_folds: 5,
            boosting: Some(BoostingParams {
                n_estimators: 7,
                learning_rate: 0.05,
            }),
            final_model: None,
            predictions_path: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ExperimentConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            bail!("test_size must be in (0, 1), got {}", self.test_size);
        }
        if self.knn_k_values.is_empty() || self.knn_k_values.contains(&0) {
            bail!("knn_k_values must be non-empty and positive");
        }
        if self.forest_sizes.is_empty() || self.forest_sizes.contains(&0) {
            bail!("forest_sizes must be non-empty and positive");
        }
        if self.forest_max_depth == 0 {
            bail!("forest_max_depth must be at least 1");
        }
        if self.boosting_grid.is_empty() || self.boosting_grid.n_estimators.contains(&0) {
            bail!("boosting_grid needs positive estimator counts and at least one learning rate");
        }
        if self.boosting_grid.learning_rates.iter().any(|&lr| !(lr > 0.0)) {
            bail!("boosting_grid learning rates must be positive");
        }
        if self.cv_folds < 2 {
            bail!("cv_folds must be at least 2, got {}", self.cv_folds);
        }
        if self.knn_k == Some(0) || self.forest_size == Some(0) {
            bail!("chosen k and forest size must be positive");
        }
        if let Some(p) = self.boosting {
            if p.n_estimators == 0 || !(p.learning_rate > 0.0) {
                bail!("boosting needs n_estimators >= 1 and a positive learning rate");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_the_notebook_sweeps() {
        let c = ExperimentConfig::default();
        assert_eq!(c.knn_k_values.len(), 39);
        assert_eq!(c.forest_sizes.first(), Some(&25));
        assert_eq!(c.forest_sizes.last(), Some(&975));
        assert_eq!(c.boosting_grid.len(), 49 * 6);
        assert_eq!(c.boosting_algorithm, BoostingAlgorithm::SammeR);
        c.validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "data_dir": "phones", "knn_k": null, "scaling": "min_max", "final_model": "knn",
                 "boosting_algorithm": "samme" }"#,
        )
        .unwrap();
        let c = ExperimentConfig::from_json_file(&path).unwrap();
        assert_eq!(c.data_dir, PathBuf::from("phones"));
        assert_eq!(c.knn_k, None);
        assert_eq!(c.scaling, ScalerKind::MinMax);
        assert_eq!(c.final_model, Some(ModelKind::Knn));
        assert_eq!(c.boosting_algorithm, BoostingAlgorithm::Samme);
        assert_eq!(c.split_seed, 51);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut c = ExperimentConfig::default();
        c.test_size = 1.0;
        assert!(c.validate().is_err());

        let mut c = ExperimentConfig::default();
        c.cv_folds = 1;
        assert!(c.validate().is_err());

        let mut c = ExperimentConfig::default();
        c.knn_k_values.push(0);
        assert!(c.validate().is_err());
    }
}
