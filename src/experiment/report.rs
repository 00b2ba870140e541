use std::fmt;

use serde::Serialize;

use super::config::ModelKind;
use crate::analysis::{ClassShare, ColumnSummary, CorrelationMatrix};
use crate::data::model::Frame;
use crate::model::GridSearchResult;

/// Row counts before and after cleaning.
///
/// `*_rows_raw` is the loaded table; rows go first to the sentinel filter and
/// then to the missing-value check (`*_missing_rows`). The null counts are
/// taken between the two steps.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub label: String,
    pub features: Vec<String>,
    pub train_rows_raw: usize,
    pub train_rows: usize,
    pub train_missing_rows: usize,
    pub test_rows_raw: usize,
    pub test_rows: usize,
    pub test_missing_rows: usize,
    pub train_nulls: Vec<(String, usize)>,
    pub test_nulls: Vec<(String, usize)>,
}

impl DatasetSummary {
    /// Rows removed from the training table for any reason.
    pub fn dropped_train(&self) -> usize {
        self.train_rows_raw - self.train_rows
    }

    pub fn dropped_test(&self) -> usize {
        self.test_rows_raw - self.test_rows
    }

    pub fn sentinel_train(&self) -> usize {
        self.dropped_train() - self.train_missing_rows
    }

    pub fn sentinel_test(&self) -> usize {
        self.dropped_test() - self.test_missing_rows
    }
}

/// Validation scores at one hyperparameter value of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub param: usize,
    pub mse: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sweep {
    pub model: ModelKind,
    /// `k` or `n_estimators`.
    pub param_name: String,
    pub points: Vec<SweepPoint>,
}

impl Sweep {
    /// Lowest error; the first such point on ties.
    pub fn best_by_mse(&self) -> Option<&SweepPoint> {
        self.points.iter().fold(None, |best, p| match best {
            Some(b) if b.mse <= p.mse => Some(b),
            _ if p.mse.is_nan() => best,
            _ => Some(p),
        })
    }

    /// Highest accuracy; the first such point on ties.
    pub fn best_by_accuracy(&self) -> Option<&SweepPoint> {
        self.points.iter().fold(None, |best, p| match best {
            Some(b) if b.accuracy >= p.accuracy => Some(b),
            _ if p.accuracy.is_nan() => best,
            _ => Some(p),
        })
    }

    pub fn point(&self, param: usize) -> Option<&SweepPoint> {
        self.points.iter().find(|p| p.param == param)
    }
}

/// A single stump's accuracy, the floor the boosted ensemble must clear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StumpBaseline {
    pub train_accuracy: f64,
    pub validation_accuracy: f64,
}

/// Validation metrics of one chosen model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationScore {
    pub model: ModelKind,
    /// Human-readable hyperparameters, e.g. `k=21`.
    pub setting: String,
    pub mse: f64,
    pub accuracy: f64,
    pub f1_macro: f64,
}

/// Everything one run of the analysis produces.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: DatasetSummary,
    pub describe_train: Vec<ColumnSummary>,
    pub describe_test: Vec<ColumnSummary>,
    pub correlation: CorrelationMatrix,
    pub distribution: Vec<ClassShare>,
    pub knn_sweep: Sweep,
    pub forest_sweep: Sweep,
    pub stump: StumpBaseline,
    pub grid: GridSearchResult,
    /// The grid winner refit on the training split and scored on validation.
    pub grid_best: ValidationScore,
    pub comparison: Vec<ValidationScore>,
    pub final_model: ModelKind,
    /// Forest feature importances, largest first.
    pub importances: Vec<(String, f64)>,
    /// Stump-weighted importances of the compared booster, largest first.
    pub boosting_importances: Vec<(String, f64)>,
    /// The filtered test table with a predicted label column appended.
    pub predictions: Frame,
    pub predicted_distribution: Vec<ClassShare>,
}

impl Report {
    pub fn score(&self, model: ModelKind) -> Option<&ValidationScore> {
        self.comparison.iter().find(|s| s.model == model)
    }
}

fn write_distribution(f: &mut fmt::Formatter<'_>, shares: &[ClassShare]) -> fmt::Result {
    for share in shares {
        writeln!(
            f,
            "  {:<10} {:>6} {:>7.2}%",
            share.class.label(),
            share.count,
            share.percent
        )?;
    }
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "== Data ==")?;
        writeln!(
            f,
            "  train: {} rows ({} dropped for sentinel values, {} for missing values)",
            s.train_rows,
            s.sentinel_train(),
            s.train_missing_rows
        )?;
        writeln!(
            f,
            "  test:  {} rows ({} dropped for sentinel values, {} for missing values)",
            s.test_rows,
            s.sentinel_test(),
            s.test_missing_rows
        )?;
        writeln!(f, "  {} features, label '{}'", s.features.len(), s.label)?;
        let missing: usize = s.train_nulls.iter().chain(&s.test_nulls).map(|(_, n)| n).sum();
        writeln!(f, "  missing cells before the row check: {missing}")?;

        writeln!(f, "\n== Training columns ==")?;
        writeln!(
            f,
            "  {:<14} {:>8} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for c in &self.describe_train {
            writeln!(
                f,
                "  {:<14} {:>8} {:>10.3} {:>10.3} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
                c.name, c.count, c.mean, c.std, c.min, c.q25, c.median, c.q75, c.max
            )?;
        }

        writeln!(f, "\n== Price range distribution (train) ==")?;
        write_distribution(f, &self.distribution)?;

        writeln!(f, "\n== Correlation with {} ==", s.label)?;
        for (name, r) in self.correlation.against(&s.label).iter().take(8) {
            writeln!(f, "  {name:<14} {r:>7.3}")?;
        }

        writeln!(f, "\n== Sweeps (validation) ==")?;
        for sweep in [&self.knn_sweep, &self.forest_sweep] {
            if let (Some(by_mse), Some(by_acc)) = (sweep.best_by_mse(), sweep.best_by_accuracy()) {
                writeln!(
                    f,
                    "  {:<13} lowest mse {:.4} at {}={}, best accuracy {:.4} at {}={}",
                    sweep.model.to_string(),
                    by_mse.mse,
                    sweep.param_name,
                    by_mse.param,
                    by_acc.accuracy,
                    sweep.param_name,
                    by_acc.param
                )?;
            }
        }
        writeln!(
            f,
            "  single stump  train accuracy {:.4}, validation accuracy {:.4}",
            self.stump.train_accuracy, self.stump.validation_accuracy
        )?;
        writeln!(
            f,
            "  grid search   best cv accuracy {:.4} at n_estimators={}, learning_rate={}",
            self.grid.best.mean_score,
            self.grid.best.params.n_estimators,
            self.grid.best.params.learning_rate
        )?;
        writeln!(
            f,
            "  grid winner   validation mse {:.4}, accuracy {:.4}",
            self.grid_best.mse, self.grid_best.accuracy
        )?;

        writeln!(f, "\n== Model comparison (validation) ==")?;
        writeln!(
            f,
            "  {:<13} {:<24} {:>8} {:>9} {:>9}",
            "model", "setting", "mse", "accuracy", "f1_macro"
        )?;
        for score in &self.comparison {
            writeln!(
                f,
                "  {:<13} {:<24} {:>8.4} {:>9.4} {:>9.4}",
                score.model.to_string(),
                score.setting,
                score.mse,
                score.accuracy,
                score.f1_macro
            )?;
        }

        for (title, ranked) in [
            ("Forest", &self.importances),
            ("Boosting", &self.boosting_importances),
        ] {
            if ranked.is_empty() {
                continue;
            }
            writeln!(f, "\n== {title} feature importances ==")?;
            for (name, v) in ranked.iter().take(5) {
                writeln!(f, "  {name:<14} {v:>7.4}")?;
            }
        }

        writeln!(
            f,
            "\n== Test predictions ({}, {} rows) ==",
            self.final_model,
            self.predictions.len()
        )?;
        write_distribution(f, &self.predicted_distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(points: &[(usize, f64, f64)]) -> Sweep {
        Sweep {
            model: ModelKind::Knn,
            param_name: "k".to_string(),
            points: points
                .iter()
                .map(|&(param, mse, accuracy)| SweepPoint { param, mse, accuracy })
                .collect(),
        }
    }

    #[test]
    fn test_best_points_take_the_first_tie() {
        let s = sweep(&[(1, 0.5, 0.6), (2, 0.3, 0.8), (3, 0.3, 0.8), (4, 0.4, 0.7)]);
        assert_eq!(s.best_by_mse().unwrap().param, 2);
        assert_eq!(s.best_by_accuracy().unwrap().param, 2);
        assert_eq!(s.point(4).unwrap().mse, 0.4);
        assert!(s.point(9).is_none());
    }

    #[test]
    fn test_nan_points_never_win() {
        let s = sweep(&[(1, f64::NAN, f64::NAN), (2, 0.9, 0.1)]);
        assert_eq!(s.best_by_mse().unwrap().param, 2);
        assert_eq!(s.best_by_accuracy().unwrap().param, 2);
        assert!(sweep(&[]).best_by_mse().is_none());
    }
}
