use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, Axis};

use super::config::{ExperimentConfig, ModelKind};
use super::report::{DatasetSummary, Report, StumpBaseline, Sweep, SweepPoint, ValidationScore};
use crate::analysis::{CorrelationMatrix, class_distribution, describe};
use crate::data::filter::{SentinelFilter, drop_missing, null_counts};
use crate::data::loader::{load_dataset, write_csv};
use crate::data::model::{Frame, PriceRange, label_columns};
use crate::model::metrics::{accuracy, f1_macro, mean_squared_error, round_to_class};
use crate::model::selection::{grid_search_adaboost, train_test_split};
use crate::model::{
    AdaBoostClassifier, BoostingParams, DecisionTree, KnnRegressor, RandomForestRegressor, Scaler,
};

/// Load the tables named by `config.data_dir` and run the full analysis.
pub fn run(config: &ExperimentConfig) -> Result<Report> {
    config.validate()?;
    let dataset = load_dataset(&config.data_dir, config.drop_test_index)?;
    run_on(&dataset.train, &dataset.test, config)
}

/// Run the analysis on already-loaded tables.
pub fn run_on(train: &Frame, test: &Frame, config: &ExperimentConfig) -> Result<Report> {
    config.validate()?;

    // -- Label and feature columns ------------------------------------------
    let train_only = label_columns(train, test);
    if !train_only.contains(&config.label) {
        bail!(
            "label column '{}' must appear in the training table only (train-only columns: {:?})",
            config.label,
            train_only
        );
    }
    if train_only.len() > 1 {
        bail!("test table lacks feature columns: {train_only:?}");
    }
    let features: Vec<String> = train
        .columns
        .iter()
        .filter(|c| **c != config.label)
        .cloned()
        .collect();
    if features.is_empty() {
        bail!("training table has no feature columns");
    }

    // -- Cleaning -----------------------------------------------------------
    let filter = SentinelFilter::new(config.sentinel_columns.clone());
    let cleaned_train = filter.apply(train).context("filtering training table")?;
    let cleaned_test = filter.apply(test).context("filtering test table")?;
    info!(
        "Sentinel filter dropped {} training and {} test rows",
        cleaned_train.dropped, cleaned_test.dropped
    );
    let train_nulls = null_counts(&cleaned_train.frame);
    let test_nulls = null_counts(&cleaned_test.frame);
    for (name, n) in train_nulls.iter().chain(&test_nulls) {
        if *n > 0 {
            warn!("column '{name}' has {n} missing cells");
        }
    }

    let mut required = features.clone();
    required.push(config.label.clone());
    let complete_train =
        drop_missing(&cleaned_train.frame, &required).context("checking training table")?;
    let complete_test =
        drop_missing(&cleaned_test.frame, &features).context("checking test table")?;
    if complete_train.dropped + complete_test.dropped > 0 {
        warn!(
            "Dropped {} training and {} test rows with missing values",
            complete_train.dropped, complete_test.dropped
        );
    }
    let train = complete_train.frame;
    let test = complete_test.frame;

    let summary = DatasetSummary {
        label: config.label.clone(),
        features: features.clone(),
        train_rows_raw: train.len() + cleaned_train.dropped + complete_train.dropped,
        train_rows: train.len(),
        train_missing_rows: complete_train.dropped,
        test_rows_raw: test.len() + cleaned_test.dropped + complete_test.dropped,
        test_rows: test.len(),
        test_missing_rows: complete_test.dropped,
        train_nulls,
        test_nulls,
    };

    let y_all: Array1<f64> = train
        .column(&config.label)
        .context("label column vanished")?
        .to_owned();
    let labels = y_all
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            PriceRange::from_value(v)
                .with_context(|| format!("row {i}: '{v}' is not a price range code"))
        })
        .collect::<Result<Vec<_>>>()?;

    // -- Exploration --------------------------------------------------------
    info!("Describing {} training and {} test rows", train.len(), test.len());
    let describe_train = describe(&train);
    let describe_test = describe(&test);
    let correlation = CorrelationMatrix::pearson(&train);
    for pair in correlation.notable_pairs(0.5) {
        debug!("correlated: {} ~ {} r={:.3}", pair.a, pair.b, pair.r);
    }
    let distribution = class_distribution(&labels);

    // -- Feature matrices ---------------------------------------------------
    let mut scaler = Scaler::new(config.scaling);
    let x_all = scaler.fit_transform(&train.select_columns(&features)?.values)?;
    let x_test = scaler.transform(&test.select_columns(&features)?.values)?;

    let split = train_test_split(x_all.nrows(), config.test_size, config.split_seed)?;
    let x_train = x_all.select(Axis(0), &split.train);
    let y_train = y_all.select(Axis(0), &split.train);
    let x_val = x_all.select(Axis(0), &split.validation);
    let y_val = y_all.select(Axis(0), &split.validation);
    info!(
        "Split {} rows into {} train / {} validation (seed {})",
        x_all.nrows(),
        x_train.nrows(),
        x_val.nrows(),
        config.split_seed
    );

    // -- KNN ----------------------------------------------------------------
    let mut knn_base = KnnRegressor::default();
    knn_base.fit(&x_train, &y_train)?;
    let knn_preds = knn_base.predict_sweep(&x_val, &config.knn_k_values)?;
    let knn_sweep = sweep(ModelKind::Knn, "k", &config.knn_k_values, &knn_preds, &y_val)?;

    let knn_k = match config.knn_k {
        Some(k) => k,
        None => best_param(&knn_sweep)?,
    };
    let mut knn = KnnRegressor::with_k(knn_k);
    knn.fit(&x_train, &y_train)?;
    let knn_score = score(ModelKind::Knn, format!("k={knn_k}"), &y_val, &knn.predict(&x_val)?)?;

    // -- Random forest ------------------------------------------------------
    let largest = config.forest_sizes.iter().copied().max().unwrap_or(1);
    let forest_size = config.forest_size.unwrap_or(largest);
    let mut forest = RandomForestRegressor::new(largest.max(forest_size))
        .with_max_depth(config.forest_max_depth)
        .with_random_state(config.forest_seed);
    info!("Fitting {} regression trees", forest.n_estimators);
    forest.fit(&x_train, &y_train)?;
    let forest_preds = forest.staged_predict(&x_val, &config.forest_sizes)?;
    let forest_sweep = sweep(
        ModelKind::RandomForest,
        "n_estimators",
        &config.forest_sizes,
        &forest_preds,
        &y_val,
    )?;

    let forest_size = match config.forest_size {
        Some(n) => n,
        None => best_param(&forest_sweep)?,
    };
    // Trees are seeded in sequence, so the first `n` trees of the big forest
    // are the forest of size `n`.
    let forest_val = forest
        .staged_predict(&x_val, &[forest_size])?
        .pop()
        .context("forest produced no predictions")?;
    let forest_score = score(
        ModelKind::RandomForest,
        format!("n_estimators={forest_size}"),
        &y_val,
        &forest_val,
    )?;
    let importances = ranked_importances(&features, forest.feature_importances());

    // -- Boosting -----------------------------------------------------------
    let mut stump = DecisionTree::stump();
    stump.fit(&x_train, &y_train)?;
    let stump_baseline = StumpBaseline {
        train_accuracy: accuracy(&y_train, &stump.predict(&x_train)?)?,
        validation_accuracy: accuracy(&y_val, &stump.predict(&x_val)?)?,
    };
    info!(
        "Single stump: train accuracy {:.4}, validation accuracy {:.4}",
        stump_baseline.train_accuracy, stump_baseline.validation_accuracy
    );

    info!(
        "Grid search over {} {} settings with {}-fold CV",
        config.boosting_grid.len(),
        config.boosting_algorithm,
        config.cv_folds
    );
    let grid = grid_search_adaboost(
        &x_train,
        &y_train,
        &config.boosting_grid,
        config.boosting_algorithm,
        config.cv_folds,
    )?;
    info!(
        "Best CV accuracy {:.4} at n_estimators={}, learning_rate={}",
        grid.best.mean_score, grid.best.params.n_estimators, grid.best.params.learning_rate
    );

    // The grid winner refit on the whole training split.
    let grid_booster = fit_booster(grid.best.params, config, &x_train, &y_train)?;
    let grid_best = score(
        ModelKind::Boosting,
        boosting_setting(grid.best.params),
        &y_val,
        &grid_booster.predict(&x_val)?,
    )?;
    info!(
        "Grid winner on validation: mse {:.4}, accuracy {:.4}",
        grid_best.mse, grid_best.accuracy
    );

    let (booster, boosting_score) = match config.boosting {
        Some(params) => {
            let booster = fit_booster(params, config, &x_train, &y_train)?;
            let s = score(
                ModelKind::Boosting,
                boosting_setting(params),
                &y_val,
                &booster.predict(&x_val)?,
            )?;
            (booster, s)
        }
        None => (grid_booster, grid_best.clone()),
    };
    let boosting_importances = ranked_importances(&features, booster.feature_importances());

    let comparison = vec![knn_score, forest_score, boosting_score];
    for s in &comparison {
        info!(
            "{} ({}): mse {:.4}, accuracy {:.4}, f1 {:.4}",
            s.model, s.setting, s.mse, s.accuracy, s.f1_macro
        );
    }

    // -- Test predictions ---------------------------------------------------
    let final_model = config
        .final_model
        .unwrap_or_else(|| most_accurate(&comparison));
    let raw = match final_model {
        ModelKind::Knn => knn.predict(&x_test)?,
        ModelKind::RandomForest => forest
            .staged_predict(&x_test, &[forest_size])?
            .pop()
            .context("forest produced no predictions")?,
        ModelKind::Boosting => booster.predict(&x_test)?,
    };
    let predicted = round_to_class(&raw).mapv(|v| v.clamp(0.0, 3.0));
    let predicted_labels: Vec<PriceRange> = predicted
        .iter()
        .filter_map(|&v| PriceRange::from_value(v))
        .collect();
    let predicted_distribution = class_distribution(&predicted_labels);
    let predictions = test.with_column(&config.label, &predicted)?;
    info!("Predicted {} test rows with {}", predictions.len(), final_model);

    if let Some(path) = &config.predictions_path {
        write_csv(&predictions, path)?;
        info!("Wrote predictions to {}", path.display());
    }

    Ok(Report {
        summary,
        describe_train,
        describe_test,
        correlation,
        distribution,
        knn_sweep,
        forest_sweep,
        stump: stump_baseline,
        grid,
        grid_best,
        comparison,
        final_model,
        importances,
        boosting_importances,
        predictions,
        predicted_distribution,
    })
}

/// Score rounded predictions at each swept value.
fn sweep(
    model: ModelKind,
    param_name: &str,
    params: &[usize],
    predictions: &[Array1<f64>],
    y_val: &Array1<f64>,
) -> Result<Sweep> {
    let points = params
        .iter()
        .zip(predictions)
        .map(|(&param, pred)| -> Result<SweepPoint> {
            let rounded = round_to_class(pred);
            let point = SweepPoint {
                param,
                mse: mean_squared_error(y_val, &rounded)?,
                accuracy: accuracy(y_val, &rounded)?,
            };
            debug!(
                "{model} {param_name}={param}: mse {:.4}, accuracy {:.4}",
                point.mse, point.accuracy
            );
            Ok(point)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Sweep {
        model,
        param_name: param_name.to_string(),
        points,
    })
}

fn fit_booster(
    params: BoostingParams,
    config: &ExperimentConfig,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<AdaBoostClassifier> {
    let mut booster = AdaBoostClassifier::new(params.n_estimators, params.learning_rate)
        .with_algorithm(config.boosting_algorithm);
    booster.fit(x, y)?;
    Ok(booster)
}

fn boosting_setting(params: BoostingParams) -> String {
    format!("n_estimators={}, lr={}", params.n_estimators, params.learning_rate)
}

fn best_param(sweep: &Sweep) -> Result<usize> {
    sweep
        .best_by_accuracy()
        .map(|p| p.param)
        .with_context(|| format!("{} sweep has no usable point", sweep.model))
}

fn score(
    model: ModelKind,
    setting: String,
    y_val: &Array1<f64>,
    raw: &Array1<f64>,
) -> Result<ValidationScore> {
    let rounded = round_to_class(raw);
    Ok(ValidationScore {
        model,
        setting,
        mse: mean_squared_error(y_val, &rounded)?,
        accuracy: accuracy(y_val, &rounded)?,
        f1_macro: f1_macro(y_val, &rounded)?,
    })
}

/// Highest accuracy, then lowest error; earlier models win exact ties.
fn most_accurate(scores: &[ValidationScore]) -> ModelKind {
    scores
        .iter()
        .fold(None::<&ValidationScore>, |best, s| match best {
            Some(b) if b.accuracy > s.accuracy => Some(b),
            Some(b) if b.accuracy == s.accuracy && b.mse <= s.mse => Some(b),
            _ => Some(s),
        })
        .map_or(ModelKind::Knn, |s| s.model)
}

fn ranked_importances(features: &[String], importances: Option<Array1<f64>>) -> Vec<(String, f64)> {
    let Some(importances) = importances else {
        return Vec::new();
    };
    let mut ranked: Vec<(String, f64)> = features.iter().cloned().zip(importances.iter().copied()).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_of(model: ModelKind, mse: f64, accuracy: f64) -> ValidationScore {
        ValidationScore {
            model,
            setting: String::new(),
            mse,
            accuracy,
            f1_macro: 0.0,
        }
    }

    #[test]
    fn test_most_accurate_breaks_ties_on_mse() {
        let scores = vec![
            score_of(ModelKind::Knn, 0.3, 0.8),
            score_of(ModelKind::RandomForest, 0.2, 0.8),
            score_of(ModelKind::Boosting, 0.1, 0.7),
        ];
        assert_eq!(most_accurate(&scores), ModelKind::RandomForest);
    }

    #[test]
    fn test_ranked_importances() {
        let features = vec!["a".to_string(), "b".to_string()];
        let ranked = ranked_importances(&features, Some(Array1::from(vec![0.25, 0.75])));
        assert_eq!(ranked[0], ("b".to_string(), 0.75));
        assert!(ranked_importances(&features, None).is_empty());
    }
}
