//! Validation metrics for price-range predictions.

use ndarray::{Array1, Array2};

use super::error::{ModelError, Result};

fn check_same_len(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(ModelError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(ModelError::EmptyInput("no predictions to score".to_string()));
    }
    Ok(())
}

/// Round regression output to class codes, halves to even.
pub fn round_to_class(predictions: &Array1<f64>) -> Array1<f64> {
    predictions.mapv(f64::round_ties_even)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_same_len(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Fraction of exact matches.
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_same_len(y_true, y_pred)?;
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

fn labels_of(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Vec<f64> {
    let mut labels: Vec<f64> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_by(|a, b| a.total_cmp(b));
    labels.dedup();
    labels
}

/// Confusion matrix over the sorted union of true and predicted labels.
/// Rows are true labels, columns predictions.
pub fn confusion_matrix(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<(Vec<f64>, Array2<usize>)> {
    check_same_len(y_true, y_pred)?;
    let labels = labels_of(y_true, y_pred);
    let position = |v: f64| labels.iter().position(|&l| l == v).unwrap_or(0);

    let mut matrix = Array2::zeros((labels.len(), labels.len()));
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        matrix[[position(t), position(p)]] += 1;
    }
    Ok((labels, matrix))
}

/// Unweighted mean of per-class F1 over every label seen in either vector.
/// A class with no true or predicted members scores 0.
pub fn f1_macro(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    let (labels, cm) = confusion_matrix(y_true, y_pred)?;
    let k = labels.len();
    let total: f64 = (0..k)
        .map(|c| {
            let tp = cm[[c, c]] as f64;
            let predicted: usize = cm.column(c).sum();
            let actual: usize = cm.row(c).sum();
            let denom = (predicted + actual) as f64;
            if denom == 0.0 { 0.0 } else { 2.0 * tp / denom }
        })
        .sum();
    Ok(total / k as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_round_half_to_even() {
        let rounded = round_to_class(&array![0.5, 1.5, 2.5, 2.4, 2.6]);
        assert_eq!(rounded, array![0.0, 2.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mse_and_accuracy() {
        let y = array![0.0, 1.0, 2.0, 3.0];
        let p = array![0.0, 2.0, 2.0, 1.0];
        assert_eq!(mean_squared_error(&y, &p).unwrap(), 1.25);
        assert_eq!(accuracy(&y, &p).unwrap(), 0.5);
        assert!(accuracy(&y, &array![0.0]).is_err());
        assert!(accuracy(&Array1::zeros(0), &Array1::zeros(0)).is_err());
    }

    #[test]
    fn test_confusion_and_f1() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.0, 1.0, 1.0, 1.0];
        let (labels, cm) = confusion_matrix(&y, &p).unwrap();
        assert_eq!(labels, vec![0.0, 1.0]);
        assert_eq!(cm, array![[1usize, 1], [0, 2]]);
        // class 0: 2*1/(1+2) = 0.667, class 1: 2*2/(3+2) = 0.8
        let f1 = f1_macro(&y, &p).unwrap();
        assert!((f1 - (2.0 / 3.0 + 0.8) / 2.0).abs() < 1e-12);
        assert_eq!(f1_macro(&y, &y).unwrap(), 1.0);
    }
}
