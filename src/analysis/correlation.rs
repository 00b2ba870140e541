use ndarray::Array2;
use serde::Serialize;

use crate::data::model::Frame;

/// Pearson correlation between every pair of columns.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

/// One off-diagonal entry of the matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub a: String,
    pub b: String,
    pub r: f64,
}

impl CorrelationMatrix {
    /// Pairwise Pearson coefficients. Rows with NaN in either column of a pair
    /// are left out of that pair. Constant columns correlate as NaN.
    pub fn pearson(frame: &Frame) -> Self {
        let n = frame.n_columns();
        let mut values = Array2::from_elem((n, n), f64::NAN);

        for i in 0..n {
            values[[i, i]] = 1.0;
            for j in 0..i {
                let r = pearson(
                    frame.values.column(i).iter().copied(),
                    frame.values.column(j).iter().copied(),
                );
                values[[i, j]] = r;
                values[[j, i]] = r;
            }
        }

        CorrelationMatrix {
            columns: frame.columns.clone(),
            values,
        }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[[i, j]])
    }

    /// Heatmap cells above the diagonal (and the diagonal itself) are hidden.
    pub fn is_masked(&self, row: usize, col: usize) -> bool {
        col >= row
    }

    /// Lower-triangle pairs with `|r| >= min_abs`, strongest first.
    pub fn notable_pairs(&self, min_abs: f64) -> Vec<CorrelatedPair> {
        let n = self.columns.len();
        let mut pairs: Vec<CorrelatedPair> = (0..n)
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .map(|(i, j)| CorrelatedPair {
                a: self.columns[i].clone(),
                b: self.columns[j].clone(),
                r: self.values[[i, j]],
            })
            .filter(|p| p.r.abs() >= min_abs)
            .collect();
        pairs.sort_by(|x, y| y.r.abs().total_cmp(&x.r.abs()));
        pairs
    }

    /// Every other column's correlation with `column`, strongest first.
    pub fn against(&self, column: &str) -> Vec<(String, f64)> {
        let Some(i) = self.columns.iter().position(|c| c == column) else {
            return Vec::new();
        };
        let mut out: Vec<(String, f64)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, name)| (name.clone(), self.values[[i, j]]))
            .filter(|(_, r)| !r.is_nan())
            .collect();
        out.sort_by(|x, y| y.1.abs().total_cmp(&x.1.abs()));
        out
    }
}

fn pearson(a: impl Iterator<Item = f64>, b: impl Iterator<Item = f64>) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for &(x, y) in &pairs {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn frame() -> Frame {
        Frame::new(
            vec!["ram".into(), "talk_time".into(), "price_range".into(), "blue".into()],
            array![
                [500.0, 10.0, 0.0, 1.0],
                [1500.0, 4.0, 1.0, 1.0],
                [2500.0, 12.0, 2.0, 1.0],
                [3500.0, 7.0, 3.0, 1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_symmetric_with_unit_diagonal() {
        let m = CorrelationMatrix::pearson(&frame());
        for i in 0..4 {
            assert_eq!(m.values[[i, i]], 1.0);
            for j in 0..4 {
                let (a, b) = (m.values[[i, j]], m.values[[j, i]]);
                assert!(a == b || (a.is_nan() && b.is_nan()));
            }
        }
        assert!((m.get("ram", "price_range").unwrap() - 1.0).abs() < 1e-12);
        assert!(m.get("ram", "blue").unwrap().is_nan());
    }

    #[test]
    fn test_mask_hides_upper_triangle() {
        let m = CorrelationMatrix::pearson(&frame());
        assert!(m.is_masked(0, 0));
        assert!(m.is_masked(1, 2));
        assert!(!m.is_masked(2, 1));
    }

    #[test]
    fn test_rankings() {
        let m = CorrelationMatrix::pearson(&frame());
        let pairs = m.notable_pairs(0.9);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].a.as_str(), pairs[0].b.as_str()), ("price_range", "ram"));

        let drivers = m.against("price_range");
        assert_eq!(drivers[0].0, "ram");
        assert_eq!(drivers.len(), 2);
    }
}
