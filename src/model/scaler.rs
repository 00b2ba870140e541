//! Feature scaling fitted on training rows and reused for validation/test rows.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::error::{ModelError, Result, check_features};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Raw feature values
    #[default]
    None,
    /// (x - min) / (max - min)
    MinMax,
    /// (x - mean) / std, population std
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub kind: ScalerKind,
    center: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Scaler {
    pub fn new(kind: ScalerKind) -> Self {
        Self {
            kind,
            center: None,
            scale: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyInput("cannot fit a scaler on no rows".to_string()));
        }
        let n_cols = x.ncols();
        let (center, scale) = match self.kind {
            ScalerKind::None => (Array1::zeros(n_cols), Array1::ones(n_cols)),
            ScalerKind::MinMax => {
                let min = x.fold_axis(Axis(0), f64::INFINITY, |&a, &b| a.min(b));
                let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&a, &b| a.max(b));
                let range = &max - &min;
                (min, range)
            }
            ScalerKind::Standard => {
                let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_cols));
                let std = x.std_axis(Axis(0), 0.0);
                (mean, std)
            }
        };
        // Constant columns pass through unscaled.
        let scale = scale.mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        self.center = Some(center);
        self.scale = Some(scale);
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(center), Some(scale)) = (&self.center, &self.scale) else {
            return Err(ModelError::NotFitted);
        };
        check_features(center.len(), x.ncols())?;
        Ok((x - center) / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_min_max() {
        let x = array![[0.0, 5.0], [10.0, 5.0], [5.0, 5.0]];
        let mut s = Scaler::new(ScalerKind::MinMax);
        let t = s.fit_transform(&x).unwrap();
        assert_eq!(t.column(0).to_vec(), vec![0.0, 1.0, 0.5]);
        assert_eq!(t.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
        // Test rows reuse the training range.
        assert_eq!(s.transform(&array![[20.0, 6.0]]).unwrap(), array![[2.0, 1.0]]);
    }

    #[test]
    fn test_standard() {
        let x = array![[1.0], [3.0]];
        let mut s = Scaler::new(ScalerKind::Standard);
        assert_eq!(s.fit_transform(&x).unwrap(), array![[-1.0], [1.0]]);
    }

    #[test]
    fn test_none_is_identity_and_unfitted_errors() {
        let x = array![[1.5, -2.0]];
        assert!(Scaler::new(ScalerKind::None).transform(&x).is_err());
        let mut s = Scaler::new(ScalerKind::None);
        assert_eq!(s.fit_transform(&x).unwrap(), x);
    }
}
