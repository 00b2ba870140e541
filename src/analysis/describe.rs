use serde::Serialize;

use crate::data::model::Frame;

/// Descriptive statistics of one column, pandas `describe()` style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    /// Non-missing cells.
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Summarise every column of `frame`. NaN cells are skipped.
pub fn describe(frame: &Frame) -> Vec<ColumnSummary> {
    frame
        .columns
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let mut values: Vec<f64> = frame
                .values
                .column(j)
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            values.sort_by(|a, b| a.total_cmp(b));
            summarise(name, &values)
        })
        .collect()
}

fn summarise(name: &str, sorted: &[f64]) -> ColumnSummary {
    let count = sorted.len();
    if count == 0 {
        return ColumnSummary {
            name: name.to_string(),
            count,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            q25: f64::NAN,
            median: f64::NAN,
            q75: f64::NAN,
            max: f64::NAN,
        };
    }

    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    ColumnSummary {
        name: name.to_string(),
        count,
        mean,
        std,
        min: sorted[0],
        q25: quantile(sorted, 0.25),
        median: quantile(sorted, 0.5),
        q75: quantile(sorted, 0.75),
        max: sorted[count - 1],
    }
}

/// Linear-interpolation quantile of already sorted, non-empty data.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_describe_matches_pandas() {
        let frame = Frame::new(
            vec!["n_cores".into(), "m_dep".into()],
            array![[1.0, 0.1], [2.0, f64::NAN], [3.0, 0.5], [4.0, 0.9]],
        )
        .unwrap();
        let stats = describe(&frame);

        let cores = &stats[0];
        assert_eq!(cores.count, 4);
        assert_eq!(cores.mean, 2.5);
        assert!((cores.std - 1.2909944).abs() < 1e-6);
        assert_eq!(cores.q25, 1.75);
        assert_eq!(cores.median, 2.5);
        assert_eq!(cores.q75, 3.25);

        let depth = &stats[1];
        assert_eq!(depth.count, 3);
        assert_eq!(depth.median, 0.5);
        assert_eq!(depth.max, 0.9);
    }

    #[test]
    fn test_empty_column_is_nan() {
        let frame = Frame::new(vec!["wifi".into()], array![[f64::NAN]]).unwrap();
        let stats = describe(&frame);
        assert_eq!(stats[0].count, 0);
        assert!(stats[0].mean.is_nan());
    }
}
