use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::model::Frame;

// ---------------------------------------------------------------------------
// Sentinel filter: drop rows whose value stands in for "unknown"
// ---------------------------------------------------------------------------

/// Columns in which `sentinel` means "not recorded".
///
/// In the phone dataset a pixel height or screen width of zero is not a real
/// measurement, so those rows are removed before any statistics are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelFilter {
    pub columns: Vec<String>,
    pub sentinel: f64,
}

impl Default for SentinelFilter {
    fn default() -> Self {
        Self {
            columns: vec!["px_height".to_string(), "sc_w".to_string()],
            sentinel: 0.0,
        }
    }
}

/// Result of applying a [`SentinelFilter`].
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub frame: Frame,
    pub dropped: usize,
}

impl SentinelFilter {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Keep rows where none of the filtered columns holds the sentinel.
    ///
    /// A column missing from `frame` is an error; an empty column list keeps everything.
    pub fn apply(&self, frame: &Frame) -> Result<FilterOutcome> {
        let indices = self
            .columns
            .iter()
            .map(|c| {
                frame
                    .column_index(c)
                    .with_context(|| format!("sentinel column '{c}' not in table"))
            })
            .collect::<Result<Vec<usize>>>()?;

        let kept = frame.retain_rows(|row| indices.iter().all(|&j| row[j] != self.sentinel));
        let dropped = frame.len() - kept.len();
        Ok(FilterOutcome { frame: kept, dropped })
    }
}

// ---------------------------------------------------------------------------
// Missing values
// ---------------------------------------------------------------------------

/// Drop rows holding a missing (NaN) cell in any of `columns`.
///
/// Run after the sentinel filter so the models only ever see complete rows.
pub fn drop_missing(frame: &Frame, columns: &[String]) -> Result<FilterOutcome> {
    let indices = columns
        .iter()
        .map(|c| {
            frame
                .column_index(c)
                .with_context(|| format!("column '{c}' not in table"))
        })
        .collect::<Result<Vec<usize>>>()?;

    let kept = frame.retain_rows(|row| indices.iter().all(|&j| !row[j].is_nan()));
    let dropped = frame.len() - kept.len();
    Ok(FilterOutcome { frame: kept, dropped })
}

/// Number of missing (NaN) cells per column, in column order.
pub fn null_counts(frame: &Frame) -> Vec<(String, usize)> {
    frame
        .columns
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let n = frame.values.column(j).iter().filter(|v| v.is_nan()).count();
            (name.clone(), n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn phones() -> Frame {
        Frame::new(
            vec!["px_height".into(), "sc_w".into(), "ram".into()],
            array![
                [20.0, 7.0, 2549.0],
                [0.0, 3.0, 2631.0],
                [905.0, 0.0, 2603.0],
                [1263.0, 8.0, f64::NAN],
                [0.0, 0.0, 1411.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_drops_sentinel_rows() {
        let outcome = SentinelFilter::default().apply(&phones()).unwrap();
        assert_eq!(outcome.dropped, 3);
        assert_eq!(outcome.frame.column("px_height").unwrap().to_vec(), vec![20.0, 1263.0]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = SentinelFilter::default();
        let once = filter.apply(&phones()).unwrap().frame;
        let twice = filter.apply(&once).unwrap();
        assert_eq!(twice.dropped, 0);
        assert_eq!(twice.frame.len(), once.len());
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let filter = SentinelFilter::new(vec!["m_dep".into()]);
        assert!(filter.apply(&phones()).is_err());
    }

    #[test]
    fn test_empty_column_list_keeps_all() {
        let outcome = SentinelFilter::new(Vec::new()).apply(&phones()).unwrap();
        assert_eq!(outcome.dropped, 0);
    }

    #[test]
    fn test_drop_missing_removes_incomplete_rows() {
        let frame = phones();
        let columns = vec!["px_height".to_string(), "ram".to_string()];
        let outcome = drop_missing(&frame, &columns).unwrap();
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.frame.len(), 4);
        assert!(outcome.frame.values.iter().all(|v| !v.is_nan()));

        // Only the listed columns are checked.
        let outcome = drop_missing(&frame, &["sc_w".to_string()]).unwrap();
        assert_eq!(outcome.dropped, 0);
        assert!(drop_missing(&frame, &["m_dep".to_string()]).is_err());
    }

    #[test]
    fn test_null_counts() {
        let counts = null_counts(&phones());
        assert_eq!(counts[2], ("ram".to_string(), 1));
        assert_eq!(counts[0].1, 0);
    }
}
