use std::fmt;

use anyhow::{Context, Result, bail};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PriceRange – the four-valued target
// ---------------------------------------------------------------------------

/// Price category of a phone, encoded 0..=3 in the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceRange {
    Cheap,
    Medium,
    Expensive,
    Pricey,
}

impl PriceRange {
    pub const ALL: [PriceRange; 4] = [
        PriceRange::Cheap,
        PriceRange::Medium,
        PriceRange::Expensive,
        PriceRange::Pricey,
    ];

    /// Map a numeric class code to its category. Anything outside 0..=3 is `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PriceRange::Cheap),
            1 => Some(PriceRange::Medium),
            2 => Some(PriceRange::Expensive),
            3 => Some(PriceRange::Pricey),
            _ => None,
        }
    }

    /// Interpret a float cell (as loaded from CSV) as a class code.
    pub fn from_value(value: f64) -> Option<Self> {
        if value.fract() != 0.0 || !value.is_finite() {
            return None;
        }
        Self::from_code(value as i64)
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            PriceRange::Cheap => "Cheap",
            PriceRange::Medium => "Medium",
            PriceRange::Expensive => "Expensive",
            PriceRange::Pricey => "Pricey",
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Frame – a labelled numeric table
// ---------------------------------------------------------------------------

/// A numeric table with named columns. Missing cells are stored as NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Row-major cell values, `len() x columns.len()`.
    pub values: Array2<f64>,
}

impl Frame {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            bail!(
                "{} column names for a table with {} columns",
                columns.len(),
                values.ncols()
            );
        }
        Ok(Frame { columns, values })
    }

    /// Build a frame from row vectors; every row must have one value per column.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_cols = columns.len();
        let n_rows = rows.len();
        let mut flat = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                bail!("Row {i} has {} values, expected {n_cols}", row.len());
            }
            flat.extend(row);
        }
        let values = Array2::from_shape_vec((n_rows, n_cols), flat)
            .context("assembling table")?;
        Frame::new(columns, values)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|j| self.values.column(j))
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    pub fn drop_column(&self, name: &str) -> Result<Frame> {
        let idx = self
            .column_index(name)
            .with_context(|| format!("no column named '{name}'"))?;
        Ok(self.drop_column_at(idx))
    }

    /// Drop the leading index column (the `id` column of the test table).
    pub fn drop_first_column(&self) -> Result<Frame> {
        if self.columns.is_empty() {
            bail!("cannot drop the index column of a table with no columns");
        }
        Ok(self.drop_column_at(0))
    }

    fn drop_column_at(&self, idx: usize) -> Frame {
        let keep: Vec<usize> = (0..self.n_columns()).filter(|&j| j != idx).collect();
        Frame {
            columns: keep.iter().map(|&j| self.columns[j].clone()).collect(),
            values: self.values.select(Axis(1), &keep),
        }
    }

    /// Reorder / subset columns by name.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        let idx = names
            .iter()
            .map(|n| {
                self.column_index(n.as_ref())
                    .with_context(|| format!("no column named '{}'", n.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Frame {
            columns: names.iter().map(|n| n.as_ref().to_string()).collect(),
            values: self.values.select(Axis(1), &idx),
        })
    }

    pub fn select_rows(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Keep the rows for which `keep` returns true.
    pub fn retain_rows<F>(&self, mut keep: F) -> Frame
    where
        F: FnMut(ArrayView1<'_, f64>) -> bool,
    {
        let indices: Vec<usize> = self
            .values
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| keep(row.view()))
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&indices)
    }

    /// Append a column. `values` must have one entry per row.
    pub fn with_column(&self, name: &str, values: &Array1<f64>) -> Result<Frame> {
        if values.len() != self.len() {
            bail!(
                "column '{name}' has {} values for a table with {} rows",
                values.len(),
                self.len()
            );
        }
        if self.column_index(name).is_some() {
            bail!("column '{name}' already exists");
        }
        let column = values.view().insert_axis(Axis(1));
        let stacked = ndarray::concatenate(Axis(1), &[self.values.view(), column])
            .context("appending column")?;
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        Frame::new(columns, stacked)
    }
}

/// Columns of `train` that `test` lacks, i.e. the target column(s).
pub fn label_columns(train: &Frame, test: &Frame) -> Vec<String> {
    train
        .columns
        .iter()
        .filter(|c| test.column_index(c).is_none())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn frame() -> Frame {
        Frame::new(
            vec!["id".into(), "ram".into(), "price_range".into()],
            array![[1.0, 512.0, 0.0], [2.0, 2048.0, 2.0], [3.0, 3900.0, 3.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_price_range_codes() {
        assert_eq!(PriceRange::from_code(0), Some(PriceRange::Cheap));
        assert_eq!(PriceRange::from_code(3), Some(PriceRange::Pricey));
        assert_eq!(PriceRange::from_code(4), None);
        assert_eq!(PriceRange::from_value(2.0), Some(PriceRange::Expensive));
        assert_eq!(PriceRange::from_value(1.5), None);
        assert_eq!(PriceRange::Medium.to_string(), "Medium");
    }

    #[test]
    fn test_new_rejects_mismatched_names() {
        assert!(Frame::new(vec!["a".into()], array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_drop_and_select_columns() {
        let f = frame();
        let no_id = f.drop_first_column().unwrap();
        assert_eq!(no_id.columns, vec!["ram", "price_range"]);
        assert_eq!(no_id.values[[1, 0]], 2048.0);

        let reordered = f.select_columns(&["price_range", "id"]).unwrap();
        assert_eq!(reordered.values.row(2).to_vec(), vec![3.0, 3.0]);
        assert!(f.select_columns(&["battery_power"]).is_err());
    }

    #[test]
    fn test_retain_rows_and_with_column() {
        let f = frame();
        let cheap = f.retain_rows(|row| row[2] == 0.0);
        assert_eq!(cheap.len(), 1);

        let extra = f.with_column("flag", &array![1.0, 0.0, 1.0]).unwrap();
        assert_eq!(extra.n_columns(), 4);
        assert_eq!(extra.column("flag").unwrap().to_vec(), vec![1.0, 0.0, 1.0]);
        assert!(f.with_column("ram", &array![1.0, 0.0, 1.0]).is_err());
        assert!(f.with_column("short", &array![1.0]).is_err());
    }

    #[test]
    fn test_label_columns() {
        let train = frame().drop_first_column().unwrap();
        let test = frame().drop_column("price_range").unwrap();
        assert_eq!(label_columns(&train, &test), vec!["price_range"]);
    }
}
