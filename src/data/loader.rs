use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::Frame;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a numeric table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one numeric value per cell (the Kaggle layout)
/// * `.json`    – `[{ "ram": 2549, "price_range": 1, ... }, ...]`
/// * `.parquet` – scalar integer, float or boolean columns
pub fn load_file(path: &Path) -> Result<Frame> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// The labelled training table and the unlabelled test table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub train: Frame,
    pub test: Frame,
}

/// Read `train.<ext>` and `test.<ext>` from `dir`, trying csv, parquet then json.
///
/// When `drop_test_index` is set the test table's leading column (`id`) is removed.
pub fn load_dataset(dir: &Path, drop_test_index: bool) -> Result<Dataset> {
    let train_path = find_table(dir, "train")?;
    let test_path = find_table(dir, "test")?;

    let train = load_file(&train_path)
        .with_context(|| format!("loading {}", train_path.display()))?;
    let mut test = load_file(&test_path)
        .with_context(|| format!("loading {}", test_path.display()))?;
    if drop_test_index {
        test = test.drop_first_column().context("dropping test index column")?;
    }

    log::info!(
        "Loaded {} training rows and {} test rows from {}",
        train.len(),
        test.len(),
        dir.display()
    );
    Ok(Dataset { train, test })
}

fn find_table(dir: &Path, stem: &str) -> Result<std::path::PathBuf> {
    ["csv", "parquet", "pq", "json"]
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|p| p.is_file())
        .with_context(|| format!("no {stem}.csv / .parquet / .json in {}", dir.display()))
}

/// Write a frame as CSV with a header row. Integral values lose their `.0`.
pub fn write_csv(frame: &Frame, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(&frame.columns).context("writing CSV header")?;
    for row in frame.values.outer_iter() {
        let record: Vec<String> = row.iter().map(|&v| format_cell(v)).collect();
        writer.write_record(&record).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn format_cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Frame> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = record
            .iter()
            .enumerate()
            .map(|(col_idx, cell)| {
                parse_cell(cell).with_context(|| {
                    let col = headers.get(col_idx).map(String::as_str).unwrap_or("?");
                    format!("CSV row {row_no}, column '{col}': '{cell}' is not a number")
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    Frame::from_rows(headers, rows)
}

fn parse_cell(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Ok(f);
    }
    match s {
        "true" | "True" => Ok(1.0),
        "false" | "False" => Ok(0.0),
        _ => bail!("unparseable cell"),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "battery_power": 842, "blue": 0, "ram": 2549, "price_range": 1 },
///   ...
/// ]
/// ```
///
/// Columns are taken from the keys of the first record.
fn load_json(path: &Path) -> Result<Frame> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let columns: Vec<String> = match records.first() {
        Some(first) => first
            .as_object()
            .context("Row 0 is not a JSON object")?
            .keys()
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let row = columns
            .iter()
            .map(|col| match obj.get(col) {
                None | Some(JsonValue::Null) => Ok(f64::NAN),
                Some(JsonValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
                Some(v) => v
                    .as_f64()
                    .with_context(|| format!("Row {i}, '{col}': not a number")),
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    Frame::from_rows(columns, rows)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of scalar numeric columns.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`), provided every column is numeric or boolean.
fn load_parquet(path: &Path) -> Result<Frame> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let values = (0..batch.num_columns())
                .map(|col_idx| {
                    extract_f64(batch.column(col_idx), row).with_context(|| {
                        format!("Row {row}: failed to read '{}'", columns[col_idx])
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push(values);
        }
    }

    Frame::from_rows(columns, rows)
}

/// Extract a single numeric cell from an Arrow column at a given row.
fn extract_f64(col: &Arc<dyn Array>, row: usize) -> Result<f64> {
    if col.is_null(row) {
        return Ok(f64::NAN);
    }
    let value = match col.data_type() {
        DataType::Int32 => downcast::<Int32Array>(col)?.value(row) as f64,
        DataType::Int64 => downcast::<Int64Array>(col)?.value(row) as f64,
        DataType::Float32 => downcast::<Float32Array>(col)?.value(row) as f64,
        DataType::Float64 => downcast::<Float64Array>(col)?.value(row),
        DataType::Boolean => {
            if downcast::<BooleanArray>(col)?.value(row) {
                1.0
            } else {
                0.0
            }
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(value)
}

/// Write a frame as Parquet. Columns holding only whole numbers become
/// `Int64`, everything else `Float64` (NaN stays NaN).
pub fn write_parquet(frame: &Frame, path: &Path) -> Result<()> {
    let mut fields = Vec::with_capacity(frame.n_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(frame.n_columns());
    for (name, column) in frame.columns.iter().zip(frame.values.columns()) {
        let integral = column.iter().all(|v| v.fract() == 0.0 && v.abs() < 1e15);
        if integral {
            fields.push(Field::new(name, DataType::Int64, false));
            arrays.push(Arc::new(Int64Array::from_iter_values(
                column.iter().map(|&v| v as i64),
            )));
        } else {
            fields.push(Field::new(name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from_iter_values(column.iter().copied())));
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn downcast<T: 'static>(col: &Arc<dyn Array>) -> Result<&T> {
    col.as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("unexpected array for {:?}", col.data_type()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell(" 842 ").unwrap(), 842.0);
        assert_eq!(parse_cell("2.2").unwrap(), 2.2);
        assert!(parse_cell("").unwrap().is_nan());
        assert_eq!(parse_cell("true").unwrap(), 1.0);
        assert!(parse_cell("yes").is_err());
    }

    #[test]
    fn test_csv_roundtrip_and_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let train = Frame::new(
            vec!["ram".into(), "clock_speed".into(), "price_range".into()],
            array![[2549.0, 2.2, 1.0], [2631.0, 0.5, 2.0]],
        )
        .unwrap();
        let test = Frame::new(
            vec!["id".into(), "ram".into(), "clock_speed".into()],
            array![[1.0, 3476.0, 1.8]],
        )
        .unwrap();
        write_csv(&train, &dir.path().join("train.csv")).unwrap();
        write_csv(&test, &dir.path().join("test.csv")).unwrap();

        let text = std::fs::read_to_string(dir.path().join("train.csv")).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("ram,clock_speed,price_range"));
        assert_eq!(lines.next(), Some("2549,2.2,1"));

        let ds = load_dataset(dir.path(), true).unwrap();
        assert_eq!(ds.train, train);
        assert_eq!(ds.test.columns, vec!["ram", "clock_speed"]);
        assert_eq!(ds.test.values, array![[3476.0, 1.8]]);
    }

    #[test]
    fn test_csv_reports_bad_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "ram,wifi\n100,1\n200,maybe\n").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("column 'wifi'"));
    }

    #[test]
    fn test_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phones.json");
        std::fs::write(
            &path,
            r#"[{"ram": 512, "wifi": true}, {"ram": 1024, "wifi": null}]"#,
        )
        .unwrap();
        let frame = load_file(&path).unwrap();
        assert_eq!(frame.columns, vec!["ram", "wifi"]);
        assert_eq!(frame.values[[0, 1]], 1.0);
        assert!(frame.values[[1, 1]].is_nan());
    }

    #[test]
    fn test_parquet_keeps_integer_and_float_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.parquet");
        let frame = Frame::new(
            vec!["ram".into(), "m_dep".into()],
            array![[2549.0, 0.6], [2631.0, 0.7]],
        )
        .unwrap();
        write_parquet(&frame, &path).unwrap();
        assert_eq!(load_file(&path).unwrap(), frame);
    }

    #[test]
    fn test_missing_table_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dataset(dir.path(), true).is_err());
        assert!(load_file(&dir.path().join("train.xlsx")).is_err());
    }
}
