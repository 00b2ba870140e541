/// Data layer: core types, loading, filtering and sample generation.
///
/// Architecture:
/// ```text
///  train.csv / test.csv (.parquet / .json)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse files → Frame (test index column dropped)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  drop rows with sentinel zeros (px_height, sc_w)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Frame    │  named columns over an ndarray matrix
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod synthetic;
