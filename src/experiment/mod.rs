//! The end-to-end price-range analysis.
//!
//! ```text
//!   data dir ──► loader ──► SentinelFilter ──► drop_missing
//!                                   │
//!                                   ├──► describe / correlation / distribution
//!                                   ▼
//!                     scaler ──► train/validation split
//!                                   │
//!            ┌──────────────────────┼──────────────────────┐
//!            ▼                      ▼                      ▼
//!        KNN k sweep        forest size sweep     stump + AdaBoost grid
//!            └──────────────────────┼──────────────────────┘
//!                                   ▼
//!                     comparison ──► test predictions
//! ```

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{ExperimentConfig, ModelKind};
pub use pipeline::{run, run_on};
pub use report::{Report, Sweep, SweepPoint, ValidationScore};
