//! Exploratory statistics: column summaries, correlations and the class balance.

pub mod correlation;
pub mod describe;
pub mod distribution;

pub use correlation::{CorrelatedPair, CorrelationMatrix};
pub use describe::{ColumnSummary, describe};
pub use distribution::{ClassShare, class_distribution};
