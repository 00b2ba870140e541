//! Exploration and model comparison for the mobile-phone price-range dataset.

pub mod analysis;
pub mod data;
pub mod experiment;
pub mod model;
