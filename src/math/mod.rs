//! Mathematical utilities: log-space accumulation and Gaussian densities.

pub mod stats;

pub use stats::*;
