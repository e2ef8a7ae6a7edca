//! Bundled generative sequence model: a diagonal-covariance Gaussian HMM.
//!
//! Responsibilities:
//!
//! - log-space forward scoring of flattened sequence data (`model`)
//! - seeded, deterministic EM fitting behind the `ModelFitter` trait
//!   (`train`)
//!
//! The selection strategies never depend on this module directly; they see it
//! only through the `SequenceModel` / `ModelFitter` interfaces.

pub mod model;
pub mod train;

pub use model::*;
pub use train::*;
