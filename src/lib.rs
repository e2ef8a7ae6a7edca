//! `hmm-select` library crate.
//!
//! Selects, for each vocabulary item in a sequence-classification task, the
//! hidden-state count that yields the best generative model of that item's
//! observed feature sequences, under a pluggable selection criterion
//! (constant, BIC, DIC, cross-validated likelihood).
//!
//! Layout:
//!
//! - `corpus`: sequences, the flattened fitting representation, and the
//!   per-word corpus
//! - `hmm`: the bundled diagonal-covariance Gaussian HMM fitter
//! - `select`: the selection strategies and the per-word/corpus drivers
//! - `math`: shared log-space primitives
//!
//! The fitter is consumed through the `ModelFitter` trait, so the strategies
//! are testable (and reusable) with any sequence-model implementation.

pub mod corpus;
pub mod domain;
pub mod error;
pub mod hmm;
pub mod math;
pub mod select;

pub use corpus::{Corpus, FlattenedSequences, Sequence};
pub use domain::{Criterion, SelectorConfig};
pub use error::{ErrorKind, SelectError};
pub use hmm::{GaussianHmm, HmmFitter};
pub use select::{ModelFitter, ModelSelector, SequenceModel, WordModel, select_all};
