//! Hidden-state-count selection.
//!
//! Responsibilities:
//!
//! - define the fitter-facing interfaces (`SequenceModel`, `ModelFitter`)
//! - sweep the candidate state-count range per word under one of the closed
//!   set of criteria (constant, BIC, DIC, cross-validated likelihood)
//! - absorb per-candidate / per-fold / per-other-item fit failures so one
//!   bad fit never aborts the sweep
//! - drive selection across a whole corpus (parallel across words)

pub mod kfold;
pub mod selector;

pub use kfold::*;
pub use selector::*;
