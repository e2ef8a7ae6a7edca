//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they
//! can be:
//!
//! - used in-memory during selection
//! - loaded from configuration files by a driver layer
//! - recorded alongside results for later comparisons

use serde::{Deserialize, Serialize};

use crate::error::SelectError;

/// Which scoring rule a selector applies over the candidate state counts.
///
/// Each variant trades fit against a different cost:
///
/// - `Constant`: no search, always the configured constant state count
/// - `Bic`: fit penalized by model complexity (free parameter count)
/// - `Dic`: fit on the target word penalized by fit on every other word
///   (discriminability)
/// - `CrossValidated`: fold-averaged held-out likelihood (generalization)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Constant,
    Bic,
    Dic,
    #[serde(rename = "cv")]
    CrossValidated,
}

impl Criterion {
    pub fn display_name(self) -> &'static str {
        match self {
            Criterion::Constant => "constant",
            Criterion::Bic => "BIC",
            Criterion::Dic => "DIC",
            Criterion::CrossValidated => "CV",
        }
    }
}

/// Per-selector configuration. Plain values, fixed at construction; there is
/// no dynamic reconfiguration after a selector is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Smallest candidate hidden-state count (inclusive).
    pub min_n_components: usize,
    /// Largest candidate hidden-state count (inclusive).
    pub max_n_components: usize,
    /// State count used by `Criterion::Constant` and as the fallback when no
    /// candidate in the range produces a valid score.
    pub n_constant: usize,
    /// Number of cross-validation folds (`Criterion::CrossValidated` only).
    pub n_splits: usize,
    /// Seed forwarded to every model fit, for reproducible selection.
    pub random_seed: u64,
    /// When set, absorbed per-candidate failures and successful fits are
    /// logged at info level instead of debug.
    pub verbose: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_n_components: 2,
            max_n_components: 10,
            n_constant: 3,
            n_splits: 3,
            random_seed: 14,
            verbose: false,
        }
    }
}

impl SelectorConfig {
    /// Validate the configuration invariants.
    ///
    /// Candidates are every integer in `min..=max`, so the range must be
    /// non-empty; the fallback count and fold count must be usable.
    pub fn validate(&self) -> Result<(), SelectError> {
        if self.min_n_components < 1 {
            return Err(SelectError::config("min_n_components must be >= 1."));
        }
        if self.min_n_components > self.max_n_components {
            return Err(SelectError::config(format!(
                "Invalid component range: min={} > max={}.",
                self.min_n_components, self.max_n_components
            )));
        }
        if self.n_constant < 1 {
            return Err(SelectError::config("n_constant must be >= 1."));
        }
        if self.n_splits < 2 {
            return Err(SelectError::config("n_splits must be >= 2."));
        }
        Ok(())
    }

    /// The inclusive candidate range swept by the searching strategies.
    pub fn candidate_range(&self) -> std::ops::RangeInclusive<usize> {
        self.min_n_components..=self.max_n_components
    }
}
