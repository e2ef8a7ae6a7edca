//! Per-word hidden-state-count selection.
//!
//! A `ModelSelector` binds one vocabulary item to its slice of the corpus and
//! sweeps every candidate state count in the configured range, scoring each
//! candidate under the configured criterion:
//!
//! - `Constant`: no search, fit at `n_constant`
//! - `Bic`: `-2·logL + p·ln(N)`, lower is better (complexity penalty)
//! - `Dic`: own log-likelihood minus the mean log-likelihood other words'
//!   models assign to their own data at the same state count, higher is
//!   better (discriminability)
//! - `CrossValidated`: fold-averaged held-out log-likelihood, higher is
//!   better (generalization)
//!
//! Failure handling is scoped as narrowly as possible: a fit or score
//! failure skips exactly the candidate, fold, or other-item that produced
//! it, and the sweep continues. Only when the whole range produces no valid
//! score does the selector fall back to the constant state count; only when
//! that fallback also fails does an error surface.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::corpus::{Corpus, FlattenedSequences, Sequence};
use crate::domain::{Criterion, SelectorConfig};
use crate::error::{ErrorKind, SelectError};
use crate::select::kfold::KFold;

/// A fitted generative sequence model, opaque beyond its state count and its
/// ability to score flattened sequence data.
pub trait SequenceModel {
    /// Hidden-state count the model was fitted with.
    fn state_count(&self) -> usize;

    /// Log-likelihood of the given data under this model.
    fn score(&self, data: &FlattenedSequences) -> Result<f64, SelectError>;
}

/// The fitting procedure the strategies search over. Failure (non-convergence,
/// numerical singularity) is a value, not a panic, so sweeps can absorb it.
pub trait ModelFitter {
    type Model: SequenceModel;

    fn fit(
        &self,
        data: &FlattenedSequences,
        n_states: usize,
        seed: u64,
    ) -> Result<Self::Model, SelectError>;
}

/// Selects the hidden-state count for a single vocabulary item.
pub struct ModelSelector<'a, F: ModelFitter> {
    corpus: &'a Corpus,
    word: String,
    criterion: Criterion,
    config: SelectorConfig,
    fitter: &'a F,
    /// The target word's flattened data (resolved once at construction).
    data: &'a FlattenedSequences,
    /// The target word's sequence list (for cross-validation splits).
    sequences: &'a [Sequence],
}

impl<'a, F: ModelFitter> ModelSelector<'a, F> {
    pub fn new(
        corpus: &'a Corpus,
        word: &str,
        criterion: Criterion,
        config: SelectorConfig,
        fitter: &'a F,
    ) -> Result<Self, SelectError> {
        config.validate()?;
        let (Some(data), Some(sequences)) = (corpus.flattened(word), corpus.sequences(word))
        else {
            return Err(SelectError::data(format!(
                "Word \"{word}\" is not in the corpus."
            )));
        };
        Ok(Self {
            corpus,
            word: word.to_string(),
            criterion,
            config,
            fitter,
            data,
            sequences,
        })
    }

    /// The vocabulary item this selector is bound to.
    pub fn word(&self) -> &str {
        &self.word
    }

    /// Fit a model with `n_states` hidden states on this word's flattened
    /// data, using the fixed seed. This is the only point where the fitter
    /// is invoked on the target word's full data.
    pub fn base_model(&self, n_states: usize) -> Result<F::Model, SelectError> {
        match self.fitter.fit(self.data, n_states, self.config.random_seed) {
            Ok(model) => {
                if self.config.verbose {
                    info!(word = %self.word, n_states, "model created");
                } else {
                    debug!(word = %self.word, n_states, "model created");
                }
                Ok(model)
            }
            Err(err) => {
                self.note(n_states, &err, "fit failed");
                Err(err)
            }
        }
    }

    /// Run the configured criterion and return the winning model.
    ///
    /// The searching criteria always return a usable model unless every
    /// candidate in the range and the constant fallback all fail, which
    /// surfaces as `ErrorKind::NoValidCandidate`. `Criterion::Constant`
    /// propagates its fit failure directly (there is no fallback beneath the
    /// floor strategy).
    pub fn select(&self) -> Result<F::Model, SelectError> {
        match self.criterion {
            Criterion::Constant => self.base_model(self.config.n_constant),
            Criterion::Bic => self.select_bic(),
            Criterion::Dic => self.select_dic(),
            Criterion::CrossValidated => self.select_cv(),
        }
    }

    /// BIC sweep: `score = -2·logL + p·ln(N)` with
    /// `p = n·(n-1) + 2·D·n` free parameters (transitions plus mean and
    /// variance per state per feature dimension). Minimum wins; the
    /// ascending sweep with strict improvement keeps the smaller state count
    /// on ties.
    fn select_bic(&self) -> Result<F::Model, SelectError> {
        let d = self.data.dim();
        let ln_n = (self.data.n_frames() as f64).ln();

        let mut best: Option<(f64, F::Model)> = None;
        for n in self.config.candidate_range() {
            let model = match self.base_model(n) {
                Ok(m) => m,
                Err(_) => continue,
            };
            let log_l = match model.score(self.data) {
                Ok(v) => v,
                Err(err) => {
                    self.note(n, &err, "scoring failed");
                    continue;
                }
            };
            let p = (n * (n - 1) + 2 * d * n) as f64;
            let score = -2.0 * log_l + p * ln_n;
            if !score.is_finite() {
                continue;
            }
            if best.as_ref().is_none_or(|(s, _)| score < *s) {
                best = Some((score, model));
            }
        }

        match best {
            Some((_, model)) => Ok(model),
            None => self.fallback(),
        }
    }

    /// DIC sweep: reward state counts that fit the target word well while
    /// fitting every other word badly.
    ///
    /// For each candidate the other words' models are refit at the same
    /// state count and scored on their own data, into a running sum and
    /// count local to the candidate. With `m` = target plus successfully
    /// scored others, the score is `L_i - sum / (m - 1)`; a candidate where
    /// no other word scores is skipped rather than divided by zero.
    fn select_dic(&self) -> Result<F::Model, SelectError> {
        let mut best: Option<(f64, F::Model)> = None;
        for n in self.config.candidate_range() {
            let model = match self.base_model(n) {
                Ok(m) => m,
                Err(_) => continue,
            };
            let own = match model.score(self.data) {
                Ok(v) => v,
                Err(err) => {
                    self.note(n, &err, "scoring failed");
                    continue;
                }
            };

            let mut sum = 0.0;
            let mut scored = 0usize;
            for (other, other_data) in self.corpus.iter_flattened() {
                if other == self.word {
                    continue;
                }
                let result = self
                    .fitter
                    .fit(other_data, n, self.config.random_seed)
                    .and_then(|m| m.score(other_data));
                match result {
                    Ok(ll) => {
                        sum += ll;
                        scored += 1;
                    }
                    Err(err) => {
                        debug!(
                            word = %self.word,
                            other = %other,
                            n_states = n,
                            %err,
                            "other-word fit failed; excluded from anti-likelihood"
                        );
                    }
                }
            }
            if scored == 0 {
                debug!(
                    word = %self.word,
                    n_states = n,
                    "no other word scored; candidate skipped"
                );
                continue;
            }

            let score = own - sum / scored as f64;
            if !score.is_finite() {
                continue;
            }
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, model));
            }
        }

        match best {
            Some((_, model)) => Ok(model),
            None => self.fallback(),
        }
    }

    /// Cross-validated sweep: fit on each fold's training sequences, score
    /// the held-out fold, and average the log-likelihood over folds that
    /// produced a valid score. Maximum wins; the winning state count is
    /// refit on all of the word's sequences before being returned, since
    /// the per-fold models only ever saw subsets.
    fn select_cv(&self) -> Result<F::Model, SelectError> {
        let kfold = KFold::new(self.config.n_splits)?;
        // The split depends only on the sequence count, so a failure here
        // would repeat identically for every candidate.
        let folds = match kfold.split(self.sequences.len()) {
            Ok(folds) => folds,
            Err(err) => {
                debug!(word = %self.word, %err, "cross-validation split failed");
                return self.fallback();
            }
        };

        let mut best: Option<(f64, usize)> = None;
        for n in self.config.candidate_range() {
            let mut sum = 0.0;
            let mut scored = 0usize;
            for (train_idx, validation_idx) in &folds {
                let result = FlattenedSequences::combine(train_idx, self.sequences)
                    .and_then(|train| {
                        self.fitter.fit(&train, n, self.config.random_seed)
                    })
                    .and_then(|model| {
                        let held_out =
                            FlattenedSequences::combine(validation_idx, self.sequences)?;
                        model.score(&held_out)
                    });
                match result {
                    Ok(ll) => {
                        sum += ll;
                        scored += 1;
                    }
                    Err(err) => {
                        self.note(n, &err, "fold fit failed; fold excluded");
                    }
                }
            }
            if scored == 0 {
                continue;
            }

            let score = sum / scored as f64;
            if !score.is_finite() {
                continue;
            }
            if best.is_none_or(|(s, _)| score > s) {
                best = Some((score, n));
            }
        }

        match best {
            Some((_, n)) => match self.base_model(n) {
                Ok(model) => Ok(model),
                Err(_) => self.fallback(),
            },
            None => self.fallback(),
        }
    }

    /// Fit the constant-state-count fallback. A failure here means the whole
    /// search space is exhausted.
    fn fallback(&self) -> Result<F::Model, SelectError> {
        self.base_model(self.config.n_constant).map_err(|err| {
            SelectError::new(
                ErrorKind::NoValidCandidate,
                format!(
                    "{} selection for \"{}\": no candidate in {}..={} produced a valid score \
                     and the fallback fit at n={} failed: {err}",
                    self.criterion.display_name(),
                    self.word,
                    self.config.min_n_components,
                    self.config.max_n_components,
                    self.config.n_constant
                ),
            )
        })
    }

    fn note(&self, n_states: usize, err: &SelectError, what: &str) {
        if self.config.verbose {
            info!(word = %self.word, n_states, %err, "{}", what);
        } else {
            debug!(word = %self.word, n_states, %err, "{}", what);
        }
    }
}

/// One word's selection outcome.
#[derive(Debug, Clone)]
pub struct WordModel<M> {
    pub word: String,
    pub model: M,
}

/// Run selection for every vocabulary item in the corpus.
///
/// Items are independent, so the sweep runs in parallel across words;
/// results come back in lexical word order regardless. The first word whose
/// selection fails entirely surfaces its error.
pub fn select_all<F>(
    corpus: &Corpus,
    criterion: Criterion,
    config: &SelectorConfig,
    fitter: &F,
) -> Result<Vec<WordModel<F::Model>>, SelectError>
where
    F: ModelFitter + Sync,
    F::Model: Send,
{
    let words: Vec<&str> = corpus.words().collect();
    words
        .par_iter()
        .map(|word| {
            let selector =
                ModelSelector::new(corpus, word, criterion, config.clone(), fitter)?;
            let model = selector.select()?;
            Ok(WordModel {
                word: (*word).to_string(),
                model,
            })
        })
        .collect()
}
