//! Gaussian HMM parameters and log-space inference.
//!
//! The model keeps start and transition probabilities in log space and one
//! diagonal Gaussian per hidden state. Scoring runs the forward algorithm
//! per sequence of a flattened representation and sums the per-sequence
//! log-likelihoods; all accumulation goes through log-sum-exp so long
//! sequences cannot underflow.

use nalgebra::DMatrix;

use crate::corpus::FlattenedSequences;
use crate::error::SelectError;
use crate::math::{log_diag_gaussian, log_sum_exp};
use crate::select::SequenceModel;

/// A fitted diagonal-covariance Gaussian HMM for one vocabulary item.
#[derive(Debug, Clone)]
pub struct GaussianHmm {
    n_states: usize,
    dim: usize,
    /// Log initial state probabilities, length `n_states`.
    log_start: Vec<f64>,
    /// Log transition probabilities, row-major `n_states * n_states`.
    log_trans: Vec<f64>,
    /// Per-state emission means, `n_states x dim`.
    means: Vec<Vec<f64>>,
    /// Per-state diagonal emission variances, `n_states x dim`.
    vars: Vec<Vec<f64>>,
}

impl GaussianHmm {
    pub(crate) fn new(
        n_states: usize,
        dim: usize,
        log_start: Vec<f64>,
        log_trans: Vec<f64>,
        means: Vec<Vec<f64>>,
        vars: Vec<Vec<f64>>,
    ) -> Self {
        debug_assert_eq!(log_start.len(), n_states);
        debug_assert_eq!(log_trans.len(), n_states * n_states);
        Self {
            n_states,
            dim,
            log_start,
            log_trans,
            means,
            vars,
        }
    }

    /// Hidden-state count this model was fitted with.
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Feature dimensionality of the emissions.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub(crate) fn log_trans(&self) -> &[f64] {
        &self.log_trans
    }

    pub(crate) fn set_params(
        &mut self,
        log_start: Vec<f64>,
        log_trans: Vec<f64>,
        means: Vec<Vec<f64>>,
        vars: Vec<Vec<f64>>,
    ) {
        self.log_start = log_start;
        self.log_trans = log_trans;
        self.means = means;
        self.vars = vars;
    }

    /// Emission log-probability table for `len` frames starting at row
    /// `start` of `x`: row-major `len * n_states`.
    pub(crate) fn emission_table(&self, x: &DMatrix<f64>, start: usize, len: usize) -> Vec<f64> {
        let n = self.n_states;
        let mut logb = vec![0.0; len * n];
        let mut frame = vec![0.0; self.dim];
        for t in 0..len {
            for d in 0..self.dim {
                frame[d] = x[(start + t, d)];
            }
            for j in 0..n {
                logb[t * n + j] = log_diag_gaussian(&frame, &self.means[j], &self.vars[j]);
            }
        }
        logb
    }

    /// Forward pass over one sequence's emission table.
    ///
    /// Returns the full lattice (row-major `len * n_states`) and the
    /// sequence log-likelihood.
    pub(crate) fn forward(&self, logb: &[f64], len: usize) -> (Vec<f64>, f64) {
        let n = self.n_states;
        let mut alpha = vec![f64::NEG_INFINITY; len * n];
        let mut scratch = vec![0.0; n];

        for j in 0..n {
            alpha[j] = self.log_start[j] + logb[j];
        }
        for t in 1..len {
            for j in 0..n {
                for i in 0..n {
                    scratch[i] = alpha[(t - 1) * n + i] + self.log_trans[i * n + j];
                }
                alpha[t * n + j] = log_sum_exp(&scratch) + logb[t * n + j];
            }
        }

        let ll = log_sum_exp(&alpha[(len - 1) * n..len * n]);
        (alpha, ll)
    }

    /// Backward pass over one sequence's emission table (row-major lattice).
    pub(crate) fn backward(&self, logb: &[f64], len: usize) -> Vec<f64> {
        let n = self.n_states;
        let mut beta = vec![f64::NEG_INFINITY; len * n];
        let mut scratch = vec![0.0; n];

        for j in 0..n {
            beta[(len - 1) * n + j] = 0.0;
        }
        for t in (0..len.saturating_sub(1)).rev() {
            for i in 0..n {
                for j in 0..n {
                    scratch[j] =
                        self.log_trans[i * n + j] + logb[(t + 1) * n + j] + beta[(t + 1) * n + j];
                }
                beta[t * n + i] = log_sum_exp(&scratch);
            }
        }
        beta
    }

    /// Total log-likelihood of a flattened representation: the sum of
    /// per-sequence forward log-likelihoods.
    pub fn log_likelihood(&self, data: &FlattenedSequences) -> Result<f64, SelectError> {
        if data.dim() != self.dim {
            return Err(SelectError::data(format!(
                "Data dimension {} != model dimension {}.",
                data.dim(),
                self.dim
            )));
        }

        let x = data.observations();
        let mut total = 0.0;
        let mut start = 0usize;
        for &len in data.lengths() {
            let logb = self.emission_table(x, start, len);
            let (_, ll) = self.forward(&logb, len);
            if !ll.is_finite() {
                return Err(SelectError::fit(
                    "Non-finite log-likelihood while scoring.",
                ));
            }
            total += ll;
            start += len;
        }
        Ok(total)
    }
}

impl SequenceModel for GaussianHmm {
    fn state_count(&self) -> usize {
        self.n_states
    }

    fn score(&self, data: &FlattenedSequences) -> Result<f64, SelectError> {
        self.log_likelihood(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Sequence;
    use crate::math::LN_2PI;

    fn single_state_model(mean: f64, var: f64) -> GaussianHmm {
        GaussianHmm::new(1, 1, vec![0.0], vec![0.0], vec![vec![mean]], vec![vec![var]])
    }

    fn flat(frames: &[f64]) -> FlattenedSequences {
        let seqs: Vec<Sequence> = frames
            .iter()
            .map(|&v| Sequence::from_frames(&[vec![v]]).unwrap())
            .collect();
        FlattenedSequences::from_all(&seqs).unwrap()
    }

    #[test]
    fn single_state_likelihood_matches_gaussian_density() {
        // With one state the HMM degenerates to i.i.d. Gaussian scoring.
        let model = single_state_model(0.0, 1.0);
        let data = flat(&[0.0, 0.0]);
        let ll = model.log_likelihood(&data).unwrap();
        assert!((ll + LN_2PI).abs() < 1e-12);
    }

    #[test]
    fn likelihood_sums_over_sequences() {
        let model = single_state_model(0.0, 1.0);
        let one = model.log_likelihood(&flat(&[0.5])).unwrap();
        let two = model.log_likelihood(&flat(&[0.5, 0.5])).unwrap();
        assert!((two - 2.0 * one).abs() < 1e-12);
    }

    #[test]
    fn better_centered_model_scores_higher() {
        let near = single_state_model(1.0, 1.0);
        let far = single_state_model(5.0, 1.0);
        let data = flat(&[1.0, 1.1, 0.9]);
        let ll_near = near.log_likelihood(&data).unwrap();
        let ll_far = far.log_likelihood(&data).unwrap();
        assert!(ll_near > ll_far);
    }

    #[test]
    fn dimension_mismatch_is_a_data_error() {
        let model = single_state_model(0.0, 1.0);
        let seq = Sequence::from_frames(&[vec![1.0, 2.0]]).unwrap();
        let data = FlattenedSequences::from_all(&[seq]).unwrap();
        let err = model.log_likelihood(&data).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Data);
    }

    #[test]
    fn forward_backward_agree_on_likelihood() {
        // ll from the forward pass must equal logsumexp over states of
        // alpha[0] + beta[0] evaluated at t = 0.
        let model = GaussianHmm::new(
            2,
            1,
            vec![0.5f64.ln(), 0.5f64.ln()],
            vec![0.9f64.ln(), 0.1f64.ln(), 0.2f64.ln(), 0.8f64.ln()],
            vec![vec![0.0], vec![3.0]],
            vec![vec![1.0], vec![1.0]],
        );
        let seq = Sequence::from_frames(&[vec![0.1], vec![2.9]]).unwrap();
        let joined = FlattenedSequences::from_all(&[seq]).unwrap();

        let logb = model.emission_table(joined.observations(), 0, 2);
        let (alpha, ll) = model.forward(&logb, 2);
        let beta = model.backward(&logb, 2);
        let at_zero: Vec<f64> = (0..2).map(|j| alpha[j] + beta[j]).collect();
        assert!((crate::math::log_sum_exp(&at_zero) - ll).abs() < 1e-10);
    }
}
