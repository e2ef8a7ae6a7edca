//! Seeded EM fitting for the Gaussian HMM.
//!
//! Initialization is deterministic given the seed: per-state means and
//! variances come from contiguous blocks of the pooled frames, with a small
//! seeded jitter on the means so states separate even on near-uniform data.
//! Start and transition probabilities start uniform.
//!
//! The EM loop pools sufficient statistics across all sequences of the
//! flattened representation, re-estimates in probability space, floors the
//! variances, and stops when the total log-likelihood moves less than the
//! tolerance. Non-convergence within the iteration cap is not an error (the
//! last iterate is returned); non-finite likelihoods and degenerate state
//! occupancy are.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::corpus::FlattenedSequences;
use crate::error::SelectError;
use crate::hmm::model::GaussianHmm;
use crate::select::ModelFitter;

/// EM settings: up to 1000 iterations, tolerance 1e-2, covariance floor
/// 1e-3 by default.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Maximum EM iterations.
    pub n_iter: usize,
    /// Convergence threshold on the total log-likelihood delta.
    pub tol: f64,
    /// Lower bound applied to every emission variance after each M-step.
    pub var_floor: f64,
    /// Mean jitter magnitude, as a fraction of the pooled per-dimension
    /// standard deviation.
    pub mean_jitter: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            n_iter: 1000,
            tol: 1e-2,
            var_floor: 1e-3,
            mean_jitter: 0.01,
        }
    }
}

/// The bundled `ModelFitter`: fits a `GaussianHmm` by EM.
#[derive(Debug, Clone, Default)]
pub struct HmmFitter {
    opts: TrainOptions,
}

impl HmmFitter {
    pub fn new(opts: TrainOptions) -> Self {
        Self { opts }
    }

    fn init(
        &self,
        data: &FlattenedSequences,
        n_states: usize,
        seed: u64,
    ) -> Result<GaussianHmm, SelectError> {
        let x = data.observations();
        let n_frames = data.n_frames();
        let dim = data.dim();
        let mut rng = StdRng::seed_from_u64(seed);

        // Pooled per-dimension mean/std, for the jitter scale and as a
        // variance fallback for tiny blocks.
        let mut pool_mean = vec![0.0; dim];
        for r in 0..n_frames {
            for d in 0..dim {
                pool_mean[d] += x[(r, d)];
            }
        }
        for m in &mut pool_mean {
            *m /= n_frames as f64;
        }
        let mut pool_var = vec![0.0; dim];
        for r in 0..n_frames {
            for d in 0..dim {
                let diff = x[(r, d)] - pool_mean[d];
                pool_var[d] += diff * diff;
            }
        }
        for v in &mut pool_var {
            *v = (*v / n_frames as f64).max(self.opts.var_floor);
        }

        // Contiguous frame blocks, remainder spread over the first blocks.
        let base = n_frames / n_states;
        let extra = n_frames % n_states;
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| SelectError::fit(format!("Jitter distribution error: {e}")))?;

        let mut means = Vec::with_capacity(n_states);
        let mut vars = Vec::with_capacity(n_states);
        let mut row = 0usize;
        for j in 0..n_states {
            let len = base + usize::from(j < extra);
            let mut mean = vec![0.0; dim];
            for r in row..row + len {
                for d in 0..dim {
                    mean[d] += x[(r, d)];
                }
            }
            for m in &mut mean {
                *m /= len as f64;
            }
            let mut var = vec![0.0; dim];
            for r in row..row + len {
                for d in 0..dim {
                    let diff = x[(r, d)] - mean[d];
                    var[d] += diff * diff;
                }
            }
            for (d, v) in var.iter_mut().enumerate() {
                *v = (*v / len as f64).max(pool_var[d] * 1e-2).max(self.opts.var_floor);
            }
            for d in 0..dim {
                mean[d] += normal.sample(&mut rng) * self.opts.mean_jitter * pool_var[d].sqrt();
            }
            means.push(mean);
            vars.push(var);
            row += len;
        }

        let log_uniform = (1.0 / n_states as f64).ln();
        Ok(GaussianHmm::new(
            n_states,
            dim,
            vec![log_uniform; n_states],
            vec![log_uniform; n_states * n_states],
            means,
            vars,
        ))
    }

    fn em_step(
        &self,
        model: &GaussianHmm,
        data: &FlattenedSequences,
    ) -> Result<(GaussianHmm, f64), SelectError> {
        let n = model.n_states();
        let dim = model.dim();
        let x = data.observations();
        let n_seqs = data.n_sequences() as f64;

        let mut total_ll = 0.0;
        let mut start_acc = vec![0.0; n];
        let mut trans_acc = vec![0.0; n * n];
        let mut gamma_acc = vec![0.0; n];
        let mut mean_acc = vec![vec![0.0; dim]; n];
        let mut sq_acc = vec![vec![0.0; dim]; n];

        let mut offset = 0usize;
        for &len in data.lengths() {
            let logb = model.emission_table(x, offset, len);
            let (alpha, ll) = model.forward(&logb, len);
            if !ll.is_finite() {
                return Err(SelectError::fit("Non-finite log-likelihood during EM."));
            }
            total_ll += ll;
            let beta = model.backward(&logb, len);

            for t in 0..len {
                for j in 0..n {
                    let gamma = (alpha[t * n + j] + beta[t * n + j] - ll).exp();
                    gamma_acc[j] += gamma;
                    if t == 0 {
                        start_acc[j] += gamma;
                    }
                    for d in 0..dim {
                        let v = x[(offset + t, d)];
                        mean_acc[j][d] += gamma * v;
                        sq_acc[j][d] += gamma * v * v;
                    }
                }
            }
            for t in 0..len.saturating_sub(1) {
                for i in 0..n {
                    for j in 0..n {
                        let log_xi = alpha[t * n + i]
                            + model.log_trans()[i * n + j]
                            + logb[(t + 1) * n + j]
                            + beta[(t + 1) * n + j]
                            - ll;
                        trans_acc[i * n + j] += log_xi.exp();
                    }
                }
            }

            offset += len;
        }

        if gamma_acc.iter().any(|&g| g < 1e-10) {
            return Err(SelectError::fit(
                "Degenerate state occupancy during EM (a state collapsed).",
            ));
        }

        // M-step in probability space.
        let mut log_start = vec![0.0; n];
        for j in 0..n {
            log_start[j] = (start_acc[j] / n_seqs).max(f64::MIN_POSITIVE).ln();
        }

        let mut log_trans = model.log_trans().to_vec();
        for i in 0..n {
            let row_sum: f64 = trans_acc[i * n..(i + 1) * n].iter().sum();
            // A state only ever occupied at final positions contributes no
            // transitions; its previous row is kept.
            if row_sum > 1e-12 {
                for j in 0..n {
                    log_trans[i * n + j] =
                        (trans_acc[i * n + j] / row_sum).max(f64::MIN_POSITIVE).ln();
                }
            }
        }

        let mut means = vec![vec![0.0; dim]; n];
        let mut vars = vec![vec![0.0; dim]; n];
        for j in 0..n {
            for d in 0..dim {
                let mean = mean_acc[j][d] / gamma_acc[j];
                means[j][d] = mean;
                vars[j][d] = (sq_acc[j][d] / gamma_acc[j] - mean * mean).max(self.opts.var_floor);
            }
        }

        let mut next = model.clone();
        next.set_params(log_start, log_trans, means, vars);
        Ok((next, total_ll))
    }
}

impl ModelFitter for HmmFitter {
    type Model = GaussianHmm;

    fn fit(
        &self,
        data: &FlattenedSequences,
        n_states: usize,
        seed: u64,
    ) -> Result<GaussianHmm, SelectError> {
        if n_states < 1 {
            return Err(SelectError::config("n_states must be >= 1."));
        }
        if data.n_frames() < n_states {
            return Err(SelectError::fit(format!(
                "Cannot fit {n_states} states to {} frames.",
                data.n_frames()
            )));
        }

        let mut model = self.init(data, n_states, seed)?;
        let mut prev_ll = f64::NEG_INFINITY;
        for _ in 0..self.opts.n_iter {
            let (next, ll) = self.em_step(&model, data)?;
            model = next;
            if prev_ll.is_finite() && (ll - prev_ll).abs() < self.opts.tol {
                break;
            }
            prev_ll = ll;
        }
        Ok(model)
    }
}
