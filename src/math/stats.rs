//! Log-space primitives shared by the HMM forward/backward passes.
//!
//! All likelihood computations run in log space to avoid underflow on long
//! observation sequences, so the two workhorses here are a max-shifted
//! log-sum-exp and a diagonal-covariance Gaussian log-density.

/// `ln(2π)`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Numerically stable `ln(Σ exp(x_i))` over a slice.
///
/// Returns negative infinity for an empty slice or when every entry is
/// negative infinity (the log of a zero total).
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        // Either empty, all -inf (legitimate log-zero), or a NaN/+inf upstream.
        return max;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Log-density of `x` under an independent (diagonal-covariance) Gaussian
/// with the given per-dimension means and variances.
///
/// Callers are expected to keep variances floored above zero; a non-positive
/// variance yields a non-finite result that scoring code rejects.
pub fn log_diag_gaussian(x: &[f64], mean: &[f64], var: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), mean.len());
    debug_assert_eq!(x.len(), var.len());

    let mut acc = 0.0;
    for d in 0..x.len() {
        let diff = x[d] - mean[d];
        acc += -0.5 * (LN_2PI + var[d].ln() + diff * diff / var[d]);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sum_exp_matches_direct_sum() {
        let xs: [f64; 3] = [-1.0, -2.0, -3.0];
        let direct: f64 = xs.iter().map(|x| x.exp()).sum::<f64>().ln();
        assert!((log_sum_exp(&xs) - direct).abs() < 1e-12);
    }

    #[test]
    fn log_sum_exp_survives_large_magnitudes() {
        // exp(-1000) underflows; the shifted form must not.
        let xs = [-1000.0, -1000.0];
        let v = log_sum_exp(&xs);
        assert!((v - (-1000.0 + 2.0_f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn log_sum_exp_of_log_zeros_is_log_zero() {
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), f64::NEG_INFINITY);
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn standard_normal_density_at_mean() {
        // N(0,1) at x=0: ln(1/sqrt(2π)) = -0.5*ln(2π)
        let v = log_diag_gaussian(&[0.0], &[0.0], &[1.0]);
        assert!((v + 0.5 * LN_2PI).abs() < 1e-12);
    }

    #[test]
    fn density_factorizes_over_dimensions() {
        let joint = log_diag_gaussian(&[0.5, -1.0], &[0.0, 0.0], &[1.0, 2.0]);
        let d0 = log_diag_gaussian(&[0.5], &[0.0], &[1.0]);
        let d1 = log_diag_gaussian(&[-1.0], &[0.0], &[2.0]);
        assert!((joint - (d0 + d1)).abs() < 1e-12);
    }
}
