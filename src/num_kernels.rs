// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Dense numeric primitives shared by every higher layer: log-space sums,
//! the standard normal tail and its inverse, a regularised symmetric
//! pseudo-inverse, and a monotone window-rank sweep.

use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

use crate::errors::Error;

/// `log(sum(exp(v)))`, computed by subtracting the maximum before
/// exponentiating so that the result is stable for any finite input.
pub fn logsumexp(v: &[f64]) -> Result<f64, Error> {
    if v.is_empty() {
        return Err(Error::EmptyLogSumExp);
    }
    let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Ok(f64::NEG_INFINITY);
    }
    let sum: f64 = v.iter().map(|x| (x - max).exp()).sum();
    Ok(max + sum.ln())
}

/// Upper-tail standard normal probability, `P(Z > z)`.
pub fn normal_sf(z: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).expect("standard normal is always valid");
    1.0 - normal.cdf(z)
}

/// The representable cap for `|z|` recovered from a p-value at or below
/// `1e-300` — the open question noted in the design notes: the upstream
/// source uses the smallest representable float as a proxy for a zero
/// p-value, so very small p-values all collapse onto this one boundary value.
pub const MAX_Z: f64 = 37.5;

/// Inverse survival function: the `z` such that `normal_sf(z) == p`. Falls
/// back to a log-space asymptotic expansion once `p` drops below double
/// precision, since `statrs`'s `inverse_cdf` loses accuracy in that regime.
pub fn normal_isf(p: f64) -> f64 {
    let p = if p <= 0.0 { f64::MIN_POSITIVE } else { p };
    if p <= 1e-300 {
        return MAX_Z;
    }
    if p < 1e-15 {
        return log_space_isf(p).min(MAX_Z);
    }
    let normal = Normal::new(0.0, 1.0).expect("standard normal is always valid");
    normal.inverse_cdf(1.0 - p)
}

fn log_space_isf(p: f64) -> f64 {
    let neg_log_p = -p.ln();
    let inner = (2.0 * neg_log_p).ln();
    let z2 = 2.0 * (neg_log_p - 0.5 * inner - 0.5 * (2.0 * PI).ln());
    z2.max(0.0).sqrt()
}

/// Result of `symmetric_pinv`: the pseudo-inverse plus the diagnostics the
/// design calls for — whether the `M * M+ * M ≈ M` post-condition held, and
/// how many retries (widened `lam`/`rtol`) were needed.
pub struct PinvResult {
    pub pinv: Array2<f64>,
    pub correct_inversion: bool,
    pub retries: u32,
}

const MAX_RETRIES: u32 = 32;

/// Adds `lam` to the diagonal of `m`, then inverts via eigenvalue truncation:
/// eigenvalues below `rtol * largest` are dropped before reconstructing.
/// Retries with `lam *= 1.1`, `rtol *= 1.1` up to 32 times if the eigensolver
/// fails to converge; returns `Error::PinvDidNotConverge` past that.
pub fn symmetric_pinv(m: &Array2<f64>, lam: f64, rtol: f64) -> Result<PinvResult, Error> {
    let n = m.nrows();
    assert_eq!(n, m.ncols(), "symmetric_pinv requires a square matrix");

    let mut lam = lam;
    let mut rtol = rtol;
    for retries in 0..MAX_RETRIES {
        let mut regularised = m.clone();
        for i in 0..n {
            regularised[[i, i]] += lam;
        }

        if let Some((eigenvalues, eigenvectors)) = jacobi_eigh(&regularised) {
            let max_eig = eigenvalues.iter().cloned().fold(f64::MIN, f64::max);
            let threshold = rtol * max_eig;

            let mut pinv = Array2::<f64>::zeros((n, n));
            for k in 0..n {
                if eigenvalues[k] > threshold && eigenvalues[k] > 0.0 {
                    let v = eigenvectors.column(k);
                    let inv_lambda = 1.0 / eigenvalues[k];
                    for i in 0..n {
                        for j in 0..n {
                            pinv[[i, j]] += inv_lambda * v[i] * v[j];
                        }
                    }
                }
            }

            let reconstructed = regularised.dot(&pinv).dot(&regularised);
            let correct_inversion = allclose(&reconstructed, &regularised, 1e-5);

            return Ok(PinvResult {
                pinv,
                correct_inversion,
                retries,
            });
        }

        lam *= 1.1;
        rtol *= 1.1;
    }

    Err(Error::PinvDidNotConverge {
        retries: MAX_RETRIES,
    })
}

/// `‖a - b‖∞ / ‖b‖∞ < rtol`, the relative-infinity-norm check the post
/// condition of `symmetric_pinv` is stated in terms of.
fn allclose(a: &Array2<f64>, b: &Array2<f64>, rtol: f64) -> bool {
    let diff_norm = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f64, f64::max);
    let b_norm = b.iter().map(|x| x.abs()).fold(0.0_f64, f64::max);
    if b_norm == 0.0 {
        return diff_norm < rtol;
    }
    diff_norm / b_norm < rtol
}

/// Symmetric eigendecomposition via the cyclic Jacobi rotation method.
/// Returns `None` if it fails to converge within a generous iteration budget
/// (this is the failure mode `symmetric_pinv` retries against).
pub(crate) fn jacobi_eigh(m: &Array2<f64>) -> Option<(Array1<f64>, Array2<f64>)> {
    let n = m.nrows();
    let mut a = m.clone();
    let mut v = Array2::<f64>::eye(n);

    let max_sweeps = 100;
    for _ in 0..max_sweeps {
        let mut off_diag = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diag += a[[p, q]] * a[[p, q]];
            }
        }
        if off_diag.sqrt() < 1e-12 {
            let eigenvalues = Array1::from_iter((0..n).map(|i| a[[i, i]]));
            return Some((eigenvalues, v));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                let a_pp = a[[p, p]];
                let a_qq = a[[q, q]];
                let a_pq = a[[p, q]];

                a[[p, p]] = a_pp - t * a_pq;
                a[[q, q]] = a_qq + t * a_pq;
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                for i in 0..n {
                    if i != p && i != q {
                        let a_ip = a[[i, p]];
                        let a_iq = a[[i, q]];
                        a[[i, p]] = c * a_ip - s * a_iq;
                        a[[p, i]] = a[[i, p]];
                        a[[i, q]] = s * a_ip + c * a_iq;
                        a[[q, i]] = a[[i, q]];
                    }
                }

                for i in 0..n {
                    let v_ip = v[[i, p]];
                    let v_iq = v[[i, q]];
                    v[[i, p]] = c * v_ip - s * v_iq;
                    v[[i, q]] = s * v_ip + c * v_iq;
                }
            }
        }
    }

    None
}

/// Ratio of largest to smallest-magnitude eigenvalue, used by `RaissImputer`
/// to report how well-conditioned the observed-observed LD block was.
pub fn condition_number(m: &Array2<f64>) -> Option<f64> {
    let (eigenvalues, _) = jacobi_eigh(m)?;
    let max = eigenvalues.iter().cloned().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    let min = eigenvalues
        .iter()
        .cloned()
        .fold(f64::INFINITY, |acc, x| acc.min(x.abs()));
    if min == 0.0 {
        return Some(f64::INFINITY);
    }
    Some(max / min)
}

/// For sorted `positions`, computes the inclusive `[lo, hi]` index bounds of
/// the window `[position - radius, position + radius]` around each element,
/// via a monotone two-pointer sweep — O(N) total rather than O(N log N).
pub fn window_ranges(positions: &[u64], radius: u64) -> Vec<(usize, usize)> {
    let n = positions.len();
    let mut out = Vec::with_capacity(n);
    let mut lo = 0usize;
    let mut hi = 0usize;
    for i in 0..n {
        let center = positions[i];
        let window_lo = center.saturating_sub(radius);
        while lo < n && positions[lo] < window_lo {
            lo += 1;
        }
        if hi < i {
            hi = i;
        }
        while hi + 1 < n && positions[hi + 1] <= center + radius {
            hi += 1;
        }
        out.push((lo, hi));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn logsumexp_matches_naive_sum_for_small_values() {
        let v = [0.1, 0.2, 0.3];
        let naive = v.iter().map(|x| x.exp()).sum::<f64>().ln();
        assert_relative_eq!(logsumexp(&v).unwrap(), naive, epsilon = 1e-12);
    }

    #[test]
    fn logsumexp_rejects_empty_input() {
        assert!(logsumexp(&[]).is_err());
    }

    #[test]
    fn normal_isf_roundtrips_through_normal_sf() {
        let z = normal_isf(0.05);
        assert_relative_eq!(normal_sf(z), 0.05, epsilon = 1e-6);
    }

    #[test]
    fn normal_isf_caps_at_extreme_p_values() {
        assert_relative_eq!(normal_isf(1e-310), MAX_Z, epsilon = 1e-6);
    }

    #[test]
    fn symmetric_pinv_satisfies_post_condition_on_identity() {
        let m = Array2::<f64>::eye(3);
        let result = symmetric_pinv(&m, 0.0, 1e-6).unwrap();
        assert!(result.correct_inversion);
        assert_relative_eq!(result.pinv[[0, 0]], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn window_ranges_covers_symmetric_radius() {
        let positions = [10u64, 20, 30, 1000];
        let ranges = window_ranges(&positions, 15);
        assert_eq!(ranges[0], (0, 1));
        assert_eq!(ranges[1], (0, 2));
        assert_eq!(ranges[2], (1, 2));
        assert_eq!(ranges[3], (3, 3));
    }
}
