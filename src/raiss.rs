// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! RAISS summary-statistics imputation: estimating z-scores of unobserved
//! variants from observed ones via the LD matrix, with a regularised
//! pseudo-inverse.

use ndarray::{Array1, Array2};

use crate::num_kernels::{condition_number, symmetric_pinv};

#[derive(Clone, Debug)]
pub struct RaissConfig {
    pub lambda: f64,
    pub rtol: f64,
}

impl Default for RaissConfig {
    fn default() -> Self {
        RaissConfig {
            lambda: 0.01,
            rtol: 0.01,
        }
    }
}

/// Per-unobserved-variant imputation outcome. `mu` is `None` when the
/// observed-observed block's pseudo-inverse failed to converge even after
/// retries — the unobserved variant is then left un-imputed rather than
/// silently degraded.
#[derive(Clone, Debug)]
pub struct ImputedVariant {
    pub mu: Option<f64>,
    pub var: f64,
    pub r_squared: f64,
    pub ld_score: f64,
}

#[derive(Clone, Debug)]
pub struct RaissResult {
    pub imputed: Vec<ImputedVariant>,
    pub condition_number: Option<f64>,
    pub correct_inversion: bool,
}

/// Imputes z-scores for `sigma_it.nrows()` unobserved variants from `z_t`
/// (observed z-scores) and the LD blocks `sigma_tt` (observed-observed,
/// `K x K`) and `sigma_it` (unobserved-observed, `U x K`).
pub fn impute(
    z_t: &Array1<f64>,
    sigma_tt: &Array2<f64>,
    sigma_it: &Array2<f64>,
    config: &RaissConfig,
) -> RaissResult {
    let u = sigma_it.nrows();

    let pinv_result = symmetric_pinv(sigma_tt, config.lambda, config.rtol);
    let condition = condition_number(sigma_tt);

    let sigma_tt_inv = match &pinv_result {
        Ok(r) => Some(&r.pinv),
        Err(_) => None,
    };
    let correct_inversion = pinv_result.as_ref().map(|r| r.correct_inversion).unwrap_or(false);

    let mut imputed = Vec::with_capacity(u);
    for i in 0..u {
        let row = sigma_it.row(i);
        let ld_score = row.iter().map(|x| x * x).sum::<f64>();

        let sigma_tt_inv = match sigma_tt_inv {
            Some(inv) => inv,
            None => {
                imputed.push(ImputedVariant {
                    mu: None,
                    var: config.lambda + 1.0,
                    r_squared: 0.0,
                    ld_score,
                });
                continue;
            }
        };

        // mu_i = sigma_it[i, :] . sigma_tt_inv . z_t
        let weights = sigma_tt_inv.dot(&row.to_owned());
        let mu_raw = weights.dot(z_t);

        // var_i = (1 + lambda) - sum_jk sigma_it[i,j] sigma_tt_inv[j,k] sigma_it[i,k]
        let quad = row.dot(&sigma_tt_inv.dot(&row.to_owned()));
        let var_raw = (1.0 + config.lambda) - quad;
        let var = var_raw.max(0.0).min(1.0 + config.lambda);

        let r_squared = 1.0 - var / (1.0 + config.lambda);
        let mu = if r_squared > 0.0 {
            Some(mu_raw / r_squared.sqrt())
        } else {
            None
        };

        imputed.push(ImputedVariant {
            mu,
            var,
            r_squared,
            ld_score,
        });
    }

    RaissResult {
        imputed,
        condition_number: condition,
        correct_inversion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_ld_yields_zero_mean_and_baseline_variance() {
        let z_t = Array1::from(vec![2.0, -1.0]);
        let sigma_tt = Array2::eye(2);
        let sigma_it = Array2::<f64>::zeros((3, 2));
        let config = RaissConfig::default();

        let result = impute(&z_t, &sigma_tt, &sigma_it, &config);
        assert_eq!(result.imputed.len(), 3);
        for variant in &result.imputed {
            assert_relative_eq!(variant.mu.unwrap(), 0.0, epsilon = 1e-9);
            assert_relative_eq!(variant.var, 1.0 + config.lambda, epsilon = 1e-9);
        }
    }

    #[test]
    fn perfectly_correlated_variant_recovers_observed_z() {
        let z_t = Array1::from(vec![3.0]);
        let sigma_tt = Array2::eye(1);
        let sigma_it = Array2::from_shape_vec((1, 1), vec![1.0]).unwrap();
        let result = impute(&z_t, &sigma_tt, &sigma_it, &RaissConfig::default());
        assert_relative_eq!(result.imputed[0].mu.unwrap(), 3.0, epsilon = 1e-6);
    }
}
