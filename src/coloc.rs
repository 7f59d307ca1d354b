// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Bayesian colocalisation: COLOC's single-causal-variant model and the
//! eCAVIAR posterior-probability-product statistic, both computed over a
//! pair of overlapping credible sets.

use crate::model::coloc_result::{ColocMethod, ColocResult};
use crate::model::overlap::OverlapPair;
use crate::num_kernels::logsumexp;

#[derive(Clone, Copy, Debug)]
pub struct ColocPriors {
    pub p1: f64,
    pub p2: f64,
    pub p12: f64,
}

impl Default for ColocPriors {
    fn default() -> Self {
        ColocPriors {
            p1: 1e-4,
            p2: 1e-4,
            p12: 1e-5,
        }
    }
}

/// `log(exp(a) - exp(b))`, stable for `a >= b` via the shared-maximum trick.
/// Returns `-inf` when `a == b` (the quantity is exactly zero).
fn log_diff_exp(a: f64, b: f64) -> f64 {
    if (a - b).abs() < 1e-12 {
        return f64::NEG_INFINITY;
    }
    let m = a.max(b);
    let diff = (a - m).exp() - (b - m).exp();
    m + diff.ln()
}

/// Single-causal-variant Bayesian colocalisation (COLOC). `overlap` supplies
/// the per-variant log Bayes factors on both sides; missing values are
/// treated as zero evidence.
pub fn coloc(overlap: &OverlapPair, priors: &ColocPriors) -> ColocResult {
    let left: Vec<f64> = overlap.rows.iter().map(|r| r.left_log_abf.unwrap_or(0.0)).collect();
    let right: Vec<f64> = overlap.rows.iter().map(|r| r.right_log_abf.unwrap_or(0.0)).collect();
    let sum: Vec<f64> = left.iter().zip(right.iter()).map(|(l, r)| l + r).collect();

    let l1 = logsumexp(&left).unwrap_or(f64::NEG_INFINITY);
    let l2 = logsumexp(&right).unwrap_or(f64::NEG_INFINITY);
    let l12 = logsumexp(&sum).unwrap_or(f64::NEG_INFINITY);

    let l_h0 = 0.0_f64;
    let l_h1 = priors.p1.ln() + l1;
    let l_h2 = priors.p2.ln() + l2;
    let l_h3 = priors.p1.ln() + priors.p2.ln() + log_diff_exp(l1 + l2, l12);
    let l_h4 = priors.p12.ln() + l12;

    let log_posteriors = [l_h0, l_h1, l_h2, l_h3, l_h4];
    let denom = logsumexp(&log_posteriors).unwrap_or(f64::NEG_INFINITY);
    let h: Vec<f64> = log_posteriors.iter().map(|l| (l - denom).exp()).collect();

    ColocResult {
        left_study_locus_id: overlap.left_study_locus_id,
        right_study_locus_id: overlap.right_study_locus_id,
        coloc_n_vars: overlap.rows.len(),
        h0: Some(h[0]),
        h1: Some(h[1]),
        h2: Some(h[2]),
        h3: Some(h[3]),
        h4: Some(h[4]),
        clpp: None,
        method: ColocMethod::Coloc,
    }
}

/// eCAVIAR's colocalisation posterior probability: the sum, over shared
/// variants, of the product of each side's posterior inclusion probability.
pub fn ecaviar(overlap: &OverlapPair) -> ColocResult {
    let clpp: f64 = overlap
        .rows
        .iter()
        .map(|r| {
            r.left_posterior_probability.unwrap_or(0.0) * r.right_posterior_probability.unwrap_or(0.0)
        })
        .sum();

    ColocResult {
        left_study_locus_id: overlap.left_study_locus_id,
        right_study_locus_id: overlap.right_study_locus_id,
        coloc_n_vars: overlap.rows.len(),
        h0: None,
        h1: None,
        h2: None,
        h3: None,
        h4: None,
        clpp: Some(clpp),
        method: ColocMethod::ECaviar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::overlap::OverlapRow;
    use approx::assert_relative_eq;

    fn overlap_with(rows: Vec<OverlapRow>) -> OverlapPair {
        OverlapPair {
            left_study_locus_id: 1,
            right_study_locus_id: 2,
            rows,
        }
    }

    #[test]
    fn strong_shared_signal_favours_h4() {
        let overlap = overlap_with(vec![OverlapRow {
            tag_variant_id: "1_1_A_G".into(),
            left_log_abf: Some(10.3),
            right_log_abf: Some(10.5),
            left_posterior_probability: None,
            right_posterior_probability: None,
        }]);
        let result = coloc(&overlap, &ColocPriors::default());
        assert_relative_eq!(result.h4.unwrap(), 0.9993, epsilon = 1e-3);
        assert!(result.h0.unwrap() < 1e-3);
        assert!(result.h1.unwrap() < 1e-3);
        assert!(result.h2.unwrap() < 1e-3);
        assert!(result.h3.unwrap() < 1e-3);
    }

    #[test]
    fn one_sided_signal_favours_h1() {
        let overlap = overlap_with(vec![OverlapRow {
            tag_variant_id: "1_1_A_G".into(),
            left_log_abf: Some(18.3),
            right_log_abf: Some(0.01),
            left_posterior_probability: None,
            right_posterior_probability: None,
        }]);
        let result = coloc(&overlap, &ColocPriors::default());
        assert_relative_eq!(result.h1.unwrap(), 0.908, epsilon = 1e-3);
        assert_relative_eq!(result.h4.unwrap(), 0.092, epsilon = 1e-3);
    }

    #[test]
    fn all_hypotheses_sum_to_one() {
        let overlap = overlap_with(vec![
            OverlapRow {
                tag_variant_id: "1_1_A_G".into(),
                left_log_abf: Some(3.0),
                right_log_abf: Some(1.2),
                left_posterior_probability: None,
                right_posterior_probability: None,
            },
            OverlapRow {
                tag_variant_id: "1_2_A_G".into(),
                left_log_abf: Some(0.5),
                right_log_abf: Some(4.0),
                left_posterior_probability: None,
                right_posterior_probability: None,
            },
        ]);
        let result = coloc(&overlap, &ColocPriors::default());
        let total = result.h0.unwrap() + result.h1.unwrap() + result.h2.unwrap() + result.h3.unwrap() + result.h4.unwrap();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn ecaviar_clpp_matches_worked_example() {
        let overlap = overlap_with(vec![
            OverlapRow {
                tag_variant_id: "1_1_A_G".into(),
                left_log_abf: None,
                right_log_abf: None,
                left_posterior_probability: Some(0.5),
                right_posterior_probability: Some(0.5),
            },
            OverlapRow {
                tag_variant_id: "1_2_A_G".into(),
                left_log_abf: None,
                right_log_abf: None,
                left_posterior_probability: Some(0.4),
                right_posterior_probability: Some(0.4),
            },
            OverlapRow {
                tag_variant_id: "1_3_A_G".into(),
                left_log_abf: None,
                right_log_abf: None,
                left_posterior_probability: Some(0.1),
                right_posterior_probability: Some(0.1),
            },
        ]);
        let result = ecaviar(&overlap);
        assert_relative_eq!(result.clpp.unwrap(), 0.42, epsilon = 1e-9);
    }
}
