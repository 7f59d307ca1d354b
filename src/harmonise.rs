// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-variant effect harmonisation: reconciling reported effect direction
//! against the reference allele (including palindromic and strand-flip
//! cases) and deriving z-scores and confidence intervals.

use crate::model::variant::Variant;
use crate::num_kernels::normal_isf;

/// Harmonised effect for one variant. `z` and `standard_error` are always
/// populated; `odds_ratio` is only set when the caller supplied one.
#[derive(Clone, Debug, PartialEq)]
pub struct HarmonisedEffect {
    pub variant_id: String,
    pub needs_harmonisation: bool,
    pub beta: f64,
    pub standard_error: f64,
    pub odds_ratio: Option<f64>,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub z: f64,
}

/// Harmonises one variant's reported effect.
///
/// `risk_allele` is the allele the effect was measured against. `odds_ratio`
/// and `ci_text` are optional — some sources report effects only on the OR
/// scale with a free-text confidence-interval description.
///
/// Returns `None` for invalid records: `p == 1`, `beta == 0` with no odds
/// ratio to recover it from, a zero/`NaN` standard error, or a zero z-score
/// (which would make the standard error undefined).
pub fn harmonise(
    p_value: f64,
    beta: f64,
    variant: &Variant,
    risk_allele: &str,
    odds_ratio: Option<f64>,
    ci_text: Option<&str>,
) -> Option<HarmonisedEffect> {
    if p_value == 1.0 || p_value.is_nan() {
        return None;
    }
    if beta == 0.0 && odds_ratio.is_none() {
        return None;
    }

    // Palindromic sites cannot be disambiguated; assumed to already target
    // the alt allele. Otherwise harmonisation is needed only when the risk
    // allele matches the reference (forward or reverse-complement strand).
    let needs_harmonisation = if variant.is_palindromic() {
        false
    } else {
        risk_allele == variant.reference_allele() || risk_allele == variant.reverse_complement_ref()
    };

    let ci_lower_text = ci_text.map(str::to_lowercase);

    let mut effective_beta = beta;
    if effective_beta == 0.0 {
        if let (Some(or), Some(text)) = (odds_ratio, &ci_lower_text) {
            if text.contains("increase") || text.contains("decrease") {
                effective_beta = or.ln();
            }
        }
    }

    let sign = if effective_beta.is_sign_negative() {
        -1.0
    } else {
        1.0
    };
    let mut z = sign * normal_isf(p_value / 2.0);
    let mut effective_or = odds_ratio;

    if needs_harmonisation {
        effective_beta = -effective_beta;
        z = -z;
        effective_or = effective_or.map(|or| 1.0 / or);
    }

    // The CI free-text direction is stated relative to the *reported* allele,
    // not the harmonised one, so it flips the sign on the opposite condition
    // from `needs_harmonisation` itself: "increase" confirms the flip already
    // applied above, "decrease" contradicts it and must be undone/applied.
    if let Some(text) = &ci_lower_text {
        let increase = text.contains("increase");
        let decrease = text.contains("decrease");
        if (increase && needs_harmonisation) || (decrease && !needs_harmonisation) {
            effective_beta = -effective_beta;
            z = -z;
        }
    }

    if z == 0.0 || z.is_nan() {
        return None;
    }

    let se = effective_beta.abs() / z.abs();
    if se == 0.0 || se.is_nan() {
        return None;
    }

    let (ci_lower, ci_upper) = match effective_or {
        Some(or) => {
            let log_or = or.ln();
            let half_width = 1.96 * log_or.abs() / z.abs();
            ((log_or - half_width).exp(), (log_or + half_width).exp())
        }
        None => (effective_beta - 1.96 * se, effective_beta + 1.96 * se),
    };

    Some(HarmonisedEffect {
        variant_id: variant.variant_id(),
        needs_harmonisation,
        beta: effective_beta,
        standard_error: se,
        odds_ratio: effective_or,
        ci_lower,
        ci_upper,
        z,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn palindromic_site_skips_harmonisation() {
        let variant = Variant::new("1", 1, "T", "A");
        let h = harmonise(0.04, 0.3, &variant, "T", None, None).unwrap();
        assert!(!h.needs_harmonisation);
        assert_relative_eq!(h.beta, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn risk_allele_matching_reference_flips_sign() {
        let variant = Variant::new("1", 1, "A", "G");
        let h = harmonise(0.04, 0.3, &variant, "A", None, None).unwrap();
        assert!(h.needs_harmonisation);
        assert_relative_eq!(h.beta, -0.3, epsilon = 1e-12);
    }

    #[test]
    fn recovered_z_agrees_with_standard_error_ratio() {
        let variant = Variant::new("1", 1, "A", "G");
        let h = harmonise(5e-8, 0.1, &variant, "G", None, None).unwrap();
        assert_relative_eq!(h.beta.abs() / h.standard_error, h.z.abs(), epsilon = 1e-9);
    }

    #[test]
    fn p_equal_to_one_is_dropped() {
        let variant = Variant::new("1", 1, "A", "G");
        assert!(harmonise(1.0, 0.1, &variant, "G", None, None).is_none());
    }

    #[test]
    fn decrease_text_flips_sign_only_when_not_otherwise_harmonised() {
        let variant = Variant::new("1", 1, "A", "G");
        let h = harmonise(0.04, 0.0, &variant, "G", Some(2.0), Some("will decrease risk")).unwrap();
        assert!(!h.needs_harmonisation);
        assert_relative_eq!(h.beta, -2.0_f64.ln(), epsilon = 1e-12);
    }
}
