// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use serde_derive::{Deserialize, Serialize};

use crate::errors::Error;

/// A single-variant association record from a GWAS or molecular-QTL study.
///
/// `pValue = pValueMantissa * 10^pValueExponent`, kept split rather than as a
/// single `f64` so that extremely small p-values (down to the exponent range,
/// not the mantissa's precision) survive round-tripping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub study_id: String,
    pub variant_id: String,
    pub chromosome: String,
    pub position: u64,
    pub p_value_mantissa: f64,
    pub p_value_exponent: i32,
    pub beta: f64,
    pub standard_error: f64,
    pub effect_allele_frequency: Option<f64>,
    pub sample_size: Option<u64>,
}

impl SummaryRecord {
    pub fn p_value(&self) -> f64 {
        self.p_value_mantissa * 10f64.powi(self.p_value_exponent)
    }

    /// Validates the record against the declared schema, returning the first
    /// violation found. Called at ingest so that invalid records are dropped
    /// or redirected before they reach the numeric kernels.
    pub fn validate(&self) -> Result<(), Error> {
        if !(1.0..10.0).contains(&self.p_value_mantissa) {
            return Err(Error::InputSchema {
                record: self.variant_id.clone(),
                field: "p_value_mantissa".into(),
            });
        }
        if self.p_value_exponent > 0 {
            return Err(Error::InputSchema {
                record: self.variant_id.clone(),
                field: "p_value_exponent".into(),
            });
        }
        if self.standard_error.is_nan() || self.beta.is_nan() {
            return Err(Error::InputSchema {
                record: self.variant_id.clone(),
                field: "beta/standard_error".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> SummaryRecord {
        SummaryRecord {
            study_id: "GCST001".into(),
            variant_id: "1_1_A_G".into(),
            chromosome: "1".into(),
            position: 1,
            p_value_mantissa: 5.0,
            p_value_exponent: -8,
            beta: 0.1,
            standard_error: 0.01,
            effect_allele_frequency: None,
            sample_size: None,
        }
    }

    #[test]
    fn p_value_reconstructed_from_mantissa_exponent() {
        let r = rec();
        assert!((r.p_value() - 5e-8).abs() < 1e-20);
    }

    #[test]
    fn rejects_mantissa_out_of_range() {
        let mut r = rec();
        r.p_value_mantissa = 11.0;
        assert!(r.validate().is_err());
    }
}
