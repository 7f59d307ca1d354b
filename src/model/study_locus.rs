// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// One tagged variant within a credible set / locus window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagVariant {
    pub variant_id: String,
    pub posterior_probability: Option<f64>,
    pub log_abf: Option<f64>,
    pub beta: Option<f64>,
    pub standard_error: Option<f64>,
    pub r2_overall: Option<f64>,
}

/// Quality-control flags accumulated on a `StudyLocus`. Flags are additive:
/// once raised, nothing in this crate clears one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumIter, Serialize, Deserialize)]
pub enum QualityControl {
    MhcRegion,
    UnsupportedChromosome,
    UnknownStudy,
    SubsignificantFlag,
    PipOutOfRange,
    LowPurity,
    RedundantPicsTopHit,
    ExplainedBySusie,
    LdPanelIncomplete,
    NumericFailure,
}

/// Confidence assigned by `CredibleSetQc::assign_confidence`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A detected independent association peak, optionally carrying a fine-mapped
/// credible set in `locus`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyLocus {
    pub study_locus_id: u64,
    pub study_id: String,
    pub lead_variant_id: String,
    pub chromosome: String,
    pub position: u64,
    pub p_value_mantissa: f64,
    pub p_value_exponent: i32,
    pub beta: Option<f64>,
    pub standard_error: Option<f64>,
    pub locus: Vec<TagVariant>,
    pub quality_controls: Vec<QualityControl>,
    pub confidence: Option<Confidence>,
}

impl StudyLocus {
    /// `studyLocusId` is a stable 64-bit hash of `(studyId, leadVariantId)`,
    /// matching the "stable studyLocusId (64-bit hash of study+lead variant)"
    /// data-model invariant.
    pub fn compute_id(study_id: &str, lead_variant_id: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        study_id.hash(&mut hasher);
        lead_variant_id.hash(&mut hasher);
        hasher.finish()
    }

    pub fn new(
        study_id: impl Into<String>,
        lead_variant_id: impl Into<String>,
        chromosome: impl Into<String>,
        position: u64,
        p_value_mantissa: f64,
        p_value_exponent: i32,
    ) -> Self {
        let study_id = study_id.into();
        let lead_variant_id = lead_variant_id.into();
        let study_locus_id = Self::compute_id(&study_id, &lead_variant_id);
        StudyLocus {
            study_locus_id,
            study_id,
            lead_variant_id,
            chromosome: chromosome.into(),
            position,
            p_value_mantissa,
            p_value_exponent,
            beta: None,
            standard_error: None,
            locus: Vec::new(),
            quality_controls: Vec::new(),
            confidence: None,
        }
    }

    pub fn p_value(&self) -> f64 {
        self.p_value_mantissa * 10f64.powi(self.p_value_exponent)
    }

    pub fn flag(&mut self, qc: QualityControl) {
        if !self.quality_controls.contains(&qc) {
            self.quality_controls.push(qc);
        }
    }

    pub fn has_flag(&self, qc: QualityControl) -> bool {
        self.quality_controls.contains(&qc)
    }

    /// `Σ posteriorProbability` over `locus`, used by the PIP-sum invariant
    /// and the `PIP_OUT_OF_RANGE` flag.
    pub fn pip_sum(&self) -> f64 {
        self.locus
            .iter()
            .filter_map(|t| t.posterior_probability)
            .sum()
    }

    /// Lead variant must be a member of `locus` once fine-mapped; true
    /// vacuously before fine-mapping (empty `locus`).
    pub fn lead_is_member(&self) -> bool {
        self.locus.is_empty() || self.locus.iter().any(|t| t.variant_id == self.lead_variant_id)
    }
}
