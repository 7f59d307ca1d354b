// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use serde_derive::{Deserialize, Serialize};

use crate::model::study_locus::StudyLocus;

/// One row of a `OverlapPair`: the ABF/posterior-probability values the two
/// loci report for a tag variant they share. Either side may be absent when
/// only one locus reports the tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlapRow {
    pub tag_variant_id: String,
    pub left_log_abf: Option<f64>,
    pub right_log_abf: Option<f64>,
    pub left_posterior_probability: Option<f64>,
    pub right_posterior_probability: Option<f64>,
}

/// Two `StudyLocus` entries that share at least one tag variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlapPair {
    pub left_study_locus_id: u64,
    pub right_study_locus_id: u64,
    pub rows: Vec<OverlapRow>,
}

impl OverlapPair {
    /// Builds the overlap by joining two loci's tag lists on `variant_id`.
    /// Rows where neither side has a value are dropped.
    pub fn from_loci(left: &StudyLocus, right: &StudyLocus) -> Self {
        use std::collections::HashMap;

        let left_by_id: HashMap<&str, &crate::model::study_locus::TagVariant> =
            left.locus.iter().map(|t| (t.variant_id.as_str(), t)).collect();
        let right_by_id: HashMap<&str, &crate::model::study_locus::TagVariant> =
            right.locus.iter().map(|t| (t.variant_id.as_str(), t)).collect();

        let mut ids: Vec<&str> = left_by_id
            .keys()
            .chain(right_by_id.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let rows = ids
            .into_iter()
            .filter_map(|id| {
                let l = left_by_id.get(id);
                let r = right_by_id.get(id);
                if l.is_none() && r.is_none() {
                    return None;
                }
                Some(OverlapRow {
                    tag_variant_id: id.to_string(),
                    left_log_abf: l.and_then(|t| t.log_abf),
                    right_log_abf: r.and_then(|t| t.log_abf),
                    left_posterior_probability: l.and_then(|t| t.posterior_probability),
                    right_posterior_probability: r.and_then(|t| t.posterior_probability),
                })
            })
            .collect();

        OverlapPair {
            left_study_locus_id: left.study_locus_id,
            right_study_locus_id: right.study_locus_id,
            rows,
        }
    }
}
