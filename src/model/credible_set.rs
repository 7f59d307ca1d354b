// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use serde_derive::{Deserialize, Serialize};

/// Per-variant output artefact emitted by `SusieInf`: posterior inclusion
/// probability and the credible sets (by effect index) the variant belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredibleSetMember {
    pub variant_id: String,
    pub pip: f64,
    pub credible_set_indices: Vec<usize>,
}

/// The full fine-mapping result for one `StudyLocus`: one `CredibleSetMember`
/// per input variant, plus the per-effect credible sets and `lbf_variable`
/// matrix `SusieInf` produced them from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredibleSet {
    pub study_locus_id: u64,
    pub members: Vec<CredibleSetMember>,
    /// `credible_sets[l]` is the ordered index set for effect `l`.
    pub credible_sets: Vec<Vec<usize>>,
    /// `lbf_variable[l][j]` is the log Bayes factor of variant `j` under effect `l`.
    pub lbf_variable: Vec<Vec<f64>>,
    pub cancelled: bool,
}
