// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumString, IntoStaticStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ColocMethod {
    #[strum(serialize = "COLOC")]
    Coloc,
    #[strum(serialize = "eCAVIAR")]
    ECaviar,
}

/// Result of pairwise colocalisation between two `StudyLocus` entries.
/// Invariant: `h0 + h1 + h2 + h3 + h4 == 1` up to `1e-9` (Coloc only; eCAVIAR
/// leaves `h0..h4` at `None` and reports only `clpp`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColocResult {
    pub left_study_locus_id: u64,
    pub right_study_locus_id: u64,
    pub coloc_n_vars: usize,
    pub h0: Option<f64>,
    pub h1: Option<f64>,
    pub h2: Option<f64>,
    pub h3: Option<f64>,
    pub h4: Option<f64>,
    pub clpp: Option<f64>,
    pub method: ColocMethod,
}
