// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Credible-set quality control: purity, P-value and LD-clumping filters
//! applied downstream of fine-mapping, plus confidence assignment.

use std::collections::{HashMap, HashSet};

use crate::ld::LdStore;
use crate::model::study_index::StudyIndex;
use crate::model::study_locus::{Confidence, QualityControl, StudyLocus};

const MHC_CHROMOSOME: &str = "6";
const MHC_START: u64 = 25_700_000;
const MHC_END: u64 = 33_400_000;

fn supported_chromosomes() -> HashSet<String> {
    let mut set: HashSet<String> = (1..=22).map(|i| i.to_string()).collect();
    set.insert("X".to_string());
    set.insert("Y".to_string());
    set.insert("MT".to_string());
    set
}

#[derive(Clone, Debug)]
pub struct QcConfig {
    pub p_value_threshold: f64,
    pub purity_min_r2: f64,
    pub ld_min_r2: f64,
    pub clump: bool,
}

impl Default for QcConfig {
    fn default() -> Self {
        QcConfig {
            p_value_threshold: 5e-8,
            purity_min_r2: 0.01,
            ld_min_r2: 0.8,
            clump: true,
        }
    }
}

fn qc_mhc_region(locus: &mut StudyLocus) {
    if locus.chromosome == MHC_CHROMOSOME && locus.position >= MHC_START && locus.position <= MHC_END {
        locus.flag(QualityControl::MhcRegion);
    }
}

fn validate_chromosome_label(locus: &mut StudyLocus, supported: &HashSet<String>) {
    if !supported.contains(&locus.chromosome) {
        locus.flag(QualityControl::UnsupportedChromosome);
    }
}

fn validate_study(locus: &mut StudyLocus, study_index: &HashMap<String, StudyIndex>) {
    if !study_index.contains_key(&locus.study_id) {
        locus.flag(QualityControl::UnknownStudy);
    }
}

fn flag_subsignificant(locus: &mut StudyLocus, p_value_threshold: f64) {
    if locus.p_value() > p_value_threshold {
        locus.flag(QualityControl::SubsignificantFlag);
    }
}

/// Flags loci whose lead variant is a duplicate hit already reported for the
/// same study by another locus in the batch (the PICS-derived redundancy the
/// upstream pipeline dedupes). Processes loci in order, flagging the second
/// and later occurrences.
fn qc_redundant_top_hits_from_pics(loci: &mut [StudyLocus]) {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for locus in loci.iter_mut() {
        let key = (locus.study_id.clone(), locus.lead_variant_id.clone());
        if !seen.insert(key) {
            locus.flag(QualityControl::RedundantPicsTopHit);
        }
    }
}

/// Flags loci with no fine-mapped `locus` (i.e. not yet run through
/// `SusieInf`) whose lead variant already appears inside another, fine-mapped
/// locus's credible set for the same study.
fn qc_explained_by_susie(loci: &mut [StudyLocus]) {
    let fine_mapped_members: Vec<(String, HashSet<String>)> = loci
        .iter()
        .filter(|l| !l.locus.is_empty())
        .map(|l| {
            (
                l.study_id.clone(),
                l.locus.iter().map(|t| t.variant_id.clone()).collect(),
            )
        })
        .collect();

    for locus in loci.iter_mut() {
        if !locus.locus.is_empty() {
            continue;
        }
        let explained = fine_mapped_members
            .iter()
            .any(|(study_id, members)| study_id == &locus.study_id && members.contains(&locus.lead_variant_id));
        if explained {
            locus.flag(QualityControl::ExplainedBySusie);
        }
    }
}

/// Truncates `locus` to the smallest prefix (by descending posterior
/// probability) whose cumulative mass reaches the 95% credible interval.
/// Members already missing a posterior probability are dropped first.
fn filter_credible_set(locus: &mut StudyLocus) {
    let mut tags = std::mem::take(&mut locus.locus);
    tags.retain(|t| t.posterior_probability.is_some());
    tags.sort_by(|a, b| {
        b.posterior_probability
            .unwrap()
            .partial_cmp(&a.posterior_probability.unwrap())
            .unwrap()
    });

    let mut cumulative = 0.0;
    let mut kept = Vec::new();
    for tag in tags {
        if cumulative >= 0.95 {
            break;
        }
        cumulative += tag.posterior_probability.unwrap();
        kept.push(tag);
    }
    locus.locus = kept;
}

fn qc_abnormal_pips(locus: &mut StudyLocus, full_pip_sum: f64, lower: f64, upper: f64) {
    if full_pip_sum < lower || full_pip_sum > upper {
        locus.flag(QualityControl::PipOutOfRange);
    }
}

/// `LOW_PURITY`: requires an LD store to compute pairwise `r²` among the
/// kept tag variants. Loci lacking LD coverage for some tags are skipped
/// (they should already carry `LD_PANEL_INCOMPLETE` from the caller).
fn qc_purity(locus: &mut StudyLocus, ld_store: &dyn LdStore, purity_min_r2: f64) {
    if locus.locus.len() < 2 {
        return;
    }
    let idxs: Option<Vec<usize>> = locus
        .locus
        .iter()
        .map(|t| ld_store.index().lookup(&t.variant_id))
        .collect();
    let idxs = match idxs {
        Some(mut v) => {
            v.sort_unstable();
            v.dedup();
            v
        }
        None => return,
    };
    if idxs.len() < 2 {
        return;
    }
    let sub = ld_store.submatrix(&idxs);
    let mut min_r2 = f64::INFINITY;
    for i in 0..sub.nrows() {
        for j in (i + 1)..sub.ncols() {
            min_r2 = min_r2.min(sub[[i, j]] * sub[[i, j]]);
        }
    }
    if min_r2 < purity_min_r2 {
        locus.flag(QualityControl::LowPurity);
    }
}

fn assign_confidence(locus: &mut StudyLocus) {
    let no_flags = locus.quality_controls.is_empty();
    let pip_sum = locus.pip_sum();

    locus.confidence = Some(if no_flags && (0.99..=1.001).contains(&pip_sum) {
        Confidence::High
    } else if locus.quality_controls == [QualityControl::LowPurity] {
        Confidence::Medium
    } else {
        Confidence::Low
    });
}

/// Runs the full QC pipeline over a batch of loci, in the order the upstream
/// validation step uses: region/chromosome/study checks, PICS and SuSiE
/// redundancy checks, credible-interval filtering, PIP-range checks, purity
/// (if an LD store is supplied) and finally confidence assignment.
pub fn run_qc(
    loci: &mut [StudyLocus],
    study_index: &HashMap<String, StudyIndex>,
    ld_store: Option<&dyn LdStore>,
    config: &QcConfig,
) {
    let supported = supported_chromosomes();

    for locus in loci.iter_mut() {
        qc_mhc_region(locus);
        validate_chromosome_label(locus, &supported);
        validate_study(locus, study_index);
        flag_subsignificant(locus, config.p_value_threshold);
    }

    qc_redundant_top_hits_from_pics(loci);
    qc_explained_by_susie(loci);

    for locus in loci.iter_mut() {
        filter_credible_set(locus);
        let pip_sum = locus.pip_sum();
        qc_abnormal_pips(locus, pip_sum, 0.95, 1.0001);
        if let Some(store) = ld_store {
            qc_purity(locus, store, config.purity_min_r2);
        }
        assign_confidence(locus);
    }
}

/// Optional post-flagging step: drops loci whose lead variant has `r² ≥
/// ld_min_r2` with a *stronger* (smaller p-value) lead of the same study.
pub fn inter_locus_clump(loci: Vec<StudyLocus>, ld_store: &dyn LdStore, ld_min_r2: f64) -> Vec<StudyLocus> {
    let mut ordered = loci;
    ordered.sort_by(|a, b| a.p_value().partial_cmp(&b.p_value()).unwrap());

    let mut kept: Vec<StudyLocus> = Vec::new();
    'outer: for candidate in ordered {
        for stronger in &kept {
            if stronger.study_id != candidate.study_id {
                continue;
            }
            let i = match ld_store.lookup(&stronger.lead_variant_id) {
                Ok(i) => i,
                Err(_) => continue,
            };
            let j = match ld_store.lookup(&candidate.lead_variant_id) {
                Ok(j) => j,
                Err(_) => continue,
            };
            let sub = ld_store.submatrix(&{
                let mut v = [i, j];
                v.sort_unstable();
                v
            });
            let r2 = sub[[0, 1]] * sub[[0, 1]];
            if r2 >= ld_min_r2 {
                continue 'outer;
            }
        }
        kept.push(candidate);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::study_locus::TagVariant;

    #[test]
    fn flags_mhc_region() {
        let mut locus = StudyLocus::new("s1", "6_30000000_A_G", "6", 30_000_000, 1.0, -10);
        qc_mhc_region(&mut locus);
        assert!(locus.has_flag(QualityControl::MhcRegion));
    }

    #[test]
    fn flags_unsupported_chromosome() {
        let supported = supported_chromosomes();
        let mut locus = StudyLocus::new("s1", "chrUn_1_A_G", "chrUn", 1, 1.0, -10);
        validate_chromosome_label(&mut locus, &supported);
        assert!(locus.has_flag(QualityControl::UnsupportedChromosome));
    }

    #[test]
    fn high_confidence_requires_no_flags_and_near_unit_pip() {
        let mut locus = StudyLocus::new("s1", "1_1_A_G", "1", 1, 5.0, -10);
        locus.locus = vec![TagVariant {
            variant_id: "1_1_A_G".into(),
            posterior_probability: Some(0.999),
            log_abf: None,
            beta: None,
            standard_error: None,
            r2_overall: None,
        }];
        assign_confidence(&mut locus);
        assert_eq!(locus.confidence, Some(Confidence::High));
    }

    #[test]
    fn pip_sum_invariant_holds_after_filtering() {
        let mut locus = StudyLocus::new("s1", "1_1_A_G", "1", 1, 5.0, -10);
        locus.locus = vec![
            TagVariant {
                variant_id: "1_1_A_G".into(),
                posterior_probability: Some(0.6),
                log_abf: None,
                beta: None,
                standard_error: None,
                r2_overall: None,
            },
            TagVariant {
                variant_id: "1_2_A_G".into(),
                posterior_probability: Some(0.4),
                log_abf: None,
                beta: None,
                standard_error: None,
                r2_overall: None,
            },
        ];
        filter_credible_set(&mut locus);
        assert!(locus.pip_sum() >= 0.95 - 1e-9);
        assert!(locus.pip_sum() <= 1.0001);
    }

    /// `run_qc` must judge `PipOutOfRange` against the post-truncation sum,
    /// not the raw pre-filter sum: 20 tags at 0.1 each sum to 2.0 before
    /// filtering but `filter_credible_set` truncates to the first 10
    /// reaching 95% mass (sum 1.0), which is in range.
    #[test]
    fn abnormal_pip_check_uses_post_filter_sum_not_pre_filter_sum() {
        let mut locus = StudyLocus::new("s1", "1_1_A_G", "1", 1, 5.0, -10);
        locus.locus = (0..20)
            .map(|i| TagVariant {
                variant_id: format!("1_{}_A_G", i),
                posterior_probability: Some(0.1),
                log_abf: None,
                beta: None,
                standard_error: None,
                r2_overall: None,
            })
            .collect();

        let mut loci = vec![locus];
        run_qc(&mut loci, &HashMap::new(), None, &QcConfig::default());

        assert!(!loci[0].has_flag(QualityControl::PipOutOfRange));
    }
}
