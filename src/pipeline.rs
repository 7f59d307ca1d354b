// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Orchestrates the per-locus flow: clump -> (optionally) fine-map -> QC ->
//! colocalise. `process_locus` is the pure, single-locus entry point the
//! concurrency model calls out — callers may drive it from a thread pool or
//! across a cluster, since it touches no shared mutable state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array1;

use crate::coloc::ColocPriors;
use crate::errors::{Error, KernelResult};
use crate::ld::LdStore;
use crate::model::credible_set::{CredibleSet, CredibleSetMember};
use crate::model::study_index::StudyIndex;
use crate::model::study_locus::{QualityControl, StudyLocus};
use crate::qc::{inter_locus_clump, run_qc, QcConfig};
use crate::raiss::RaissConfig;
use crate::susie::{susie_inf, SusieConfig};

/// Replaces the module-scope mutable Spark/Hail session of the system this
/// crate's algorithms were distilled from: one explicit, cheaply-clonable
/// value threaded through every entry point, carrying per-run configuration
/// and the cancellation signal.
#[derive(Clone)]
pub struct ComputeContext {
    pub coloc_priors: ColocPriors,
    pub raiss_config: RaissConfig,
    pub susie_config: SusieConfig,
    pub qc_config: QcConfig,
    pub cancel: Arc<AtomicBool>,
}

impl Default for ComputeContext {
    fn default() -> Self {
        ComputeContext {
            coloc_priors: ColocPriors::default(),
            raiss_config: RaissConfig::default(),
            susie_config: SusieConfig::default(),
            qc_config: QcConfig::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Fine-maps one already-clumped locus against the LD store. Pure: it reads
/// `locus` and `ld_store` and returns a value, performing no I/O beyond the
/// opaque `submatrix` call. Safe to call concurrently across loci sharing one
/// `ld_store` and one `ComputeContext`.
pub fn process_locus(locus: &StudyLocus, ld_store: &dyn LdStore, ctx: &ComputeContext) -> KernelResult<CredibleSet> {
    if locus.locus.is_empty() {
        return KernelResult::Fatal(Error::Fatal {
            msg: "process_locus requires a locus window populated by the clumper".into(),
        });
    }

    let mut idxs = Vec::with_capacity(locus.locus.len());
    for tag in &locus.locus {
        match ld_store.lookup(&tag.variant_id) {
            Ok(i) => idxs.push(i),
            Err(e) => return KernelResult::Recoverable(e),
        }
    }

    let mut order: Vec<usize> = (0..idxs.len()).collect();
    order.sort_by_key(|&i| idxs[i]);
    let sorted_idxs: Vec<usize> = order.iter().map(|&i| idxs[i]).collect();
    let sorted_variant_ids: Vec<&str> = order.iter().map(|&i| locus.locus[i].variant_id.as_str()).collect();
    let sorted_z: Vec<f64> = order
        .iter()
        .map(|&i| {
            let tag = &locus.locus[i];
            let beta = tag.beta.unwrap_or(0.0);
            let se = tag.standard_error.unwrap_or(1.0);
            if se > 0.0 {
                beta / se
            } else {
                0.0
            }
        })
        .collect();

    let ld = ld_store.submatrix(&sorted_idxs);
    let z = Array1::from(sorted_z);

    let susie_result = susie_inf(&z, &ld, &ctx.susie_config, &ctx.cancel);

    if susie_result.cancelled {
        return KernelResult::Recoverable(Error::Cancelled);
    }

    let members = sorted_variant_ids
        .iter()
        .enumerate()
        .map(|(j, variant_id)| {
            let credible_set_indices = susie_result
                .credible_sets
                .iter()
                .enumerate()
                .filter(|(_, set)| set.contains(&j))
                .map(|(l, _)| l)
                .collect();
            CredibleSetMember {
                variant_id: variant_id.to_string(),
                pip: susie_result.pip[j],
                credible_set_indices,
            }
        })
        .collect();

    KernelResult::Ok(CredibleSet {
        study_locus_id: locus.study_locus_id,
        members,
        credible_sets: susie_result.credible_sets,
        lbf_variable: susie_result.lbf_variable,
        cancelled: false,
    })
}

fn apply_credible_set(locus: &mut StudyLocus, credible_set: CredibleSet) {
    let pip_by_variant: HashMap<String, f64> = credible_set
        .members
        .into_iter()
        .map(|m| (m.variant_id, m.pip))
        .collect();
    for tag in locus.locus.iter_mut() {
        if let Some(&pip) = pip_by_variant.get(&tag.variant_id) {
            tag.posterior_probability = Some(pip);
        }
    }
}

/// Drives the whole per-study flow: fine-map every already-clumped locus,
/// run QC, then (if configured) drop loci that clump away against a
/// stronger signal in the same study. Coarse-grained parallelism across
/// loci is left to the caller: each `process_locus` call is independent.
pub struct StudyLocusPipeline {
    pub ctx: ComputeContext,
}

impl StudyLocusPipeline {
    pub fn new(ctx: ComputeContext) -> Self {
        StudyLocusPipeline { ctx }
    }

    pub fn run(
        &self,
        mut loci: Vec<StudyLocus>,
        ld_store: &dyn LdStore,
        study_index: &HashMap<String, StudyIndex>,
    ) -> Vec<StudyLocus> {
        for locus in loci.iter_mut() {
            if self.ctx.cancel.load(Ordering::Relaxed) {
                break;
            }
            match process_locus(locus, ld_store, &self.ctx) {
                KernelResult::Ok(credible_set) => apply_credible_set(locus, credible_set),
                KernelResult::Recoverable(Error::LdPanelMiss { .. }) => {
                    locus.flag(QualityControl::LdPanelIncomplete)
                }
                KernelResult::Recoverable(Error::Cancelled) => break,
                KernelResult::Recoverable(_) => locus.flag(QualityControl::NumericFailure),
                KernelResult::Fatal(e) => panic!("fatal pipeline error: {}", e),
            }
        }

        run_qc(&mut loci, study_index, Some(ld_store), &self.ctx.qc_config);

        if self.ctx.qc_config.clump {
            loci = inter_locus_clump(loci, ld_store, self.ctx.qc_config.ld_min_r2);
        }

        loci
    }
}
