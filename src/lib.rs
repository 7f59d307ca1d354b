// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Statistical-genetics core for a GWAS / molecular-QTL post-processing
//! pipeline: window-based clumping, LD querying, effect harmonisation,
//! Bayesian colocalisation, SuSiE-inf fine-mapping, RAISS imputation and
//! credible-set quality control.
//!
//! The crate is a pure library; orchestration across loci, ingestion of raw
//! summary statistics and persistence are all caller concerns (see
//! `pipeline::process_locus` for the one entry point the concurrency model
//! is built around).

pub mod cli;
pub mod clump;
pub mod coloc;
pub mod errors;
pub mod harmonise;
pub mod ld;
pub mod model;
pub mod num_kernels;
pub mod pipeline;
pub mod qc;
pub mod raiss;
pub mod susie;
