// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The external CLI surface: one subcommand per kernel, reading/writing
//! newline-delimited JSON. This is thin plumbing only — no Parquet reader,
//! no schema registry, no workflow orchestration; see the crate root for why
//! those stay out of scope.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use ndarray::{Array1, Array2};
use serde_derive::{Deserialize, Serialize};
use structopt::StructOpt;

use crate::clump::{clump, ClumpConfig};
use crate::coloc::{coloc, ColocPriors};
use crate::errors::Error;
use crate::ld::{InMemoryLdStore, LdIndexEntry, LdVariantIndex};
use crate::model::overlap::OverlapPair;
use crate::model::study_index::StudyIndex;
use crate::model::study_locus::StudyLocus;
use crate::model::summary::SummaryRecord;
use crate::model::variant::Variant;
use crate::pipeline::{process_locus, ComputeContext};
use crate::qc::{run_qc, QcConfig};
use crate::raiss::{impute, RaissConfig};
use crate::susie::VarianceEstimator;

#[derive(StructOpt, Debug)]
#[structopt(name = "gentropy-core", about = "Statistical-genetics kernels for GWAS/QTL post-processing.")]
pub enum Cli {
    /// Window-based clumping (4.4).
    Clump {
        #[structopt(long)]
        sumstats: PathBuf,
        #[structopt(long)]
        out: PathBuf,
        #[structopt(long, default_value = "500000")]
        distance: u64,
        #[structopt(long = "p-sig", default_value = "0.00000005")]
        p_sig: f64,
        #[structopt(long = "p-base", default_value = "0.05")]
        p_base: f64,
        #[structopt(long = "locus-window")]
        locus_window: Option<u64>,
    },
    /// SuSiE-inf fine-mapping (4.7).
    Finemap {
        #[structopt(long)]
        sumstats: PathBuf,
        #[structopt(long)]
        ld: PathBuf,
        #[structopt(long)]
        out: PathBuf,
        #[structopt(long = "L", default_value = "10")]
        l: usize,
        #[structopt(long, default_value = "moments")]
        method: String,
    },
    /// COLOC colocalisation (4.6).
    Coloc {
        #[structopt(long)]
        left: PathBuf,
        #[structopt(long)]
        right: PathBuf,
        #[structopt(long)]
        out: PathBuf,
        #[structopt(long, default_value = "0.0001")]
        p1: f64,
        #[structopt(long, default_value = "0.0001")]
        p2: f64,
        #[structopt(long, default_value = "0.00001")]
        p12: f64,
    },
    /// RAISS z-score imputation (4.5).
    Impute {
        #[structopt(long)]
        observed: PathBuf,
        #[structopt(long)]
        ld: PathBuf,
        #[structopt(long)]
        out: PathBuf,
        #[structopt(long, default_value = "0.01")]
        lambda: f64,
        #[structopt(long, default_value = "0.01")]
        rtol: f64,
    },
    /// Credible-set QC (4.8).
    Qc {
        #[structopt(long)]
        credsets: PathBuf,
        #[structopt(long = "study-index")]
        study_index: PathBuf,
        #[structopt(long)]
        ld: Option<PathBuf>,
        #[structopt(long)]
        out: PathBuf,
        #[structopt(long)]
        invalid: Option<PathBuf>,
    },
}

/// On-disk JSON shape for an LD panel handed to `finemap`/`impute`/`qc`:
/// a flat list of variant ids alongside their dense correlation matrix.
#[derive(Serialize, Deserialize)]
struct LdPanelFile {
    variant_ids: Vec<String>,
    matrix: Vec<Vec<f64>>,
}

/// On-disk JSON shape for `impute`'s observed/unobserved LD blocks.
#[derive(Serialize, Deserialize)]
struct ImputeInputFile {
    z_t: Vec<f64>,
    sigma_tt: Vec<Vec<f64>>,
    sigma_it: Vec<Vec<f64>>,
}

/// Mirrors the error-handling design's exit-code contract: every non-zero
/// outcome carries the error kind that produced it.
#[derive(Debug)]
pub enum CliError {
    InputSchema(anyhow::Error),
    LdPanelMiss(anyhow::Error),
    Numerical(anyhow::Error),
    Cancelled,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InputSchema(_) => 2,
            CliError::LdPanelMiss(_) => 3,
            CliError::Numerical(_) => 4,
            CliError::Cancelled => 5,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::InputSchema(e) => write!(f, "input schema error: {}", e),
            CliError::LdPanelMiss(e) => write!(f, "LD panel error: {}", e),
            CliError::Numerical(e) => write!(f, "numerical error: {}", e),
            CliError::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn read_ndjson<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<Vec<T>, CliError> {
    let file = File::open(path).map_err(|e| CliError::InputSchema(e.into()))?;
    BufReader::new(file)
        .lines()
        .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
        .map(|line| {
            let line = line.map_err(|e| CliError::InputSchema(e.into()))?;
            serde_json::from_str(&line).map_err(|e| CliError::InputSchema(e.into()))
        })
        .collect()
}

fn write_ndjson<T: serde::Serialize>(path: &PathBuf, items: &[T]) -> Result<(), CliError> {
    let mut file = File::create(path).map_err(|e| CliError::InputSchema(e.into()))?;
    for item in items {
        let line = serde_json::to_string(item).map_err(|e| CliError::InputSchema(e.into()))?;
        writeln!(file, "{}", line).map_err(|e| CliError::InputSchema(e.into()))?;
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, CliError> {
    let file = File::open(path).map_err(|e| CliError::InputSchema(e.into()))?;
    serde_json::from_reader(file).map_err(|e| CliError::InputSchema(e.into()))
}

fn load_ld_store(path: &PathBuf) -> Result<InMemoryLdStore, CliError> {
    let panel: LdPanelFile = read_json(path)?;
    let n = panel.variant_ids.len();
    let mut matrix = Array2::<f64>::eye(n);
    for (i, row) in panel.matrix.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            matrix[[i, j]] = *value;
        }
    }
    let entries = panel
        .variant_ids
        .iter()
        .enumerate()
        .map(|(idx, vid)| {
            let parts: Vec<&str> = vid.split('_').collect();
            let variant = if parts.len() == 4 {
                Variant::new(parts[0], parts[1].parse().unwrap_or(0), parts[2], parts[3])
            } else {
                Variant::new(vid.as_str(), 0, "N", "N")
            };
            LdIndexEntry { variant, idx }
        })
        .collect();
    Ok(InMemoryLdStore::new(LdVariantIndex::new(entries), matrix))
}

pub fn run(opt: Cli) -> Result<(), CliError> {
    match opt {
        Cli::Clump {
            sumstats,
            out,
            distance,
            p_sig,
            p_base,
            locus_window,
        } => {
            let records: Vec<SummaryRecord> = read_ndjson(&sumstats)?;
            for record in &records {
                record
                    .validate()
                    .map_err(|e: Error| CliError::InputSchema(anyhow::anyhow!(e)))?;
            }
            let config = ClumpConfig {
                window_length: distance,
                p_significance: p_sig,
                p_baseline: p_base,
                locus_window_length: locus_window,
            };
            let peaks = clump(&records, &config);
            write_ndjson(&out, &peaks)
        }

        Cli::Finemap {
            sumstats,
            ld,
            out,
            l,
            method,
        } => {
            let records: Vec<SummaryRecord> = read_ndjson(&sumstats)?;
            let store = load_ld_store(&ld)?;
            let variance_estimator = match method.as_str() {
                "MLE" | "mle" => VarianceEstimator::Mle,
                _ => VarianceEstimator::Moments,
            };

            let mut ctx = ComputeContext::default();
            ctx.susie_config.num_effects = l;
            ctx.susie_config.variance_estimator = variance_estimator;

            let mut locus = StudyLocus::new(
                records.first().map(|r| r.study_id.clone()).unwrap_or_default(),
                records.first().map(|r| r.variant_id.clone()).unwrap_or_default(),
                records.first().map(|r| r.chromosome.clone()).unwrap_or_default(),
                records.first().map(|r| r.position).unwrap_or(0),
                records.first().map(|r| r.p_value_mantissa).unwrap_or(1.0),
                records.first().map(|r| r.p_value_exponent).unwrap_or(0),
            );
            locus.locus = records
                .iter()
                .map(|r| crate::model::study_locus::TagVariant {
                    variant_id: r.variant_id.clone(),
                    posterior_probability: None,
                    log_abf: None,
                    beta: Some(r.beta),
                    standard_error: Some(r.standard_error),
                    r2_overall: None,
                })
                .collect();

            match process_locus(&locus, &store, &ctx) {
                crate::errors::KernelResult::Ok(cs) => write_ndjson(&out, &[cs]),
                crate::errors::KernelResult::Recoverable(Error::LdPanelMiss { variant }) => {
                    Err(CliError::LdPanelMiss(anyhow::anyhow!(Error::LdPanelMiss { variant })))
                }
                crate::errors::KernelResult::Recoverable(Error::Cancelled) => Err(CliError::Cancelled),
                crate::errors::KernelResult::Recoverable(e) => Err(CliError::Numerical(anyhow::anyhow!(e))),
                crate::errors::KernelResult::Fatal(e) => Err(CliError::Numerical(anyhow::anyhow!(e))),
            }
        }

        Cli::Coloc {
            left,
            right,
            out,
            p1,
            p2,
            p12,
        } => {
            let left_locus: StudyLocus = read_json(&left)?;
            let right_locus: StudyLocus = read_json(&right)?;
            let overlap = OverlapPair::from_loci(&left_locus, &right_locus);
            let result = coloc(&overlap, &ColocPriors { p1, p2, p12 });
            write_ndjson(&out, &[result])
        }

        Cli::Impute {
            observed,
            ld: _ld,
            out,
            lambda,
            rtol,
        } => {
            // The LD panel for `impute` is embedded in `observed` (sigma_tt /
            // sigma_it); `--ld` is accepted for surface symmetry with the
            // other subcommands but unused here.
            let input: ImputeInputFile = read_json(&observed)?;
            let z_t = Array1::from(input.z_t);
            let sigma_tt = vec_to_array2(&input.sigma_tt);
            let sigma_it = vec_to_array2(&input.sigma_it);
            let config = RaissConfig { lambda, rtol };
            let result = impute(&z_t, &sigma_tt, &sigma_it, &config);
            let rows: Vec<_> = result
                .imputed
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "mu": v.mu,
                        "var": v.var,
                        "r_squared": v.r_squared,
                        "ld_score": v.ld_score,
                    })
                })
                .collect();
            write_ndjson(&out, &rows)
        }

        Cli::Qc {
            credsets,
            study_index,
            ld,
            out,
            invalid,
        } => {
            let mut loci: Vec<StudyLocus> = read_ndjson(&credsets)?;
            let study_index_records: Vec<StudyIndex> = read_ndjson(&study_index)?;
            let study_index_map: HashMap<String, StudyIndex> = study_index_records
                .into_iter()
                .map(|s| (s.study_id.clone(), s))
                .collect();
            let store = ld.map(|p| load_ld_store(&p)).transpose()?;

            run_qc(
                &mut loci,
                &study_index_map,
                store.as_ref().map(|s| s as &dyn crate::ld::LdStore),
                &QcConfig::default(),
            );

            let (valid, invalid_loci): (Vec<_>, Vec<_>) = loci.into_iter().partition(|l| l.quality_controls.is_empty());
            write_ndjson(&out, &valid)?;
            if let Some(invalid_path) = invalid {
                write_ndjson(&invalid_path, &invalid_loci)?;
            }
            Ok(())
        }
    }
}

fn vec_to_array2(v: &[Vec<f64>]) -> Array2<f64> {
    let rows = v.len();
    let cols = v.first().map(|r| r.len()).unwrap_or(0);
    let mut out = Array2::<f64>::zeros((rows, cols));
    for (i, row) in v.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            out[[i, j]] = *value;
        }
    }
    out
}
