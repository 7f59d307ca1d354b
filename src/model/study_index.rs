// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumString, IntoStaticStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum StudyType {
    Gwas,
    Eqtl,
    Pqtl,
    Sqtl,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySample {
    pub ancestry: String,
    pub sample_size: u64,
}

/// Per-study metadata the QC layer consults to resolve `UNKNOWN_STUDY` and to
/// map reported ancestries onto the LD reference panel's population labels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyIndex {
    pub study_id: String,
    pub study_type: StudyType,
    pub trait_from_source: String,
    pub trait_from_source_mapped_ids: Vec<String>,
    pub discovery_samples: Vec<DiscoverySample>,
    pub has_sumstats: bool,
    pub quality_controls: Vec<String>,
}

lazy_static! {
    /// Static ancestry-string -> LD-reference-population mapping. Mirrors the
    /// `gwas_population_2_LD_panel_map.json` table the ingest layer loads:
    /// coarse continental ancestry labels collapse onto the 1000-Genomes-style
    /// super-populations used by the LD panel.
    static ref ANCESTRY_TO_LD_POPULATION: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("European", "EUR");
        m.insert("African", "AFR");
        m.insert("East Asian", "EAS");
        m.insert("South Asian", "SAS");
        m.insert("Asian", "EAS");
        m.insert("American", "AMR");
        m.insert("Hispanic or Latin American", "AMR");
        m.insert("Mixed", "EUR");
        m.insert("NR", "EUR");
        m
    };
}

fn map_ancestry_to_ld_population(ancestry: &str) -> &'static str {
    ANCESTRY_TO_LD_POPULATION
        .get(ancestry.trim())
        .copied()
        .unwrap_or("EUR")
}

impl StudyIndex {
    /// Splits multi-ancestry sample records (`"European, African, Asian"`) on
    /// `,`, maps each token to an LD population and divides the sample count
    /// evenly (integer division) across tokens, then aggregates per
    /// population. Mirrors
    /// `StudyIndex._aggregate_samples_by_ancestry` / `_map_ancestries_to_ld_population`.
    pub fn aggregate_samples_by_ld_population(&self) -> HashMap<&'static str, u64> {
        let mut totals: HashMap<&'static str, u64> = HashMap::new();
        for sample in &self.discovery_samples {
            let tokens: Vec<&str> = sample.ancestry.split(',').map(str::trim).collect();
            if tokens.is_empty() {
                continue;
            }
            let share = sample.sample_size / tokens.len() as u64;
            for token in tokens {
                let population = map_ancestry_to_ld_population(token);
                *totals.entry(population).or_insert(0) += share;
            }
        }
        totals
    }

    /// Relative sample size per LD population, used when choosing which
    /// reference panel to query for a multi-ancestry study.
    pub fn relative_sample_size_by_ld_population(&self) -> HashMap<&'static str, f64> {
        let totals = self.aggregate_samples_by_ld_population();
        let grand_total: u64 = totals.values().sum();
        if grand_total == 0 {
            return HashMap::new();
        }
        totals
            .into_iter()
            .map(|(pop, n)| (pop, n as f64 / grand_total as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_divides_multi_ancestry_samples() {
        let si = StudyIndex {
            study_id: "GCST001".into(),
            study_type: StudyType::Gwas,
            trait_from_source: "height".into(),
            trait_from_source_mapped_ids: vec![],
            discovery_samples: vec![DiscoverySample {
                ancestry: "European, African, Asian".into(),
                sample_size: 300,
            }],
            has_sumstats: true,
            quality_controls: vec![],
        };
        let totals = si.aggregate_samples_by_ld_population();
        assert_eq!(totals.get("EUR"), Some(&100));
        assert_eq!(totals.get("AFR"), Some(&100));
        assert_eq!(totals.get("EAS"), Some(&100));
    }
}
