// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Window-based clumping: turning dense summary statistics into a sparse set
//! of independent association peaks.

use crate::model::study_locus::{StudyLocus, TagVariant};
use crate::model::summary::SummaryRecord;

/// Tuning parameters for [`clump`]. Defaults match commonly used GWAS
/// clumping settings.
#[derive(Clone, Debug)]
pub struct ClumpConfig {
    pub window_length: u64,
    pub p_significance: f64,
    pub p_baseline: f64,
    pub locus_window_length: Option<u64>,
}

impl Default for ClumpConfig {
    fn default() -> Self {
        ClumpConfig {
            window_length: 500_000,
            p_significance: 5e-8,
            p_baseline: 0.05,
            locus_window_length: None,
        }
    }
}

/// Clumps a single study's summary statistics, which must already be sorted
/// ascending by `(chromosome, position)` — clumping does not re-sort its
/// input, per the ordering guarantee the caller is required to uphold.
pub fn clump(records: &[SummaryRecord], config: &ClumpConfig) -> Vec<StudyLocus> {
    let mut peaks = Vec::new();

    let mut chrom_start = 0;
    while chrom_start < records.len() {
        let chromosome = &records[chrom_start].chromosome;
        let mut chrom_end = chrom_start;
        while chrom_end < records.len() && &records[chrom_end].chromosome == chromosome {
            chrom_end += 1;
        }
        peaks.extend(clump_chromosome(
            &records[chrom_start..chrom_end],
            config,
        ));
        chrom_start = chrom_end;
    }

    peaks
}

fn clump_chromosome(records: &[SummaryRecord], config: &ClumpConfig) -> Vec<StudyLocus> {
    let mut candidates: Vec<&SummaryRecord> = records
        .iter()
        .filter(|r| r.p_value() <= config.p_significance)
        .collect();

    // Strongest first; ties broken by smaller position, then lexicographically
    // smaller variant id.
    candidates.sort_by(|a, b| {
        a.p_value()
            .partial_cmp(&b.p_value())
            .unwrap()
            .then(a.position.cmp(&b.position))
            .then(a.variant_id.cmp(&b.variant_id))
    });

    let mut accepted_positions: Vec<u64> = Vec::new();
    let mut peaks = Vec::new();

    for record in candidates {
        let blocked = accepted_positions
            .iter()
            .any(|&p| record.position.abs_diff(p) <= config.window_length);
        if blocked {
            continue;
        }
        accepted_positions.push(record.position);

        let mut locus = StudyLocus::new(
            record.study_id.clone(),
            record.variant_id.clone(),
            record.chromosome.clone(),
            record.position,
            record.p_value_mantissa,
            record.p_value_exponent,
        );
        locus.beta = Some(record.beta);
        locus.standard_error = Some(record.standard_error);

        if let Some(locus_window) = config.locus_window_length {
            locus.locus = records
                .iter()
                .filter(|r| {
                    r.position.abs_diff(record.position) <= locus_window
                        && r.p_value() <= config.p_baseline
                })
                .map(|r| TagVariant {
                    variant_id: r.variant_id.clone(),
                    posterior_probability: None,
                    log_abf: None,
                    beta: Some(r.beta),
                    standard_error: Some(r.standard_error),
                    r2_overall: None,
                })
                .collect();
        }

        peaks.push(locus);
    }

    peaks.sort_by_key(|p| p.position);
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(variant_id: &str, position: u64, p: f64) -> SummaryRecord {
        let exponent = p.log10().floor() as i32;
        let mantissa = p / 10f64.powi(exponent);
        SummaryRecord {
            study_id: "S1".into(),
            variant_id: variant_id.into(),
            chromosome: "1".into(),
            position,
            p_value_mantissa: mantissa,
            p_value_exponent: exponent,
            beta: 0.1,
            standard_error: 0.02,
            effect_allele_frequency: None,
            sample_size: None,
        }
    }

    #[test]
    fn single_peak_clumping() {
        let records = vec![
            record("1_100000_A_G", 100_000, 1e-20),
            record("1_100100_A_T", 100_100, 1e-5),
            record("1_400000_C_G", 400_000, 1e-6),
        ];
        let peaks = clump(&records, &ClumpConfig::default());
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].lead_variant_id, "1_100000_A_G");
    }

    #[test]
    fn peaks_further_apart_than_window_both_survive() {
        let records = vec![
            record("1_100000_A_G", 100_000, 1e-20),
            record("1_900000_C_G", 900_000, 1e-10),
        ];
        let peaks = clump(&records, &ClumpConfig::default());
        assert_eq!(peaks.len(), 2);
    }

    #[test]
    fn clumping_is_idempotent() {
        let records = vec![
            record("1_100000_A_G", 100_000, 1e-20),
            record("1_100100_A_T", 100_100, 1e-5),
            record("1_900000_C_G", 900_000, 1e-10),
        ];
        let config = ClumpConfig::default();
        let first = clump(&records, &config);

        let as_records: Vec<SummaryRecord> = first
            .iter()
            .map(|sl| record(&sl.lead_variant_id, sl.position, sl.p_value()))
            .collect();
        let second = clump(&as_records, &config);

        let first_ids: Vec<&str> = first.iter().map(|p| p.lead_variant_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|p| p.lead_variant_id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
