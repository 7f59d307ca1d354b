// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// A single genomic variant, identified by `(chromosome, position, reference, alternate)`.
///
/// Immutable once constructed; alleles are uppercased on construction so that
/// `variant_id()` is stable regardless of how the caller cased its input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    chromosome: String,
    position: u64,
    reference_allele: String,
    alternate_allele: String,
}

impl Variant {
    pub fn new(
        chromosome: impl Into<String>,
        position: u64,
        reference_allele: impl Into<String>,
        alternate_allele: impl Into<String>,
    ) -> Self {
        Variant {
            chromosome: chromosome.into(),
            position,
            reference_allele: reference_allele.into().to_ascii_uppercase(),
            alternate_allele: alternate_allele.into().to_ascii_uppercase(),
        }
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn reference_allele(&self) -> &str {
        &self.reference_allele
    }

    pub fn alternate_allele(&self) -> &str {
        &self.alternate_allele
    }

    /// Canonical `"chr_pos_ref_alt"` identifier.
    pub fn variant_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.chromosome, self.position, self.reference_allele, self.alternate_allele
        )
    }

    /// Reverse complement of the alternate allele, used by the harmoniser to
    /// detect palindromic sites.
    pub fn reverse_complement_alt(&self) -> String {
        reverse_complement(&self.alternate_allele)
    }

    pub fn reverse_complement_ref(&self) -> String {
        reverse_complement(&self.reference_allele)
    }

    /// A palindromic site has `ref == reverse_complement(alt)` — strand
    /// assignment is ambiguous for these (the harmoniser treats this as a
    /// reason to skip harmonisation rather than guess).
    pub fn is_palindromic(&self) -> bool {
        self.reference_allele == self.reverse_complement_alt()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variant_id())
    }
}

pub(crate) fn reverse_complement(allele: &str) -> String {
    allele
        .chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_id_is_canonical() {
        let v = Variant::new("1", 123, "a", "g");
        assert_eq!(v.variant_id(), "1_123_A_G");
    }

    #[test]
    fn detects_palindromic_site() {
        let v = Variant::new("1", 1, "T", "A");
        assert!(v.is_palindromic());
        let v = Variant::new("1", 1, "T", "G");
        assert!(!v.is_palindromic());
    }
}
