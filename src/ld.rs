// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Read-only access to the reference LD correlation matrix. The physical,
//! block-sparse on-disk representation is out of scope here — this module
//! only specifies the lookup/submatrix contract and ships one in-memory
//! reference implementation for tests and callers who have already
//! materialised a panel.

use std::collections::HashMap;

use ndarray::Array2;

use crate::errors::Error;
use crate::model::variant::Variant;

/// One entry of the `LdVariantIndex`: a variant plus its row/column offset
/// into the logical `LdMatrix`.
#[derive(Clone, Debug, PartialEq)]
pub struct LdIndexEntry {
    pub variant: Variant,
    pub idx: usize,
}

/// Ordered index over the reference panel's variants, supporting point lookup
/// by variant id and range lookup by genomic window.
#[derive(Clone, Debug)]
pub struct LdVariantIndex {
    entries: Vec<LdIndexEntry>,
    by_variant_id: HashMap<String, usize>,
}

impl LdVariantIndex {
    /// `entries` must already be sorted by `(chromosome, position)`; `idx`
    /// values need not be contiguous but must be distinct.
    pub fn new(entries: Vec<LdIndexEntry>) -> Self {
        let by_variant_id = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.variant.variant_id(), i))
            .collect();
        LdVariantIndex {
            entries,
            by_variant_id,
        }
    }

    pub fn lookup(&self, variant_id: &str) -> Option<usize> {
        self.by_variant_id
            .get(variant_id)
            .map(|&i| self.entries[i].idx)
    }

    /// All index offsets whose variant lies within `[start, stop]` on `chromosome`.
    pub fn range(&self, chromosome: &str, start: u64, stop: u64) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| {
                e.variant.chromosome() == chromosome
                    && e.variant.position() >= start
                    && e.variant.position() <= stop
            })
            .map(|e| e.idx)
            .collect()
    }
}

/// Read-only handle to the N×N logical LD matrix. Implementations may back
/// this with a block-sparse on-disk store; the contract only requires that
/// `submatrix` materialise the rows/columns the caller asked for.
pub trait LdStore: Sync {
    fn index(&self) -> &LdVariantIndex;

    fn lookup(&self, variant_id: &str) -> Result<usize, Error> {
        self.index()
            .lookup(variant_id)
            .ok_or_else(|| Error::LdPanelMiss {
                variant: variant_id.to_string(),
            })
    }

    /// `idxs` must be distinct and strictly increasing. Never fails once the
    /// indices are in range — callers are expected to have resolved them via
    /// `lookup` first.
    fn submatrix(&self, idxs: &[usize]) -> Array2<f64>;
}

/// Dense in-memory `LdStore`, used by tests and by callers who already hold
/// the whole panel in memory.
pub struct InMemoryLdStore {
    index: LdVariantIndex,
    matrix: Array2<f64>,
}

impl InMemoryLdStore {
    pub fn new(index: LdVariantIndex, matrix: Array2<f64>) -> Self {
        assert_eq!(matrix.nrows(), matrix.ncols(), "LD matrix must be square");
        InMemoryLdStore { index, matrix }
    }
}

impl LdStore for InMemoryLdStore {
    fn index(&self) -> &LdVariantIndex {
        &self.index
    }

    fn submatrix(&self, idxs: &[usize]) -> Array2<f64> {
        let n = idxs.len();
        let mut out = Array2::<f64>::eye(n);
        for (a, &i) in idxs.iter().enumerate() {
            for (b, &j) in idxs.iter().enumerate() {
                out[[a, b]] = self.matrix[[i, j]];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> LdVariantIndex {
        LdVariantIndex::new(vec![
            LdIndexEntry {
                variant: Variant::new("1", 100, "A", "G"),
                idx: 0,
            },
            LdIndexEntry {
                variant: Variant::new("1", 200, "A", "G"),
                idx: 1,
            },
        ])
    }

    #[test]
    fn lookup_resolves_known_variant() {
        let idx = index();
        assert_eq!(idx.lookup("1_100_A_G"), Some(0));
        assert_eq!(idx.lookup("1_999_A_G"), None);
    }

    #[test]
    fn store_reports_missing_variant() {
        let store = InMemoryLdStore::new(index(), Array2::eye(2));
        assert!(store.lookup("1_999_A_G").is_err());
        assert!(store.lookup("1_100_A_G").is_ok());
    }

    #[test]
    fn submatrix_is_symmetric_with_unit_diagonal() {
        let mut m = Array2::<f64>::eye(2);
        m[[0, 1]] = 0.5;
        m[[1, 0]] = 0.5;
        let store = InMemoryLdStore::new(index(), m);
        let sub = store.submatrix(&[0, 1]);
        assert_eq!(sub[[0, 0]], 1.0);
        assert_eq!(sub[[0, 1]], sub[[1, 0]]);
    }
}
