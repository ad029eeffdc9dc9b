//! # Pattern Tabulator
//!
//! Scans the conceptual N1 x N2 cross product in bounded chunks and counts
//! record pairs per joint agreement pattern. Memory is proportional to the
//! number of *observed* patterns, never to the cross-product size.
//!
//! Each chunk is an independent task producing an owned partial count table;
//! partials are merged by summing counts, which is associative and
//! commutative, so the result is identical for any chunk size or worker
//! count.

use crate::agreement::AgreementMatrix;
use crate::error::LinkError;
use crate::grid::CellGrid;
use crate::model::{PatternCode, Symbol, MAX_FIELDS};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

/// One linked field's per-pair inputs: its sparse agreement set and the two
/// sides' missing-index sets.
#[derive(Clone, Copy)]
pub struct FieldView<'a> {
    pub agree: &'a AgreementMatrix,
    pub missing_a: &'a FxHashSet<u32>,
    pub missing_b: &'a FxHashSet<u32>,
}

/// Contingency table: pattern -> number of record pairs exhibiting it over
/// the full implicit cross product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    width: usize,
    counts: FxHashMap<PatternCode, u64>,
}

impl FrequencyTable {
    /// Number of linked fields per pattern.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Count for one pattern; unobserved patterns have count zero.
    pub fn count(&self, code: PatternCode) -> u64 {
        self.counts.get(&code).copied().unwrap_or(0)
    }

    /// Sum of all counts; equals N1 * N2 for a full tabulation.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Observed patterns and counts in deterministic (code) order.
    pub fn patterns(&self) -> Vec<(PatternCode, u64)> {
        let mut rows: Vec<(PatternCode, u64)> =
            self.counts.iter().map(|(&code, &count)| (code, count)).collect();
        rows.sort_unstable_by_key(|(code, _)| *code);
        rows
    }

    /// Number of distinct observed patterns.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Classify one decoded cell: per field, missing dominates (either side
/// absent), otherwise membership in the agreement set decides. Returns the
/// packed pattern bits. Shared with pair retrieval so the two engines can
/// never diverge on symbol semantics.
#[inline]
pub(crate) fn classify_cell(fields: &[FieldView<'_>], cell: u64, i: u32, j: u32) -> u32 {
    let mut code = 0u32;
    for (idx, field) in fields.iter().enumerate() {
        let symbol = if field.missing_a.contains(&i) || field.missing_b.contains(&j) {
            Symbol::Missing
        } else if field.agree.contains(cell) {
            Symbol::Agree
        } else {
            Symbol::Disagree
        };
        code |= symbol.to_bits() << (2 * idx);
    }
    code
}

/// Tabulate the full cross product into a [`FrequencyTable`].
///
/// `chunk` bounds the number of cells a single task touches.
#[instrument(skip(grid, fields), level = "debug", fields(cells = grid.cells(), width = fields.len()))]
pub fn tabulate(
    grid: CellGrid,
    fields: &[FieldView<'_>],
    chunk: u64,
) -> Result<FrequencyTable, LinkError> {
    if fields.len() > MAX_FIELDS {
        return Err(LinkError::InvalidInput(format!(
            "{} linked fields exceed the pattern limit of {}",
            fields.len(),
            MAX_FIELDS
        )));
    }

    let ranges = grid.chunk_ranges(chunk);
    debug!(chunks = ranges.len(), chunk, "tabulating cross product");

    let partials: Vec<FxHashMap<u32, u64>> = ranges
        .into_par_iter()
        .map(|range| {
            let mut local: FxHashMap<u32, u64> = FxHashMap::default();
            for cell in range {
                let (i, j) = grid.decode(cell);
                let code = classify_cell(fields, cell, i, j);
                *local.entry(code).or_insert(0) += 1;
            }
            local
        })
        .collect();

    let mut counts: FxHashMap<PatternCode, u64> = FxHashMap::default();
    for partial in partials {
        for (code, count) in partial {
            *counts.entry(PatternCode(code)).or_insert(0) += count;
        }
    }

    Ok(FrequencyTable {
        width: fields.len(),
        counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::UniqueValueIndex;
    use crate::model::{FieldSpec, RecordSet, StringInterner};

    /// Record sets with a single exact `code` column:
    /// A = [x, x, y], B = [x, y, y].
    fn scenario() -> (CellGrid, UniqueValueIndex, UniqueValueIndex) {
        let mut interner = StringInterner::new();
        let field = interner.intern_field("code");
        let x = interner.intern_value("x");
        let y = interner.intern_value("y");

        let mut set_a = RecordSet::new(3);
        set_a.add_column(field, vec![Some(x), Some(x), Some(y)]).unwrap();
        let mut set_b = RecordSet::new(3);
        set_b.add_column(field, vec![Some(x), Some(y), Some(y)]).unwrap();

        let spec = FieldSpec::exact("code", field);
        let index_a = UniqueValueIndex::build(&set_a, &spec).unwrap();
        let index_b = UniqueValueIndex::build(&set_b, &spec).unwrap();
        let grid = CellGrid::new(3, 3).unwrap();
        (grid, index_a, index_b)
    }

    #[test]
    fn test_three_by_three_scenario() {
        let (grid, index_a, index_b) = scenario();
        let matrix = AgreementMatrix::exact(grid, &index_a, &index_b);
        let view = FieldView {
            agree: &matrix,
            missing_a: index_a.missing(),
            missing_b: index_b.missing(),
        };

        let table = tabulate(grid, &[view], 4).unwrap();

        let agree = PatternCode::encode(&[Symbol::Agree]).unwrap();
        let disagree = PatternCode::encode(&[Symbol::Disagree]).unwrap();
        let missing = PatternCode::encode(&[Symbol::Missing]).unwrap();

        assert_eq!(table.count(agree), 4);
        assert_eq!(table.count(disagree), 5);
        assert_eq!(table.count(missing), 0);
        assert_eq!(table.total(), 9);
    }

    #[test]
    fn test_total_mass_equals_cross_product() {
        let (grid, index_a, index_b) = scenario();
        let matrix = AgreementMatrix::exact(grid, &index_a, &index_b);
        let view = FieldView {
            agree: &matrix,
            missing_a: index_a.missing(),
            missing_b: index_b.missing(),
        };

        let table = tabulate(grid, &[view], 1 << 20).unwrap();
        assert_eq!(table.total(), grid.cells());
    }

    #[test]
    fn test_chunk_size_does_not_change_counts() {
        let (grid, index_a, index_b) = scenario();
        let matrix = AgreementMatrix::exact(grid, &index_a, &index_b);
        let view = FieldView {
            agree: &matrix,
            missing_a: index_a.missing(),
            missing_b: index_b.missing(),
        };

        let reference = tabulate(grid, &[view], 1).unwrap();
        for chunk in [2u64, 3, 5, 9, 1024] {
            let other = tabulate(grid, &[view], chunk).unwrap();
            assert_eq!(reference.patterns(), other.patterns(), "chunk {}", chunk);
        }
    }

    #[test]
    fn test_missing_dominates_agreement() {
        let mut interner = StringInterner::new();
        let field = interner.intern_field("code");
        let x = interner.intern_value("x");

        let mut set_a = RecordSet::new(2);
        set_a.add_column(field, vec![Some(x), None]).unwrap();
        let mut set_b = RecordSet::new(1);
        set_b.add_column(field, vec![Some(x)]).unwrap();

        let spec = FieldSpec::exact("code", field);
        let index_a = UniqueValueIndex::build(&set_a, &spec).unwrap();
        let index_b = UniqueValueIndex::build(&set_b, &spec).unwrap();
        let grid = CellGrid::new(2, 1).unwrap();
        let matrix = AgreementMatrix::exact(grid, &index_a, &index_b);
        let view = FieldView {
            agree: &matrix,
            missing_a: index_a.missing(),
            missing_b: index_b.missing(),
        };

        let table = tabulate(grid, &[view], 16).unwrap();
        assert_eq!(table.count(PatternCode::encode(&[Symbol::Agree]).unwrap()), 1);
        assert_eq!(table.count(PatternCode::encode(&[Symbol::Missing]).unwrap()), 1);
        assert_eq!(table.count(PatternCode::encode(&[Symbol::Disagree]).unwrap()), 0);
    }
}
