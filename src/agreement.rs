//! # Agreement Matrix Builder
//!
//! Expands value-level agreement into the sparse set of record-pair cells
//! where a field agrees. Conceptually each matrix is an N1 x N2 boolean
//! grid; only the agreeing cells are stored, as linear cell indices under
//! the shared [`CellGrid`] convention.

use crate::grid::CellGrid;
use crate::index::UniqueValueIndex;
use crate::model::ValueId;
use crate::similarity::ScoreMatrix;
use rustc_hash::FxHashSet;
use tracing::debug;

/// Sparse per-field agreement set over the record-pair cross product.
#[derive(Debug, Clone)]
pub struct AgreementMatrix {
    cells: FxHashSet<u64>,
}

impl AgreementMatrix {
    /// Exact field: for every value tuple present on both sides, the full
    /// cross product of its two buckets agrees.
    pub fn exact(grid: CellGrid, side_a: &UniqueValueIndex, side_b: &UniqueValueIndex) -> Self {
        let mut cells = FxHashSet::default();
        for (key, bucket_a) in side_a.buckets() {
            if let Some(bucket_b) = side_b.bucket(key) {
                insert_cross_product(&mut cells, grid, bucket_a, bucket_b);
            }
        }
        debug!(agree_cells = cells.len(), "built exact agreement matrix");
        Self { cells }
    }

    /// Fuzzy field: every cached distinct pair scoring at or above the
    /// threshold contributes its bucket cross product. `keys_a`/`keys_b`
    /// must be the same deterministic orderings the score matrix was built
    /// from.
    pub fn fuzzy(
        grid: CellGrid,
        side_a: &UniqueValueIndex,
        side_b: &UniqueValueIndex,
        keys_a: &[Vec<ValueId>],
        keys_b: &[Vec<ValueId>],
        scores: &ScoreMatrix,
        threshold: f64,
    ) -> Self {
        let mut cells = FxHashSet::default();
        for (ai, key_a) in keys_a.iter().enumerate() {
            let bucket_a = match side_a.bucket(key_a) {
                Some(bucket) => bucket,
                None => continue,
            };
            for (bi, key_b) in keys_b.iter().enumerate() {
                if scores.get(ai, bi) < threshold {
                    continue;
                }
                if let Some(bucket_b) = side_b.bucket(key_b) {
                    insert_cross_product(&mut cells, grid, bucket_a, bucket_b);
                }
            }
        }
        debug!(agree_cells = cells.len(), threshold, "built fuzzy agreement matrix");
        Self { cells }
    }

    #[inline]
    pub fn contains(&self, cell: u64) -> bool {
        self.cells.contains(&cell)
    }

    /// Number of agreeing (i, j) cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = u64> + '_ {
        self.cells.iter().copied()
    }
}

/// Insertion through a set deduplicates cells that arrive via more than one
/// value pair.
fn insert_cross_product(cells: &mut FxHashSet<u64>, grid: CellGrid, bucket_a: &[u32], bucket_b: &[u32]) {
    for &i in bucket_a {
        for &j in bucket_b {
            cells.insert(grid.encode(i, j));
        }
    }
}
