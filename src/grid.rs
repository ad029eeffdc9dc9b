//! # Cell Grid Module
//!
//! The single shared convention for addressing cells of the implicit
//! N1 x N2 cross product as linear indices. The tabulator and the pair
//! retrieval engine both go through this module, so the two can never
//! disagree on what a cell index means.
//!
//! Convention: `idx = j * n1 + i`, where `i` indexes side 1 and `j` indexes
//! side 2. Decoding is `i = idx % n1`, `j = idx / n1`.

use crate::error::LinkError;
use std::ops::Range;

/// The implicit cross-product address space of one linkage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGrid {
    n1: u32,
    n2: u32,
}

impl CellGrid {
    /// Create a grid over record sets of `n1` and `n2` records.
    pub fn new(n1: usize, n2: usize) -> Result<Self, LinkError> {
        let n1 = u32::try_from(n1)
            .map_err(|_| LinkError::InvalidInput(format!("record set A too large: {}", n1)))?;
        let n2 = u32::try_from(n2)
            .map_err(|_| LinkError::InvalidInput(format!("record set B too large: {}", n2)))?;
        Ok(Self { n1, n2 })
    }

    pub fn n1(&self) -> u32 {
        self.n1
    }

    pub fn n2(&self) -> u32 {
        self.n2
    }

    /// Total number of cells, `n1 * n2`.
    pub fn cells(&self) -> u64 {
        self.n1 as u64 * self.n2 as u64
    }

    /// Encode a (i, j) pair. Callers must hold `i < n1 && j < n2`.
    #[inline]
    pub fn encode(&self, i: u32, j: u32) -> u64 {
        debug_assert!(i < self.n1 && j < self.n2);
        j as u64 * self.n1 as u64 + i as u64
    }

    /// Range-checked encode for externally supplied indices.
    pub fn try_encode(&self, i: u32, j: u32) -> Result<u64, LinkError> {
        if i >= self.n1 || j >= self.n2 {
            return Err(LinkError::InvalidInput(format!(
                "pair ({}, {}) out of range for {}x{} grid",
                i, j, self.n1, self.n2
            )));
        }
        Ok(self.encode(i, j))
    }

    /// Decode a linear index. Callers must hold `idx < cells()`.
    #[inline]
    pub fn decode(&self, idx: u64) -> (u32, u32) {
        debug_assert!(idx < self.cells());
        ((idx % self.n1 as u64) as u32, (idx / self.n1 as u64) as u32)
    }

    /// Partition `[0, cells())` into chunk ranges of at most `chunk` cells.
    /// Chunks are disjoint, ordered, and cover the space exactly; they are
    /// the unit of parallel work for tabulation and grid-scan retrieval.
    pub fn chunk_ranges(&self, chunk: u64) -> Vec<Range<u64>> {
        let chunk = chunk.max(1);
        let total = self.cells();
        let mut ranges = Vec::with_capacity((total / chunk + 1) as usize);
        let mut start = 0u64;
        while start < total {
            let end = (start + chunk).min(total);
            ranges.push(start..end);
            start = end;
        }
        ranges
    }
}
