//! # Pair Retrieval Engine
//!
//! Reconstructs the exact record pairs realizing a given agreement pattern
//! by sparse set intersection, never by enumerating the cross product. The
//! seed is always the smallest required-agree set, which bounds total work;
//! patterns with no agree requirement fall back to a bounded chunked grid
//! scan.
//!
//! Symbol semantics mirror the tabulator exactly: a Disagree requirement
//! excludes pairs where *either* side is missing, because missing dominates
//! disagree.

use crate::error::LinkError;
use crate::grid::CellGrid;
use crate::model::{PatternCode, Symbol};
use crate::tabulate::{classify_cell, FieldView};
use crate::threshold::{FittedTable, ThresholdPair};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Final disposition of a record pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Link,
    Review,
    NonLink,
}

/// Classify one fitted probability against the cutoffs.
///
/// Equality goes to the higher band: `p == high` links, `p == low` goes to
/// review. Since the low cutoff is clamped to the minimum observed
/// probability, an observed pattern is never dropped below review unless a
/// caller widens the gap with an explicit higher `low`.
pub fn decide(probability: f64, thresholds: &ThresholdPair) -> Decision {
    if probability >= thresholds.high {
        Decision::Link
    } else if probability >= thresholds.low {
        Decision::Review
    } else {
        Decision::NonLink
    }
}

/// One linked record pair with its pattern's fitted probability and the
/// threshold decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkedPair {
    pub a: u32,
    pub b: u32,
    pub probability: f64,
    pub decision: Decision,
}

/// Retrieve every (i, j) pair realizing `pattern`, in ascending cell order.
///
/// Every retrieved cell is independently re-classified through the shared
/// tabulation logic; a mismatch is a fatal index-consistency error.
#[instrument(skip(grid, fields, pattern), level = "debug")]
pub fn pairs_for_pattern(
    grid: CellGrid,
    fields: &[FieldView<'_>],
    pattern: &[Symbol],
    chunk: u64,
) -> Result<Vec<(u32, u32)>, LinkError> {
    if pattern.len() != fields.len() {
        return Err(LinkError::InvalidInput(format!(
            "pattern has {} symbols for {} linked fields",
            pattern.len(),
            fields.len()
        )));
    }
    let code = PatternCode::encode(pattern)?;

    let agree_fields: Vec<usize> = pattern
        .iter()
        .enumerate()
        .filter(|(_, s)| **s == Symbol::Agree)
        .map(|(idx, _)| idx)
        .collect();

    let mut cells = match agree_fields
        .iter()
        .copied()
        .min_by_key(|&idx| fields[idx].agree.len())
    {
        Some(seed) => seeded_cells(grid, fields, pattern, seed),
        None => scanned_cells(grid, fields, code, chunk),
    };
    cells.sort_unstable();

    // round-trip guard: the retrieved cells must re-derive to the pattern
    // they were retrieved under
    for &cell in &cells {
        let (i, j) = grid.decode(cell);
        if classify_cell(fields, cell, i, j) != code.0 {
            return Err(LinkError::IndexConsistency(format!(
                "cell ({}, {}) retrieved for pattern {} re-derives differently",
                i,
                j,
                code.display(fields.len())
            )));
        }
    }

    debug!(pairs = cells.len(), pattern = %code.display(fields.len()), "retrieved pattern pairs");
    Ok(cells.into_iter().map(|cell| grid.decode(cell)).collect())
}

/// Intersect outward from the smallest required-agree set.
fn seeded_cells(
    grid: CellGrid,
    fields: &[FieldView<'_>],
    pattern: &[Symbol],
    seed: usize,
) -> Vec<u64> {
    fields[seed]
        .agree
        .cells()
        .filter(|&cell| {
            let (i, j) = grid.decode(cell);
            for (idx, symbol) in pattern.iter().enumerate() {
                let field = &fields[idx];
                let keep = match symbol {
                    Symbol::Agree => idx == seed || field.agree.contains(cell),
                    Symbol::Missing => {
                        field.missing_a.contains(&i) || field.missing_b.contains(&j)
                    }
                    // known on both sides and not agreeing
                    Symbol::Disagree => {
                        !field.agree.contains(cell)
                            && !field.missing_a.contains(&i)
                            && !field.missing_b.contains(&j)
                    }
                };
                if !keep {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// No agree requirement: bounded chunked scan of the grid, parallel over
/// disjoint ranges, merged in range order.
fn scanned_cells(grid: CellGrid, fields: &[FieldView<'_>], code: PatternCode, chunk: u64) -> Vec<u64> {
    grid.chunk_ranges(chunk)
        .into_par_iter()
        .map(|range| {
            range
                .filter(|&cell| {
                    let (i, j) = grid.decode(cell);
                    classify_cell(fields, cell, i, j) == code.0
                })
                .collect::<Vec<u64>>()
        })
        .reduce(Vec::new, |mut acc, mut part| {
            acc.append(&mut part);
            acc
        })
}

/// Materialize the linked-pair output: for every fitted pattern at or above
/// the low cutoff (and, when `include_nonlink` is set, below it too),
/// retrieve its pairs and annotate them with the fitted probability and
/// decision. Patterns are processed in descending probability order.
///
/// The retrieved pair count must equal the tabulated count for the pattern;
/// divergence is a fatal index-consistency error.
pub fn linked_pairs(
    grid: CellGrid,
    fields: &[FieldView<'_>],
    fitted: &FittedTable,
    thresholds: &ThresholdPair,
    chunk: u64,
    include_nonlink: bool,
) -> Result<Vec<LinkedPair>, LinkError> {
    let mut rows = fitted.rows.clone();
    rows.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then(a.pattern.cmp(&b.pattern))
    });

    let mut out = Vec::new();
    for row in &rows {
        let decision = decide(row.probability, thresholds);
        if decision == Decision::NonLink && !include_nonlink {
            continue;
        }

        let pattern = row.pattern.decode(fields.len());
        let pairs = pairs_for_pattern(grid, fields, &pattern, chunk)?;
        if pairs.len() as u64 != row.count {
            return Err(LinkError::IndexConsistency(format!(
                "pattern {}: retrieved {} pairs, contingency table counted {}",
                row.pattern.display(fields.len()),
                pairs.len(),
                row.count
            )));
        }

        out.extend(pairs.into_iter().map(|(a, b)| LinkedPair {
            a,
            b,
            probability: row.probability,
            decision,
        }));
    }
    Ok(out)
}
