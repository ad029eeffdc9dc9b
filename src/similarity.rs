//! # Pairwise Similarity Engine
//!
//! Computes fuzzy similarity between the *distinct* values of a field, one
//! side against the other, never between records. Cost is O(U1 * U2) in the
//! distinct-value counts; the record counts only matter later, when the
//! agreement matrix expands value-level agreement through the index buckets.
//!
//! Work is split into fixed-size blocks of the two distinct-value lists.
//! Each block pair is an independent task returning an owned score fragment;
//! fragments are stitched in a fixed order after all tasks complete, so the
//! result is bit-identical regardless of worker count or block size. Any
//! failing task aborts the whole stage.

use crate::error::LinkError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, instrument};

/// Pluggable string similarity measure, score in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measure {
    JaroWinkler,
    NormalizedLevenshtein,
}

impl Measure {
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            Measure::JaroWinkler => strsim::jaro_winkler(a, b),
            Measure::NormalizedLevenshtein => strsim::normalized_levenshtein(a, b),
        }
    }
}

/// Dense cache of scores over the full distinct-value cross product of one
/// fuzzy field: `rows` distinct keys from side 1, `cols` from side 2.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    rows: usize,
    cols: usize,
    scores: Vec<f64>,
}

impl ScoreMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Score for the `a`-th side-1 key against the `b`-th side-2 key.
    #[inline]
    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.scores[a * self.cols + b]
    }
}

/// Score every pair of distinct keys, one key per side. Keys are component
/// tuples; the pair score is the mean of the per-component scores.
///
/// `block` bounds the side length of one task's sub-rectangle.
#[instrument(skip(keys_a, keys_b), level = "debug", fields(u1 = keys_a.len(), u2 = keys_b.len()))]
pub fn score_distinct(
    keys_a: &[Vec<String>],
    keys_b: &[Vec<String>],
    measure: Measure,
    block: usize,
) -> Result<ScoreMatrix, LinkError> {
    let rows = keys_a.len();
    let cols = keys_b.len();
    let block = block.max(1);

    let tasks = block_tasks(rows, cols, block);
    debug!(tasks = tasks.len(), block, "scoring distinct value blocks");

    let fragments: Vec<Vec<f64>> = tasks
        .par_iter()
        .map(|(row_range, col_range)| score_block(keys_a, keys_b, measure, row_range, col_range))
        .collect::<Result<_, _>>()?;

    // Stitch fragments in task order; the layout depends only on (rows,
    // cols, block), never on scheduling.
    let mut scores = vec![0.0f64; rows * cols];
    for ((row_range, col_range), fragment) in tasks.iter().zip(fragments) {
        let width = col_range.end - col_range.start;
        for (local_row, a) in row_range.clone().enumerate() {
            let src = &fragment[local_row * width..(local_row + 1) * width];
            let dst_start = a * cols + col_range.start;
            scores[dst_start..dst_start + width].copy_from_slice(src);
        }
    }

    Ok(ScoreMatrix { rows, cols, scores })
}

fn block_tasks(rows: usize, cols: usize, block: usize) -> Vec<(Range<usize>, Range<usize>)> {
    let mut tasks = Vec::new();
    let mut row_start = 0;
    while row_start < rows {
        let row_end = (row_start + block).min(rows);
        let mut col_start = 0;
        while col_start < cols {
            let col_end = (col_start + block).min(cols);
            tasks.push((row_start..row_end, col_start..col_end));
            col_start = col_end;
        }
        row_start = row_end;
    }
    tasks
}

fn score_block(
    keys_a: &[Vec<String>],
    keys_b: &[Vec<String>],
    measure: Measure,
    row_range: &Range<usize>,
    col_range: &Range<usize>,
) -> Result<Vec<f64>, LinkError> {
    let width = col_range.end - col_range.start;
    let mut fragment = Vec::with_capacity((row_range.end - row_range.start) * width);

    for a in row_range.clone() {
        for b in col_range.clone() {
            fragment.push(score_pair(&keys_a[a], &keys_b[b], measure)?);
        }
    }

    Ok(fragment)
}

fn score_pair(key_a: &[String], key_b: &[String], measure: Measure) -> Result<f64, LinkError> {
    if key_a.len() != key_b.len() || key_a.is_empty() {
        return Err(LinkError::WorkerFailure {
            stage: "similarity",
            reason: format!(
                "component arity mismatch: {} vs {}",
                key_a.len(),
                key_b.len()
            ),
        });
    }

    let mut sum = 0.0;
    for (a, b) in key_a.iter().zip(key_b) {
        let score = measure.score(a, b);
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(LinkError::WorkerFailure {
                stage: "similarity",
                reason: format!("measure returned invalid score {} for {:?} / {:?}", score, a, b),
            });
        }
        sum += score;
    }
    Ok(sum / key_a.len() as f64)
}
