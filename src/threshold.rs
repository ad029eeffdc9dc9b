//! # Threshold Decision Engine
//!
//! Converts externally fitted match probabilities plus false-positive and
//! false-negative budgets into the (low, high) probability cutoffs that
//! split pairs into link / clerical review / non-link.
//!
//! The fitting itself is a collaborator behind [`ProbabilityFitter`]; this
//! crate never estimates probabilities.

use crate::error::LinkError;
use crate::model::PatternCode;
use crate::tabulate::FrequencyTable;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One pattern's externally fitted match probability, joined with its
/// tabulated pair count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedRow {
    pub pattern: PatternCode,
    pub count: u64,
    pub probability: f64,
}

/// Output of the external fitter: one row per pattern of the contingency
/// table it was fitted on, plus the overall estimated match proportion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTable {
    pub rows: Vec<FittedRow>,
    pub match_proportion: f64,
}

impl FittedTable {
    /// Fitted probability for one pattern, if covered.
    pub fn probability_of(&self, pattern: PatternCode) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.pattern == pattern)
            .map(|row| row.probability)
    }

    /// Verify the fitter covered every pattern the table observed, with
    /// finite probabilities in [0, 1]. Missing coverage is a fit-input
    /// error; the fitter's contract requires MISSING-bearing patterns to be
    /// first-class, so no pattern may be silently dropped.
    pub fn validate_against(&self, table: &FrequencyTable, width: usize) -> Result<(), LinkError> {
        for (pattern, _) in table.patterns() {
            if self.probability_of(pattern).is_none() {
                return Err(LinkError::FitInput {
                    pattern: pattern.display(width),
                });
            }
        }
        for row in &self.rows {
            if !row.probability.is_finite() || !(0.0..=1.0).contains(&row.probability) {
                return Err(LinkError::Configuration(format!(
                    "fitted probability {} for pattern {} outside [0, 1]",
                    row.probability,
                    row.pattern.display(width)
                )));
            }
        }
        Ok(())
    }
}

/// External match-probability fitter collaborator (latent-class / EM style
/// estimation lives behind this seam).
pub trait ProbabilityFitter {
    fn fit(&self, table: &FrequencyTable) -> Result<FittedTable, LinkError>;
}

/// Probability cutoffs: `p >= high` links, `p < low` does not, anything
/// between goes to clerical review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub low: f64,
    pub high: f64,
}

/// Compute accept/reject cutoffs from a fitted table and error budgets.
///
/// High cutoff: walking patterns from the most probable down, the expected
/// false-positive rate of linking everything seen so far is
/// `sum(count * (1 - p)) / sum(count)`; the cutoff is the smallest
/// probability whose prefix keeps that rate within `p_fp`.
///
/// Low cutoff: walking up from the least probable, the expected share of
/// true-match mass excluded by rejecting everything seen so far is
/// `sum(count * p) / total(count * p)`; the cutoff is the largest
/// probability keeping that share within `p_fn`, clamped to the minimum
/// observed probability. In realistic tables the bottom pattern alone holds
/// most of the pair mass, so permissive budgets still land on the clamp.
///
/// `low > high` means the budgets and the fit are mutually inconsistent;
/// that is a fatal configuration error, never silently resolved.
pub fn compute_thresholds(
    fitted: &FittedTable,
    p_fp: f64,
    p_fn: f64,
) -> Result<ThresholdPair, LinkError> {
    if !(0.0..1.0).contains(&p_fp) || p_fp <= 0.0 {
        return Err(LinkError::Configuration(format!(
            "false-positive budget {} outside (0, 1)",
            p_fp
        )));
    }
    if !(0.0..1.0).contains(&p_fn) || p_fn <= 0.0 {
        return Err(LinkError::Configuration(format!(
            "false-negative budget {} outside (0, 1)",
            p_fn
        )));
    }
    if fitted.rows.is_empty() {
        return Err(LinkError::Configuration(
            "fitted table has no patterns".to_string(),
        ));
    }
    for row in &fitted.rows {
        if !row.probability.is_finite() || !(0.0..=1.0).contains(&row.probability) {
            return Err(LinkError::Configuration(format!(
                "fitted probability {} outside [0, 1]",
                row.probability
            )));
        }
    }

    let mut by_probability = fitted.rows.clone();
    // ties broken by pattern code so the scan order is deterministic
    by_probability.sort_by(|a, b| {
        a.probability
            .total_cmp(&b.probability)
            .then(a.pattern.cmp(&b.pattern))
    });

    let min_probability = by_probability[0].probability;

    // high: descending prefix scan on expected FP rate
    let mut high = None;
    let mut fp_mass = 0.0;
    let mut linked = 0.0;
    for row in by_probability.iter().rev() {
        fp_mass += row.count as f64 * (1.0 - row.probability);
        linked += row.count as f64;
        if fp_mass / linked <= p_fp {
            high = Some(row.probability);
        } else {
            break;
        }
    }
    // no admissible prefix: nothing can be linked within budget
    let high = high.unwrap_or(1.0);

    // low: ascending prefix scan on excluded true-match mass
    let total_match_mass: f64 = by_probability
        .iter()
        .map(|row| row.count as f64 * row.probability)
        .sum();
    let mut low = None;
    if total_match_mass > 0.0 {
        let mut excluded = 0.0;
        for row in &by_probability {
            excluded += row.count as f64 * row.probability;
            if excluded / total_match_mass <= p_fn {
                low = Some(row.probability);
            } else {
                break;
            }
        }
    }
    let low = low.map(|p| p.max(min_probability)).unwrap_or(min_probability);

    if low > high {
        return Err(LinkError::Configuration(format!(
            "threshold budgets produce low {} > high {}; tighten budgets or refit",
            low, high
        )));
    }

    debug!(low, high, "computed decision thresholds");
    Ok(ThresholdPair { low, high })
}
