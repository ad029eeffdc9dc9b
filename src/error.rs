//! # Error Module
//!
//! Typed failure kinds for the linkage pipeline. Every stage surfaces its
//! failure to the caller; retry means re-running the stage from its immutable
//! inputs, since no partial state is ever kept.

use thiserror::Error;

/// Errors produced by the linkage pipeline.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Budgets or tuning values that cannot yield a usable decision rule,
    /// e.g. threshold budgets that produce low > high.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The contingency table contains a pattern the fitted-probability
    /// mapping does not cover.
    #[error("fit input error: pattern {pattern} has no fitted probability")]
    FitInput { pattern: String },

    /// A parallel task failed; the whole stage aborts with no partial commit.
    #[error("worker failure in {stage}: {reason}")]
    WorkerFailure {
        stage: &'static str,
        reason: String,
    },

    /// An internal invariant was violated, e.g. a retrieved pair whose
    /// re-derived pattern does not match the pattern it was retrieved under.
    #[error("index consistency violation: {0}")]
    IndexConsistency(String),

    /// Malformed caller input: ragged columns, unknown field ids, thresholds
    /// outside [0, 1], or a schema wider than the pattern encoding allows.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
