//! # Reclink
//!
//! A record-linkage engine that decides, for two collections of noisy
//! multi-field records, which cross-collection pairs refer to the same
//! real-world entity, without ever materializing the full cross product.
//!
//! The pipeline: per-field unique-value indices block each side; fuzzy
//! similarity runs over distinct values only; agreement expands back through
//! the index buckets into sparse per-field pair sets; a chunked tabulator
//! counts joint agreement patterns; externally fitted match probabilities
//! plus error budgets become accept/reject cutoffs; and retrieval
//! reconstructs the exact pairs behind each decision by sparse intersection.
//!
//! Memory scales with distinct values and observed patterns, never with
//! N1 x N2.

pub mod agreement;
pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod index;
pub mod model;
pub mod retrieve;
pub mod similarity;
pub mod tabulate;
pub mod test_support;
pub mod threshold;

// Re-export main types for convenience
pub use config::{LinkTuning, TuningProfile};
pub use error::LinkError;
pub use grid::CellGrid;
pub use model::{
    CompareMode, FieldId, FieldSpec, PatternCode, RecordSet, StringInterner, Symbol, ValueId,
    MAX_FIELDS,
};
pub use retrieve::{decide, Decision, LinkedPair};
pub use similarity::{Measure, ScoreMatrix};
pub use tabulate::FrequencyTable;
pub use threshold::{FittedRow, FittedTable, ProbabilityFitter, ThresholdPair};

use agreement::AgreementMatrix;
use index::UniqueValueIndex;
use tabulate::FieldView;
use tracing::debug;

/// Everything built for one linked field: both sides' value indices (which
/// carry the missingness sets), the optional distinct-value score cache, and
/// the sparse agreement set.
#[derive(Debug, Clone)]
pub struct FieldArtifacts {
    pub spec: FieldSpec,
    pub index_a: UniqueValueIndex,
    pub index_b: UniqueValueIndex,
    pub scores: Option<ScoreMatrix>,
    pub agree: AgreementMatrix,
}

/// Immutable per-run artifacts, built once and passed explicitly into the
/// later stages.
#[derive(Debug, Clone)]
pub struct LinkageArtifacts {
    pub grid: CellGrid,
    pub fields: Vec<FieldArtifacts>,
}

impl LinkageArtifacts {
    fn views(&self) -> Vec<FieldView<'_>> {
        self.fields
            .iter()
            .map(|field| FieldView {
                agree: &field.agree,
                missing_a: field.index_a.missing(),
                missing_b: field.index_b.missing(),
            })
            .collect()
    }
}

/// Main API for record linkage between two record sets.
#[derive(Debug)]
pub struct Linker {
    set_a: RecordSet,
    set_b: RecordSet,
    interner: StringInterner,
    fields: Vec<FieldSpec>,
    grid: CellGrid,
    tuning: LinkTuning,
}

impl Linker {
    /// Create a linker over two record sets sharing one interner.
    pub fn new(
        set_a: RecordSet,
        set_b: RecordSet,
        interner: StringInterner,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, LinkError> {
        Self::with_tuning(set_a, set_b, interner, fields, LinkTuning::default())
    }

    pub fn with_tuning(
        set_a: RecordSet,
        set_b: RecordSet,
        interner: StringInterner,
        fields: Vec<FieldSpec>,
        tuning: LinkTuning,
    ) -> Result<Self, LinkError> {
        if fields.is_empty() {
            return Err(LinkError::InvalidInput(
                "at least one linked field is required".to_string(),
            ));
        }
        if fields.len() > MAX_FIELDS {
            return Err(LinkError::InvalidInput(format!(
                "{} linked fields exceed the pattern limit of {}",
                fields.len(),
                MAX_FIELDS
            )));
        }
        for spec in &fields {
            if spec.components.is_empty() {
                return Err(LinkError::InvalidInput(format!(
                    "field '{}' has no component columns",
                    spec.name
                )));
            }
            for component in &spec.components {
                if !set_a.has_column(*component) || !set_b.has_column(*component) {
                    return Err(LinkError::InvalidInput(format!(
                        "field '{}' references column '{}' absent from a side",
                        spec.name,
                        interner.field_label(*component)
                    )));
                }
            }
            if let CompareMode::Fuzzy { threshold, .. } = spec.mode {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(LinkError::InvalidInput(format!(
                        "field '{}' threshold {} outside [0, 1]",
                        spec.name, threshold
                    )));
                }
            }
        }

        let grid = CellGrid::new(set_a.len(), set_b.len())?;
        Ok(Self {
            set_a,
            set_b,
            interner,
            fields,
            grid,
            tuning,
        })
    }

    pub fn grid(&self) -> CellGrid {
        self.grid
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Build all per-field artifacts: unique-value indices on both sides,
    /// distinct-value similarity caches for fuzzy fields, and the sparse
    /// agreement matrices.
    pub fn build_agreement(&self) -> Result<LinkageArtifacts, LinkError> {
        let mut built = Vec::with_capacity(self.fields.len());

        for spec in &self.fields {
            let index_a = UniqueValueIndex::build(&self.set_a, spec)?;
            let index_b = UniqueValueIndex::build(&self.set_b, spec)?;
            debug!(
                field = %spec.name,
                distinct_a = index_a.distinct_count(),
                distinct_b = index_b.distinct_count(),
                missing_a = index_a.missing().len(),
                missing_b = index_b.missing().len(),
                "built unique-value indices"
            );

            let (scores, agree) = match spec.mode {
                CompareMode::Exact => {
                    (None, AgreementMatrix::exact(self.grid, &index_a, &index_b))
                }
                CompareMode::Fuzzy { measure, threshold } => {
                    let keys_a = index_a.distinct_keys();
                    let keys_b = index_b.distinct_keys();
                    let scores = similarity::score_distinct(
                        &self.resolve_keys(&keys_a)?,
                        &self.resolve_keys(&keys_b)?,
                        measure,
                        self.tuning.similarity_block,
                    )?;
                    let agree = AgreementMatrix::fuzzy(
                        self.grid, &index_a, &index_b, &keys_a, &keys_b, &scores, threshold,
                    );
                    (Some(scores), agree)
                }
            };

            built.push(FieldArtifacts {
                spec: spec.clone(),
                index_a,
                index_b,
                scores,
                agree,
            });
        }

        Ok(LinkageArtifacts {
            grid: self.grid,
            fields: built,
        })
    }

    /// Tabulate the full cross product into a contingency table.
    pub fn tabulate(&self, artifacts: &LinkageArtifacts) -> Result<FrequencyTable, LinkError> {
        tabulate::tabulate(self.grid, &artifacts.views(), self.tuning.tabulate_chunk)
    }

    /// Convert a fitted table plus error budgets into decision cutoffs,
    /// first checking the fit covers every tabulated pattern.
    pub fn thresholds(
        &self,
        table: &FrequencyTable,
        fitted: &FittedTable,
        p_fp: f64,
        p_fn: f64,
    ) -> Result<ThresholdPair, LinkError> {
        fitted.validate_against(table, self.fields.len())?;
        threshold::compute_thresholds(fitted, p_fp, p_fn)
    }

    /// Exact pair membership of one agreement pattern.
    pub fn pairs_for_pattern(
        &self,
        artifacts: &LinkageArtifacts,
        pattern: &[Symbol],
    ) -> Result<Vec<(u32, u32)>, LinkError> {
        retrieve::pairs_for_pattern(
            self.grid,
            &artifacts.views(),
            pattern,
            self.tuning.tabulate_chunk,
        )
    }

    /// Materialize linked output for every pattern at or above the low
    /// cutoff, annotated with probability and decision.
    pub fn linked_pairs(
        &self,
        artifacts: &LinkageArtifacts,
        fitted: &FittedTable,
        thresholds: &ThresholdPair,
    ) -> Result<Vec<LinkedPair>, LinkError> {
        retrieve::linked_pairs(
            self.grid,
            &artifacts.views(),
            fitted,
            thresholds,
            self.tuning.tabulate_chunk,
            false,
        )
    }

    fn resolve_keys(&self, keys: &[Vec<ValueId>]) -> Result<Vec<Vec<String>>, LinkError> {
        keys.iter()
            .map(|key| {
                key.iter()
                    .map(|value| {
                        self.interner
                            .get_value(*value)
                            .map(str::to_string)
                            .ok_or_else(|| {
                                LinkError::IndexConsistency(format!(
                                    "value {} not present in the interner",
                                    value
                                ))
                            })
                    })
                    .collect()
            })
            .collect()
    }
}
