//! # Unique-Value Indexing Module
//!
//! Partitions a record set, per linked field, into buckets of record indices
//! sharing a value tuple, plus the set of indices with no observed value.
//! This is the blocking structure everything downstream leans on: similarity
//! runs over the distinct keys, and agreement expands back through the
//! buckets.

use crate::error::LinkError;
use crate::model::{FieldSpec, RecordSet, ValueId};
use rustc_hash::{FxHashMap, FxHashSet};

/// Per-field, per-side partition of record indices by distinct value tuple.
///
/// Invariant: the buckets are pairwise disjoint and, together with the
/// missing set, cover `0..len` exactly.
#[derive(Debug, Clone)]
pub struct UniqueValueIndex {
    buckets: FxHashMap<Vec<ValueId>, Vec<u32>>,
    missing: FxHashSet<u32>,
    len: u32,
}

impl UniqueValueIndex {
    /// Build the index for one field over one record set.
    ///
    /// Composite fields treat a record as missing whenever *any* component
    /// column is missing for it.
    pub fn build(records: &RecordSet, spec: &FieldSpec) -> Result<Self, LinkError> {
        let columns: Vec<&[Option<ValueId>]> = spec
            .components
            .iter()
            .map(|field| {
                records.column(*field).ok_or_else(|| {
                    LinkError::InvalidInput(format!(
                        "field '{}' references unknown column {}",
                        spec.name, field
                    ))
                })
            })
            .collect::<Result<_, _>>()?;

        let mut buckets: FxHashMap<Vec<ValueId>, Vec<u32>> = FxHashMap::default();
        let mut missing = FxHashSet::default();

        'rows: for row in 0..records.len() as u32 {
            let mut key = Vec::with_capacity(columns.len());
            for column in &columns {
                match column[row as usize] {
                    Some(value) => key.push(value),
                    None => {
                        missing.insert(row);
                        continue 'rows;
                    }
                }
            }
            buckets.entry(key).or_default().push(row);
        }

        Ok(Self {
            buckets,
            missing,
            len: records.len() as u32,
        })
    }

    /// Record indices with no observed value for this field (the
    /// missingness index for this field/side).
    pub fn missing(&self) -> &FxHashSet<u32> {
        &self.missing
    }

    /// Record indices holding a given value tuple.
    pub fn bucket(&self, key: &[ValueId]) -> Option<&[u32]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&Vec<ValueId>, &[u32])> {
        self.buckets.iter().map(|(key, rows)| (key, rows.as_slice()))
    }

    /// Distinct value tuples in a deterministic (sorted) order. This order
    /// is what positions keys in the similarity score matrix, so it must
    /// not depend on hash-map iteration.
    pub fn distinct_keys(&self) -> Vec<Vec<ValueId>> {
        let mut keys: Vec<Vec<ValueId>> = self.buckets.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    pub fn distinct_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check the partition invariant: every index in `0..len` appears in
    /// exactly one bucket or in the missing set.
    pub fn partition_holds(&self) -> bool {
        let mut seen = vec![0u8; self.len as usize];
        for rows in self.buckets.values() {
            for &row in rows {
                if row >= self.len {
                    return false;
                }
                seen[row as usize] += 1;
            }
        }
        for &row in &self.missing {
            if row >= self.len {
                return false;
            }
            seen[row as usize] += 1;
        }
        seen.iter().all(|&count| count == 1)
    }
}
