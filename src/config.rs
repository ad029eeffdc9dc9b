//! Tuning knobs for the parallel stages. Block and chunk sizes bound the
//! peak memory of any single task; they never change results, only resource
//! footprint (determinism is guaranteed by the merge discipline).

/// Resource-bounding parameters for a linkage run.
#[derive(Debug, Clone)]
pub struct LinkTuning {
    /// Side length of one distinct-value block in the similarity stage.
    /// A task covers at most `similarity_block^2` score computations.
    pub similarity_block: usize,
    /// Number of cross-product cells one tabulation (or grid-scan
    /// retrieval) task processes.
    pub tabulate_chunk: u64,
}

impl Default for LinkTuning {
    fn default() -> Self {
        Self {
            similarity_block: 1000,
            tabulate_chunk: 1 << 20,
        }
    }
}

/// Preset profiles that bundle common tuning choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningProfile {
    Balanced,
    MemorySaver,
    HighThroughput,
}

impl LinkTuning {
    pub fn from_profile(profile: TuningProfile) -> Self {
        match profile {
            TuningProfile::Balanced => Self::balanced(),
            TuningProfile::MemorySaver => Self::memory_saver(),
            TuningProfile::HighThroughput => Self::high_throughput(),
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }

    pub fn memory_saver() -> Self {
        Self {
            similarity_block: 250,
            tabulate_chunk: 1 << 16,
        }
    }

    pub fn high_throughput() -> Self {
        Self {
            similarity_block: 4000,
            tabulate_chunk: 1 << 22,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_bound_memory_saver_below_default() {
        let saver = LinkTuning::from_profile(TuningProfile::MemorySaver);
        let default = LinkTuning::default();
        assert!(saver.similarity_block < default.similarity_block);
        assert!(saver.tabulate_chunk < default.tabulate_chunk);
    }
}
