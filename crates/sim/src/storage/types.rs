use crate::errors::{DatabaseError, SimulationError};
use crate::simulation::{LineageLayout, OccupancyMatrix, RunConfig, RunState};
use metapop_codec::CodecStrategy;
use serde::{Deserialize, Serialize};

/// Recording strategy for when to persist simulation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingStrategy {
    /// Record every N generations.
    EveryN(usize),

    /// Record at specific generations.
    Specific(Vec<usize>),

    /// Record all generations.
    All,

    /// Record only the final state of a completed run.
    FinalOnly,
}

impl RecordingStrategy {
    /// Check if generation should be recorded
    pub fn should_record(&self, generation: usize) -> bool {
        match self {
            Self::EveryN(n) => *n > 0 && generation % n == 0,
            Self::Specific(gens) => gens.contains(&generation),
            Self::All => true,
            Self::FinalOnly => false,
        }
    }
}

/// One non-sink patch of the habitat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub index: usize,
    pub nx: i32,
    pub ny: i32,
    pub lon: f64,
    pub lat: f64,
}

/// A registered run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: i64,
    /// Label of the batch this run belongs to (e.g. replicate number).
    pub replicate: usize,
    pub seed: u64,
    pub config: RunConfig,
    pub layout: LineageLayout,
    pub status: RunState,
    pub generations: usize,
    pub extinction_generation: Option<usize>,
}

/// Encoded occupancy matrix of one run at one generation.
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub run_id: i64,
    pub generation: usize,
    pub patches: usize,
    pub lineages: usize,
    pub codec: CodecStrategy,
    pub data: Vec<u8>,
    pub rng_state: Option<Vec<u8>>,
}

impl SnapshotRecord {
    /// Decode the stored matrix.
    pub fn occupancy(&self) -> Result<OccupancyMatrix, SimulationError> {
        let values = self.codec.decode(&self.data).map_err(DatabaseError::from)?;
        OccupancyMatrix::from_vec(self.patches, self.lineages, values)
    }
}

/// Outcome of one region in one persistence replicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceRecord {
    pub replicate: usize,
    pub region: usize,
    /// Generations the introduced lineage survived (or the horizon).
    pub generations: usize,
    /// Whether it was still present at the horizon.
    pub persisted: bool,
    /// Final per-patch occupancy of the introduced lineage.
    pub final_introduced: Vec<u32>,
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_strategy() {
        let every = RecordingStrategy::EveryN(5);
        assert!(every.should_record(0));
        assert!(every.should_record(10));
        assert!(!every.should_record(7));
        assert!(!RecordingStrategy::EveryN(0).should_record(0));

        let specific = RecordingStrategy::Specific(vec![3, 8]);
        assert!(specific.should_record(8));
        assert!(!specific.should_record(4));

        assert!(RecordingStrategy::All.should_record(13));
        assert!(!RecordingStrategy::FinalOnly.should_record(0));
    }

    #[test]
    fn test_snapshot_decodes() {
        let values = vec![0, 3, 0, 0, 1, 0];
        let codec = CodecStrategy::SparseZ;
        let record = SnapshotRecord {
            run_id: 1,
            generation: 4,
            patches: 3,
            lineages: 2,
            codec,
            data: codec.encode(&values).unwrap(),
            rng_state: None,
        };
        let occ = record.occupancy().unwrap();
        assert_eq!(occ.get(0, 1), 3);
        assert_eq!(occ.get(2, 0), 1);
    }
}
