//! Hand-off point between the generation loop and whatever persists it.

use crate::errors::DatabaseError;
use crate::simulation::{OccupancyMatrix, RunOutcome};

/// State of a run at one recorded generation.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub generation: usize,
    pub occupancy: &'a OccupancyMatrix,
    /// Serialized master RNG, enough to resume the run from here.
    pub rng_state: &'a [u8],
}

/// Receiver of snapshots emitted by [`Simulation::run`](crate::simulation::Simulation::run).
///
/// Recording is best-effort: an error returned here is logged and the run
/// carries on.
pub trait SnapshotSink {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> Result<(), DatabaseError>;

    /// Called once when the run terminates.
    fn finish(&mut self, _outcome: &RunOutcome) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn record(&mut self, _snapshot: &Snapshot<'_>) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Sink that keeps every snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub snapshots: Vec<(usize, OccupancyMatrix)>,
    pub outcome: Option<RunOutcome>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generations(&self) -> Vec<usize> {
        self.snapshots.iter().map(|(g, _)| *g).collect()
    }
}

impl SnapshotSink for MemorySink {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> Result<(), DatabaseError> {
        self.snapshots
            .push((snapshot.generation, snapshot.occupancy.clone()));
        Ok(())
    }

    fn finish(&mut self, outcome: &RunOutcome) -> Result<(), DatabaseError> {
        self.outcome = Some(outcome.clone());
        Ok(())
    }
}
