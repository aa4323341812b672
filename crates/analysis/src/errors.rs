//! Error types for the analysis crate.

use metapop_sim::errors::{DatabaseError, SimulationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The database holds no runs to summarize.
    #[error("Database contains no runs")]
    NoRuns,
    #[error("Unknown run {0}")]
    UnknownRun(i64),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// A stored snapshot could not be decoded.
    #[error(transparent)]
    Snapshot(#[from] SimulationError),
}
