//! Error types shared across the simulation crate.

use crate::simulation::RunState;
use metapop_codec::CodecError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while compiling a connectivity table into a linear model.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// The table holds no origin patches at all.
    #[error("Connectivity table has no origin patches")]
    EmptyTable,
    /// Two origin records share a grid coordinate.
    #[error("Duplicate origin patch at grid ({nx}, {ny})")]
    DuplicateOrigin { nx: i32, ny: i32 },
    /// A destination is not one of the origin patches (nor the sink).
    #[error("Destination ({to_nx}, {to_ny}) of origin ({nx}, {ny}) is not an origin patch")]
    UnknownDestination {
        nx: i32,
        ny: i32,
        to_nx: i32,
        to_ny: i32,
    },
    /// Destination coordinate and count lists differ in length.
    #[error("Origin ({nx}, {ny}) lists {destinations} destinations but {counts} counts")]
    LengthMismatch {
        nx: i32,
        ny: i32,
        destinations: usize,
        counts: usize,
    },
    /// The grid mask has no geographic position for an origin.
    #[error("Grid mask has no position for patch ({nx}, {ny})")]
    MissingPosition { nx: i32, ny: i32 },
    /// Reading an input file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// An input file is not valid JSON for the expected schema.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors that can occur during simulation building.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// A required parameter is missing
    #[error("Missing required parameter: {0}")]
    MissingRequired(&'static str),
    /// An invalid parameter value was provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Errors raised while building the initial population.
#[derive(Debug, Error)]
pub enum InitializationError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// The label vector does not cover the habitat.
    #[error("Introduction labels cover {found} patches but the habitat has {expected}")]
    LabelCount { expected: usize, found: usize },
    /// A patch did not start exactly at capacity.
    #[error("Patch {patch} starts with {total} occupants instead of capacity {capacity}")]
    NotAtCapacity {
        patch: usize,
        total: u64,
        capacity: u32,
    },
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for InitializationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(format!("JSON error: {e}"))
    }
}

/// Errors that abort a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A patch holds more occupants than its capacity after settlement.
    #[error("Capacity invariant violated at patch {patch}: {total} occupants exceed capacity {capacity}")]
    CapacityExceeded {
        patch: usize,
        total: u64,
        capacity: u32,
    },
    /// The sink patch ended up with occupants.
    #[error("Sink patch {patch} holds {total} occupants")]
    OccupiedSink { patch: usize, total: u64 },
    /// The state buffers could not be allocated.
    #[error("Failed to allocate {what} buffer of {patches} patches x {lineages} lineages")]
    Allocation {
        what: &'static str,
        patches: usize,
        lineages: usize,
    },
    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
    /// `step` was called on a run that already terminated.
    #[error("Run already finished in state {0}")]
    Finished(RunState),
    /// A checkpoint could not be turned back into a simulation.
    #[error("Invalid checkpoint: {0}")]
    Checkpoint(String),
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error(transparent)]
    Initialization(#[from] InitializationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Database error types.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Database initialization error: {0}")]
    Initialization(String),
    #[error("Transaction error: {0}")]
    Transaction(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Insert error: {0}")]
    Insert(String),
    #[error("Close error: {0}")]
    Close(String),
    #[error("Recorder error: {0}")]
    Recorder(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
