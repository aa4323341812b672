//! Storage module for persisting simulation data.
//!
//! This module provides SQLite-based recording of occupancy snapshots and
//! experiment results, allowing runs to be resumed and analyzed later.

mod database;
mod query;
mod recorder;
pub mod types;

pub use database::{Database, DatabaseStats};
pub use query::QueryBuilder;
pub use recorder::{BufferConfig, Recorder, RecorderStats};
pub use types::{PatchRecord, PersistenceRecord, RecordingStrategy, RunRecord, SnapshotRecord};
