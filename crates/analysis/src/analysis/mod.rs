//! Analysis tools for recorded metapopulation runs.
//!
//! - Survivor origins: presence and spatial spread of each introduced
//!   lineage at a chosen generation, across replicates
//! - Persistence summaries for the two-lineage experiment
//! - Per-run trajectories of lineage totals

pub mod persistence;
pub mod survivors;
pub mod temporal;
pub mod utils;

pub use persistence::{persistence_summary, RegionPersistenceSummary};
pub use survivors::{survivor_origins, LineageKey, LineageSurvival, SurvivorSummary};
pub use temporal::{lineage_trajectory, TrajectoryPoint};
