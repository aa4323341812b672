//! # Analysis Crate
//!
//! Summaries computed from databases written by `metapop-sim`: which
//! introduction regions still have descendants at a given generation, and
//! how often each region persists in the two-lineage experiment.

pub mod analysis;
pub mod errors;

pub use analysis::{
    lineage_trajectory, persistence_summary, survivor_origins, LineageKey, LineageSurvival,
    RegionPersistenceSummary, SurvivorSummary, TrajectoryPoint,
};
pub use errors::AnalysisError;
