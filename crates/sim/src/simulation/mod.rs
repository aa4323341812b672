//! Simulation engine and population management.
//!
//! This module provides the generation loop, the state it advances and the
//! experiments built on top of it.
//!
//! - `Simulation`: the driver that alternates dispersal and settlement and
//!   decides when a run terminates.
//! - `Population`: occupancy matrix plus the generation counter.
//! - `SimulationBuilder`: fluent builder for constructing `Simulation`
//!   instances with defaults and validation.

pub mod builder;
pub mod configs;
pub mod engine;
pub mod experiment;
pub mod initialization;
pub mod population;
pub mod snapshot;

pub use builder::SimulationBuilder;
pub use configs::{Introduction, RunConfig};
pub use engine::{RunOutcome, RunState, Simulation, StepReport};
pub use experiment::{
    ExperimentConfig, ExperimentKind, NeutralExperiment, PersistenceExperiment,
    RegionPersistence, ReplicateSummary,
};
pub use initialization::{initialize, IntroductionPlan, LineageLayout};
pub use population::{OccupancyMatrix, Population, SettlementTally};
pub use snapshot::{MemorySink, NullSink, Snapshot, SnapshotSink};
