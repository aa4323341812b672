//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use metapop_sim::prelude::*;
//!
//! let plan = IntroductionPlan::from_raw(&[0, 0, -1]);
//! assert_eq!(plan.regions(), vec![0]);
//! ```

pub use crate::connectivity::{ConnectivityTable, GridCoord, GridMask, LinearModel};
pub use crate::errors;
pub use crate::simulation::{
    Introduction, IntroductionPlan, NullSink, RunConfig, RunOutcome, RunState, Simulation,
    SimulationBuilder, SnapshotSink,
};
pub use crate::storage::{QueryBuilder, Recorder, RecordingStrategy};
