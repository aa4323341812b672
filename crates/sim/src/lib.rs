//! # Simulation Crate
//!
//! The `metapop-sim` crate simulates a capacity-limited metapopulation of
//! competing lineages on a fixed habitat of patches. It compiles particle
//! tracking statistics into a linear connectivity model, alternates
//! stochastic dispersal and settlement each generation, and records
//! occupancy snapshots to SQLite.

pub mod connectivity;
pub mod dynamics;
pub mod errors;
pub mod prelude;
pub mod simulation;
pub mod storage;

pub use connectivity::LinearModel;
pub use simulation::{Simulation, SimulationBuilder};
