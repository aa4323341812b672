//! Connectivity inputs and the linear model compiled from them.
//!
//! The raw table is keyed by grid coordinates and is only used once, at
//! build time. Everything downstream works on the [`LinearModel`], which is
//! immutable and shared by reference for the life of a run.

pub mod model;
pub mod table;

pub use model::{ConnectivityRecord, LinearModel};
pub use table::{ConnectivityTable, GeoCoord, GridCoord, GridMask, MaskCell, OriginRecord, SINK_COORD};
