//! Shared default values for the command-line arguments.

pub const OUTPUT_DB: &str = "metapop.db";

pub const FECUNDITY: f64 = 1.0;
pub const CAPACITY: u32 = 1;
pub const GENERATIONS: usize = 100;
/// Negative: fill every introduction region to capacity.
pub const NINTRO: i64 = -1;
pub const REPLICATES: usize = 1;
pub const RECORD_EVERY: usize = 10;
pub const CHUNKS_PER_WORKER: usize = 4;
pub const CODEC: &str = "sparse-z";
