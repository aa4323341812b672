use crate::defaults;
use clap::{Args, Subcommand};
use metapop_codec::CodecStrategy;
use metapop_sim::simulation::{Introduction, RunConfig};
use metapop_sim::storage::RecordingStrategy;
use std::path::PathBuf;

/// Input files describing the habitat.
#[derive(Args, Debug, Clone)]
pub struct HabitatArgs {
    /// Connectivity table (JSON, one record per origin patch)
    #[arg(short, long)]
    pub connectivity: PathBuf,

    /// Grid mask with the geographic position of every cell (JSON)
    #[arg(short, long)]
    pub mask: PathBuf,
}

/// Parameters shared by every experiment.
#[derive(Args, Debug, Clone)]
pub struct RunParams {
    /// Introduction region of every patch (JSON array, negative = unassigned)
    ///
    /// Defaults to one region per patch.
    #[arg(short, long)]
    pub labels: Option<PathBuf>,

    /// Output database path
    #[arg(short, long, default_value = defaults::OUTPUT_DB)]
    pub database: PathBuf,

    /// Maximum occupants per patch
    #[arg(short = 'p', long, default_value_t = defaults::CAPACITY)]
    pub capacity: u32,

    /// Number of generations
    #[arg(short, long, default_value_t = defaults::GENERATIONS)]
    pub generations: usize,

    /// Individuals introduced per region (negative fills each region)
    #[arg(long, default_value_t = defaults::NINTRO, allow_negative_numbers = true)]
    pub nintro: i64,

    /// Number of replicates
    #[arg(short, long, default_value_t = defaults::REPLICATES)]
    pub replicates: usize,

    /// Random seed of the first replicate
    #[arg(long)]
    pub seed: Option<u64>,

    /// Record every N generations
    #[arg(long, default_value_t = defaults::RECORD_EVERY)]
    pub record_every: usize,

    /// Worker threads per run (default: the global pool)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Fixed partition count, for results independent of thread count
    #[arg(long)]
    pub partitions: Option<usize>,

    /// Snapshot encoding (unpacked, unpacked-z, sparse-z)
    #[arg(long, default_value = defaults::CODEC)]
    pub codec: CodecStrategy,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl RunParams {
    pub fn run_config(&self, fecundity: f64, filler_fecundity: Option<f64>) -> RunConfig {
        RunConfig {
            fecundity,
            filler_fecundity,
            capacity: self.capacity,
            generations: self.generations,
            introduction: Introduction::from_nintro(self.nintro),
            seed: self.seed,
            workers: self.workers,
            chunks_per_worker: defaults::CHUNKS_PER_WORKER,
            partitions: self.partitions,
            recording: RecordingStrategy::EveryN(self.record_every),
            codec: self.codec,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub habitat: HabitatArgs,

    #[command(flatten)]
    pub params: RunParams,

    /// Propagules per occupant per generation (R)
    #[arg(short = 'R', long, default_value_t = defaults::FECUNDITY)]
    pub fecundity: f64,
}

#[derive(Args, Debug)]
pub struct PersistenceArgs {
    #[command(flatten)]
    pub habitat: HabitatArgs,

    #[command(flatten)]
    pub params: RunParams,

    /// Fecundity of the introduced lineage
    #[arg(long)]
    pub r0: f64,

    /// Fecundity of the native (filler) lineage
    #[arg(long)]
    pub r1: f64,
}

#[derive(Subcommand, Debug)]
pub enum AnalyzeTarget {
    /// Presence of every introduction region's descendants at a generation
    Survivors {
        /// Generation to inspect
        #[arg(short, long)]
        generation: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Persistence fractions of the two-lineage experiment
    Persistence {
        /// Horizon to evaluate (default: the simulated one)
        #[arg(long)]
        horizon: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Lineage totals of one run over its recorded generations
    Trajectory {
        #[arg(long)]
        run_id: i64,
    },
}
