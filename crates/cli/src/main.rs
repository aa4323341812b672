mod args;
mod commands;
pub mod defaults;
mod printing;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use args::{AnalyzeTarget, HabitatArgs, PersistenceArgs, RunArgs};
use commands::{analyze, export, inspect, persistence, resume, run};

/// Metapop: larval dispersal and settlement in a patchy habitat
///
/// Simulates discrete generations of sessile adults that release propagules,
/// which drift between habitat patches along an empirical connectivity matrix
/// and compete for a limited number of places.
#[derive(Parser, Debug)]
#[command(name = "metapop")]
#[command(author, version, about = "Simulates dispersal and settlement in a metapopulation", long_about = None)]
struct Cli {
    /// Number of threads to use for parallel processing
    ///
    /// If not specified, defaults to the number of logical CPUs.
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run neutral replicates of an introduction plan.
    ///
    /// Every region of the plan gets its own lineage; snapshots of the
    /// occupancy are recorded to the database.
    Run(Box<RunArgs>),

    /// Run the two-lineage persistence experiment.
    ///
    /// Each region is introduced on its own with fecundity R0 against a
    /// native lineage with fecundity R1.
    Persistence(Box<PersistenceArgs>),

    /// Resume the latest unfinished run from its last snapshot.
    Resume {
        #[command(flatten)]
        habitat: HabitatArgs,

        /// Database path
        #[arg(short, long, default_value = defaults::OUTPUT_DB)]
        database: PathBuf,

        /// Run to resume (default: the latest unfinished one)
        #[arg(long)]
        run_id: Option<i64>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Info: Show metadata and runs stored in a database.
    Info {
        /// Database path
        #[arg(short, long, default_value = defaults::OUTPUT_DB)]
        database: PathBuf,
    },

    /// Analyze recorded results.
    Analyze {
        /// Database path
        #[arg(short, long, default_value = defaults::OUTPUT_DB)]
        database: PathBuf,

        #[command(subcommand)]
        target: AnalyzeTarget,
    },

    /// Export a recorded occupancy snapshot as CSV.
    ///
    /// One row per patch with its coordinates and the occupancy of every
    /// lineage.
    Export {
        /// Database path
        #[arg(short, long, default_value = defaults::OUTPUT_DB)]
        database: PathBuf,

        /// Run to export (default: the first run)
        #[arg(long)]
        run_id: Option<i64>,

        /// Generation to export (default: the latest recorded)
        #[arg(short, long)]
        generation: Option<usize>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    match cli.command {
        Commands::Run(args) => {
            run::run_neutral(&args)?;
        }
        Commands::Persistence(args) => {
            persistence::run_persistence(&args)?;
        }
        Commands::Resume {
            habitat,
            database,
            run_id,
            no_progress,
        } => {
            resume::resume_run(&habitat, &database, run_id, !no_progress)?;
        }
        Commands::Info { database } => {
            inspect::show_info(&database)?;
        }
        Commands::Analyze { database, target } => match target {
            AnalyzeTarget::Survivors { generation, json } => {
                analyze::analyze_survivors(&database, generation, json)?;
            }
            AnalyzeTarget::Persistence { horizon, json } => {
                analyze::analyze_persistence(&database, horizon, json)?;
            }
            AnalyzeTarget::Trajectory { run_id } => {
                analyze::analyze_trajectory(&database, run_id)?;
            }
        },
        Commands::Export {
            database,
            run_id,
            generation,
            output,
        } => {
            export::export_snapshot(&database, run_id, generation, output.as_ref())?;
        }
    }

    Ok(())
}
