use anyhow::{Context, Result};
use metapop_sim::simulation::Simulation;
use metapop_sim::storage::{BufferConfig, QueryBuilder, Recorder};
use std::path::PathBuf;

use crate::args::HabitatArgs;
use crate::printing::print_run_config;
use crate::utils::{load_habitat, progress_bar};

pub fn resume_run(
    habitat: &HabitatArgs,
    database: &PathBuf,
    run_id: Option<i64>,
    show_progress: bool,
) -> Result<()> {
    println!("🌊 Metapop - Resuming Run");
    println!("============================================\n");

    let query = QueryBuilder::new(database).context("Failed to open database")?;
    let run_id = match run_id {
        Some(id) => id,
        None => {
            let runs = query.get_runs().context("Failed to list runs")?;
            runs.iter()
                .rev()
                .find(|r| !r.status.is_terminal())
                .map(|r| r.run_id)
                .context("No unfinished run found in database")?
        }
    };

    let model = load_habitat(habitat)?;
    println!("📂 Loading checkpoint of run {run_id}...");
    let mut sim = Simulation::from_checkpoint(model.clone(), &query, run_id)
        .with_context(|| format!("Failed to resume run {run_id}"))?;
    query.close().ok();

    let start_generation = sim.generation();
    let total_generations = sim.config().generations;
    println!("✓ Loaded checkpoint from generation {start_generation}");
    print_run_config(sim.config());
    println!();

    let mut recorder = Recorder::create(database, &model, &[], BufferConfig::default())
        .context("Failed to create recorder")?;
    recorder.resume_run(run_id, sim.config().codec);

    let pb = progress_bar(total_generations as u64, show_progress)?;
    pb.set_position(start_generation as u64);
    let outcome = sim
        .run_with(&mut recorder, |report| pb.set_position(report.generation as u64))
        .with_context(|| format!("Run {run_id} failed"))?;
    pb.finish_with_message("Done");

    recorder.close().context("Failed to close recorder")?;

    println!("\n✓ Run {run_id} finished: {}", outcome.status);
    println!("  Final generation: {}", outcome.generations);
    if let Some(generation) = outcome.extinction_generation {
        println!("  Introduced lineages extinct at generation {generation}");
    }

    Ok(())
}
