use anyhow::{Context, Result};
use metapop_sim::simulation::ExperimentConfig;
use metapop_sim::storage::QueryBuilder;
use std::path::PathBuf;

use crate::printing::print_experiment;

pub fn show_info(database: &PathBuf) -> Result<()> {
    let query = QueryBuilder::new(database).context("Failed to open database")?;
    let metadata = query.get_metadata().context("Failed to read metadata")?;
    let stats = query.stats().context("Failed to read database statistics")?;

    println!("\n📊 Database Information");
    println!("{}", "=".repeat(50));
    println!("Patches: {}", stats.patches);
    println!("Runs: {}", stats.runs);
    println!("Snapshots: {}", stats.snapshots);
    println!("Persistence rows: {}", stats.persistence_rows);

    let mut keys: Vec<_> = metadata
        .keys()
        .filter(|k| k.as_str() != ExperimentConfig::METADATA_KEY)
        .collect();
    keys.sort();
    println!("\nMetadata:");
    for key in keys {
        println!("  {key}: {}", metadata[key]);
    }

    if let Some(json) = metadata.get(ExperimentConfig::METADATA_KEY) {
        let experiment: ExperimentConfig =
            serde_json::from_str(json).context("Failed to parse experiment configuration")?;
        print_experiment(&experiment);
    }

    let runs = query.get_runs().context("Failed to list runs")?;
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    println!("📈 Runs:");
    println!(
        "{:>7} {:>9} {:>22} {:>14} {:>12} {:>10}",
        "run_id", "replicate", "seed", "status", "generations", "recorded"
    );
    for run in &runs {
        let recorded = query
            .get_recorded_generations(run.run_id)
            .with_context(|| format!("Failed to list snapshots of run {}", run.run_id))?;
        println!(
            "{:>7} {:>9} {:>22} {:>14} {:>12} {:>10}",
            run.run_id,
            run.replicate,
            run.seed,
            run.status,
            run.generations,
            recorded.len()
        );
    }

    Ok(())
}
