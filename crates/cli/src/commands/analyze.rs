use anyhow::{Context, Result};
use metapop_analysis::{lineage_trajectory, persistence_summary, survivor_origins};
use metapop_sim::simulation::ExperimentConfig;
use metapop_sim::storage::QueryBuilder;
use std::path::PathBuf;

use crate::printing::{print_persistence_summary, print_survivors};

pub fn analyze_survivors(database: &PathBuf, generation: usize, json: bool) -> Result<()> {
    let query = QueryBuilder::new(database).context("Failed to open database")?;
    let summary = survivor_origins(&query, generation)
        .with_context(|| format!("Failed to analyze generation {generation}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_survivors(&summary);
    }
    Ok(())
}

pub fn analyze_persistence(database: &PathBuf, horizon: Option<usize>, json: bool) -> Result<()> {
    let query = QueryBuilder::new(database).context("Failed to open database")?;
    let rows = query
        .get_persistence()
        .context("Failed to load persistence results")?;
    if rows.is_empty() {
        anyhow::bail!("No persistence results found. Did you run 'metapop persistence'?");
    }

    let horizon = match horizon {
        Some(h) => h,
        None => simulated_horizon(&query)?
            .unwrap_or_else(|| rows.iter().map(|r| r.generations).max().unwrap_or(0)),
    };
    let summary = persistence_summary(&rows, horizon);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_persistence_summary(horizon, &summary);
    }
    Ok(())
}

/// Generation horizon of the stored experiment, if any.
fn simulated_horizon(query: &QueryBuilder) -> Result<Option<usize>> {
    let Some(json) = query
        .get_metadata_value(ExperimentConfig::METADATA_KEY)
        .context("Failed to read metadata")?
    else {
        return Ok(None);
    };
    let experiment: ExperimentConfig =
        serde_json::from_str(&json).context("Failed to parse experiment configuration")?;
    Ok(Some(experiment.run.generations))
}

pub fn analyze_trajectory(database: &PathBuf, run_id: i64) -> Result<()> {
    let query = QueryBuilder::new(database).context("Failed to open database")?;
    let points = lineage_trajectory(&query, run_id)
        .with_context(|| format!("Failed to load trajectory of run {run_id}"))?;

    println!("generation,lineage,total,patches_occupied");
    for point in &points {
        for (lineage, (total, patches)) in point
            .totals
            .iter()
            .zip(&point.patches_occupied)
            .enumerate()
        {
            println!("{},{lineage},{total},{patches}", point.generation);
        }
    }
    Ok(())
}
