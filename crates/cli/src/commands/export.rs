use anyhow::{Context, Result};
use metapop_sim::storage::QueryBuilder;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Write one snapshot as CSV: patch coordinates followed by the occupancy of
/// every lineage. The sink is left out.
pub fn export_snapshot(
    database: &PathBuf,
    run_id: Option<i64>,
    generation: Option<usize>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let query = QueryBuilder::new(database).context("Failed to open database")?;

    let run = match run_id {
        Some(id) => query
            .get_run(id)
            .context("Failed to load run")?
            .with_context(|| format!("Run {id} not found"))?,
        None => query
            .get_runs()
            .context("Failed to list runs")?
            .into_iter()
            .next()
            .context("No runs recorded in database")?,
    };

    let snapshot = match generation {
        Some(g) => query
            .get_snapshot(run.run_id, g)
            .context("Failed to load snapshot")?
            .with_context(|| format!("Run {} has no snapshot at generation {g}", run.run_id))?,
        None => query
            .get_latest_snapshot(run.run_id)
            .context("Failed to load snapshot")?
            .with_context(|| format!("Run {} has no recorded snapshot", run.run_id))?,
    };
    eprintln!(
        "📤 Exporting run {} at generation {}",
        run.run_id, snapshot.generation
    );

    let occupancy = snapshot.occupancy().context("Failed to decode snapshot")?;
    let patches = query.get_patches().context("Failed to load patches")?;

    let mut content = String::from("index,nx,ny,lon,lat");
    for lineage in 0..occupancy.lineages() {
        match run.layout.region_of(lineage) {
            Some(region) => write!(content, ",region_{region}")?,
            None => content.push_str(",filler"),
        }
    }
    content.push('\n');

    for patch in &patches {
        if patch.index >= occupancy.patches() {
            anyhow::bail!(
                "Patch {} is outside the snapshot ({} patches)",
                patch.index,
                occupancy.patches()
            );
        }
        write!(
            content,
            "{},{},{},{},{}",
            patch.index, patch.nx, patch.ny, patch.lon, patch.lat
        )?;
        for &n in occupancy.row(patch.index) {
            write!(content, ",{n}")?;
        }
        content.push('\n');
    }

    if let Some(path) = output {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("✓ Data exported to: {}", path.display());
    } else {
        print!("{content}");
    }

    Ok(())
}
