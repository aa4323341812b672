//! Temporal analysis
//!
//! Functions for tracking changes over time in recorded runs.

use crate::errors::AnalysisError;
use metapop_sim::storage::QueryBuilder;
use serde::Serialize;

/// Lineage totals at one recorded generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrajectoryPoint {
    pub generation: usize,
    /// Global occupancy of every lineage.
    pub totals: Vec<u64>,
    /// Patches holding at least one individual of each lineage.
    pub patches_occupied: Vec<usize>,
}

/// Track every lineage of `run_id` over its recorded generations.
pub fn lineage_trajectory(
    query: &QueryBuilder,
    run_id: i64,
) -> Result<Vec<TrajectoryPoint>, AnalysisError> {
    if query.get_run(run_id)?.is_none() {
        return Err(AnalysisError::UnknownRun(run_id));
    }

    let mut points = Vec::new();
    for generation in query.get_recorded_generations(run_id)? {
        let Some(snapshot) = query.get_snapshot(run_id, generation)? else {
            continue;
        };
        let occupancy = snapshot.occupancy()?;
        let patches_occupied = (0..occupancy.lineages())
            .map(|lineage| {
                (0..occupancy.patches())
                    .filter(|&patch| occupancy.get(patch, lineage) > 0)
                    .count()
            })
            .collect();
        points.push(TrajectoryPoint {
            generation,
            totals: occupancy.lineage_totals(),
            patches_occupied,
        });
    }
    Ok(points)
}
