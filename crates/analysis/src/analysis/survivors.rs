//! Where do survivors come from?
//!
//! For a chosen generation, count across all recorded runs how often the
//! descendants of each introduction region are still present, and how they
//! are spread over the habitat.

use crate::analysis::utils::mean;
use crate::errors::AnalysisError;
use metapop_sim::errors::SimulationError;
use metapop_sim::simulation::OccupancyMatrix;
use metapop_sim::storage::{QueryBuilder, RunRecord};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Identity of a lineage that is stable across runs of the same plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LineageKey {
    /// Descendants of the individuals introduced in this region.
    Region(usize),
    Filler,
}

impl std::fmt::Display for LineageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Region(r) => write!(f, "region {r}"),
            Self::Filler => write!(f, "filler"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageSurvival {
    pub lineage: LineageKey,
    /// Runs in which the lineage occupies at least one patch.
    pub runs_present: usize,
    /// Fraction of all runs in which it is present.
    pub fraction_present: f64,
    /// Occupants summed over all runs.
    pub total_occupancy: u64,
    /// Occupancy of every non-sink patch as a fraction of capacity,
    /// averaged over all runs.
    pub mean_fill: Vec<f64>,
}

impl LineageSurvival {
    /// Habitat-wide mean of [`mean_fill`](Self::mean_fill).
    pub fn mean_habitat_fill(&self) -> f64 {
        mean(&self.mean_fill)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivorSummary {
    pub generation: usize,
    /// Runs in the database.
    pub runs: usize,
    /// Runs with a snapshot at `generation`. The others count as extinct.
    pub runs_recorded: usize,
    pub lineages: Vec<LineageSurvival>,
}

#[derive(Default)]
struct Accumulator {
    runs_present: usize,
    total_occupancy: u64,
    fill: Vec<f64>,
}

/// Summarize lineage presence at `generation` over every run in `query`.
///
/// A run without a snapshot at `generation` counts as one in which every
/// lineage is absent: runs stop recording once their introduced lineages
/// are extinct.
pub fn survivor_origins(
    query: &QueryBuilder,
    generation: usize,
) -> Result<SurvivorSummary, AnalysisError> {
    let runs = query.get_runs()?;
    if runs.is_empty() {
        return Err(AnalysisError::NoRuns);
    }
    let patches = query.get_patches()?.len();

    let mut recorded = Vec::new();
    for run in &runs {
        if let Some(snapshot) = query.get_snapshot(run.run_id, generation)? {
            recorded.push((run, snapshot));
        }
    }
    let runs_recorded = recorded.len();

    let decoded: Vec<(&RunRecord, OccupancyMatrix)> = recorded
        .into_par_iter()
        .map(|(run, snapshot)| Ok::<_, SimulationError>((run, snapshot.occupancy()?)))
        .collect::<Result<_, SimulationError>>()?;

    let mut acc: BTreeMap<LineageKey, Accumulator> = BTreeMap::new();
    for run in &runs {
        for lineage in 0..run.layout.lineages() {
            acc.entry(key_of(run, lineage)).or_insert_with(|| Accumulator {
                fill: vec![0.0; patches],
                ..Default::default()
            });
        }
    }

    for (run, occupancy) in &decoded {
        let capacity = f64::from(run.config.capacity.max(1));
        let lineages = occupancy.lineages().min(run.layout.lineages());
        for lineage in 0..lineages {
            let Some(entry) = acc.get_mut(&key_of(run, lineage)) else {
                continue;
            };
            let mut total = 0u64;
            for (patch, fill) in entry.fill.iter_mut().enumerate().take(occupancy.patches()) {
                let n = occupancy.get(patch, lineage);
                total += u64::from(n);
                *fill += f64::from(n) / capacity;
            }
            if total > 0 {
                entry.runs_present += 1;
            }
            entry.total_occupancy += total;
        }
    }

    let n_runs = runs.len() as f64;
    let lineages = acc
        .into_iter()
        .map(|(lineage, a)| LineageSurvival {
            lineage,
            runs_present: a.runs_present,
            fraction_present: a.runs_present as f64 / n_runs,
            total_occupancy: a.total_occupancy,
            mean_fill: a.fill.into_iter().map(|f| f / n_runs).collect(),
        })
        .collect();

    Ok(SurvivorSummary {
        generation,
        runs: runs.len(),
        runs_recorded,
        lineages,
    })
}

fn key_of(run: &RunRecord, lineage: usize) -> LineageKey {
    run.layout
        .region_of(lineage)
        .map_or(LineageKey::Filler, LineageKey::Region)
}
