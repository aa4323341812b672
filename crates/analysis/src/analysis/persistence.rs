//! Summaries of the two-lineage persistence experiment.

use crate::analysis::utils::{mean, std_dev};
use metapop_sim::storage::PersistenceRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Persistence of one introduction region across replicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionPersistenceSummary {
    pub region: usize,
    pub replicates: usize,
    /// Replicates in which the introduced lineage was present at the horizon.
    pub persisted: usize,
    pub fraction_persisted: f64,
    /// Mean generations survived, truncated at the horizon.
    pub mean_generations: f64,
    pub std_generations: f64,
}

/// Whether the lineage of `row` was still present at generation `horizon`.
///
/// A lineage that went extinct at generation `g` was last present at
/// `g - 1`; one that persisted was present through `row.generations`.
fn present_at(row: &PersistenceRecord, horizon: usize) -> bool {
    if row.persisted {
        horizon <= row.generations
    } else {
        horizon < row.generations
    }
}

/// Per-region persistence summary, in ascending region order.
///
/// `horizon` may be earlier than the simulated one; persistence times are
/// truncated to it.
pub fn persistence_summary(rows: &[PersistenceRecord], horizon: usize) -> Vec<RegionPersistenceSummary> {
    let mut by_region: BTreeMap<usize, Vec<&PersistenceRecord>> = BTreeMap::new();
    for row in rows {
        by_region.entry(row.region).or_default().push(row);
    }

    by_region
        .into_iter()
        .map(|(region, rows)| {
            let persisted = rows.iter().filter(|r| present_at(r, horizon)).count();
            let times: Vec<f64> = rows
                .iter()
                .map(|r| r.generations.min(horizon) as f64)
                .collect();
            RegionPersistenceSummary {
                region,
                replicates: rows.len(),
                persisted,
                fraction_persisted: persisted as f64 / rows.len() as f64,
                mean_generations: mean(&times),
                std_generations: std_dev(&times),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(replicate: usize, region: usize, generations: usize, persisted: bool) -> PersistenceRecord {
        PersistenceRecord {
            replicate,
            region,
            generations,
            persisted,
            final_introduced: Vec::new(),
        }
    }

    #[test]
    fn test_summary_at_simulated_horizon() {
        let rows = vec![
            row(0, 3, 100, true),
            row(1, 3, 40, false),
            row(0, 1, 12, false),
            row(1, 1, 100, true),
            row(2, 1, 100, true),
            row(3, 1, 100, true),
        ];
        let summary = persistence_summary(&rows, 100);
        assert_eq!(summary.len(), 2);

        assert_eq!(summary[0].region, 1);
        assert_eq!(summary[0].replicates, 4);
        assert_eq!(summary[0].persisted, 3);
        assert_eq!(summary[0].fraction_persisted, 0.75);
        assert_eq!(summary[0].mean_generations, 78.0);

        assert_eq!(summary[1].region, 3);
        assert_eq!(summary[1].fraction_persisted, 0.5);
        assert_eq!(summary[1].mean_generations, 70.0);
    }

    #[test]
    fn test_earlier_horizon() {
        let rows = vec![row(0, 0, 40, false), row(1, 0, 100, true)];
        let at_39 = persistence_summary(&rows, 39);
        assert_eq!(at_39[0].persisted, 2);
        assert_eq!(at_39[0].mean_generations, 39.0);

        // Extinct at 40 means absent at 40.
        assert_eq!(persistence_summary(&rows, 40)[0].persisted, 1);
    }

    #[test]
    fn test_no_rows() {
        assert!(persistence_summary(&[], 10).is_empty());
    }
}
