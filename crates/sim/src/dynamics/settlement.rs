//! Settlement arbitrator.

use crate::simulation::SettlementTally;
use rand::Rng;
use std::ops::Range;

/// Settle arrivals at patches `patches` into `next`.
///
/// `next` is the patch-major chunk owned by this range (pre-zeroed, one row
/// of `tally.lineages()` counts per patch). A patch whose arrivals fit in
/// `capacity` keeps them all; an oversubscribed patch is filled with
/// `capacity` independent draws weighted by each lineage's share of the
/// arrivals. This is sampling with replacement: unbiased in expectation,
/// though a lineage can win more slots than it sent propagules. The sink
/// row is always left empty.
pub fn arbitrate_settlement<R: Rng + ?Sized>(
    tally: &SettlementTally,
    capacity: u32,
    sink: usize,
    patches: Range<usize>,
    next: &mut [u32],
    rng: &mut R,
) {
    let lineages = tally.lineages();
    debug_assert_eq!(next.len(), patches.len() * lineages);
    if lineages == 0 {
        return;
    }

    let mut present: Vec<usize> = Vec::new();
    let mut cumulative: Vec<f64> = Vec::new();

    for (patch, row) in patches.zip(next.chunks_exact_mut(lineages)) {
        if patch == sink {
            continue;
        }
        let total = tally.patch_total(patch);
        if total == 0 {
            continue;
        }

        if total <= u64::from(capacity) {
            for (lineage, slot) in row.iter_mut().enumerate() {
                *slot = tally.get(patch, lineage);
            }
            continue;
        }

        present.clear();
        cumulative.clear();
        let mut running = 0u64;
        for lineage in 0..lineages {
            let arrivals = tally.get(patch, lineage);
            if arrivals > 0 {
                running += u64::from(arrivals);
                present.push(lineage);
                cumulative.push(running as f64 / total as f64);
            }
        }
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        let last = present.len() - 1;
        for _ in 0..capacity {
            let u = rng.random::<f64>();
            let k = cumulative.partition_point(|&c| c < u).min(last);
            row[present[k]] += 1;
        }
    }
}
