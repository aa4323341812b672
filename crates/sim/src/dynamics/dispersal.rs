//! Dispersal projector.

use super::stochastic_round;
use crate::connectivity::LinearModel;
use crate::simulation::OccupancyMatrix;
use rand::Rng;
use std::ops::Range;

/// Disperse the propagules of lineages `lineages` into `tally`.
///
/// `tally` is the lineage-major chunk owned by this range: one column of
/// `model.len()` counts per lineage, starting at `lineages.start`. It must be
/// zeroed by the caller. Lineages whose entry in `totals` is zero are
/// skipped, as are empty patches. Each occupied patch launches
/// `floor(R * occupancy * frac_return + U)` propagules and each propagule
/// draws its destination from the origin's cumulative distribution. The
/// sink may receive arrivals; it never launches.
pub fn project_dispersal<R: Rng + ?Sized>(
    model: &LinearModel,
    occupancy: &OccupancyMatrix,
    fecundity: &[f64],
    totals: &[u64],
    lineages: Range<usize>,
    tally: &mut [u32],
    rng: &mut R,
) {
    let domain = model.len();
    debug_assert_eq!(tally.len(), lineages.len() * domain);

    for (lineage, column) in lineages.zip(tally.chunks_exact_mut(domain)) {
        if totals[lineage] == 0 {
            continue;
        }
        let rate = fecundity[lineage];

        for patch in 0..model.patch_count() {
            let occupants = occupancy.get(patch, lineage);
            if occupants == 0 {
                continue;
            }
            let record = model.record(patch);
            let expected = rate * f64::from(occupants) * record.frac_return();
            let propagules = stochastic_round(expected, rng);

            for _ in 0..propagules {
                if let Some(dest) = record.sample(rng.random::<f64>()) {
                    debug_assert!(column[dest] < u32::MAX, "arrival tally overflow at {dest}");
                    column[dest] = column[dest].saturating_add(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityTable, GridCoord, GridMask, OriginRecord, SINK_COORD};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn model() -> LinearModel {
        let a = GridCoord::new(0, 0);
        let b = GridCoord::new(1, 0);
        let table = ConnectivityTable::new(vec![
            OriginRecord::new(a, 4, &[(b, 2), (SINK_COORD, 2)]),
            OriginRecord::new(b, 0, &[]),
        ]);
        LinearModel::build(&table, &GridMask::identity(&[a, b])).unwrap()
    }

    #[test]
    fn test_arrivals_follow_connectivity() {
        let model = model();
        let mut occ = OccupancyMatrix::zeros(model.len(), 2).unwrap();
        occ.set(0, 0, 10);
        occ.set(1, 1, 10);
        let totals = occ.lineage_totals();
        let mut tally = vec![0u32; 2 * model.len()];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);

        // frac_return = 1.0, so R = 2 yields exactly 20 propagules.
        project_dispersal(&model, &occ, &[2.0, 2.0], &totals, 0..2, &mut tally, &mut rng);

        let (lineage0, lineage1) = tally.split_at(model.len());
        assert_eq!(lineage0[0], 0);
        assert_eq!(lineage0[1] + lineage0[2], 20);
        assert!(lineage0[1] > 0 && lineage0[2] > 0);
        // Patch B launched nothing.
        assert!(lineage1.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_zero_fecundity_launches_nothing() {
        let model = model();
        let mut occ = OccupancyMatrix::zeros(model.len(), 1).unwrap();
        occ.set(0, 0, 10);
        let totals = occ.lineage_totals();
        let mut tally = vec![0u32; model.len()];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        project_dispersal(&model, &occ, &[0.0], &totals, 0..1, &mut tally, &mut rng);
        assert!(tally.iter().all(|&v| v == 0));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "arrival tally overflow")]
    fn test_tally_overflow_is_caught() {
        let model = model();
        let mut occ = OccupancyMatrix::zeros(model.len(), 1).unwrap();
        occ.set(0, 0, 10);
        let totals = occ.lineage_totals();
        let mut tally = vec![u32::MAX; model.len()];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        project_dispersal(&model, &occ, &[1.0], &totals, 0..1, &mut tally, &mut rng);
    }

    #[test]
    fn test_sub_range_writes_own_columns() {
        let model = model();
        let mut occ = OccupancyMatrix::zeros(model.len(), 3).unwrap();
        occ.set(0, 2, 5);
        let totals = occ.lineage_totals();
        let mut tally = vec![0u32; model.len()];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        project_dispersal(&model, &occ, &[1.0; 3], &totals, 2..3, &mut tally, &mut rng);
        assert_eq!(tally.iter().sum::<u32>(), 5);
    }
}
