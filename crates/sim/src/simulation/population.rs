//! Population state: the occupancy matrix and the per-generation settlement
//! tally.

use crate::errors::SimulationError;

fn alloc_zeroed(
    what: &'static str,
    patches: usize,
    lineages: usize,
) -> Result<Vec<u32>, SimulationError> {
    let err = || SimulationError::Allocation {
        what,
        patches,
        lineages,
    };
    let len = patches.checked_mul(lineages).ok_or_else(err)?;
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|_| err())?;
    data.resize(len, 0);
    Ok(data)
}

/// Patches x lineages occupancy counts, stored patch-major so that a range
/// of patches is one contiguous slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyMatrix {
    patches: usize,
    lineages: usize,
    data: Vec<u32>,
}

impl OccupancyMatrix {
    /// Allocate an empty matrix.
    pub fn zeros(patches: usize, lineages: usize) -> Result<Self, SimulationError> {
        Ok(Self {
            patches,
            lineages,
            data: alloc_zeroed("occupancy", patches, lineages)?,
        })
    }

    /// Wrap a flat patch-major buffer, e.g. one decoded from a snapshot.
    pub fn from_vec(patches: usize, lineages: usize, data: Vec<u32>) -> Result<Self, SimulationError> {
        if Some(data.len()) != patches.checked_mul(lineages) {
            return Err(SimulationError::Checkpoint(format!(
                "occupancy buffer holds {} values, expected {patches} x {lineages}",
                data.len()
            )));
        }
        Ok(Self {
            patches,
            lineages,
            data,
        })
    }

    pub fn patches(&self) -> usize {
        self.patches
    }

    pub fn lineages(&self) -> usize {
        self.lineages
    }

    #[inline]
    pub fn get(&self, patch: usize, lineage: usize) -> u32 {
        self.data[patch * self.lineages + lineage]
    }

    #[inline]
    pub fn set(&mut self, patch: usize, lineage: usize, value: u32) {
        self.data[patch * self.lineages + lineage] = value;
    }

    #[inline]
    pub fn add(&mut self, patch: usize, lineage: usize, value: u32) {
        self.data[patch * self.lineages + lineage] += value;
    }

    pub fn row(&self, patch: usize) -> &[u32] {
        &self.data[patch * self.lineages..(patch + 1) * self.lineages]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn patch_total(&self, patch: usize) -> u64 {
        self.row(patch).iter().map(|&v| u64::from(v)).sum()
    }

    /// Global occupancy of every lineage.
    pub fn lineage_totals(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.lineages];
        for row in self.data.chunks_exact(self.lineages.max(1)) {
            for (total, &v) in totals.iter_mut().zip(row) {
                *total += u64::from(v);
            }
        }
        totals
    }

    /// Number of lineages with non-zero global occupancy.
    pub fn occupied_lineages(&self) -> usize {
        self.lineage_totals().iter().filter(|&&t| t > 0).count()
    }

    /// Fail if any patch holds more than `capacity`, or if `sink` holds
    /// anyone at all.
    pub fn check_capacity(&self, capacity: u32, sink: usize) -> Result<(), SimulationError> {
        for patch in 0..self.patches {
            let total = self.patch_total(patch);
            if patch == sink && total > 0 {
                return Err(SimulationError::OccupiedSink { patch, total });
            }
            if total > u64::from(capacity) {
                return Err(SimulationError::CapacityExceeded {
                    patch,
                    total,
                    capacity,
                });
            }
        }
        Ok(())
    }
}

/// Patches x lineages propagule arrivals for one generation, stored
/// lineage-major so that a range of lineages is one contiguous slice.
#[derive(Debug, Clone)]
pub struct SettlementTally {
    patches: usize,
    lineages: usize,
    data: Vec<u32>,
}

impl SettlementTally {
    pub fn zeros(patches: usize, lineages: usize) -> Result<Self, SimulationError> {
        Ok(Self {
            patches,
            lineages,
            data: alloc_zeroed("settlement tally", patches, lineages)?,
        })
    }

    pub fn patches(&self) -> usize {
        self.patches
    }

    pub fn lineages(&self) -> usize {
        self.lineages
    }

    #[inline]
    pub fn get(&self, patch: usize, lineage: usize) -> u32 {
        self.data[lineage * self.patches + patch]
    }

    /// Arrivals of one lineage at every patch.
    pub fn column(&self, lineage: usize) -> &[u32] {
        &self.data[lineage * self.patches..(lineage + 1) * self.patches]
    }

    /// Total arrivals at `patch` across lineages.
    pub fn patch_total(&self, patch: usize) -> u64 {
        (0..self.lineages)
            .map(|l| u64::from(self.get(patch, l)))
            .sum()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

/// Occupancy of the habitat at a given generation.
#[derive(Debug, Clone)]
pub struct Population {
    occupancy: OccupancyMatrix,
    generation: usize,
}

impl Population {
    pub fn new(occupancy: OccupancyMatrix) -> Self {
        Self {
            occupancy,
            generation: 0,
        }
    }

    /// Restore a population at a recorded generation.
    pub fn at_generation(occupancy: OccupancyMatrix, generation: usize) -> Self {
        Self {
            occupancy,
            generation,
        }
    }

    pub fn occupancy(&self) -> &OccupancyMatrix {
        &self.occupancy
    }

    pub fn occupancy_mut(&mut self) -> &mut OccupancyMatrix {
        &mut self.occupancy
    }

    /// Get the current generation number.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Install the next generation's occupancy, handing back the previous
    /// buffer for reuse.
    pub fn advance(&mut self, next: &mut OccupancyMatrix) {
        std::mem::swap(&mut self.occupancy, next);
        self.generation += 1;
    }
}
