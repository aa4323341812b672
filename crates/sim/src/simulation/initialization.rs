//! Initial conditions: which lineage starts where.
//!
//! Each patch of the habitat carries an optional region label. Every
//! distinct label becomes one introduced lineage; patches left unassigned,
//! and any capacity the introduced lineages do not use, are occupied by a
//! single filler lineage.

use crate::connectivity::LinearModel;
use crate::errors::{InitializationError, SimulationError};
use crate::simulation::{Introduction, OccupancyMatrix};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Region label of every non-sink patch, in linear index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntroductionPlan {
    labels: Vec<Option<usize>>,
}

impl IntroductionPlan {
    pub fn new(labels: Vec<Option<usize>>) -> Self {
        Self { labels }
    }

    /// Convert raw labels, where any negative value marks an unassigned patch.
    pub fn from_raw(raw: &[i64]) -> Self {
        Self::new(
            raw.iter()
                .map(|&label| usize::try_from(label).ok())
                .collect(),
        )
    }

    /// Read a JSON array of integer labels.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InitializationError> {
        let text = fs::read_to_string(path)?;
        let raw: Vec<i64> = serde_json::from_str(&text)?;
        Ok(Self::from_raw(&raw))
    }

    /// Every patch in region 0: one introduced lineage covering the habitat.
    pub fn uniform(patches: usize) -> Self {
        Self::new(vec![Some(0); patches])
    }

    /// One lineage per patch, labelled by its index.
    pub fn per_patch(patches: usize) -> Self {
        Self::new((0..patches).map(Some).collect())
    }

    /// Keep only `region`; every other patch becomes unassigned.
    pub fn single_region(&self, region: usize) -> Self {
        Self::new(
            self.labels
                .iter()
                .map(|&label| label.filter(|&l| l == region))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    /// Distinct region labels in ascending order.
    pub fn regions(&self) -> Vec<usize> {
        let mut regions: Vec<usize> = self.labels.iter().flatten().copied().collect();
        regions.sort_unstable();
        regions.dedup();
        regions
    }

    /// Patches belonging to `region`.
    pub fn patches_of(&self, region: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == Some(region))
            .map(|(patch, _)| patch)
            .collect()
    }

    pub fn has_unassigned(&self) -> bool {
        self.labels.iter().any(Option::is_none)
    }
}

/// Mapping from lineage columns to what they represent.
///
/// Lineages `0..introduced()` are the regions in ascending label order;
/// the filler, if any, is the last column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageLayout {
    regions: Vec<usize>,
    filler: bool,
}

impl LineageLayout {
    pub fn new(regions: Vec<usize>, filler: bool) -> Self {
        Self { regions, filler }
    }

    /// Total number of lineage columns.
    pub fn lineages(&self) -> usize {
        self.regions.len() + usize::from(self.filler)
    }

    /// Number of introduced (non-filler) lineages.
    pub fn introduced(&self) -> usize {
        self.regions.len()
    }

    pub fn filler(&self) -> Option<usize> {
        self.filler.then_some(self.regions.len())
    }

    /// Region label of an introduced lineage.
    pub fn region_of(&self, lineage: usize) -> Option<usize> {
        self.regions.get(lineage).copied()
    }

    pub fn regions(&self) -> &[usize] {
        &self.regions
    }
}

/// Build the starting occupancy for `plan` on `model`.
///
/// Every non-sink patch starts at exactly `capacity`; this is checked before
/// returning.
pub fn initialize<R: Rng + ?Sized>(
    model: &LinearModel,
    plan: &IntroductionPlan,
    introduction: Introduction,
    capacity: u32,
    rng: &mut R,
) -> Result<(OccupancyMatrix, LineageLayout), SimulationError> {
    let patches = model.patch_count();
    if plan.len() != patches {
        return Err(InitializationError::LabelCount {
            expected: patches,
            found: plan.len(),
        }
        .into());
    }

    let regions = plan.regions();
    let filler = !introduction.fills_range() || plan.has_unassigned();
    let layout = LineageLayout::new(regions, filler);
    let lineage_of: BTreeMap<usize, usize> = layout
        .regions()
        .iter()
        .enumerate()
        .map(|(lineage, &region)| (region, lineage))
        .collect();

    let mut occupancy = OccupancyMatrix::zeros(model.len(), layout.lineages())?;

    match introduction {
        Introduction::FillRange => {
            for (patch, label) in plan.labels().iter().enumerate() {
                if let Some(&lineage) = label.and_then(|l| lineage_of.get(&l)) {
                    occupancy.set(patch, lineage, capacity);
                }
            }
        }
        Introduction::Count(n) => {
            for (&region, &lineage) in &lineage_of {
                let mut slots: Vec<usize> = plan
                    .patches_of(region)
                    .into_iter()
                    .flat_map(|patch| std::iter::repeat(patch).take(capacity as usize))
                    .collect();
                slots.shuffle(rng);

                if n as usize > slots.len() {
                    tracing::warn!(
                        region,
                        requested = n,
                        available = slots.len(),
                        "Region saturated; introducing fewer individuals"
                    );
                }
                for &patch in slots.iter().take(n as usize) {
                    occupancy.add(patch, lineage, 1);
                }
            }
        }
    }

    if let Some(filler) = layout.filler() {
        for patch in 0..patches {
            let total = occupancy.patch_total(patch);
            if total < u64::from(capacity) {
                occupancy.add(patch, filler, capacity - total as u32);
            }
        }
    }

    for patch in 0..patches {
        let total = occupancy.patch_total(patch);
        if total != u64::from(capacity) {
            return Err(InitializationError::NotAtCapacity {
                patch,
                total,
                capacity,
            }
            .into());
        }
    }
    occupancy.check_capacity(capacity, model.sink())?;

    tracing::info!(
        patches,
        introduced = layout.introduced(),
        filler = filler,
        %introduction,
        "Initialized population"
    );

    Ok((occupancy, layout))
}
