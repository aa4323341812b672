//! Simulation driver.
//!
//! Each generation runs two parallel phases separated by a hard barrier:
//! dispersal, partitioned by lineage, fills the settlement tally; settlement,
//! partitioned by patch, turns the tally into the next occupancy matrix.
//! Every partition draws from its own Xoshiro256++ stream seeded from the
//! driver's master generator, so a run is reproducible for a given seed and
//! partition count.

use crate::connectivity::LinearModel;
use crate::dynamics::{arbitrate_settlement, partition, project_dispersal, split_ranges_mut, WorkerPool};
use crate::errors::{InitializationError, SimulationError};
use crate::simulation::{
    initialize, IntroductionPlan, LineageLayout, OccupancyMatrix, Population, RunConfig,
    SettlementTally, Snapshot, SnapshotSink,
};
use crate::storage::QueryBuilder;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Initializing,
    Running,
    /// Reached the generation horizon.
    Completed,
    /// Every introduced lineage died out before the horizon.
    ExtinctEarly,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::ExtinctEarly)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::ExtinctEarly => write!(f, "extinct_early"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initializing" => Ok(Self::Initializing),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "extinct_early" => Ok(Self::ExtinctEarly),
            _ => Err(format!("Unknown run state: {s}")),
        }
    }
}

/// Summary of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Generations completed so far.
    pub generation: usize,
    pub state: RunState,
    /// Lineages with non-zero global occupancy.
    pub occupied_lineages: usize,
    /// Introduced lineages still present somewhere.
    pub introduced_alive: usize,
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunState,
    /// Generations completed.
    pub generations: usize,
    /// Generation at which the last introduced lineage vanished.
    pub extinction_generation: Option<usize>,
    /// Final global occupancy of every lineage.
    pub lineage_totals: Vec<u64>,
}

/// Main simulation engine.
#[derive(Debug)]
pub struct Simulation {
    model: Arc<LinearModel>,
    config: RunConfig,
    layout: LineageLayout,
    /// Fecundity per lineage column.
    fecundity: Vec<f64>,
    population: Population,
    /// Scratch buffer for the next generation, swapped in each step.
    next: OccupancyMatrix,
    tally: SettlementTally,
    pool: WorkerPool,
    lineage_ranges: Vec<Range<usize>>,
    patch_ranges: Vec<Range<usize>>,
    seed: u64,
    /// Master generator; only used to seed partition streams.
    rng: Xoshiro256PlusPlus,
    state: RunState,
    extinction_generation: Option<usize>,
}

impl Simulation {
    /// Set up a run of `plan` on `model`.
    ///
    /// Fails on invalid parameters, on a plan that does not match the
    /// habitat, or when the state buffers cannot be allocated.
    pub fn new(
        model: Arc<LinearModel>,
        plan: &IntroductionPlan,
        config: RunConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let (occupancy, layout) =
            initialize(&model, plan, config.introduction, config.capacity, &mut rng)?;
        if layout.introduced() == 0 {
            return Err(InitializationError::Validation(
                "introduction plan assigns no patch to any region".into(),
            )
            .into());
        }

        let mut sim = Self::from_parts(
            model,
            config,
            layout,
            Population::new(occupancy),
            seed,
            rng,
        )?;
        sim.state = RunState::Running;
        tracing::info!(
            seed,
            patches = sim.model.patch_count(),
            lineages = sim.layout.lineages(),
            workers = sim.pool.workers(),
            partitions = sim.partitions(),
            "Simulation initialized"
        );
        Ok(sim)
    }

    fn from_parts(
        model: Arc<LinearModel>,
        config: RunConfig,
        layout: LineageLayout,
        population: Population,
        seed: u64,
        rng: Xoshiro256PlusPlus,
    ) -> Result<Self, SimulationError> {
        let domain = model.len();
        let lineages = layout.lineages();
        let next = OccupancyMatrix::zeros(domain, lineages)?;
        let tally = SettlementTally::zeros(domain, lineages)?;

        let pool = WorkerPool::from_workers(config.workers)?;
        let parts = config.partition_count(pool.workers());

        let mut fecundity = vec![config.fecundity; lineages];
        if let Some(filler) = layout.filler() {
            fecundity[filler] = config.filler_fecundity();
        }

        Ok(Self {
            model,
            layout,
            fecundity,
            population,
            next,
            tally,
            pool,
            lineage_ranges: partition(lineages, parts),
            patch_ranges: partition(domain, parts),
            seed,
            rng,
            state: RunState::Initializing,
            extinction_generation: None,
            config,
        })
    }

    /// Resume run `run_id` from its latest recorded snapshot.
    ///
    /// Continuing the returned simulation reproduces the uninterrupted run
    /// exactly, provided the partition count is unchanged.
    pub fn from_checkpoint(
        model: Arc<LinearModel>,
        query: &QueryBuilder,
        run_id: i64,
    ) -> Result<Self, SimulationError> {
        let run = query
            .get_run(run_id)?
            .ok_or_else(|| SimulationError::Checkpoint(format!("unknown run {run_id}")))?;
        let snapshot = query.get_latest_snapshot(run_id)?.ok_or_else(|| {
            SimulationError::Checkpoint(format!("run {run_id} has no recorded snapshot"))
        })?;

        if snapshot.patches != model.len() {
            return Err(SimulationError::Checkpoint(format!(
                "snapshot covers {} patches but the habitat has {}",
                snapshot.patches,
                model.len()
            )));
        }
        if snapshot.lineages != run.layout.lineages() {
            return Err(SimulationError::Checkpoint(format!(
                "snapshot holds {} lineages but the run layout has {}",
                snapshot.lineages,
                run.layout.lineages()
            )));
        }
        let rng_state = snapshot.rng_state.as_deref().ok_or_else(|| {
            SimulationError::Checkpoint(format!(
                "snapshot at generation {} has no RNG state",
                snapshot.generation
            ))
        })?;
        let rng: Xoshiro256PlusPlus = bincode::deserialize(rng_state)
            .map_err(|e| SimulationError::Checkpoint(format!("failed to restore RNG state: {e}")))?;

        let occupancy = snapshot.occupancy()?;
        occupancy.check_capacity(run.config.capacity, model.sink())?;
        let population = Population::at_generation(occupancy, snapshot.generation);

        let mut sim = Self::from_parts(model, run.config, run.layout, population, run.seed, rng)?;
        sim.state = RunState::Running;
        sim.evaluate_termination();

        tracing::info!(
            run_id,
            generation = sim.generation(),
            state = %sim.state,
            "Resumed simulation from checkpoint"
        );
        Ok(sim)
    }

    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn layout(&self) -> &LineageLayout {
        &self.layout
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Get the current generation number.
    pub fn generation(&self) -> usize {
        self.population.generation()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Master seed actually used, whether configured or drawn.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    pub fn partitions(&self) -> usize {
        self.patch_ranges.len()
    }

    /// Serialized master RNG for checkpointing.
    pub fn rng_state_bytes(&self) -> Result<Vec<u8>, SimulationError> {
        bincode::serialize(&self.rng)
            .map_err(|e| SimulationError::Checkpoint(format!("failed to serialize RNG state: {e}")))
    }

    /// Advance the simulation by one generation.
    pub fn step(&mut self) -> Result<StepReport, SimulationError> {
        if self.state.is_terminal() {
            return Err(SimulationError::Finished(self.state));
        }
        self.state = RunState::Running;

        let parts = self.partitions();
        let dispersal_seeds: Vec<u64> = (0..parts).map(|_| self.rng.random()).collect();
        let settlement_seeds: Vec<u64> = (0..parts).map(|_| self.rng.random()).collect();
        let totals = self.population.occupancy().lineage_totals();

        // Dispersal: one lineage range per partition.
        self.tally.clear();
        {
            let model = &*self.model;
            let occupancy = self.population.occupancy();
            let fecundity = &self.fecundity;
            let totals = &totals;
            let ranges = &self.lineage_ranges;
            let chunks = split_ranges_mut(self.tally.as_mut_slice(), ranges, model.len());
            self.pool.install(|| {
                chunks
                    .into_par_iter()
                    .zip(ranges.par_iter())
                    .zip(dispersal_seeds.par_iter())
                    .for_each(|((chunk, range), &seed)| {
                        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                        project_dispersal(
                            model,
                            occupancy,
                            fecundity,
                            totals,
                            range.clone(),
                            chunk,
                            &mut rng,
                        );
                    });
            });
        }

        // Settlement: one patch range per partition.
        self.next.clear();
        {
            let tally = &self.tally;
            let capacity = self.config.capacity;
            let sink = self.model.sink();
            let ranges = &self.patch_ranges;
            let chunks = split_ranges_mut(self.next.as_mut_slice(), ranges, tally.lineages());
            self.pool.install(|| {
                chunks
                    .into_par_iter()
                    .zip(ranges.par_iter())
                    .zip(settlement_seeds.par_iter())
                    .for_each(|((chunk, range), &seed)| {
                        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                        arbitrate_settlement(tally, capacity, sink, range.clone(), chunk, &mut rng);
                    });
            });
        }

        self.next
            .check_capacity(self.config.capacity, self.model.sink())?;
        self.population.advance(&mut self.next);

        let totals = self.population.occupancy().lineage_totals();
        let introduced_alive = totals[..self.layout.introduced()]
            .iter()
            .filter(|&&t| t > 0)
            .count();
        let occupied_lineages = totals.iter().filter(|&&t| t > 0).count();
        self.evaluate_termination();

        tracing::debug!(
            generation = self.generation(),
            occupied_lineages,
            introduced_alive,
            "Generation complete"
        );

        Ok(StepReport {
            generation: self.generation(),
            state: self.state,
            occupied_lineages,
            introduced_alive,
        })
    }

    fn evaluate_termination(&mut self) {
        let introduced = self.layout.introduced();
        let alive = self
            .population
            .occupancy()
            .lineage_totals()
            .iter()
            .take(introduced)
            .any(|&t| t > 0);

        if !alive {
            self.state = RunState::ExtinctEarly;
            self.extinction_generation = Some(self.generation());
            tracing::info!(generation = self.generation(), "All introduced lineages extinct");
        } else if self.generation() >= self.config.generations {
            self.state = RunState::Completed;
        }
    }

    /// Run until the horizon or early extinction, emitting snapshots to
    /// `sink`.
    pub fn run(&mut self, sink: &mut dyn SnapshotSink) -> Result<RunOutcome, SimulationError> {
        self.run_with(sink, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_step` after every generation.
    pub fn run_with<F>(
        &mut self,
        sink: &mut dyn SnapshotSink,
        mut on_step: F,
    ) -> Result<RunOutcome, SimulationError>
    where
        F: FnMut(&StepReport),
    {
        if self.generation() == 0 && self.config.recording.should_record(0) {
            self.emit(sink);
        }

        while !self.state.is_terminal() {
            let report = self.step()?;
            let record = match report.state {
                RunState::Completed => true,
                RunState::ExtinctEarly => false,
                _ => self.config.recording.should_record(report.generation),
            };
            if record {
                self.emit(sink);
            }
            on_step(&report);
        }

        let outcome = self.outcome();
        if let Err(e) = sink.finish(&outcome) {
            tracing::warn!(error = %e, "Failed to record run outcome");
        }
        tracing::info!(
            status = %outcome.status,
            generations = outcome.generations,
            "Run finished"
        );
        Ok(outcome)
    }

    fn emit(&self, sink: &mut dyn SnapshotSink) {
        let rng_state = match self.rng_state_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(generation = self.generation(), error = %e, "Skipping snapshot");
                return;
            }
        };
        let snapshot = Snapshot {
            generation: self.generation(),
            occupancy: self.population.occupancy(),
            rng_state: &rng_state,
        };
        if let Err(e) = sink.record(&snapshot) {
            tracing::warn!(generation = self.generation(), error = %e, "Failed to record snapshot");
        }
    }

    /// Outcome of the run as it stands.
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            status: self.state,
            generations: self.generation(),
            extinction_generation: self.extinction_generation,
            lineage_totals: self.population.occupancy().lineage_totals(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityTable, GridCoord, GridMask, OriginRecord};
    use crate::simulation::{Introduction, MemorySink, NullSink};
    use crate::storage::RecordingStrategy;

    /// Ring of `n` patches, each sending half its propagules home and half
    /// to the next patch.
    fn ring_model(n: i32) -> Arc<LinearModel> {
        let coords: Vec<GridCoord> = (0..n).map(|i| GridCoord::new(i, 0)).collect();
        let origins = coords
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let next = coords[(i + 1) % coords.len()];
                OriginRecord::new(c, 10, &[(c, 5), (next, 5)])
            })
            .collect();
        Arc::new(
            LinearModel::build(&ConnectivityTable::new(origins), &GridMask::identity(&coords))
                .unwrap(),
        )
    }

    fn config(seed: u64) -> RunConfig {
        RunConfig {
            fecundity: 3.0,
            capacity: 4,
            generations: 10,
            introduction: Introduction::Count(2),
            seed: Some(seed),
            workers: Some(2),
            partitions: Some(4),
            recording: RecordingStrategy::EveryN(5),
            ..Default::default()
        }
    }

    fn halves(n: usize) -> IntroductionPlan {
        IntroductionPlan::new((0..n).map(|i| Some(i * 2 / n)).collect())
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::new(ring_model(6), &halves(6), config(1)).unwrap();
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.state(), RunState::Running);
        assert_eq!(sim.layout().lineages(), 3);
        assert_eq!(sim.partitions(), 4);
        assert_eq!(sim.workers(), 2);
        for patch in 0..6 {
            assert_eq!(sim.population().occupancy().patch_total(patch), 4);
        }
    }

    #[test]
    fn test_capacity_holds_every_generation() {
        let model = ring_model(8);
        let mut sim = Simulation::new(model.clone(), &halves(8), config(2)).unwrap();
        while !sim.state().is_terminal() {
            let report = sim.step().unwrap();
            let occ = sim.population().occupancy();
            for patch in 0..model.len() {
                assert!(occ.patch_total(patch) <= 4);
            }
            assert_eq!(occ.patch_total(model.sink()), 0);
            assert_eq!(report.generation, sim.generation());
        }
    }

    #[test]
    fn test_zero_fecundity_goes_extinct_at_generation_one() {
        let cfg = RunConfig {
            fecundity: 0.0,
            introduction: Introduction::FillRange,
            ..config(3)
        };
        let mut sim = Simulation::new(ring_model(3), &IntroductionPlan::uniform(3), cfg).unwrap();
        let outcome = sim.run(&mut NullSink).unwrap();
        assert_eq!(outcome.status, RunState::ExtinctEarly);
        assert_eq!(outcome.generations, 1);
        assert_eq!(outcome.extinction_generation, Some(1));
    }

    #[test]
    fn test_step_after_finish_is_error() {
        let cfg = RunConfig {
            fecundity: 0.0,
            ..config(3)
        };
        let mut sim = Simulation::new(ring_model(3), &halves(3), cfg).unwrap();
        sim.run(&mut NullSink).unwrap();
        assert!(matches!(
            sim.step(),
            Err(SimulationError::Finished(RunState::ExtinctEarly))
        ));
    }

    #[test]
    fn test_same_seed_same_result() {
        let run = |workers| {
            let cfg = RunConfig {
                workers: Some(workers),
                ..config(42)
            };
            let mut sim = Simulation::new(ring_model(12), &halves(12), cfg).unwrap();
            sim.run(&mut NullSink).unwrap();
            sim.population().occupancy().clone()
        };
        // Fixed partition count: the thread count does not matter.
        assert_eq!(run(1), run(3));
    }

    #[test]
    fn test_snapshot_cadence() {
        let cfg = RunConfig {
            fecundity: 5.0,
            generations: 12,
            introduction: Introduction::FillRange,
            ..config(9)
        };
        let mut sim = Simulation::new(ring_model(4), &IntroductionPlan::uniform(4), cfg).unwrap();
        let mut sink = MemorySink::new();
        let outcome = sim.run(&mut sink).unwrap();
        assert_eq!(outcome.status, RunState::Completed);
        assert_eq!(sink.generations(), vec![0, 5, 10, 12]);
        assert_eq!(sink.outcome, Some(outcome));
    }

    #[test]
    fn test_run_with_reports_each_generation() {
        let mut sim = Simulation::new(ring_model(4), &halves(4), config(5)).unwrap();
        let mut seen = Vec::new();
        let outcome = sim
            .run_with(&mut NullSink, |report| seen.push(report.generation))
            .unwrap();
        assert_eq!(seen.len(), outcome.generations);
        assert_eq!(seen.first(), Some(&1));
    }

    #[test]
    fn test_plan_without_regions_rejected() {
        let plan = IntroductionPlan::new(vec![None; 3]);
        let err = Simulation::new(ring_model(3), &plan, config(0)).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Initialization(InitializationError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = RunConfig {
            capacity: 0,
            ..config(0)
        };
        assert!(matches!(
            Simulation::new(ring_model(3), &halves(3), cfg),
            Err(SimulationError::Builder(_))
        ));
    }

    #[test]
    fn test_run_state_round_trip() {
        for state in [
            RunState::Initializing,
            RunState::Running,
            RunState::Completed,
            RunState::ExtinctEarly,
        ] {
            assert_eq!(state.to_string().parse::<RunState>().unwrap(), state);
        }
        assert!("bogus".parse::<RunState>().is_err());
    }
}
