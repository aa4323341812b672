//! Multi-run experiments built on top of [`Simulation`].
//!
//! Two kinds are supported: independent neutral replicates of one plan,
//! each recorded as its own run, and the two-lineage persistence experiment
//! where every region is introduced on its own against a native filler.

use crate::connectivity::LinearModel;
use crate::errors::{BuilderError, SimulationError};
use crate::simulation::{
    IntroductionPlan, NullSink, RunConfig, RunOutcome, RunState, Simulation, StepReport,
};
use crate::storage::{PersistenceRecord, Recorder, RecordingStrategy};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which experiment produced a database.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ExperimentKind {
    Neutral,
    /// Introduced lineage with fecundity `r0` against a filler with `r1`.
    Persistence { r0: f64, r1: f64 },
}

impl std::fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neutral => write!(f, "neutral"),
            Self::Persistence { r0, r1 } => write!(f, "persistence (R0={r0}, R1={r1})"),
        }
    }
}

/// Description of an experiment, stored in the database metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub kind: ExperimentKind,
    pub replicates: usize,
    /// First replicate's seed; replicate `i` uses `base_seed + i`.
    pub base_seed: u64,
    pub run: RunConfig,
}

impl ExperimentConfig {
    /// Metadata key under which the JSON form is stored.
    pub const METADATA_KEY: &'static str = "experiment_config";

    pub fn new(kind: ExperimentKind, replicates: usize, run: RunConfig) -> Self {
        let base_seed = run.seed.unwrap_or_else(|| rand::rng().random());
        Self {
            kind,
            replicates,
            base_seed,
            run,
        }
    }

    pub fn validate(&self) -> Result<(), BuilderError> {
        if self.replicates == 0 {
            return Err(BuilderError::InvalidParameter(
                "replicates must be at least 1".into(),
            ));
        }
        if let ExperimentKind::Persistence { r0, r1 } = self.kind {
            for (name, rate) in [("r0", r0), ("r1", r1)] {
                if !rate.is_finite() || rate < 0.0 {
                    return Err(BuilderError::InvalidParameter(format!(
                        "{name} must be a finite non-negative number, got {rate}"
                    )));
                }
            }
        }
        self.run.validate()
    }

    pub fn replicate_seed(&self, replicate: usize) -> u64 {
        self.base_seed.wrapping_add(replicate as u64)
    }

    /// Run configuration of replicate `replicate`.
    pub fn replicate_config(&self, replicate: usize) -> RunConfig {
        RunConfig {
            seed: Some(self.replicate_seed(replicate)),
            ..self.run.clone()
        }
    }

    pub fn to_json(&self) -> Result<String, SimulationError> {
        serde_json::to_string(self).map_err(|e| {
            BuilderError::InvalidParameter(format!("unserializable experiment config: {e}")).into()
        })
    }
}

/// One finished neutral replicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateSummary {
    pub replicate: usize,
    pub run_id: i64,
    pub seed: u64,
    pub outcome: RunOutcome,
}

/// Independent replicates of one introduction plan.
#[derive(Debug, Clone)]
pub struct NeutralExperiment {
    model: Arc<LinearModel>,
    plan: IntroductionPlan,
    config: ExperimentConfig,
}

impl NeutralExperiment {
    pub fn new(
        model: Arc<LinearModel>,
        plan: IntroductionPlan,
        config: ExperimentConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            model,
            plan,
            config,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Run every replicate in turn, recording each as a separate run.
    ///
    /// `on_step` receives the replicate index and the report of every
    /// generation.
    pub fn run<F>(
        &self,
        recorder: &mut Recorder,
        mut on_step: F,
    ) -> Result<Vec<ReplicateSummary>, SimulationError>
    where
        F: FnMut(usize, &StepReport),
    {
        let mut summaries = Vec::with_capacity(self.config.replicates);
        for replicate in 0..self.config.replicates {
            let config = self.config.replicate_config(replicate);
            let mut sim = Simulation::new(self.model.clone(), &self.plan, config)?;
            let run_id = recorder.begin_run(replicate, sim.seed(), sim.config(), sim.layout())?;

            let outcome = sim.run_with(recorder, |report| on_step(replicate, report))?;
            tracing::info!(
                replicate,
                run_id,
                status = %outcome.status,
                generations = outcome.generations,
                "Replicate finished"
            );
            summaries.push(ReplicateSummary {
                replicate,
                run_id,
                seed: sim.seed(),
                outcome,
            });
        }
        Ok(summaries)
    }
}

/// Fate of one region's introduced lineage in one replicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPersistence {
    pub region: usize,
    /// Generations until extinction, or the horizon if it persisted.
    pub generations: usize,
    pub persisted: bool,
    /// Introduced-lineage occupancy of every non-sink patch at the end.
    pub final_introduced: Vec<u32>,
}

impl RegionPersistence {
    pub fn to_record(&self, replicate: usize) -> PersistenceRecord {
        PersistenceRecord {
            replicate,
            region: self.region,
            generations: self.generations,
            persisted: self.persisted,
            final_introduced: self.final_introduced.clone(),
        }
    }
}

/// Two-lineage relative-fitness experiment over every region of a plan.
#[derive(Debug, Clone)]
pub struct PersistenceExperiment {
    model: Arc<LinearModel>,
    plan: IntroductionPlan,
    config: ExperimentConfig,
    r0: f64,
    r1: f64,
}

impl PersistenceExperiment {
    pub fn new(
        model: Arc<LinearModel>,
        plan: IntroductionPlan,
        config: ExperimentConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let ExperimentKind::Persistence { r0, r1 } = config.kind else {
            return Err(BuilderError::InvalidParameter(format!(
                "persistence experiment needs R0 and R1, got {}",
                config.kind
            ))
            .into());
        };
        Ok(Self {
            model,
            plan,
            config,
            r0,
            r1,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn regions(&self) -> Vec<usize> {
        self.plan.regions()
    }

    /// Run every region of one replicate concurrently on the current rayon
    /// pool. Results are in ascending region order.
    pub fn run_replicate(&self, replicate: usize) -> Result<Vec<RegionPersistence>, SimulationError> {
        let seed = self.config.replicate_seed(replicate);
        let results = self
            .regions()
            .into_par_iter()
            .map(|region| self.run_region(region, region_seed(seed, region)))
            .collect::<Result<Vec<_>, _>>()?;

        let persisted = results.iter().filter(|r| r.persisted).count();
        tracing::info!(
            replicate,
            regions = results.len(),
            persisted,
            "Persistence replicate finished"
        );
        Ok(results)
    }

    /// Run all replicates, handing each one's rows to `recorder`.
    pub fn run<F>(
        &self,
        recorder: &mut Recorder,
        mut on_replicate: F,
    ) -> Result<Vec<Vec<RegionPersistence>>, SimulationError>
    where
        F: FnMut(usize, &[RegionPersistence]),
    {
        let mut all = Vec::with_capacity(self.config.replicates);
        for replicate in 0..self.config.replicates {
            let results = self.run_replicate(replicate)?;
            recorder.record_persistence(results.iter().map(|r| r.to_record(replicate)).collect())?;
            on_replicate(replicate, &results);
            all.push(results);
        }
        Ok(all)
    }

    fn run_region(&self, region: usize, seed: u64) -> Result<RegionPersistence, SimulationError> {
        let config = RunConfig {
            fecundity: self.r0,
            filler_fecundity: Some(self.r1),
            seed: Some(seed),
            // Regions already run in parallel; share the caller's pool.
            workers: None,
            recording: RecordingStrategy::FinalOnly,
            ..self.config.run.clone()
        };
        let mut sim = Simulation::new(self.model.clone(), &self.plan.single_region(region), config)?;
        let outcome = sim.run(&mut NullSink)?;

        let occupancy = sim.population().occupancy();
        let final_introduced = (0..self.model.patch_count())
            .map(|patch| occupancy.get(patch, 0))
            .collect();
        tracing::debug!(region, generations = outcome.generations, status = %outcome.status, "Region finished");

        Ok(RegionPersistence {
            region,
            generations: outcome.generations,
            persisted: outcome.status == RunState::Completed,
            final_introduced,
        })
    }
}

/// Decorrelated per-region seed.
fn region_seed(seed: u64, region: usize) -> u64 {
    seed ^ (region as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
