//! Builder pattern for creating simulations.
//!
//! Provides a fluent API for configuring and creating simulations with
//! sensible defaults and validation.

pub use crate::errors::BuilderError;
use crate::connectivity::LinearModel;
use crate::errors::SimulationError;
use crate::simulation::{Introduction, IntroductionPlan, RunConfig, Simulation};
use crate::storage::RecordingStrategy;
use metapop_codec::CodecStrategy;
use std::sync::Arc;

/// Builder for constructing [`Simulation`] instances with a fluent API.
///
/// # Examples
///
/// ```
/// use metapop_sim::connectivity::{ConnectivityTable, GridCoord, GridMask, LinearModel, OriginRecord};
/// use metapop_sim::simulation::{IntroductionPlan, SimulationBuilder};
///
/// let a = GridCoord::new(0, 0);
/// let b = GridCoord::new(1, 0);
/// let table = ConnectivityTable::new(vec![
///     OriginRecord::new(a, 4, &[(a, 2), (b, 2)]),
///     OriginRecord::new(b, 4, &[(a, 4)]),
/// ]);
/// let model = LinearModel::build(&table, &GridMask::identity(&[a, b])).unwrap();
///
/// let sim = SimulationBuilder::new()
///     .model(model)
///     .plan(IntroductionPlan::per_patch(2))
///     .capacity(3)
///     .generations(50)
///     .fecundity(2.0)
///     .seed(42)
///     .build()
///     .unwrap();
/// assert_eq!(sim.generation(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationBuilder {
    // Required parameters
    model: Option<Arc<LinearModel>>,
    plan: Option<IntroductionPlan>,
    capacity: Option<u32>,
    generations: Option<usize>,

    // Everything else, with defaults
    config: RunConfig,
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationBuilder {
    /// Create a new simulation builder with default values.
    pub fn new() -> Self {
        Self {
            model: None,
            plan: None,
            capacity: None,
            generations: None,
            config: RunConfig::default(),
        }
    }

    /// Start from an existing configuration; capacity and generations are
    /// taken from it.
    pub fn from_config(config: RunConfig) -> Self {
        Self {
            capacity: Some(config.capacity),
            generations: Some(config.generations),
            config,
            ..Self::new()
        }
    }

    /// Set the habitat (required).
    pub fn model(mut self, model: impl Into<Arc<LinearModel>>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the region labels (required).
    pub fn plan(mut self, plan: IntroductionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Set the per-patch capacity (required).
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the number of generations to run (required).
    pub fn generations(mut self, generations: usize) -> Self {
        self.generations = Some(generations);
        self
    }

    /// Propagules per occupant (default: 1.0).
    pub fn fecundity(mut self, fecundity: f64) -> Self {
        self.config.fecundity = fecundity;
        self
    }

    /// Fecundity of the filler lineage (default: same as `fecundity`).
    pub fn filler_fecundity(mut self, fecundity: f64) -> Self {
        self.config.filler_fecundity = Some(fecundity);
        self
    }

    pub fn introduction(mut self, introduction: Introduction) -> Self {
        self.config.introduction = introduction;
        self
    }

    /// Raw introduction count; negative fills each region's range.
    pub fn nintro(self, nintro: i64) -> Self {
        self.introduction(Introduction::from_nintro(nintro))
    }

    /// Set the random seed for reproducibility (default: None = random).
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Run on a dedicated pool of `workers` threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = Some(workers);
        self
    }

    pub fn chunks_per_worker(mut self, chunks: usize) -> Self {
        self.config.chunks_per_worker = chunks;
        self
    }

    /// Fix the partition count, making results independent of thread count.
    pub fn partitions(mut self, partitions: usize) -> Self {
        self.config.partitions = Some(partitions);
        self
    }

    pub fn recording(mut self, recording: RecordingStrategy) -> Self {
        self.config.recording = recording;
        self
    }

    /// Shorthand for `recording(RecordingStrategy::EveryN(every))`.
    pub fn record_every(self, every: usize) -> Self {
        self.recording(RecordingStrategy::EveryN(every))
    }

    pub fn codec(mut self, codec: CodecStrategy) -> Self {
        self.config.codec = codec;
        self
    }

    /// Validated configuration without building the simulation.
    pub fn config(&self) -> Result<RunConfig, BuilderError> {
        let capacity = self
            .capacity
            .ok_or(BuilderError::MissingRequired("capacity"))?;
        let generations = self
            .generations
            .ok_or(BuilderError::MissingRequired("generations"))?;
        let config = RunConfig {
            capacity,
            generations,
            ..self.config.clone()
        };
        config.validate()?;
        Ok(config)
    }

    /// Build and validate the simulation.
    pub fn build(self) -> Result<Simulation, SimulationError> {
        let config = self.config()?;
        let model = self.model.ok_or(BuilderError::MissingRequired("model"))?;
        let plan = self.plan.ok_or(BuilderError::MissingRequired("plan"))?;
        Simulation::new(model, &plan, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityTable, GridCoord, GridMask, OriginRecord};

    fn model() -> LinearModel {
        let coords: Vec<GridCoord> = (0..4).map(|i| GridCoord::new(i, 1)).collect();
        let origins = coords
            .iter()
            .map(|&c| OriginRecord::new(c, 8, &[(c, 8)]))
            .collect();
        LinearModel::build(&ConnectivityTable::new(origins), &GridMask::identity(&coords)).unwrap()
    }

    fn minimal() -> SimulationBuilder {
        SimulationBuilder::new()
            .model(model())
            .plan(IntroductionPlan::per_patch(4))
            .capacity(2)
            .generations(5)
    }

    #[test]
    fn test_builder_minimal() {
        let sim = minimal().build().unwrap();
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.layout().lineages(), 4);
        assert_eq!(sim.config().capacity, 2);
        assert_eq!(sim.config().generations, 5);
    }

    #[test]
    fn test_builder_with_seed() {
        let sim = minimal().seed(42).build().unwrap();
        assert_eq!(sim.seed(), 42);
    }

    #[test]
    fn test_builder_options_reach_config() {
        let config = minimal()
            .fecundity(2.5)
            .filler_fecundity(1.5)
            .nintro(1)
            .workers(2)
            .partitions(6)
            .record_every(3)
            .codec(CodecStrategy::Unpacked)
            .config()
            .unwrap();
        assert_eq!(config.fecundity, 2.5);
        assert_eq!(config.filler_fecundity(), 1.5);
        assert_eq!(config.introduction, Introduction::Count(1));
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.partitions, Some(6));
        assert_eq!(config.recording, RecordingStrategy::EveryN(3));
        assert_eq!(config.codec, CodecStrategy::Unpacked);
    }

    #[test]
    fn test_builder_missing_capacity() {
        let err = SimulationBuilder::new()
            .model(model())
            .plan(IntroductionPlan::per_patch(4))
            .generations(5)
            .build()
            .unwrap_err();
        match err {
            SimulationError::Builder(BuilderError::MissingRequired(param)) => {
                assert_eq!(param, "capacity");
            }
            other => panic!("Expected MissingRequired error, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_missing_model() {
        let err = SimulationBuilder::new()
            .plan(IntroductionPlan::per_patch(4))
            .capacity(1)
            .generations(5)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Builder(BuilderError::MissingRequired("model"))
        ));
    }

    #[test]
    fn test_builder_missing_plan() {
        let err = SimulationBuilder::new()
            .model(model())
            .capacity(1)
            .generations(5)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Builder(BuilderError::MissingRequired("plan"))
        ));
    }

    #[test]
    fn test_builder_invalid_fecundity() {
        let err = minimal().fecundity(-1.0).build().unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Builder(BuilderError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_builder_from_config() {
        let config = RunConfig {
            capacity: 3,
            generations: 7,
            seed: Some(11),
            ..Default::default()
        };
        let sim = SimulationBuilder::from_config(config.clone())
            .model(model())
            .plan(IntroductionPlan::uniform(4))
            .build()
            .unwrap();
        assert_eq!(sim.config(), &config);
    }
}
