//! Run parameters.

use crate::errors::BuilderError;
use crate::storage::RecordingStrategy;
use metapop_codec::CodecStrategy;
use serde::{Deserialize, Serialize};

/// How many individuals each introduced lineage starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Introduction {
    /// Fill every patch of the lineage's region to capacity.
    FillRange,
    /// Scatter this many individuals over the region's patches.
    Count(u32),
}

impl Introduction {
    /// Interpret a raw introduction count, where a negative value means
    /// "fill the whole range".
    pub fn from_nintro(nintro: i64) -> Self {
        if nintro < 0 {
            Self::FillRange
        } else {
            Self::Count(u32::try_from(nintro).unwrap_or(u32::MAX))
        }
    }

    /// Whether every lineage's range is filled, leaving no room for filler.
    pub fn fills_range(&self) -> bool {
        matches!(self, Self::FillRange)
    }
}

impl std::fmt::Display for Introduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FillRange => write!(f, "fill-range"),
            Self::Count(n) => write!(f, "{n} per lineage"),
        }
    }
}

/// Immutable configuration of one run.
///
/// Serialized as JSON next to every recorded run so that it can be resumed
/// or inspected later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Propagules per occupant per generation for introduced lineages.
    pub fecundity: f64,
    /// Fecundity of the filler lineage; defaults to `fecundity`.
    #[serde(default)]
    pub filler_fecundity: Option<f64>,
    /// Maximum occupants per patch.
    pub capacity: u32,
    /// Number of generations to simulate.
    pub generations: usize,
    pub introduction: Introduction,
    /// Master seed; drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Size of the dedicated worker pool; the caller's pool when absent.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Partitions per worker, for load balancing.
    pub chunks_per_worker: usize,
    /// Fixed partition count. Results are reproducible for a given seed and
    /// partition count, whatever the number of threads.
    #[serde(default)]
    pub partitions: Option<usize>,
    pub recording: RecordingStrategy,
    #[serde(default)]
    pub codec: CodecStrategy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            fecundity: 1.0,
            filler_fecundity: None,
            capacity: 1,
            generations: 100,
            introduction: Introduction::FillRange,
            seed: None,
            workers: None,
            chunks_per_worker: 4,
            partitions: None,
            recording: RecordingStrategy::EveryN(10),
            codec: CodecStrategy::default(),
        }
    }
}

impl RunConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), BuilderError> {
        let check_rate = |name: &str, rate: f64| {
            if rate.is_finite() && rate >= 0.0 {
                Ok(())
            } else {
                Err(BuilderError::InvalidParameter(format!(
                    "{name} must be a finite non-negative number, got {rate}"
                )))
            }
        };
        check_rate("fecundity", self.fecundity)?;
        if let Some(rate) = self.filler_fecundity {
            check_rate("filler_fecundity", rate)?;
        }
        if self.capacity == 0 {
            return Err(BuilderError::InvalidParameter(
                "capacity must be at least 1".into(),
            ));
        }
        if self.generations == 0 {
            return Err(BuilderError::InvalidParameter(
                "generations must be at least 1".into(),
            ));
        }
        if self.chunks_per_worker == 0 {
            return Err(BuilderError::InvalidParameter(
                "chunks_per_worker must be at least 1".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(BuilderError::InvalidParameter(
                "workers must be at least 1".into(),
            ));
        }
        if self.partitions == Some(0) {
            return Err(BuilderError::InvalidParameter(
                "partitions must be at least 1".into(),
            ));
        }
        if let RecordingStrategy::EveryN(0) = self.recording {
            return Err(BuilderError::InvalidParameter(
                "recording interval must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn filler_fecundity(&self) -> f64 {
        self.filler_fecundity.unwrap_or(self.fecundity)
    }

    /// Number of partitions each phase is split into when running on a
    /// pool of `workers` threads.
    pub fn partition_count(&self, workers: usize) -> usize {
        self.partitions
            .unwrap_or(workers.max(1) * self.chunks_per_worker)
            .max(1)
    }
}
