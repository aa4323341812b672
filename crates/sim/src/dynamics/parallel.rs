//! Partitioning and the worker pool shared by the dispersal and settlement
//! phases.

use crate::errors::SimulationError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;

/// Split `0..len` into `parts` contiguous, disjoint ranges that cover it.
///
/// Bounds are `i * len / parts`, so sizes differ by at most one. Ranges may
/// be empty when `parts > len`; the number of ranges is always `parts`
/// (at least one).
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    (0..parts)
        .map(|i| (i * len / parts)..((i + 1) * len / parts))
        .collect()
}

/// Hand out one mutable chunk of `data` per range.
///
/// `data` is viewed as consecutive blocks of `stride` elements and range
/// `r` owns blocks `r.start..r.end`. The ranges must be ordered, contiguous
/// and start at zero, as produced by [`partition`].
pub fn split_ranges_mut<'a, T>(
    mut data: &'a mut [T],
    ranges: &[Range<usize>],
    stride: usize,
) -> Vec<&'a mut [T]> {
    let mut chunks = Vec::with_capacity(ranges.len());
    let mut cursor = 0;
    for range in ranges {
        debug_assert_eq!(range.start, cursor);
        let (head, tail) = std::mem::take(&mut data).split_at_mut(range.len() * stride);
        chunks.push(head);
        data = tail;
        cursor = range.end;
    }
    chunks
}

/// Thread pool used by one run.
///
/// Either owns a dedicated pool of a fixed size, built once and reused
/// every generation, or borrows whatever rayon context the caller is
/// already running in.
#[derive(Debug)]
pub struct WorkerPool {
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Build a dedicated pool with `workers` threads.
    pub fn new(workers: usize) -> Result<Self, SimulationError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("metapop-worker-{i}"))
            .build()
            .map_err(|e| SimulationError::WorkerPool(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Run on the caller's rayon context (global pool or an enclosing
    /// `install`).
    pub fn current() -> Self {
        Self { pool: None }
    }

    /// Dedicated pool when `workers` is given, the current context
    /// otherwise.
    pub fn from_workers(workers: Option<usize>) -> Result<Self, SimulationError> {
        match workers {
            Some(n) => Self::new(n),
            None => Ok(Self::current()),
        }
    }

    pub fn workers(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    pub fn is_dedicated(&self) -> bool {
        self.pool.is_some()
    }

    /// Execute `op` inside the pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_partition_is_exhaustive_and_disjoint() {
        for (len, parts) in [(10, 3), (3, 8), (0, 4), (17, 1), (100, 7)] {
            let ranges = partition(len, parts);
            assert_eq!(ranges.len(), parts);
            assert_eq!(ranges[0].start, 0);
            assert_eq!(ranges.last().unwrap().end, len);
            for w in ranges.windows(2) {
                assert_eq!(w[0].end, w[1].start);
            }
            let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
            let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
            assert!(max - min <= 1);
        }
    }

    #[test]
    fn test_partition_zero_parts() {
        assert_eq!(partition(5, 0), vec![0..5]);
    }

    #[test]
    fn test_split_ranges_mut_with_stride() {
        let mut data: Vec<u32> = (0..12).collect();
        let ranges = partition(4, 3);
        let chunks = split_ranges_mut(&mut data, &ranges, 3);
        assert_eq!(chunks.len(), 3);
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens.iter().sum::<usize>(), 12);
        assert_eq!(lens, ranges.iter().map(|r| r.len() * 3).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunks_written_in_parallel() {
        let mut data = vec![0u32; 20];
        let ranges = partition(10, 4);
        let pool = WorkerPool::new(2).unwrap();
        pool.install(|| {
            split_ranges_mut(&mut data, &ranges, 2)
                .into_par_iter()
                .zip(ranges.par_iter())
                .for_each(|(chunk, range)| {
                    for (k, v) in chunk.iter_mut().enumerate() {
                        *v = (range.start * 2 + k) as u32;
                    }
                });
        });
        assert_eq!(data, (0..20).collect::<Vec<u32>>());
    }

    #[test]
    fn test_pool_sizes() {
        assert_eq!(WorkerPool::new(3).unwrap().workers(), 3);
        assert!(WorkerPool::new(1).unwrap().is_dedicated());
        assert!(!WorkerPool::current().is_dedicated());
        assert!(WorkerPool::from_workers(None).unwrap().workers() >= 1);
    }
}
