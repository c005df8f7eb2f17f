use rayon::prelude::*;

use crate::error::FilterError;

/// Number of elements from which [`ExecutionStrategy::Auto`] runs in parallel.
const AUTO_PARALLEL_THRESHOLD: usize = 100_000;

/// Controls how the separable filters distribute their work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Run sequentially on the current thread.
    Serial,

    /// Use the global Rayon thread pool.
    Parallel,

    /// Run in parallel for arrays of at least 100K elements, sequentially otherwise.
    #[default]
    Auto,

    /// Run on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call, which has significant overhead.
    /// Use this primarily for benchmarking or specific isolation needs.
    Fixed(usize),
}

impl ExecutionStrategy {
    /// Returns true if an array of `num_elements` elements is processed in parallel.
    pub fn is_parallel(&self, num_elements: usize) -> bool {
        match self {
            ExecutionStrategy::Serial => false,
            ExecutionStrategy::Parallel | ExecutionStrategy::Fixed(_) => true,
            ExecutionStrategy::Auto => num_elements >= AUTO_PARALLEL_THRESHOLD,
        }
    }
}

/// The resolved form of an [`ExecutionStrategy`] for one call.
///
/// Resolving builds the thread pool of [`ExecutionStrategy::Fixed`], so invalid strategies are
/// rejected before any buffer is touched and the pool is reused across passes.
pub(crate) enum Executor {
    Serial,
    Global,
    Pool(rayon::ThreadPool),
}

impl Executor {
    /// Resolve the strategy for an array of `num_elements` elements.
    pub(crate) fn new(
        strategy: ExecutionStrategy,
        num_elements: usize,
    ) -> Result<Self, FilterError> {
        if let ExecutionStrategy::Fixed(0) = strategy {
            return Err(FilterError::InvalidThreadCount(0));
        }

        if !strategy.is_parallel(num_elements) {
            return Ok(Executor::Serial);
        }

        match strategy {
            ExecutionStrategy::Fixed(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map(Executor::Pool)
                .map_err(|e| FilterError::ThreadPool(e.to_string())),
            _ => Ok(Executor::Global),
        }
    }

    /// Apply `op` to consecutive chunks of `chunk_len` elements of `data`.
    ///
    /// The last chunk may be shorter. The first error returned by `op` is propagated; chunks
    /// already processed keep their new values.
    ///
    /// # Arguments
    ///
    /// * `data` - The buffer to process.
    /// * `chunk_len` - The number of elements per chunk, greater than zero.
    /// * `op` - The operation applied to every chunk.
    pub(crate) fn try_for_each_chunk<F>(
        &self,
        data: &mut [f32],
        chunk_len: usize,
        op: F,
    ) -> Result<(), FilterError>
    where
        F: Fn(&mut [f32]) -> Result<(), FilterError> + Sync + Send,
    {
        match self {
            Executor::Serial => data.chunks_mut(chunk_len).try_for_each(op),
            Executor::Global => data.par_chunks_mut(chunk_len).try_for_each(op),
            Executor::Pool(pool) => {
                pool.install(|| data.par_chunks_mut(chunk_len).try_for_each(&op))
            }
        }
    }
}
