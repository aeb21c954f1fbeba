//! Worker pool for running tests concurrently.
//!
//! Without a thread count the global rayon pool is used. With one, a
//! dedicated pool is built with a larger stack, since every test runs its
//! own nested parallel voxel fit.

#[cfg(feature = "parallel")]
use rayon::ThreadPool;

use crate::error::Result;

/// Stack size of dedicated worker threads.
#[cfg(feature = "parallel")]
const STACK_SIZE: usize = 8 * 1024 * 1024;

/// Thread pool used for test-level parallelism.
#[derive(Debug)]
pub struct WorkerPool {
    #[cfg(feature = "parallel")]
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Build a pool with `threads` workers, or defer to the global pool.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pool cannot be built.
    #[cfg(feature = "parallel")]
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let pool = match threads {
            None => None,
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .stack_size(STACK_SIZE)
                    .build()
                    .map_err(|e| {
                        crate::error::AnalysisError::config(format!("cannot build thread pool: {e}"))
                    })?,
            ),
        };
        Ok(Self { pool })
    }

    #[cfg(not(feature = "parallel"))]
    pub fn new(_threads: Option<usize>) -> Result<Self> {
        Ok(Self {})
    }

    /// Execute `op` inside the pool.
    #[cfg(feature = "parallel")]
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

    #[cfg(not(feature = "parallel"))]
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R,
    {
        // No parallel feature - just execute directly
        op()
    }
}
