//! Rayon thread pool configuration for damage and hazard workloads.
//!
//! Use [WorkerPool::install] to run parallel work with a fixed number of
//! threads, or rely on Rayon's default (all CPU cores).

use rayon::ThreadPoolBuilder;

use crate::error::Result;

/// Configures how many worker threads are used for parallel execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool {
    /// Number of worker threads. If 0, use Rayon default (num_cpus).
    pub workers: usize,
}

impl WorkerPool {
    /// Use exactly `n` worker threads.
    pub fn with_workers(n: usize) -> Self {
        Self { workers: n }
    }

    /// Threads that [install](WorkerPool::install) will actually use.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            rayon::current_num_threads()
        } else {
            self.workers
        }
    }

    /// Run a closure on a thread pool with this worker count. If [workers](WorkerPool::workers) is 0,
    /// uses the global Rayon pool (all cores). Otherwise builds a temporary pool with that many threads.
    pub fn install<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.workers == 0 {
            Ok(f())
        } else {
            let pool = ThreadPoolBuilder::new().num_threads(self.workers).build()?;
            Ok(pool.install(f))
        }
    }
}

#[cfg(test)]
mod tests {
    use rayon::prelude::*;

    use super::*;

    #[test]
    fn fixed_pool_runs_closure_with_requested_threads() {
        let pool = WorkerPool::with_workers(2);
        let threads = pool
            .install(rayon::current_num_threads)
            .expect("pool should build");
        assert_eq!(threads, 2);
        assert_eq!(pool.effective_workers(), 2);
    }

    #[test]
    fn default_pool_preserves_parallel_results() {
        let pool = WorkerPool::default();
        let squares: Vec<u64> = pool
            .install(|| (0..100u64).into_par_iter().map(|v| v * v).collect())
            .expect("global pool");
        assert_eq!(squares[9], 81);
        assert_eq!(squares.len(), 100);
    }
}
