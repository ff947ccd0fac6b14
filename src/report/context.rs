use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::report::ReportError;

/// Scoped execution engine for the pipeline.
///
/// Owns the thread pool that loader and aggregator parallelism runs on, so
/// teardown happens when the context is dropped rather than at process exit.
/// Components receive the context explicitly instead of reaching for a
/// process-global pool.
#[derive(Debug)]
pub struct ExecutionContext {
    pool: ThreadPool,
}

impl ExecutionContext {
    /// Builds a context with the given worker count, or one worker per core
    /// when `threads` is `None`.
    pub fn new(threads: Option<usize>) -> Result<Self, ReportError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|i| format!("binge-report-{i}"))
            .build()
            .map_err(|e| ReportError::Context(e.to_string()))?;
        Ok(ExecutionContext { pool })
    }

    /// Runs `f` inside the context's pool; rayon calls within it use this
    /// pool's workers.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_thread_count() {
        let ctx = ExecutionContext::new(Some(2)).unwrap();
        assert_eq!(ctx.threads(), 2);
    }

    #[test]
    fn test_install_runs_in_pool() {
        let ctx = ExecutionContext::new(Some(3)).unwrap();
        let n = ctx.install(rayon::current_num_threads);
        assert_eq!(n, 3);
    }
}
