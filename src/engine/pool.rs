// src/engine/pool.rs
//
// Load context: where decode, fit and composite work runs.
//
// **Architecture Decision**: Resizers built with `with_defaults` share a single
// global pool instead of creating one per resizer. Threads are reused across
// resizers and the thread count stays predictable.
//
// **IMPORTANT**:
// - The global pool is initialized lazily on first use
// - Changes to STREAM_RESIZER_THREADS after initialization have NO effect

use crate::engine::config::{ResizerConfig, MIN_LOAD_THREADS};
use crate::error::{ResizeError, Result};
use rayon::ThreadPool;
use std::sync::{Arc, OnceLock};

/// A unit of work handed to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Background context that runs resize work. Jobs may run in any order and in parallel.
pub trait LoadContext: Send + Sync {
    fn spawn(&self, job: Job);
}

impl LoadContext for ThreadPool {
    fn spawn(&self, job: Job) {
        ThreadPool::spawn(self, job);
    }
}

impl<L: LoadContext + ?Sized> LoadContext for Arc<L> {
    fn spawn(&self, job: Job) {
        (**self).spawn(job);
    }
}

/// Named rayon pool sized from a [`ResizerConfig`].
pub struct LoadPool {
    pool: ThreadPool,
}

impl std::fmt::Debug for LoadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadPool")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl LoadPool {
    pub fn new(config: &ResizerConfig) -> Result<Self> {
        let threads = config.resolved_threads();
        let prefix = config.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            // Tasks guard their own bodies; anything reaching here must not abort the process.
            .panic_handler(|_| tracing::error!("load job panicked outside its task guard"))
            .build()
            .map_err(|e| {
                ResizeError::generic(format!("failed to build load pool ({threads} threads): {e}"))
            })?;
        tracing::debug!(threads, "load pool started");
        Ok(Self { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl LoadContext for LoadPool {
    fn spawn(&self, job: Job) {
        self.pool.spawn(job);
    }
}

static GLOBAL_LOAD_POOL: OnceLock<LoadPool> = OnceLock::new();

/// Process-wide load pool, configured from the environment on first use.
pub fn global_pool() -> &'static LoadPool {
    GLOBAL_LOAD_POOL.get_or_init(|| {
        let config = ResizerConfig::from_env();
        LoadPool::new(&config).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to a minimal load pool");
            // Fallback: create a minimal pool if the preferred configuration fails
            LoadPool::new(&config.with_load_threads(MIN_LOAD_THREADS)).unwrap_or_else(|e| {
                panic!(
                    "Failed to create fallback load pool with {} threads: {}",
                    MIN_LOAD_THREADS, e
                )
            })
        })
    })
}

/// Shared handle to the global pool, usable where an owned `LoadContext` is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalPool;

impl LoadContext for GlobalPool {
    fn spawn(&self, job: Job) {
        global_pool().spawn(job);
    }
}
