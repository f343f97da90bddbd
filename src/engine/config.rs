// src/engine/config.rs
//
// Resizer configuration: load-context sizing and decode limits.
//
// **Thread Count Calculation** (when `load_threads` is not set):
// - Uses std::thread::available_parallelism() to respect cgroup/CPU quota
// - Reserves one core for the callback (UI) context
// - Never drops below MIN_LOAD_THREADS
//
// The environment variable STREAM_RESIZER_THREADS overrides the detected count
// when the config is built with `from_env()`.

use crate::engine::decoder::DecodeLimits;

/// Environment variable read by [`ResizerConfig::from_env`].
pub const THREADS_ENV: &str = "STREAM_RESIZER_THREADS";

/// Minimum number of load threads
pub const MIN_LOAD_THREADS: usize = 1;

/// Cores kept free for the thread that drains callbacks
const CALLBACK_RESERVE: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizerConfig {
    /// Number of load threads; `None` = detect from available parallelism
    pub load_threads: Option<usize>,
    /// Load threads are named `{prefix}-{index}`
    pub thread_name_prefix: String,
    /// Header limits applied before any pixels are decoded
    pub limits: DecodeLimits,
}

impl Default for ResizerConfig {
    fn default() -> Self {
        Self {
            load_threads: None,
            thread_name_prefix: "resize-load".to_string(),
            limits: DecodeLimits::default(),
        }
    }
}

impl ResizerConfig {
    /// Default config with `STREAM_RESIZER_THREADS` applied when it parses as a
    /// positive integer. Invalid values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(THREADS_ENV) {
            match parse_threads(&raw) {
                Some(n) => config.load_threads = Some(n),
                None => tracing::warn!(
                    env = THREADS_ENV,
                    value = %raw,
                    "ignoring invalid load thread count"
                ),
            }
        }
        config
    }

    pub fn with_load_threads(mut self, threads: usize) -> Self {
        self.load_threads = Some(threads.max(MIN_LOAD_THREADS));
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Effective number of load threads.
    pub fn resolved_threads(&self) -> usize {
        match self.load_threads {
            Some(n) => n.max(MIN_LOAD_THREADS),
            None => detected_threads(),
        }
    }
}

fn parse_threads(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&n| n >= MIN_LOAD_THREADS)
}

fn detected_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_LOAD_THREADS)
        .saturating_sub(CALLBACK_RESERVE)
        .max(MIN_LOAD_THREADS)
}
