// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::ResizeError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type EngineResult<T> = std::result::Result<T, ResizeError>;

/// Run `f`, converting a panic into `ResizeError::InternalPanic` tagged with `label`.
///
/// Codec and compositor code runs on shared pool threads; a panic there must become
/// a delivered failure instead of tearing down the worker.
pub fn run_with_panic_policy<T, F>(label: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(label, %message, "panic caught at task boundary");
            Err(ResizeError::internal_panic(format!("{label}: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
