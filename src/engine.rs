// src/engine.rs
//
// The core of stream-resizer. An asynchronous resize pipeline that:
// 1. Validates requests on the caller's thread
// 2. Decodes, fits and composites on a background load context
// 3. Delivers exactly one callback per task on a caller-owned callback context
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected before decoding to prevent
/// decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod api;
pub mod buffer;
mod common;
pub mod compositor;
pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod fit;
pub mod io;
pub mod pool;
pub mod task;

pub use api::{callback_fn, FnCallback, ResizeCallback, Resizer};
pub use buffer::{PixelBuffer, PixelConfig};
pub use compositor::{Compositor, DefaultCompositor};
pub use config::{ResizerConfig, THREADS_ENV};
pub use decoder::{check_dimensions, sample_size, DecodeLimits, DefaultCodec, ImageCodec};
pub use dispatch::{
    callback_channel, spawn_callback_thread, CallbackContext, CallbackLoop, CallbackQueue,
};
pub use fit::{center_crop_fit, contain_decode_bound, contain_fit, FitTransform};
pub use io::Source;
pub use pool::{global_pool, GlobalPool, Job, LoadContext, LoadPool};
pub use task::{CancelToken, CancellableTask, ResizeFuture, TaskId, TaskOutcome, TaskState};
