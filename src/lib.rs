// lib.rs
//
// stream-resizer: asynchronous image decode-and-resize for UI thumbnails
//
// Design goals:
// - Never block the caller: work runs on a background load context
// - Decode only as many pixels as the target needs (power-of-two subsampling)
// - Exactly one callback per task, always on the caller's callback context
// - Cancellable at any point before the callback is posted

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    callback_channel, callback_fn, center_crop_fit, contain_fit, spawn_callback_thread,
    CallbackContext, CallbackLoop, CallbackQueue, FitTransform, PixelBuffer, PixelConfig,
    ResizeCallback, ResizeFuture, Resizer, ResizerConfig, Source, TaskState,
};
pub use error::{ErrorCategory, ResizeError, Result};
pub use ops::{ResizeMode, ResizeRequest};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Input formats the default codec can decode.
pub fn supported_input_formats() -> &'static [&'static str] {
    &["jpeg", "png", "webp"]
}
