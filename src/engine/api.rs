// src/engine/api.rs
//
// Resizer: the public entry point of the pipeline.
//
// Every operation validates its arguments on the caller's thread, then schedules one
// CancellableTask on the load context and returns a ResizeFuture right away. When
// the task finishes, exactly one callback job is posted to the callback context.
// Cancelled tasks post nothing.

use crate::engine::buffer::PixelBuffer;
use crate::engine::compositor::{Compositor, DefaultCompositor};
use crate::engine::config::ResizerConfig;
use crate::engine::decoder::{DecodeLimits, DefaultCodec, ImageCodec};
use crate::engine::dispatch::CallbackContext;
use crate::engine::io::Source;
use crate::engine::pool::{GlobalPool, Job, LoadContext, LoadPool};
use crate::engine::task::{CancelToken, CancellableTask, ResizeFuture, TaskId, TaskOutcome};
use crate::error::{ResizeError, Result};
use crate::ops::{ResizeMode, ResizeRequest};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

// =============================================================================
// CALLBACKS
// =============================================================================

/// Receives the result of one resize task, on the callback context.
///
/// Both methods consume the callback, so at most one of them can ever run.
pub trait ResizeCallback: Send + 'static {
    /// The resized buffer. Ownership moves to the callback.
    fn on_resize_complete(self: Box<Self>, buffer: PixelBuffer);

    fn on_resize_failed(self: Box<Self>, error: ResizeError);
}

impl ResizeCallback for Box<dyn ResizeCallback> {
    fn on_resize_complete(self: Box<Self>, buffer: PixelBuffer) {
        (*self).on_resize_complete(buffer)
    }

    fn on_resize_failed(self: Box<Self>, error: ResizeError) {
        (*self).on_resize_failed(error)
    }
}

/// Adapter that turns a closure over `Result<PixelBuffer>` into a [`ResizeCallback`].
pub struct FnCallback<F>(F);

impl<F> ResizeCallback for FnCallback<F>
where
    F: FnOnce(Result<PixelBuffer>) + Send + 'static,
{
    fn on_resize_complete(self: Box<Self>, buffer: PixelBuffer) {
        (self.0)(Ok(buffer))
    }

    fn on_resize_failed(self: Box<Self>, error: ResizeError) {
        (self.0)(Err(error))
    }
}

/// Build a callback from a closure.
///
/// ```no_run
/// # use stream_resizer::{callback_fn, spawn_callback_thread, Resizer};
/// let (queue, _thread) = spawn_callback_thread("callbacks").unwrap();
/// let resizer = Resizer::with_defaults(queue);
/// resizer
///     .resize_center_crop("photo.jpg", 128, 128, callback_fn(|result| {
///         if let Ok(buffer) = result {
///             println!("{}x{}", buffer.width(), buffer.height());
///         }
///     }))
///     .unwrap();
/// ```
pub fn callback_fn<F>(f: F) -> FnCallback<F>
where
    F: FnOnce(Result<PixelBuffer>) + Send + 'static,
{
    FnCallback(f)
}

// =============================================================================
// RESIZER
// =============================================================================

/// Schedules resize tasks on a load context and reports results on a callback context.
///
/// Cheap to clone; clones share the same contexts, codec and compositor.
#[derive(Clone)]
pub struct Resizer {
    load: Arc<dyn LoadContext>,
    callbacks: Arc<dyn CallbackContext>,
    codec: Arc<dyn ImageCodec>,
    compositor: Arc<dyn Compositor>,
    /// Upper bound on requested target sizes
    limits: DecodeLimits,
}

impl std::fmt::Debug for Resizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resizer")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Resizer {
    /// Resizer with its own load pool sized from `config`.
    pub fn new(config: &ResizerConfig, callbacks: impl CallbackContext + 'static) -> Result<Self> {
        let pool = LoadPool::new(config)?;
        Ok(Self::with_parts(
            Arc::new(pool),
            Arc::new(callbacks),
            Arc::new(DefaultCodec::new(config.limits)),
            Arc::new(DefaultCompositor),
        )
        .with_limits(config.limits))
    }

    /// Resizer on the process-wide load pool with default decode limits.
    pub fn with_defaults(callbacks: impl CallbackContext + 'static) -> Self {
        Self::with_parts(
            Arc::new(GlobalPool),
            Arc::new(callbacks),
            Arc::new(DefaultCodec::default()),
            Arc::new(DefaultCompositor),
        )
    }

    pub fn with_parts(
        load: Arc<dyn LoadContext>,
        callbacks: Arc<dyn CallbackContext>,
        codec: Arc<dyn ImageCodec>,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        Self {
            load,
            callbacks,
            codec,
            compositor,
            limits: DecodeLimits::default(),
        }
    }

    /// Reject targets beyond `limits` at submission. Defaults to [`DecodeLimits::default`].
    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Decode close to `width x height`, scale to cover it and crop the overflow evenly.
    pub fn resize_center_crop(
        &self,
        source: impl Into<Source>,
        width: u32,
        height: u32,
        callback: impl ResizeCallback,
    ) -> Result<ResizeFuture> {
        self.submit(ResizeRequest::center_crop(source, width, height), callback)
    }

    /// Decode and scale so the whole image fits inside `width x height`, keeping aspect ratio.
    pub fn fit_in_space(
        &self,
        source: impl Into<Source>,
        width: u32,
        height: u32,
        callback: impl ResizeCallback,
    ) -> Result<ResizeFuture> {
        self.submit(ResizeRequest::fit_in_space(source, width, height), callback)
    }

    /// Subsampled decode only. The result may be larger than `width x height`.
    pub fn load_approximate(
        &self,
        source: impl Into<Source>,
        width: u32,
        height: u32,
        callback: impl ResizeCallback,
    ) -> Result<ResizeFuture> {
        self.submit(ResizeRequest::approximate(source, width, height), callback)
    }

    /// Full-resolution decode. `reuse` is moved in and its allocation is decoded into
    /// when it fits; the same buffer must not back two in-flight requests.
    pub fn load_as_is(
        &self,
        source: impl Into<Source>,
        reuse: Option<PixelBuffer>,
        callback: impl ResizeCallback,
    ) -> Result<ResizeFuture> {
        self.submit(ResizeRequest::as_is(source, reuse), callback)
    }

    pub fn load_as_is_path(
        &self,
        path: impl AsRef<Path>,
        callback: impl ResizeCallback,
    ) -> Result<ResizeFuture> {
        self.load_as_is(Source::from_path(path), None, callback)
    }

    pub fn load_as_is_stream(
        &self,
        reader: impl Read + Send + 'static,
        reuse: Option<PixelBuffer>,
        callback: impl ResizeCallback,
    ) -> Result<ResizeFuture> {
        self.load_as_is(Source::from_reader(reader), reuse, callback)
    }

    /// Schedule an arbitrary request.
    ///
    /// Argument errors are returned here and nothing is scheduled. Every later
    /// failure reaches `callback.on_resize_failed` instead.
    pub fn submit(
        &self,
        request: ResizeRequest,
        callback: impl ResizeCallback,
    ) -> Result<ResizeFuture> {
        request.validate_within(&self.limits)?;

        let mode = request.mode;
        let (width, height) = (request.width, request.height);
        let codec = self.codec.clone();
        let compositor = self.compositor.clone();
        let callbacks = self.callbacks.clone();
        let callback: Box<dyn ResizeCallback> = Box::new(callback);
        let started = Instant::now();

        let (task, future) = CancellableTask::new(
            move |token: &CancelToken| request.execute(codec.as_ref(), compositor.as_ref(), token),
            move |id, outcome| deliver(callbacks.as_ref(), id, mode, started, outcome, callback),
        );

        tracing::debug!(
            task_id = %task.id(),
            mode = mode.as_str(),
            width,
            height,
            "resize task submitted"
        );
        self.load.spawn(Box::new(move || task.run()));
        Ok(future)
    }
}

/// Completion observer: turn the outcome into one callback job on the callback context.
fn deliver(
    callbacks: &dyn CallbackContext,
    id: TaskId,
    mode: ResizeMode,
    started: Instant,
    outcome: TaskOutcome<PixelBuffer>,
    callback: Box<dyn ResizeCallback>,
) {
    let job: Job = match outcome {
        TaskOutcome::Completed(buffer) => {
            tracing::debug!(
                task_id = %id,
                mode = mode.as_str(),
                out_width = buffer.width(),
                out_height = buffer.height(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "resize task completed"
            );
            Box::new(move || callback.on_resize_complete(buffer))
        }
        TaskOutcome::Failed(error) => {
            tracing::warn!(
                task_id = %id,
                mode = mode.as_str(),
                error = %error,
                category = error.category().as_str(),
                "resize task failed"
            );
            Box::new(move || callback.on_resize_failed(error))
        }
        TaskOutcome::Cancelled => {
            tracing::debug!(task_id = %id, "resize task cancelled; no callback");
            return;
        }
    };

    if let Err(e) = callbacks.post(job) {
        tracing::warn!(task_id = %id, error = %e, "dropping resize callback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::PixelConfig;
    use crate::engine::dispatch::{callback_channel, CallbackLoop};
    use crate::engine::fit::FitTransform;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Runs jobs on the calling thread and counts them.
    #[derive(Default)]
    struct InlineLoad {
        spawned: AtomicUsize,
    }

    impl LoadContext for InlineLoad {
        fn spawn(&self, job: Job) {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            job();
        }
    }

    /// Hands back a solid buffer of the requested bound, counting decodes.
    #[derive(Default)]
    struct SolidCodec {
        decodes: AtomicUsize,
    }

    impl ImageCodec for SolidCodec {
        fn decode_approx(&self, _source: Source, bound_w: u32, bound_h: u32) -> Result<PixelBuffer> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            PixelBuffer::new(bound_w * 2, bound_h * 2, PixelConfig::Rgba8)
        }

        fn decode_full(&self, _source: Source, reuse: Option<PixelBuffer>) -> Result<PixelBuffer> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            match reuse {
                Some(buffer) => Ok(buffer),
                None => PixelBuffer::new(3, 2, PixelConfig::Rgb8),
            }
        }
    }

    struct FailingCompositor;

    impl Compositor for FailingCompositor {
        fn composite(&self, source: &PixelBuffer, transform: &FitTransform) -> Result<PixelBuffer> {
            Err(ResizeError::composite_failed(
                source.dimensions(),
                transform.out_size(),
                "refused",
            ))
        }
    }

    /// Hands back a buffer of fixed size whatever the bound, remembering its address.
    struct ExactCodec {
        dims: (u32, u32),
        last_ptr: AtomicUsize,
    }

    impl ExactCodec {
        fn new(width: u32, height: u32) -> Self {
            Self {
                dims: (width, height),
                last_ptr: AtomicUsize::new(0),
            }
        }
    }

    impl ImageCodec for ExactCodec {
        fn decode_approx(&self, _source: Source, _bound_w: u32, _bound_h: u32) -> Result<PixelBuffer> {
            let buffer = PixelBuffer::new(self.dims.0, self.dims.1, PixelConfig::Rgb8)?;
            self.last_ptr
                .store(buffer.as_bytes().as_ptr() as usize, Ordering::SeqCst);
            Ok(buffer)
        }

        fn decode_full(&self, source: Source, _reuse: Option<PixelBuffer>) -> Result<PixelBuffer> {
            self.decode_approx(source, 0, 0)
        }
    }

    /// Submit through `codec` and a refusing compositor; returns the delivered result
    /// as (dimensions, data address).
    fn run_exact(
        codec: Arc<ExactCodec>,
        submit: impl FnOnce(&Resizer, FnCallback<Box<dyn FnOnce(Result<PixelBuffer>) + Send>>),
    ) -> Result<((u32, u32), usize)> {
        let (queue, callback_loop) = callback_channel();
        let resizer = Resizer::with_parts(
            Arc::new(InlineLoad::default()),
            Arc::new(queue),
            codec,
            Arc::new(FailingCompositor),
        );
        let (tx, rx) = mpsc::channel();
        let f: Box<dyn FnOnce(Result<PixelBuffer>) + Send> = Box::new(move |r| {
            let _ = tx.send(r.map(|b| (b.dimensions(), b.as_bytes().as_ptr() as usize)));
        });
        submit(&resizer, callback_fn(f));
        assert_eq!(callback_loop.run_pending(), 1);
        rx.recv_timeout(Duration::from_secs(1)).unwrap()
    }

    fn resizer(
        compositor: Arc<dyn Compositor>,
    ) -> (Resizer, Arc<InlineLoad>, Arc<SolidCodec>, CallbackLoop) {
        let load = Arc::new(InlineLoad::default());
        let codec = Arc::new(SolidCodec::default());
        let (queue, callback_loop) = callback_channel();
        let resizer = Resizer::with_parts(load.clone(), Arc::new(queue), codec.clone(), compositor);
        (resizer, load, codec, callback_loop)
    }

    #[test]
    fn zero_target_is_rejected_before_scheduling() {
        let (resizer, load, codec, callback_loop) = resizer(Arc::new(DefaultCompositor));
        let err = resizer
            .resize_center_crop("x.png", 0, 10, callback_fn(|_| panic!("no callback expected")))
            .unwrap_err();
        assert!(matches!(err, ResizeError::InvalidDimensions { width: 0, height: 10 }));
        assert_eq!(load.spawned.load(Ordering::SeqCst), 0);
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
        assert_eq!(callback_loop.pending(), 0);
    }

    #[test]
    fn oversized_target_is_rejected_before_scheduling() {
        let (resizer, load, codec, callback_loop) = resizer(Arc::new(DefaultCompositor));
        let err = resizer
            .resize_center_crop("x.png", 60_000, 60_000, callback_fn(|_| panic!("no callback expected")))
            .unwrap_err();
        assert!(matches!(err, ResizeError::InvalidArgument { .. }));
        assert_eq!(err.category(), crate::error::ErrorCategory::UserError);

        assert!(resizer
            .fit_in_space("x.png", 60_000, 60_000, callback_fn(|_| panic!("no callback expected")))
            .is_err());
        assert!(resizer
            .load_approximate("x.png", 1, 200_000, callback_fn(|_| panic!("no callback expected")))
            .is_err());

        assert_eq!(load.spawned.load(Ordering::SeqCst), 0);
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
        assert_eq!(callback_loop.pending(), 0);
    }

    #[test]
    fn configured_limits_bound_targets() {
        let (resizer, load, _codec, _callback_loop) = resizer(Arc::new(DefaultCompositor));
        let resizer = resizer.with_limits(DecodeLimits {
            max_dimension: 16,
            max_pixels: 256,
        });
        assert!(resizer
            .resize_center_crop("x.png", 17, 1, callback_fn(|_| {}))
            .is_err());
        assert_eq!(load.spawned.load(Ordering::SeqCst), 0);

        resizer
            .resize_center_crop("x.png", 16, 16, callback_fn(|_| {}))
            .unwrap();
        assert_eq!(load.spawned.load(Ordering::SeqCst), 1);

        // as-is has no target to bound
        resizer
            .load_as_is(vec![0u8; 4], None, callback_fn(|_| {}))
            .unwrap();
        assert_eq!(load.spawned.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn center_crop_of_exact_size_skips_the_compositor() {
        let codec = Arc::new(ExactCodec::new(8, 4));
        let (dims, ptr) = run_exact(codec.clone(), |resizer, callback| {
            resizer.resize_center_crop("x.png", 8, 4, callback).unwrap();
        })
        .unwrap();
        assert_eq!(dims, (8, 4));
        assert_eq!(ptr, codec.last_ptr.load(Ordering::SeqCst));
    }

    #[test]
    fn fit_in_space_identity_skips_the_compositor() {
        let codec = Arc::new(ExactCodec::new(8, 4));
        let (dims, ptr) = run_exact(codec.clone(), |resizer, callback| {
            resizer.fit_in_space("x.png", 8, 4, callback).unwrap();
        })
        .unwrap();
        assert_eq!(dims, (8, 4));
        assert_eq!(ptr, codec.last_ptr.load(Ordering::SeqCst));

        // a real scale still reaches the (refusing) compositor
        let codec = Arc::new(ExactCodec::new(8, 4));
        let err = run_exact(codec, |resizer, callback| {
            resizer.fit_in_space("x.png", 4, 4, callback).unwrap();
        })
        .unwrap_err();
        assert!(matches!(err, ResizeError::CompositeFailed { .. }));
    }

    #[test]
    fn completion_is_posted_not_run_inline() {
        let (resizer, _load, _codec, callback_loop) = resizer(Arc::new(DefaultCompositor));
        let (tx, rx) = mpsc::channel();
        let future = resizer
            .resize_center_crop("x.png", 8, 4, callback_fn(move |r| {
                let _ = tx.send(r.map(|b| b.dimensions()));
            }))
            .unwrap();
        assert!(future.is_done());
        assert!(rx.try_recv().is_err());
        assert_eq!(callback_loop.run_pending(), 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap().unwrap(), (8, 4));
    }

    #[test]
    fn background_failure_goes_to_on_resize_failed() {
        let (resizer, _load, _codec, callback_loop) = resizer(Arc::new(FailingCompositor));
        let (tx, rx) = mpsc::channel();
        resizer
            .fit_in_space("x.png", 8, 4, callback_fn(move |r| {
                let _ = tx.send(r);
            }))
            .unwrap();
        callback_loop.run_pending();
        let err = rx.recv_timeout(Duration::from_secs(1)).unwrap().unwrap_err();
        assert!(matches!(err, ResizeError::CompositeFailed { .. }));
    }

    #[test]
    fn as_is_hands_back_the_reuse_buffer() {
        let (resizer, _load, _codec, callback_loop) = resizer(Arc::new(DefaultCompositor));
        let reuse = PixelBuffer::new(5, 5, PixelConfig::Luma8).unwrap();
        let ptr = reuse.as_bytes().as_ptr() as usize;
        let (tx, rx) = mpsc::channel();
        resizer
            .load_as_is(vec![0u8; 4], Some(reuse), callback_fn(move |r| {
                let _ = tx.send(r.map(|b| b.as_bytes().as_ptr() as usize));
            }))
            .unwrap();
        callback_loop.run_pending();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap().unwrap(), ptr);
    }

    #[test]
    fn cancelled_outcome_posts_nothing() {
        let (queue, callback_loop) = callback_channel();
        let (task, future) = CancellableTask::<PixelBuffer>::new(
            |_token: &CancelToken| PixelBuffer::new(1, 1, PixelConfig::Rgb8),
            move |id, outcome| {
                deliver(
                    &queue,
                    id,
                    ResizeMode::Approximate,
                    Instant::now(),
                    outcome,
                    Box::new(callback_fn(|_| panic!("cancelled task must not call back"))),
                )
            },
        );
        assert!(future.cancel());
        task.run();
        assert_eq!(callback_loop.pending(), 0);
    }
}
