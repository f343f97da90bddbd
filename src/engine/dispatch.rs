// src/engine/dispatch.rs
//
// Callback context: the single place where callback bodies run.
//
// Completion hooks on the load context never call user code directly. They post a
// job to a CallbackContext, and whoever owns the matching CallbackLoop (usually
// the UI thread) drains it.

use crate::engine::pool::Job;
use crate::error::{ResizeError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Destination for completion messages.
pub trait CallbackContext: Send + Sync {
    /// Enqueue `job` to run on the callback context. Never runs it inline.
    fn post(&self, job: Job) -> Result<()>;
}

impl<C: CallbackContext + ?Sized> CallbackContext for Arc<C> {
    fn post(&self, job: Job) -> Result<()> {
        (**self).post(job)
    }
}

/// Sending half of a callback context. Cheap to clone.
#[derive(Clone)]
pub struct CallbackQueue {
    tx: Sender<Job>,
}

impl std::fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("queued", &self.tx.len())
            .finish()
    }
}

impl CallbackContext for CallbackQueue {
    fn post(&self, job: Job) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| ResizeError::context_closed("callback loop dropped"))
    }
}

/// Receiving half of a callback context, driven by the thread that owns it.
pub struct CallbackLoop {
    rx: Receiver<Job>,
}

impl std::fmt::Debug for CallbackLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackLoop")
            .field("pending", &self.rx.len())
            .finish()
    }
}

/// Create a connected queue/loop pair.
pub fn callback_channel() -> (CallbackQueue, CallbackLoop) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (CallbackQueue { tx }, CallbackLoop { rx })
}

impl CallbackLoop {
    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run every callback that is already queued, without blocking. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(job) => {
                    run_job(job);
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Wait up to `timeout` for one callback and run it. Returns false on timeout or
    /// when every queue has been dropped.
    pub fn run_next_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                run_job(job);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Run callbacks until every `CallbackQueue` has been dropped. Returns how many ran.
    pub fn run(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.recv() {
            run_job(job);
            ran += 1;
        }
        ran
    }
}

/// A panicking callback must not take the callback loop down with it.
fn run_job(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!("callback panicked; continuing with the next one");
    }
}

/// Run a callback loop on a dedicated thread, for hosts without a UI loop.
///
/// The thread exits once every clone of the returned queue (including those held
/// by resizers) has been dropped; joining yields the number of callbacks run.
pub fn spawn_callback_thread(
    name: impl Into<String>,
) -> std::io::Result<(CallbackQueue, JoinHandle<usize>)> {
    let (queue, callback_loop) = callback_channel();
    let handle = std::thread::Builder::new()
        .name(name.into())
        .spawn(move || callback_loop.run())?;
    Ok((queue, handle))
}
