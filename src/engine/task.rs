// src/engine/task.rs
//
// Cancellable background tasks.
//
// A CancellableTask<T> owns a unit of work and a completion observer. Running it on
// the load context moves it through:
//
//   Pending --run--> Running --Ok--> Completed
//                            --Err/panic--> Failed
//   {Pending | Running} --cancel--> Cancelled
//
// Terminal states never change. The observer is called exactly once per task with
// the outcome, even when the task is dropped without running.

use crate::engine::common::run_with_panic_policy;
use crate::error::{ResizeError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identifier, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

/// What the completion observer receives.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Failed(ResizeError),
    Cancelled,
}

struct Inner {
    state: TaskState,
    /// Set once the observer has returned.
    observed: bool,
}

struct Shared {
    id: TaskId,
    inner: Mutex<Inner>,
    done: Condvar,
}

impl Shared {
    fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    fn cancel(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            TaskState::Pending | TaskState::Running => {
                let from = inner.state;
                inner.state = TaskState::Cancelled;
                drop(inner);
                tracing::trace!(task_id = %self.id, from = from.as_str(), "task cancelled");
                self.done.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Waiters are released when the observer has run, or immediately on cancel.
    fn settled(inner: &Inner) -> bool {
        inner.observed || inner.state == TaskState::Cancelled
    }
}

/// Read-only view of a task's cancellation flag, handed to the work closure so it
/// can stop early between steps.
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.shared.state() == TaskState::Cancelled
    }

    /// `Err(ResizeError::Cancelled)` once the task has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ResizeError::cancelled())
        } else {
            Ok(())
        }
    }
}

/// Handle to a submitted task.
///
/// Dropping the handle does not cancel the task.
#[derive(Clone)]
pub struct ResizeFuture {
    shared: Arc<Shared>,
}

impl fmt::Debug for ResizeFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResizeFuture")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

impl ResizeFuture {
    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn state(&self) -> TaskState {
        self.shared.state()
    }

    /// Cancel the task. A pending task never runs; a running task finishes its
    /// current step but its callback never fires.
    ///
    /// Returns true only for the call that performed the cancellation. Calling it
    /// again, or after the task completed or failed, returns false and changes nothing.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Block until the task is settled: cancelled, or finished with its completion
    /// hook run (for resize tasks, the callback has been posted).
    pub fn wait(&self) -> TaskState {
        let mut inner = self.shared.inner.lock();
        while !Shared::settled(&inner) {
            self.shared.done.wait(&mut inner);
        }
        inner.state
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskState> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while !Shared::settled(&inner) {
            if self.shared.done.wait_until(&mut inner, deadline).timed_out() {
                return Shared::settled(&inner).then_some(inner.state);
            }
        }
        Some(inner.state)
    }
}

type Work<T> = Box<dyn FnOnce(&CancelToken) -> Result<T> + Send + 'static>;
type Observer<T> = Box<dyn FnOnce(TaskId, TaskOutcome<T>) + Send + 'static>;

/// A unit of work plus the observer that learns how it ended.
pub struct CancellableTask<T> {
    shared: Arc<Shared>,
    work: Option<Work<T>>,
    observer: Option<Observer<T>>,
}

impl<T: Send + 'static> CancellableTask<T> {
    /// Build a task and the handle used to cancel or wait on it.
    ///
    /// `observer` runs on whichever thread finishes the task, after the terminal
    /// state is recorded and outside the state lock.
    pub fn new<W, O>(work: W, observer: O) -> (Self, ResizeFuture)
    where
        W: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
        O: FnOnce(TaskId, TaskOutcome<T>) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            id: TaskId::next(),
            inner: Mutex::new(Inner {
                state: TaskState::Pending,
                observed: false,
            }),
            done: Condvar::new(),
        });
        let task = Self {
            shared: shared.clone(),
            work: Some(Box::new(work)),
            observer: Some(Box::new(observer)),
        };
        (task, ResizeFuture { shared })
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    /// Execute the task on the current thread. Consumes the task, so the work runs
    /// at most once.
    pub fn run(mut self) {
        let id = self.shared.id;
        {
            let mut inner = self.shared.inner.lock();
            if inner.state == TaskState::Cancelled {
                drop(inner);
                tracing::debug!(task_id = %id, "skipping task cancelled before start");
                self.finish(TaskOutcome::Cancelled);
                return;
            }
            inner.state = TaskState::Running;
        }
        tracing::trace!(task_id = %id, "task running");

        let Some(work) = self.work.take() else {
            return;
        };
        let token = CancelToken {
            shared: self.shared.clone(),
        };
        let result = run_with_panic_policy("task", || work(&token));

        let outcome = {
            let mut inner = self.shared.inner.lock();
            if inner.state == TaskState::Cancelled {
                TaskOutcome::Cancelled
            } else {
                match result {
                    Ok(value) => {
                        inner.state = TaskState::Completed;
                        TaskOutcome::Completed(value)
                    }
                    Err(err) => {
                        inner.state = TaskState::Failed;
                        TaskOutcome::Failed(err)
                    }
                }
            }
        };
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: TaskOutcome<T>) {
        if let Some(observer) = self.observer.take() {
            observe(&self.shared, observer, outcome);
        }
    }
}

/// Hand `outcome` to the observer, then release waiters. A panicking observer is
/// logged and still counts as observed, so `wait()` cannot hang on it.
fn observe<T>(shared: &Shared, observer: Observer<T>, outcome: TaskOutcome<T>) {
    let id = shared.id;
    if let Err(e) = run_with_panic_policy("observer", || {
        observer(id, outcome);
        Ok(())
    }) {
        tracing::warn!(task_id = %id, error = %e, "completion observer failed");
    }
    shared.inner.lock().observed = true;
    shared.done.notify_all();
}

impl<T> Drop for CancellableTask<T> {
    fn drop(&mut self) {
        // Dropped without running (load context shut down or rejected the job):
        // fail the task so the observer still fires exactly once.
        let Some(observer) = self.observer.take() else {
            return;
        };
        let outcome = {
            let mut inner = self.shared.inner.lock();
            if inner.state == TaskState::Cancelled {
                TaskOutcome::Cancelled
            } else {
                inner.state = TaskState::Failed;
                TaskOutcome::Failed(ResizeError::context_closed(
                    "task dropped before it ran",
                ))
            }
        };
        tracing::warn!(task_id = %self.shared.id, "task dropped without running");
        observe(&self.shared, observer, outcome);
    }
}
