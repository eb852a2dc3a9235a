//! Task handles and the context passed to running work

use domus_core::panic_message;
use futures::FutureExt;
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::error::TaskError;

/// Context handed to every task
///
/// Tasks are expected to check [`TaskContext::is_interrupted`] at I/O
/// boundaries and return early once the scheduler shuts down or the task's
/// handle is cancelled.
#[derive(Debug, Clone)]
pub struct TaskContext {
    name: Arc<str>,
    token: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(name: Arc<str>, token: CancellationToken) -> Self {
        Self { name, token }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task has been asked to stop
    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the task has been asked to stop
    pub async fn interrupted(&self) {
        self.token.cancelled().await
    }

    /// Cancellation token, for use in `tokio::select!`
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Handle to submitted work
///
/// Dropping the handle detaches the task; it keeps running.
#[derive(Debug)]
pub struct TaskHandle {
    name: Arc<str>,
    token: CancellationToken,
    join: JoinHandle<Result<(), TaskError>>,
}

impl TaskHandle {
    pub(crate) fn new(
        name: Arc<str>,
        token: CancellationToken,
        join: JoinHandle<Result<(), TaskError>>,
    ) -> Self {
        Self { name, token, join }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the task to stop; the task decides when to honour it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to end
    pub async fn join(self) -> Result<(), TaskError> {
        match self.join.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(TaskError::Cancelled),
            Err(err) => Err(TaskError::Panicked(panic_message(err.into_panic().as_ref()))),
        }
    }

    /// Block the calling thread until the task ends
    ///
    /// Must not be called from an async context.
    pub fn wait(self) -> Result<(), TaskError> {
        futures::executor::block_on(self.join())
    }
}

/// Count of submitted tasks that have not finished yet
#[derive(Debug, Default)]
pub(crate) struct ActiveTasks {
    count: Mutex<usize>,
    idle: Condvar,
}

impl ActiveTasks {
    pub(crate) fn get(&self) -> usize {
        *self.count.lock()
    }

    pub(crate) fn enter(self: &Arc<Self>) -> ActiveGuard {
        *self.count.lock() += 1;
        ActiveGuard(Arc::clone(self))
    }

    /// Wait until no task is active; returns the number still active at
    /// the deadline
    pub(crate) fn wait_idle(&self, deadline: Instant) -> usize {
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                break;
            }
        }
        *count
    }
}

/// Decrements the active count when the task ends or is dropped unrun
pub(crate) struct ActiveGuard(Arc<ActiveTasks>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

type Outcome = Result<anyhow::Result<()>, Box<dyn std::any::Any + Send>>;

fn report(name: &str, outcome: Outcome) -> Result<(), TaskError> {
    match outcome {
        Ok(Ok(())) => {
            trace!(task = name, "Task completed");
            Ok(())
        }
        Ok(Err(err)) => {
            error!(task = name, error = %format!("{:#}", err), "Task failed");
            Err(TaskError::Failed(format!("{:#}", err)))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(task = name, panic = %message, "Task panicked");
            Err(TaskError::Panicked(message))
        }
    }
}

/// Run blocking work inside the worker boundary
pub(crate) fn run_blocking<F>(name: &str, ctx: TaskContext, work: F) -> Result<(), TaskError>
where
    F: FnOnce(TaskContext) -> anyhow::Result<()>,
{
    trace!(task = name, "Task started");
    report(name, catch_unwind(AssertUnwindSafe(|| work(ctx))))
}

/// Run async work inside the worker boundary
pub(crate) async fn run_async<Fut>(name: Arc<str>, work: Fut) -> Result<(), TaskError>
where
    Fut: Future<Output = anyhow::Result<()>>,
{
    trace!(task = &*name, "Task started");
    let outcome = AssertUnwindSafe(work).catch_unwind().await;
    report(&name, outcome)
}
