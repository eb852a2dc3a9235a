//! Worker pools

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::task::{run_async, run_blocking, ActiveTasks, TaskContext, TaskHandle};

/// One tokio runtime backing a pool
struct Pool {
    name: &'static str,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl Pool {
    fn start(name: &'static str, workers: usize, max_blocking: usize) -> SchedulerResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(max_blocking)
            .thread_name(format!("domus-{}", name))
            .enable_all()
            .build()
            .map_err(|source| SchedulerError::Runtime { pool: name, source })?;

        Ok(Self {
            name,
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    fn stop(&self, timeout: Duration) {
        if let Some(runtime) = self.runtime.lock().take() {
            debug!(pool = self.name, ?timeout, "Stopping pool");
            runtime.shutdown_timeout(timeout);
        }
    }

    fn abandon(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

/// The task scheduler
///
/// Owns two pools:
/// - the ordinary pool, at most `max_threads` workers, for rule actions,
///   request handling and other reactions
/// - the system pool, sized separately, for work that must keep running
///   under load (accept loops, driver read loops)
pub struct Scheduler {
    pool: Pool,
    system: Pool,
    /// Parent of every task's cancellation token
    root: CancellationToken,
    accepting: AtomicBool,
    active: Arc<ActiveTasks>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Start the scheduler's pools
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let pool = Pool::start("worker", cpus.min(config.max_threads), config.max_threads)?;
        let system = Pool::start("system", config.system_threads, config.system_threads)?;
        info!(
            max_threads = config.max_threads,
            system_threads = config.system_threads,
            "Task scheduler started"
        );

        Ok(Self {
            pool,
            system,
            root: CancellationToken::new(),
            accepting: AtomicBool::new(true),
            active: Arc::new(ActiveTasks::default()),
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run blocking work on the ordinary pool
    ///
    /// Returns immediately; the work is queued if every worker is busy.
    pub fn submit<F>(&self, name: impl Into<String>, work: F) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(TaskContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.submit_on(&self.pool, name.into(), work)
    }

    /// Run blocking work on the system pool
    pub fn submit_system<F>(&self, name: impl Into<String>, work: F) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(TaskContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.submit_on(&self.system, name.into(), work)
    }

    /// Run async work on the ordinary pool
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, work: F) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.spawn_on(&self.pool, name.into(), work)
    }

    /// Run async work on the system pool
    pub fn spawn_system<F, Fut>(&self, name: impl Into<String>, work: F) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.spawn_on(&self.system, name.into(), work)
    }

    fn prepare(&self, name: String) -> SchedulerResult<(Arc<str>, TaskContext, CancellationToken)> {
        if !self.accepting.load(Ordering::SeqCst) {
            warn!(task = %name, "Rejecting task, scheduler is shut down");
            return Err(SchedulerError::ShutDown);
        }
        let name: Arc<str> = Arc::from(name);
        let token = self.root.child_token();
        let ctx = TaskContext::new(Arc::clone(&name), token.clone());
        Ok((name, ctx, token))
    }

    fn submit_on<F>(&self, pool: &Pool, name: String, work: F) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(TaskContext) -> anyhow::Result<()> + Send + 'static,
    {
        let (name, ctx, token) = self.prepare(name)?;
        let guard = self.active.enter();
        let task_name = Arc::clone(&name);
        let join = pool.handle.spawn_blocking(move || {
            let _guard = guard;
            run_blocking(&task_name, ctx, work)
        });
        Ok(TaskHandle::new(name, token, join))
    }

    fn spawn_on<F, Fut>(&self, pool: &Pool, name: String, work: F) -> SchedulerResult<TaskHandle>
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (name, ctx, token) = self.prepare(name)?;
        let guard = self.active.enter();
        let fut = run_async(Arc::clone(&name), work(ctx));
        let join = pool.handle.spawn(async move {
            let _guard = guard;
            fut.await
        });
        Ok(TaskHandle::new(name, token, join))
    }

    /// Drive a future to completion on the system pool from a synchronous
    /// thread, e.g. waiting for a termination signal in `main`
    ///
    /// Must not be called from an async context.
    pub fn block_on<F: Future>(&self, fut: F) -> SchedulerResult<F::Output> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }
        Ok(self.system.handle.block_on(fut))
    }

    /// Number of submitted tasks that have not finished
    pub fn active_tasks(&self) -> usize {
        self.active.get()
    }

    pub fn is_shut_down(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting work, interrupt running tasks and wait up to
    /// `timeout` for them to finish
    ///
    /// Tasks still running at the deadline are abandoned along with their
    /// threads. Calling this more than once is a no-op. Must not be called
    /// from an async context.
    #[instrument(skip(self))]
    pub fn shutdown(&self, timeout: Duration) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            debug!("Task scheduler already shut down");
            return;
        }

        let deadline = Instant::now() + timeout;
        info!(active = self.active.get(), "Shutting down task scheduler");
        self.root.cancel();

        let remaining = self.active.wait_idle(deadline);
        if remaining > 0 {
            warn!(remaining, "Shutdown timeout expired with tasks still running");
        }

        let left = deadline.saturating_duration_since(Instant::now());
        self.pool.stop(left);
        self.system.stop(deadline.saturating_duration_since(Instant::now()));
        info!("Task scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Never block in drop; it may run inside an async context
        self.accepting.store(false, Ordering::SeqCst);
        self.root.cancel();
        self.pool.abandon();
        self.system.abandon();
    }
}

/// Thread-safe wrapper for Scheduler
pub type SharedScheduler = Arc<Scheduler>;
