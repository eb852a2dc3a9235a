//! Task scheduling for Domus
//!
//! Listeners on the event bus run on the posting thread, so anything slow
//! they need to do (rule actions, I/O, connection handling) is handed to the
//! [`Scheduler`]. Work runs on a bounded pool of worker threads; a separate
//! system pool serves long-lived work such as accept loops so it is never
//! starved by ordinary load.
//!
//! An error or panic inside a task is logged with the task's name and never
//! takes the pool down.

mod config;
mod error;
mod scheduler;
mod task;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult, TaskError};
pub use scheduler::{Scheduler, SharedScheduler};
pub use task::{TaskContext, TaskHandle};
