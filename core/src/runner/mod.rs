//! Runs one task per background thread and marshals its outcome back to the
//! controlling context.
//!
//! ```text
//! TaskRunner::run(task, job, on_error, on_complete)
//!   ↓ spawn "wpm-job-<run id>"
//! task(&job)            ── panics and errors caught here
//!   ↓ post
//! on_error(TaskError)   ── controlling context, only on failure
//!   ↓ post
//! on_complete()         ── controlling context, always, exactly once
//! ```
//!
//! There is no cancellation: a started task runs until it returns or fails.

mod task_runner;
pub mod types;

pub use task_runner::TaskRunner;
pub use types::RunId;
