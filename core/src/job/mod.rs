//! Observable progress handles.
//!
//! A [`Job`] carries the human-readable hint of whatever the background work is
//! currently doing, plus progress/completion bookkeeping. Jobs nest: a task may
//! hand a sub-job to a collaborator so the collaborator reports its own steps
//! without touching the parent's hint.
//!
//! # Notification delivery
//!
//! ```text
//! worker thread                      controlling context
//!   job.set_hint("A") ──post──▶ queue ──pump──▶ observer("A")
//!   job.set_hint("B") ──post──▶ queue ──pump──▶ observer("B")
//! ```
//!
//! A job bound to a [`ControlHandle`](crate::control::ControlHandle) queues every
//! notification to the controlling context; posting happens under the job's
//! lock, so the queue order is the set order. An unbound job notifies
//! synchronously on the writer's thread.

mod handle;
mod observer;
mod state;

pub use handle::{Job, JobId};
pub use observer::ObserverId;
pub use state::JobState;
