//! Supervised background jobs for the wpm package manager.
//!
//! Long operations (install, uninstall, repository reload) run on their own
//! thread, report hierarchical progress through [`Job`]s and hand their
//! outcome back to a single controlling context. A failing operation is
//! reported, never propagated into the controlling context as a crash.
//!
//! # Architecture
//!
//! ```text
//! BlockingController::block(title, task)
//!   ↓ root Job bound to the ControlLoop
//! TaskRunner::run ──▶ background thread: task(&job)
//!   ↓                     │ set_hint / create_sub_job / set_progress
//! ControlLoop::pump_until ◀── queued notifications, error, completion
//!   ↓
//! BlockReport
//! ```

pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod job;
pub mod monitor;
pub mod packages;
pub mod runner;

pub use control::{ControlHandle, ControlLoop};
pub use controller::{BlockReport, BlockingController, InformUser, LogInformUser, StatusSink};
pub use error::{CliError, RunnerError, TaskError};
pub use job::{Job, JobId, JobState, ObserverId};
pub use monitor::JobMonitor;
pub use runner::{RunId, TaskRunner};
