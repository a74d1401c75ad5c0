use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::control::{ControlHandle, ControlLoop};
use crate::error::task::panic_message;
use crate::error::{RunnerError, TaskError};
use crate::job::{Job, JobState};
use crate::monitor::JobMonitor;
use crate::runner::{RunId, TaskRunner};

use super::sinks::{InformUser, StatusSink};

/// Outcome of one [`BlockingController::block`] call.
#[derive(Debug, Clone)]
pub struct BlockReport {
    pub run_id: RunId,
    /// Root job as it was when the task finished.
    pub state: JobState,
    pub failed: bool,
}

impl BlockReport {
    pub fn succeeded(&self) -> bool {
        !self.failed
    }
}

/// Owns the controlling context and runs one task at a time while keeping
/// that context serviced.
///
/// Task failures go to the [`InformUser`] collaborator and show up as
/// `BlockReport::failed`; they are never returned as errors of `block`.
///
/// # Reentrancy
///
/// `block` must not be started again while a previous call is pending, and a
/// task must not wait for another `block` on the same controller: the inner
/// call could only finish once the outer pump resumes, which never happens.
/// `&mut self` rules out the first case; the second is the caller's
/// responsibility.
pub struct BlockingController {
    control: ControlLoop,
    runner: TaskRunner,
    status: StatusSink,
    inform: Arc<dyn InformUser>,
    monitor: Option<JobMonitor>,
}

impl BlockingController {
    pub fn new<S, I>(status: S, inform: I) -> Self
    where
        S: Fn(&str) + Send + Sync + 'static,
        I: InformUser + 'static,
    {
        let control = ControlLoop::new();
        let runner = TaskRunner::new(control.handle());
        Self {
            control,
            runner,
            status: Arc::new(status),
            inform: Arc::new(inform),
            monitor: None,
        }
    }

    /// Applies runner settings and attaches a monitor built from `cfg`.
    pub fn with_config(mut self, cfg: &AppConfig) -> Self {
        self.runner = TaskRunner::with_config(self.control.handle(), cfg.runner.clone());
        self.monitor = Some(JobMonitor::new(&cfg.monitor));
        self
    }

    pub fn with_monitor(mut self, monitor: JobMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn monitor(&self) -> Option<&JobMonitor> {
        self.monitor.as_ref()
    }

    /// Handle for posting work to the controlling context, e.g. to hand a
    /// loaded result back from inside a task.
    pub fn control(&self) -> ControlHandle {
        self.control.handle()
    }

    /// Runs messages already queued for the controlling context.
    pub fn run_pending(&mut self) -> usize {
        self.control.run_pending()
    }

    /// Runs `task` on a background thread and returns once it has finished,
    /// servicing the controlling context in the meantime.
    ///
    /// Every hint the task sets on the root job reaches the status sink in
    /// order. Sub-job hints do not.
    #[tracing::instrument(name = "controller.block", skip(self, task))]
    pub async fn block<T>(&mut self, title: &str, task: T) -> Result<BlockReport, RunnerError>
    where
        T: FnOnce(&Job) -> anyhow::Result<()> + Send + 'static,
    {
        let job = Job::bound(title, self.control.handle());
        let status = Arc::clone(&self.status);
        job.add_observer(move |hint| status(hint));

        let done = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        let inform = Arc::clone(&self.inform);
        let op_title = title.to_string();
        let err_flag = Arc::clone(&failed);
        let done_flag = Arc::clone(&done);

        if let Some(monitor) = &self.monitor {
            monitor.register(&job);
        }

        let run_id = match self.runner.run(
            task,
            job.clone(),
            move |err| {
                err_flag.store(true, Ordering::Release);
                inform_guarded(inform.as_ref(), &op_title, &err);
            },
            move || done_flag.store(true, Ordering::Release),
        ) {
            Ok(id) => id,
            Err(e) => {
                if let Some(monitor) = &self.monitor {
                    monitor.unregister(job.id());
                }
                return Err(e);
            }
        };

        self.control
            .pump_until(|| done.load(Ordering::Acquire))
            .await;

        if let Some(monitor) = &self.monitor {
            monitor.unregister(job.id());
        }

        let failed = failed.load(Ordering::Acquire);
        tracing::debug!(run_id = %run_id, failed, "block released");
        Ok(BlockReport {
            run_id,
            state: job.state(),
            failed,
        })
    }
}

/// A panicking reporter is logged and skipped so the pump keeps running and
/// the completion still arrives.
fn inform_guarded(inform: &dyn InformUser, title: &str, err: &TaskError) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| inform.inform(title, err))) {
        tracing::warn!(
            operation = %title,
            error = %err,
            "inform-user sink panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}
