use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crate::config::RunnerConfig;
use crate::control::ControlHandle;
use crate::error::{RunnerError, TaskError};
use crate::job::Job;

use super::types::RunId;

/// Starts tasks on fresh background threads.
#[derive(Clone)]
pub struct TaskRunner {
    control: ControlHandle,
    cfg: RunnerConfig,
}

impl TaskRunner {
    pub fn new(control: ControlHandle) -> Self {
        Self::with_config(control, RunnerConfig::default())
    }

    pub fn with_config(control: ControlHandle, cfg: RunnerConfig) -> Self {
        Self { control, cfg }
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    /// Starts `task(&job)` on a new thread and returns immediately.
    ///
    /// On the controlling context, `on_error` runs once if the task returned
    /// an error or panicked, then `on_complete` runs exactly once whatever the
    /// outcome. Both run strictly after the task has finished.
    ///
    /// If the thread cannot be created nothing runs and the error is returned.
    /// An unusable [`RunnerConfig`] is reported the same way.
    pub fn run<T, E, C>(
        &self,
        task: T,
        job: Job,
        on_error: E,
        on_complete: C,
    ) -> Result<RunId, RunnerError>
    where
        T: FnOnce(&Job) -> anyhow::Result<()> + Send + 'static,
        E: FnOnce(TaskError) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let stack_size = validate(&self.cfg)?;
        let run_id = RunId::new();
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.cfg.thread_name_prefix, run_id.short()));
        if let Some(bytes) = stack_size {
            builder = builder.stack_size(bytes);
        }

        let control = self.control.clone();
        builder.spawn(move || {
            let span = tracing::debug_span!("task", run_id = %run_id, job = %job.id());
            let _enter = span.enter();
            tracing::debug!(title = %job.title(), "task started");
            let start = Instant::now();

            let error = match panic::catch_unwind(AssertUnwindSafe(|| task(&job))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(TaskError::Failed(e)),
                Err(payload) => Some(TaskError::from_panic(payload)),
            };

            tracing::debug!(
                duration_ms = start.elapsed().as_millis() as u64,
                failed = error.is_some(),
                "task finished"
            );

            if let Some(err) = error {
                if !control.post(move || on_error(err)) {
                    tracing::warn!("control loop closed, task error dropped");
                }
            }
            if !control.post(on_complete) {
                tracing::warn!("control loop closed, completion dropped");
            }
        })?;

        tracing::debug!(run_id = %run_id, "task spawned");
        Ok(run_id)
    }
}

/// Returns the stack size in bytes, if one is configured.
fn validate(cfg: &RunnerConfig) -> Result<Option<usize>, RunnerError> {
    if cfg.thread_name_prefix.contains('\0') {
        return Err(RunnerError::Config(
            "thread_name_prefix must not contain NUL".to_string(),
        ));
    }
    match cfg.stack_size_kb {
        None => Ok(None),
        Some(0) => Err(RunnerError::Config("stack_size_kb must be positive".to_string())),
        Some(kb) => kb
            .checked_mul(1024)
            .map(Some)
            .ok_or_else(|| RunnerError::Config("stack_size_kb too large".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlLoop;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;

    struct Recorder {
        errors: Arc<Mutex<Vec<String>>>,
        completions: Arc<AtomicUsize>,
        done: Arc<AtomicBool>,
        threads: Arc<Mutex<Vec<ThreadId>>>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                errors: Arc::new(Mutex::new(Vec::new())),
                completions: Arc::new(AtomicUsize::new(0)),
                done: Arc::new(AtomicBool::new(false)),
                threads: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn run<T>(&self, runner: &TaskRunner, task: T) -> RunId
        where
            T: FnOnce(&Job) -> anyhow::Result<()> + Send + 'static,
        {
            let errors = Arc::clone(&self.errors);
            let err_threads = Arc::clone(&self.threads);
            let completions = Arc::clone(&self.completions);
            let done = Arc::clone(&self.done);
            let done_threads = Arc::clone(&self.threads);
            runner
                .run(
                    task,
                    Job::new("test"),
                    move |e| {
                        err_threads.lock().unwrap().push(thread::current().id());
                        errors.lock().unwrap().push(e.to_string());
                    },
                    move || {
                        done_threads.lock().unwrap().push(thread::current().id());
                        completions.fetch_add(1, Ordering::SeqCst);
                        done.store(true, Ordering::Release);
                    },
                )
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_success_completes_without_error() {
        let mut control = ControlLoop::new();
        let runner = TaskRunner::new(control.handle());
        let rec = Recorder::new();

        rec.run(&runner, |job| {
            job.set_hint("working");
            Ok(())
        });
        control.pump_until(|| rec.done.load(Ordering::Acquire)).await;

        assert_eq!(rec.completions.load(Ordering::SeqCst), 1);
        assert!(rec.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_and_completion_run_on_controlling_thread() {
        let mut control = ControlLoop::new();
        let runner = TaskRunner::new(control.handle());
        let rec = Recorder::new();

        rec.run(&runner, |_| anyhow::bail!("repository unreachable"));
        control.pump_until(|| rec.done.load(Ordering::Acquire)).await;

        assert_eq!(*rec.errors.lock().unwrap(), vec!["repository unreachable"]);
        assert_eq!(rec.completions.load(Ordering::SeqCst), 1);
        let me = thread::current().id();
        assert!(rec.threads.lock().unwrap().iter().all(|t| *t == me));
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let mut control = ControlLoop::new();
        let runner = TaskRunner::new(control.handle());
        let rec = Recorder::new();

        rec.run(&runner, |_| panic!("unexpected state"));
        control.pump_until(|| rec.done.load(Ordering::Acquire)).await;

        assert_eq!(
            *rec.errors.lock().unwrap(),
            vec!["task panicked: unexpected state"]
        );
        assert_eq!(rec.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_task_runs_on_named_background_thread() {
        let mut control = ControlLoop::new();
        let cfg = RunnerConfig {
            thread_name_prefix: "worker".into(),
            stack_size_kb: Some(256),
        };
        let runner = TaskRunner::with_config(control.handle(), cfg);
        let rec = Recorder::new();
        let name = Arc::new(Mutex::new(None));
        let task_name = Arc::clone(&name);

        let run_id = rec.run(&runner, move |_| {
            *task_name.lock().unwrap() = thread::current().name().map(str::to_string);
            Ok(())
        });
        control.pump_until(|| rec.done.load(Ordering::Acquire)).await;

        let expected = format!("worker-{}", run_id.short());
        assert_eq!(name.lock().unwrap().as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_spawn() {
        let control = ControlLoop::new();
        let cfg = RunnerConfig {
            thread_name_prefix: "wpm-job".into(),
            stack_size_kb: Some(0),
        };
        let runner = TaskRunner::with_config(control.handle(), cfg);
        let ran = Arc::new(AtomicBool::new(false));
        let task_ran = Arc::clone(&ran);

        let res = runner.run(
            move |_| {
                task_ran.store(true, Ordering::SeqCst);
                Ok(())
            },
            Job::new("test"),
            |_| {},
            || {},
        );

        assert!(matches!(res, Err(RunnerError::Config(_))));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_oversized_stack_is_rejected_before_spawn() {
        let control = ControlLoop::new();
        let cfg = RunnerConfig {
            thread_name_prefix: "wpm-job".into(),
            stack_size_kb: Some(usize::MAX / 2),
        };
        let runner = TaskRunner::with_config(control.handle(), cfg);

        let res = runner.run(|_| Ok(()), Job::new("test"), |_| {}, || {});

        match res {
            Err(RunnerError::Config(msg)) => assert_eq!(msg, "stack_size_kb too large"),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
