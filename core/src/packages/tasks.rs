use std::sync::Arc;

use anyhow::Context;

use crate::control::ControlHandle;
use crate::job::Job;

use super::types::{PackageAction, PackageOperation, PackageOperations, PackageVersion};

pub fn install_task(
    ops: Arc<dyn PackageOperations>,
    target: PackageVersion,
) -> impl FnOnce(&Job) -> anyhow::Result<()> + Send + 'static {
    move |job| {
        job.set_hint("Installing");
        let sub = job.create_sub_job_with_share(1.0);
        ops.install(&target, &sub)
            .with_context(|| format!("install {} failed", target))?;
        job.complete();
        Ok(())
    }
}

pub fn uninstall_task(
    ops: Arc<dyn PackageOperations>,
    target: PackageVersion,
) -> impl FnOnce(&Job) -> anyhow::Result<()> + Send + 'static {
    move |job| {
        job.set_hint("Uninstalling");
        let sub = job.create_sub_job_with_share(1.0);
        ops.uninstall(&target, &sub)
            .with_context(|| format!("uninstall {} failed", target))?;
        job.complete();
        Ok(())
    }
}

/// Runs a batch in order, each operation owning an equal share of the job's
/// progress. Stops at the first failure, leaving the message on the job.
pub fn process(
    ops: &dyn PackageOperations,
    job: &Job,
    batch: &[PackageOperation],
) -> anyhow::Result<()> {
    let n = batch.len().max(1) as f64;
    for op in batch {
        job.set_hint(format!("{} {}", op.action, op.target));
        let sub = job.create_sub_job_with_share(1.0 / n);
        let res = match op.action {
            PackageAction::Install => ops.install(&op.target, &sub),
            PackageAction::Uninstall => ops.uninstall(&op.target, &sub),
        };
        if let Err(e) = res {
            let e = e.context(format!("{} {} failed", op.action, op.target));
            job.set_error_message(format!("{:#}", e));
            return Err(e);
        }
    }
    job.complete();
    Ok(())
}

pub fn process_task(
    ops: Arc<dyn PackageOperations>,
    batch: Vec<PackageOperation>,
) -> impl FnOnce(&Job) -> anyhow::Result<()> + Send + 'static {
    move |job| process(ops.as_ref(), job, &batch)
}

/// Reloads the repositories and hands the result to `on_loaded` on the
/// controlling context.
pub fn reload_task<F>(
    ops: Arc<dyn PackageOperations>,
    control: ControlHandle,
    on_loaded: F,
) -> impl FnOnce(&Job) -> anyhow::Result<()> + Send + 'static
where
    F: FnOnce(Vec<PackageVersion>) + Send + 'static,
{
    move |job| {
        job.set_hint("Loading package repository");
        let sub = job.create_sub_job_with_share(1.0);
        let versions = ops.reload(&sub).context("repository reload failed")?;
        tracing::debug!(count = versions.len(), "repository loaded");
        if !control.post(move || on_loaded(versions)) {
            anyhow::bail!("controlling context closed before the repository could be shown");
        }
        job.complete();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl PackageOperations for Recording {
        fn install(&self, target: &PackageVersion, job: &Job) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("install {}", target));
            job.set_hint("Downloading");
            if self.fail_on.as_deref() == Some(target.package.as_str()) {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            job.complete();
            Ok(())
        }

        fn uninstall(&self, target: &PackageVersion, job: &Job) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("uninstall {}", target));
            job.complete();
            Ok(())
        }

        fn reload(&self, job: &Job) -> anyhow::Result<Vec<PackageVersion>> {
            job.set_hint("Repository 1 of 1");
            Ok(vec![pv("app", false)])
        }
    }

    fn pv(name: &str, installed: bool) -> PackageVersion {
        PackageVersion {
            package: name.to_string(),
            version: "1.0".to_string(),
            installed,
        }
    }

    fn hints(job: &Job) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        job.add_observer(move |h| sink.lock().unwrap().push(h.to_string()));
        seen
    }

    #[test]
    fn test_install_task_reports_on_root_only_once() {
        let ops: Arc<dyn PackageOperations> = Arc::new(Recording::default());
        let job = Job::new("Installing...");
        let seen = hints(&job);

        install_task(Arc::clone(&ops), pv("app", false))(&job).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["Installing"]);
        assert!(job.is_completed());
    }

    #[test]
    fn test_process_shares_progress_and_orders_hints() {
        let ops = Recording::default();
        let job = Job::new("Install/Uninstall");
        let seen = hints(&job);
        let batch = vec![
            PackageOperation::uninstall(pv("old", true)),
            PackageOperation::install(pv("new", false)),
        ];

        process(&ops, &job, &batch).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Uninstalling old 1.0", "Installing new 1.0"]
        );
        assert_eq!(
            *ops.calls.lock().unwrap(),
            vec!["uninstall old 1.0", "install new 1.0"]
        );
        assert_eq!(job.progress(), 1.0);
        assert!(job.is_completed());
    }

    #[test]
    fn test_process_stops_at_first_failure() {
        let ops = Recording {
            fail_on: Some("broken".into()),
            ..Default::default()
        };
        let job = Job::new("Install/Uninstall");
        let batch = vec![
            PackageOperation::install(pv("broken", false)),
            PackageOperation::install(pv("never", false)),
        ];

        let err = process(&ops, &job, &batch).unwrap_err();

        assert_eq!(ops.calls.lock().unwrap().len(), 1);
        assert!(err.downcast_ref::<std::io::Error>().is_some());
        assert_eq!(job.error_message(), "Installing broken 1.0 failed: disk full");
        assert!(!job.is_completed());
    }

    #[test]
    fn test_reload_posts_result_to_controlling_context() {
        let mut control = crate::control::ControlLoop::new();
        let ops: Arc<dyn PackageOperations> = Arc::new(Recording::default());
        let loaded = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&loaded);
        let job = Job::new("Loading package repository");

        reload_task(ops, control.handle(), move |v| {
            *sink.lock().unwrap() = Some(v);
        })(&job)
        .unwrap();

        // nothing is delivered until the controlling context runs
        assert!(loaded.lock().unwrap().is_none());
        assert_eq!(control.run_pending(), 1);
        assert_eq!(*loaded.lock().unwrap(), Some(vec![pv("app", false)]));
    }
}
