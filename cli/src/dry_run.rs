//! Package operations that walk the real steps without touching the system.

use std::io;
use std::thread;
use std::time::Duration;

use wpm_core::packages::{PackageOperations, PackageVersion};
use wpm_core::Job;

const REPOSITORIES: &[&str] = &["main", "extras"];

const CATALOG: &[(&str, &str, bool)] = &[
    ("7zip", "23.01", true),
    ("firefox", "128.0", false),
    ("git", "2.45.2", true),
    ("notepad-plus-plus", "8.6.9", false),
    ("vlc", "3.0.21", false),
];

pub struct DryRunOperations {
    step: Duration,
    fail: Option<String>,
}

impl DryRunOperations {
    pub fn new(step: Duration, fail: Option<String>) -> Self {
        Self { step, fail }
    }

    fn pause(&self) {
        thread::sleep(self.step);
    }

    fn should_fail(&self, target: &PackageVersion) -> bool {
        self.fail.as_deref() == Some(target.package.as_str())
    }
}

impl PackageOperations for DryRunOperations {
    fn install(&self, target: &PackageVersion, job: &Job) -> anyhow::Result<()> {
        job.set_hint(format!("Downloading {}", target));
        let download = job.create_sub_job_with_share(0.7);
        for i in 1..=5 {
            self.pause();
            download.set_progress(i as f64 / 5.0);
            if i == 3 && self.should_fail(target) {
                job.set_error_message("disk full");
                return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
            }
        }
        download.complete();

        job.set_hint("Extracting");
        self.pause();
        job.set_progress(0.85);

        job.set_hint("Running the installation script");
        self.pause();
        job.complete();
        Ok(())
    }

    fn uninstall(&self, target: &PackageVersion, job: &Job) -> anyhow::Result<()> {
        job.set_hint(format!("Running the removal script for {}", target));
        self.pause();
        if self.should_fail(target) {
            job.set_error_message("disk full");
            return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
        }
        job.set_progress(0.5);

        job.set_hint("Deleting files");
        self.pause();
        job.complete();
        Ok(())
    }

    fn reload(&self, job: &Job) -> anyhow::Result<Vec<PackageVersion>> {
        let n = REPOSITORIES.len();
        for (i, repo) in REPOSITORIES.iter().enumerate() {
            job.set_hint(format!("Repository {} of {}", i + 1, n));
            let sub = job.create_sub_job_with_share(0.9 / n as f64);
            sub.set_hint(format!("Downloading {}", repo));
            self.pause();
            sub.set_progress(0.9);
            sub.set_hint("Parsing the content");
            self.pause();
            sub.complete();
        }

        job.set_hint("Scanning for installed package versions");
        self.pause();

        job.set_hint("Detecting software");
        let detect = job.create_sub_job_with_share(0.1);
        self.pause();
        detect.complete();

        job.complete();
        Ok(CATALOG
            .iter()
            .map(|(package, version, installed)| PackageVersion {
                package: package.to_string(),
                version: version.to_string(),
                installed: *installed,
            })
            .collect())
    }
}

/// Parses `name` or `name@version`.
pub fn parse_target(spec: &str, installed: bool) -> PackageVersion {
    let (package, version) = match spec.split_once('@') {
        Some((p, v)) if !v.trim().is_empty() => (p.trim(), v.trim()),
        Some((p, _)) => (p.trim(), "latest"),
        None => (spec.trim(), "latest"),
    };
    PackageVersion {
        package: package.to_string(),
        version: version.to_string(),
        installed,
    }
}
