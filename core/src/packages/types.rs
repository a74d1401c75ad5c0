use std::fmt;

use crate::job::Job;

/// One installable version of a package as listed by a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub package: String,
    pub version: String,
    pub installed: bool,
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.package, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Install,
    Uninstall,
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageAction::Install => write!(f, "Installing"),
            PackageAction::Uninstall => write!(f, "Uninstalling"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOperation {
    pub action: PackageAction,
    pub target: PackageVersion,
}

impl PackageOperation {
    pub fn install(target: PackageVersion) -> Self {
        Self {
            action: PackageAction::Install,
            target,
        }
    }

    pub fn uninstall(target: PackageVersion) -> Self {
        Self {
            action: PackageAction::Uninstall,
            target,
        }
    }
}

/// Host-provided package logic. Every call runs on a background thread and
/// may report its own steps on the job it receives.
pub trait PackageOperations: Send + Sync {
    fn install(&self, target: &PackageVersion, job: &Job) -> anyhow::Result<()>;

    fn uninstall(&self, target: &PackageVersion, job: &Job) -> anyhow::Result<()>;

    /// Loads the repositories and returns every known package version with
    /// its installed flag up to date.
    fn reload(&self, job: &Job) -> anyhow::Result<Vec<PackageVersion>>;
}
