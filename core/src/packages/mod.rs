//! Package operations as background tasks.
//!
//! The install/uninstall/reload logic itself lives behind
//! [`PackageOperations`]; this module only shapes it into tasks for a
//! [`BlockingController`](crate::controller::BlockingController) and reports
//! progress on the job it is given.

mod tasks;
mod types;

pub use tasks::{install_task, process, process_task, reload_task, uninstall_task};
pub use types::{PackageAction, PackageOperation, PackageOperations, PackageVersion};
