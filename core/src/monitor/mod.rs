//! Running-jobs registry for the controlling context.

mod registry;

pub use registry::{format_hms, summary_title, JobMonitor};
