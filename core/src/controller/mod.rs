//! "Run this and wait, but stay alive and show progress."

mod blocking;
mod sinks;

pub use blocking::{BlockReport, BlockingController};
pub use sinks::{InformUser, LogInformUser, StatusSink};
