use std::sync::Arc;

use crate::error::TaskError;

/// Receives every hint of the job being blocked on, on the controlling
/// context.
pub type StatusSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Tells the user that an operation failed. Always called on the controlling
/// context, at most once per blocked operation.
pub trait InformUser: Send + Sync {
    fn inform(&self, title: &str, error: &TaskError);
}

/// Reports failures through the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInformUser;

impl InformUser for LogInformUser {
    fn inform(&self, title: &str, error: &TaskError) {
        tracing::error!(operation = %title, "{}", error);
    }
}

impl<F> InformUser for F
where
    F: Fn(&str, &TaskError) + Send + Sync,
{
    fn inform(&self, title: &str, error: &TaskError) {
        self(title, error)
    }
}
