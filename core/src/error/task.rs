use std::any::Any;

use thiserror::Error;

/// Failure captured at the task boundary.
///
/// Produced on the background thread and handed to the error sink on the
/// controlling context. The underlying error is kept intact so callers can
/// `downcast_ref` to the collaborator's concrete type.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked(panic_message(payload.as_ref()))
    }

    /// Source error of a failed task, if the task returned one.
    pub fn source_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Panicked(_) => None,
        }
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.source_error().and_then(|e| e.downcast_ref::<E>())
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(e: anyhow::Error) -> Self {
        Self::Failed(e)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
