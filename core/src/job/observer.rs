use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::task::panic_message;

use super::handle::JobId;
use super::state::JobState;

pub(crate) type HintCallback = dyn Fn(&str) + Send + Sync;
pub(crate) type StateCallback = dyn Fn(&JobState) + Send + Sync;

/// Identifies one registration on one job. Returned by `add_observer` and
/// `subscribe_state`, accepted by `remove_observer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

pub(crate) struct ObserverSlot<F: ?Sized> {
    pub(crate) id: ObserverId,
    callback: Arc<F>,
    reported: Arc<AtomicBool>,
}

impl<F: ?Sized> Clone for ObserverSlot<F> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
            reported: Arc::clone(&self.reported),
        }
    }
}

impl<F: ?Sized> ObserverSlot<F> {
    pub(crate) fn new(id: ObserverId, callback: Arc<F>) -> Self {
        Self {
            id,
            callback,
            reported: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A panicking observer is reported once and otherwise ignored; the
    /// remaining observers and later notifications still run.
    fn guarded(&self, job: JobId, call: impl FnOnce(&F)) {
        let callback = &*self.callback;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| call(callback))) {
            let msg = panic_message(payload.as_ref());
            if !self.reported.swap(true, Ordering::AcqRel) {
                tracing::warn!(job = %job, observer = %self.id, "job observer panicked: {}", msg);
            } else {
                tracing::debug!(job = %job, observer = %self.id, "job observer panicked again: {}", msg);
            }
        }
    }
}

impl ObserverSlot<HintCallback> {
    pub(crate) fn notify(&self, job: JobId, hint: &str) {
        self.guarded(job, |cb| cb(hint));
    }
}

impl ObserverSlot<StateCallback> {
    pub(crate) fn notify(&self, job: JobId, state: &JobState) {
        self.guarded(job, |cb| cb(state));
    }
}

/// One change of one job, captured under the job's lock and delivered either
/// inline or on the controlling context.
pub(crate) struct Notification {
    pub(crate) job: JobId,
    pub(crate) hint: Option<(String, Vec<ObserverSlot<HintCallback>>)>,
    pub(crate) state: Option<(JobState, Vec<ObserverSlot<StateCallback>>)>,
}

impl Notification {
    pub(crate) fn is_empty(&self) -> bool {
        self.hint.is_none() && self.state.is_none()
    }

    pub(crate) fn deliver(self) {
        if let Some((hint, observers)) = self.hint {
            for o in &observers {
                o.notify(self.job, &hint);
            }
        }
        if let Some((state, observers)) = self.state {
            for o in &observers {
                o.notify(self.job, &state);
            }
        }
    }
}
