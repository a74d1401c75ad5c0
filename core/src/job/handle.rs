use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::control::ControlHandle;

use super::observer::{HintCallback, Notification, ObserverId, ObserverSlot, StateCallback};
use super::state::JobState;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Observable progress handle shared between the worker and its observers.
///
/// Cloning is cheap and yields another handle to the same job. Only the code
/// running the work that owns a job should write to it; everyone else reads.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: JobId,
    title: String,
    parent: Option<Weak<JobInner>>,
    share: Option<ProgressShare>,
    started: Instant,
    started_at: DateTime<Utc>,
    dispatcher: Option<ControlHandle>,
    data: Mutex<JobData>,
}

/// Portion of the parent's progress a sub-job stands for.
#[derive(Debug, Clone, Copy)]
struct ProgressShare {
    start: f64,
    part: f64,
}

#[derive(Default)]
struct JobData {
    hint: String,
    progress: f64,
    completed: bool,
    error_message: String,
    children: Vec<Job>,
    next_observer: u64,
    hint_observers: Vec<ObserverSlot<HintCallback>>,
    state_observers: Vec<ObserverSlot<StateCallback>>,
}

impl Job {
    /// Job whose observers run synchronously inside the setter.
    pub fn new(title: impl Into<String>) -> Self {
        Self::build(title.into(), None, None, None)
    }

    /// Job whose observers run on the controlling context behind `control`.
    pub fn bound(title: impl Into<String>, control: ControlHandle) -> Self {
        Self::build(title.into(), None, None, Some(control))
    }

    fn build(
        title: String,
        parent: Option<Weak<JobInner>>,
        share: Option<ProgressShare>,
        dispatcher: Option<ControlHandle>,
    ) -> Self {
        let inner = JobInner {
            id: JobId::next(),
            title,
            parent,
            share,
            started: Instant::now(),
            started_at: Utc::now(),
            dispatcher,
            data: Mutex::new(JobData::default()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn parent(&self) -> Option<Job> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Job { inner })
    }

    pub fn hint(&self) -> String {
        self.inner.lock().hint.clone()
    }

    pub fn set_hint(&self, hint: impl Into<String>) {
        let hint = hint.into();
        self.inner.update(true, |data| data.hint = hint);
    }

    pub fn progress(&self) -> f64 {
        self.inner.lock().progress
    }

    /// Values outside `0.0..=1.0` are clamped. A sub-job created with a share
    /// moves its parent's progress proportionally.
    pub fn set_progress(&self, progress: f64) {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        self.inner.update(false, |data| {
            data.progress = progress;
        });
        self.propagate_progress(progress);
    }

    /// Marks the job done and its progress full.
    pub fn complete(&self) {
        self.inner.update(false, |data| {
            data.progress = 1.0;
            data.completed = true;
        });
        self.propagate_progress(1.0);
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock().completed
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner.update(false, |data| {
            data.error_message = message;
        });
    }

    pub fn error_message(&self) -> String {
        self.inner.lock().error_message.clone()
    }

    pub fn state(&self) -> JobState {
        let data = self.inner.lock();
        self.inner.snapshot(&data)
    }

    /// Child job with an empty hint. Its hint is never forwarded here.
    pub fn create_sub_job(&self) -> Job {
        self.spawn_child(None)
    }

    /// Child job standing for `part` of this job's remaining progress:
    /// while the child goes from 0 to 1, this job goes from its current
    /// progress to current + `part`. The parent only reaches the full share
    /// once the child is `complete()`d or set to progress 1.
    pub fn create_sub_job_with_share(&self, part: f64) -> Job {
        let part = if part.is_nan() {
            0.0
        } else {
            part.clamp(0.0, 1.0)
        };
        let start = self.progress();
        self.spawn_child(Some(ProgressShare { start, part }))
    }

    fn spawn_child(&self, share: Option<ProgressShare>) -> Job {
        let child = Job::build(
            String::new(),
            Some(Arc::downgrade(&self.inner)),
            share,
            self.inner.dispatcher.clone(),
        );
        self.inner.lock().children.push(child.clone());
        tracing::trace!(parent = %self.id(), child = %child.id(), "sub-job created");
        child
    }

    pub(crate) fn child_count(&self) -> usize {
        self.inner.lock().children.len()
    }

    /// Registers a hint-change callback. Observers added later do not see
    /// earlier hints.
    pub fn add_observer<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut data = self.inner.lock();
        let id = next_observer_id(&mut data);
        data.hint_observers
            .push(ObserverSlot::new(id, Arc::new(callback) as Arc<HintCallback>));
        id
    }

    /// Registers a callback for any change: hint, progress, completion or
    /// error message.
    pub fn subscribe_state<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&JobState) + Send + Sync + 'static,
    {
        let mut data = self.inner.lock();
        let id = next_observer_id(&mut data);
        data.state_observers
            .push(ObserverSlot::new(id, Arc::new(callback) as Arc<StateCallback>));
        id
    }

    /// Notifications already queued to the controlling context still reach
    /// the removed observer.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut data = self.inner.lock();
        let before = data.hint_observers.len() + data.state_observers.len();
        data.hint_observers.retain(|o| o.id != id);
        data.state_observers.retain(|o| o.id != id);
        before != data.hint_observers.len() + data.state_observers.len()
    }

    fn propagate_progress(&self, progress: f64) {
        let (Some(parent), Some(share)) = (self.parent(), self.inner.share) else {
            return;
        };
        parent.set_progress(share.start + progress * share.part);
    }
}

fn next_observer_id(data: &mut JobData) -> ObserverId {
    let id = ObserverId(data.next_observer);
    data.next_observer += 1;
    id
}

impl JobInner {
    fn lock(&self) -> MutexGuard<'_, JobData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, data: &JobData) -> JobState {
        JobState {
            id: self.id,
            title: self.title.clone(),
            hint: data.hint.clone(),
            progress: data.progress,
            completed: data.completed,
            error_message: data.error_message.clone(),
            started_at: self.started_at,
            elapsed: self.started.elapsed(),
        }
    }

    /// Applies `apply` and notifies state observers, plus hint observers when
    /// the change was a hint.
    fn update(&self, hint_changed: bool, apply: impl FnOnce(&mut JobData)) {
        let mut data = self.lock();
        apply(&mut data);
        let hint = (hint_changed && !data.hint_observers.is_empty())
            .then(|| (data.hint.clone(), data.hint_observers.clone()));
        let state = self.state_notification(&data);
        self.dispatch(
            data,
            Notification {
                job: self.id,
                hint,
                state,
            },
        );
    }

    fn state_notification(
        &self,
        data: &JobData,
    ) -> Option<(JobState, Vec<ObserverSlot<StateCallback>>)> {
        (!data.state_observers.is_empty())
            .then(|| (self.snapshot(data), data.state_observers.clone()))
    }

    /// Posts while `data` is still locked so that queue order matches the
    /// order of writes. Inline delivery happens after unlocking, so observers
    /// may read the job.
    fn dispatch(&self, data: MutexGuard<'_, JobData>, notification: Notification) {
        if notification.is_empty() {
            return;
        }
        match &self.dispatcher {
            Some(control) => {
                if !control.post(move || notification.deliver()) {
                    tracing::debug!(job = %self.id, "control loop gone, notification dropped");
                }
                drop(data);
            }
            None => {
                drop(data);
                notification.deliver();
            }
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.lock();
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("title", &self.inner.title)
            .field("hint", &data.hint)
            .field("progress", &data.progress)
            .field("completed", &data.completed)
            .finish()
    }
}
