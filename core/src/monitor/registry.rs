use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::MonitorConfig;
use crate::job::{Job, JobId, JobState, ObserverId};

type TitleSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Tracks every job currently shown as running and keeps a one-line summary
/// ("2 Jobs (40%, 00:01:05)") for status displays.
///
/// State updates are throttled: the stored snapshot is always refreshed, the
/// summary only once per `refresh_interval`. Registering and unregistering
/// always refresh.
#[derive(Clone)]
pub struct JobMonitor {
    inner: Arc<Mutex<MonitorInner>>,
}

struct MonitorInner {
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
    running: Vec<Entry>,
    title: String,
    title_sink: Option<TitleSink>,
}

struct Entry {
    job: Job,
    observer: ObserverId,
    state: Option<JobState>,
}

impl JobMonitor {
    pub fn new(cfg: &MonitorConfig) -> Self {
        let inner = MonitorInner {
            refresh_interval: Duration::from_millis(cfg.refresh_interval_ms),
            last_refresh: None,
            running: Vec::new(),
            title: summary_title(&[]),
            title_sink: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Called with the new summary whenever it changes.
    pub fn set_title_sink<F>(&self, sink: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.lock().title_sink = Some(Arc::new(sink));
    }

    pub fn register(&self, job: &Job) {
        let monitor = self.clone();
        let observer = job.subscribe_state(move |state| monitor.update(state));
        tracing::debug!(job = %job.id(), title = %job.title(), "job monitored");

        let mut inner = self.lock();
        inner.running.push(Entry {
            job: job.clone(),
            observer,
            state: None,
        });
        let sink = inner.refresh(Instant::now());
        drop(inner);
        emit(sink);
    }

    pub fn unregister(&self, id: JobId) {
        let mut inner = self.lock();
        let Some(pos) = inner.running.iter().position(|e| e.job.id() == id) else {
            return;
        };
        let entry = inner.running.remove(pos);
        let sink = inner.refresh(Instant::now());
        drop(inner);

        entry.job.remove_observer(entry.observer);
        tracing::debug!(job = %id, "job unmonitored");
        emit(sink);
    }

    fn update(&self, state: &JobState) {
        let mut inner = self.lock();
        let Some(entry) = inner.running.iter_mut().find(|e| e.job.id() == state.id) else {
            return;
        };
        entry.state = Some(state.clone());

        let now = Instant::now();
        let due = inner
            .last_refresh
            .map(|t| now.duration_since(t) >= inner.refresh_interval)
            .unwrap_or(true);
        if !due {
            return;
        }
        let sink = inner.refresh(now);
        drop(inner);
        emit(sink);
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn running(&self) -> usize {
        self.lock().running.len()
    }

    pub fn is_idle(&self) -> bool {
        self.running() == 0
    }

    /// Latest known snapshot of every running job, in registration order.
    /// Jobs that have not reported anything yet are omitted.
    pub fn states(&self) -> Vec<JobState> {
        self.lock()
            .running
            .iter()
            .filter_map(|e| e.state.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MonitorInner {
    /// Recomputes the title; returns the sink call to make once unlocked.
    fn refresh(&mut self, now: Instant) -> Option<(TitleSink, String)> {
        self.last_refresh = Some(now);
        let states: Vec<Option<&JobState>> =
            self.running.iter().map(|e| e.state.as_ref()).collect();
        let title = summary_title(&states);
        if title == self.title {
            return None;
        }
        self.title = title;
        self.title_sink
            .clone()
            .map(|sink| (sink, self.title.clone()))
    }
}

fn emit(call: Option<(TitleSink, String)>) {
    if let Some((sink, title)) = call {
        sink(&title);
    }
}

/// Summary over the running jobs, reporting the one expected to finish last.
/// `None` stands for a job that has not reported any state yet; it still
/// counts as running.
pub fn summary_title(states: &[Option<&JobState>]) -> String {
    let n = states.len();
    let mut max = Duration::ZERO;
    let mut max_progress = 0.0;
    for state in states.iter().flatten() {
        let remaining = state.remaining();
        if remaining > max {
            max = remaining;
            max_progress = state.progress;
        }
    }
    let percent = (max_progress * 100.0).round() as u32;
    let rest = format_hms(max);

    match n {
        0 => "0 Jobs".to_string(),
        1 => format!("1 Job ({}%, {})", percent, rest),
        _ => format!("{} Jobs ({}%, {})", n, percent, rest),
    }
}

/// `HH:MM:SS`, hours not wrapped.
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
