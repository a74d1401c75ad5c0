use tokio::sync::mpsc;

/// Unit of work queued for the controlling context.
pub type Deferred = Box<dyn FnOnce() + Send + 'static>;

/// Sending half of the controlling context's queue. Cheap to clone and safe
/// to move to any thread.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<Deferred>,
}

impl ControlHandle {
    /// Queues `f` to run on the controlling context. Returns `false` when the
    /// loop has been dropped and `f` will never run.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(f)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// FIFO run queue owned by the controlling context.
///
/// Messages posted from one thread run in the order they were posted.
pub struct ControlLoop {
    tx: mpsc::UnboundedSender<Deferred>,
    rx: mpsc::UnboundedReceiver<Deferred>,
}

impl ControlLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.tx.clone(),
        }
    }

    /// Runs everything queued right now without waiting. Returns how many
    /// messages ran.
    pub fn run_pending(&mut self) -> usize {
        let mut n = 0;
        while let Ok(f) = self.rx.try_recv() {
            f();
            n += 1;
        }
        n
    }

    /// Re-entrant pump: keeps running queued messages until `done` reports
    /// true. The caller's logical flow is suspended at the `.await` while the
    /// messages that may flip `done` still get delivered here.
    ///
    /// `done` is checked before each wait, so a message that sets it ends the
    /// pump right after it runs.
    pub async fn pump_until(&mut self, done: impl Fn() -> bool) {
        while !done() {
            // The loop holds a sender itself, so `recv` only yields `None` if
            // that invariant is ever broken.
            let Some(f) = self.rx.recv().await else {
                break;
            };
            f();
        }
    }
}

impl Default for ControlLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_run_pending_preserves_post_order() {
        let mut control = ControlLoop::new();
        let handle = control.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            assert!(handle.post(move || seen.lock().unwrap().push(i)));
        }

        assert_eq!(control.run_pending(), 5);
        assert_eq!(control.run_pending(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_post_after_drop_reports_closed() {
        let control = ControlLoop::new();
        let handle = control.handle();
        drop(control);

        assert!(handle.is_closed());
        assert!(!handle.post(|| {}));
    }

    #[tokio::test]
    async fn test_pump_until_runs_messages_from_other_threads() {
        let mut control = ControlLoop::new();
        let handle = control.handle();
        let done = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let worker_done = Arc::clone(&done);
        let worker_seen = Arc::clone(&seen);
        let worker = std::thread::spawn(move || {
            for i in 0..3 {
                let seen = Arc::clone(&worker_seen);
                handle.post(move || seen.lock().unwrap().push(i));
            }
            handle.post(move || worker_done.store(true, Ordering::Release));
        });

        control
            .pump_until(|| done.load(Ordering::Acquire))
            .await;
        worker.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}
