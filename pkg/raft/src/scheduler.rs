use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A single armed, one-shot timer. Re-arming is always explicit: firing (or
/// cancelling) a handle never implicitly arms another timer.
pub trait TimerHandle: Send + Sync {
    fn cancel(&self);
}

/// Election/replication timers. The core arms exactly one timer per role at
/// a time (the outgoing role's timer is always cancelled before a new one is
/// armed) plus per-RPC retry timers is left to the `Connector`
/// implementation, since retries are a transport concern here.
pub trait Scheduler: Send + Sync {
    /// Arms a one-shot timer that invokes `callback` after `after`, unless
    /// cancelled first. Returns a handle the caller uses to cancel it.
    fn arm(&self, after: Duration, callback: Box<dyn FnOnce() + Send>) -> Box<dyn TimerHandle>;
}

struct NoopTimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle for NoopTimerHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Production `Scheduler` built on the Tokio timer wheel. Spawns one task
/// per armed timer; cancellation is cooperative (checked right before the
/// callback runs) rather than task-abort, so a racing fire-then-cancel never
/// panics.
#[derive(Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        TokioScheduler
    }
}

impl Scheduler for TokioScheduler {
    fn arm(&self, after: Duration, callback: Box<dyn FnOnce() + Send>) -> Box<dyn TimerHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_for_task = cancelled.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if !cancelled_for_task.load(Ordering::SeqCst) {
                callback();
            }
        });
        Box::new(NoopTimerHandle { cancelled })
    }
}

struct RecordedTimer {
    after: Duration,
    callback: Option<Box<dyn FnOnce() + Send>>,
    cancelled: Arc<AtomicBool>,
}

/// Deterministic `Scheduler` for tests: `arm` never spawns anything, it just
/// records the request. A test drives time explicitly by calling
/// `fire_latest` (or `fire_all_pending`), so scenarios stay fully
/// single-threaded and independent of wall-clock timing.
#[derive(Default)]
pub struct ManualScheduler {
    timers: Mutex<Vec<RecordedTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        ManualScheduler::default()
    }

    pub fn pending_count(&self) -> usize {
        self.timers
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Duration most recently passed to `arm` for a still-armed timer, if
    /// any -- useful for asserting a leader re-armed its heartbeat tick.
    pub fn latest_pending_duration(&self) -> Option<Duration> {
        self.timers
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|t| !t.cancelled.load(Ordering::SeqCst))
            .map(|t| t.after)
    }

    /// Fires the most recently armed, not-yet-cancelled timer's callback.
    /// Used by tests to simulate an election or replication timeout firing.
    pub fn fire_latest(&self) {
        let callback = {
            let mut timers = self.timers.lock().unwrap();
            let pos = timers
                .iter()
                .rposition(|t| !t.cancelled.load(Ordering::SeqCst));
            pos.and_then(|p| timers[p].callback.take())
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&self, after: Duration, callback: Box<dyn FnOnce() + Send>) -> Box<dyn TimerHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.timers.lock().unwrap().push(RecordedTimer {
            after,
            callback: Some(callback),
            cancelled: cancelled.clone(),
        });
        Box::new(NoopTimerHandle { cancelled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn manual_scheduler_fires_latest_uncancelled_timer() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f1 = fired.clone();
        let handle1 = scheduler.arm(Duration::from_millis(100), Box::new(move || {
            f1.fetch_add(1, Ordering::SeqCst);
        }));

        let f2 = fired.clone();
        scheduler.arm(Duration::from_millis(200), Box::new(move || {
            f2.fetch_add(10, Ordering::SeqCst);
        }));

        handle1.cancel();
        scheduler.fire_latest();
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }
}
