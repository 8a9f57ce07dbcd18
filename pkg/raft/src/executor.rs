use std::sync::Mutex;
use tokio::sync::mpsc;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single-threaded serial queue. Every public entry point on `NodeImpl`
/// submits a closure here rather than mutating state directly; jobs run in
/// submission order and any mutation one job makes is visible to the next.
pub trait TaskExecutor: Send + Sync {
    fn submit(&self, job: Job);
}

/// Runs submitted jobs immediately, synchronously, on the calling thread.
/// This is the "DirectTaskExecutor"-style executor the design notes call
/// for: deterministic tests never need to pump a runtime or await anything
/// to observe a job's effects.
#[derive(Default)]
pub struct DirectTaskExecutor;

impl DirectTaskExecutor {
    pub fn new() -> Self {
        DirectTaskExecutor
    }
}

impl TaskExecutor for DirectTaskExecutor {
    fn submit(&self, job: Job) {
        job();
    }
}

/// Production executor: a dedicated background task drains an unbounded
/// channel and runs jobs one at a time, preserving submission order across
/// any number of concurrent callers without ever holding a lock across an
/// await point.
pub struct TokioTaskExecutor {
    sender: mpsc::UnboundedSender<Job>,
}

impl TokioTaskExecutor {
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job();
            }
        });
        TokioTaskExecutor { sender }
    }
}

impl Default for TokioTaskExecutor {
    fn default() -> Self {
        TokioTaskExecutor::new()
    }
}

impl TaskExecutor for TokioTaskExecutor {
    fn submit(&self, job: Job) {
        // The receiver is only ever dropped when the executor itself is
        // dropped, so a send failure here means the node has already shut
        // down; silently discarding the job is correct in that case.
        let _ = self.sender.send(job);
    }
}

/// Records every submitted job without running it, so a test can assert a
/// public entry point dispatched exactly once without needing to also drive
/// the main executor.
#[derive(Default)]
pub struct RecordingTaskExecutor {
    jobs: Mutex<Vec<Job>>,
}

impl RecordingTaskExecutor {
    pub fn new() -> Self {
        RecordingTaskExecutor::default()
    }

    pub fn run_all(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl TaskExecutor for RecordingTaskExecutor {
    fn submit(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }
}
