//! Worker pool (C9) — bounded-concurrency task executor built on
//! `std::thread` and a bounded `mpsc` channel, giving `submit` natural
//! non-blocking `QueueFull` semantics via `try_send`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::SyncError;

/// Cooperative cancellation signal threaded into every task.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type TaskFn = Box<dyn FnOnce(&CancellationToken) -> Result<(), SyncError> + Send + 'static>;

struct Job {
    id: u64,
    task: TaskFn,
}

/// The outcome of one submitted task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: u64,
    pub error: Option<String>,
    pub start: chrono::DateTime<Utc>,
    pub end: chrono::DateTime<Utc>,
    pub duration: Duration,
    pub timed_out: bool,
}

/// Pool-wide counters, updated under a single lock.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub total_duration: Duration,
    pub active: usize,
    pub idle: usize,
}

impl PoolStats {
    pub fn average_duration(&self) -> Duration {
        if self.completed == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.completed as u32
        }
    }
}

/// Bounded-concurrency task executor.
pub struct WorkerPool {
    job_tx: Mutex<Option<SyncSender<Job>>>,
    result_rx: Receiver<TaskResult>,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    stats: Arc<Mutex<PoolStats>>,
    next_id: AtomicU64,
    handles: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl WorkerPool {
    /// `workers` defaults to the host CPU count; `queue_capacity` defaults
    /// to `2 * workers`.
    pub fn new(workers: Option<usize>, queue_capacity: Option<usize>) -> Self {
        let workers = workers.unwrap_or_else(num_cpus::get).max(1);
        let queue_capacity = queue_capacity.unwrap_or(workers * 2).max(1);

        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(queue_capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel::<TaskResult>();

        let cancel = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(PoolStats {
            idle: workers,
            ..Default::default()
        }));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                worker_loop(job_rx, result_tx, cancel, stats);
            }));
        }

        WorkerPool {
            job_tx: Mutex::new(Some(job_tx)),
            result_rx,
            cancel,
            stopped,
            stats,
            next_id: AtomicU64::new(1),
            handles: Mutex::new(handles),
        }
    }

    /// Non-blocking submit. Fails with [`SyncError::QueueFull`] at capacity,
    /// [`SyncError::ShuttingDown`] if the pool has been stopped.
    pub fn submit(
        &self,
        task: impl FnOnce(&CancellationToken) -> Result<(), SyncError> + Send + 'static,
    ) -> Result<u64, SyncError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SyncError::ShuttingDown);
        }
        let guard = self.job_tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            return Err(SyncError::ShuttingDown);
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(Job {
            id,
            task: Box::new(task),
        }) {
            Ok(()) => {
                self.stats.lock().unwrap().submitted += 1;
                Ok(id)
            }
            Err(TrySendError::Full(_)) => Err(SyncError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(SyncError::ShuttingDown),
        }
    }

    /// Consumer-side stream of completed task results.
    pub fn results(&self) -> &Receiver<TaskResult> {
        &self.result_rx
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Close submission, signal cancellation, drain running tasks, then join.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        self.job_tx.lock().unwrap().take(); // drop sender: closes the channel
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    job_rx: Arc<Mutex<Receiver<Job>>>,
    result_tx: mpsc::Sender<TaskResult>,
    cancel: CancellationToken,
    stats: Arc<Mutex<PoolStats>>,
) {
    loop {
        let job = {
            let rx = job_rx.lock().unwrap();
            rx.recv()
        };
        let Ok(job) = job else {
            break;
        };

        {
            let mut s = stats.lock().unwrap();
            s.active += 1;
            s.idle = s.idle.saturating_sub(1);
        }

        let start = Utc::now();
        let t0 = Instant::now();
        let result = (job.task)(&cancel);
        let duration = t0.elapsed();
        let end = Utc::now();

        {
            let mut s = stats.lock().unwrap();
            s.active = s.active.saturating_sub(1);
            s.idle += 1;
            s.total_duration += duration;
            match &result {
                Ok(()) => s.completed += 1,
                Err(_) => {
                    s.completed += 1;
                    s.failed += 1;
                }
            }
        }

        let _ = result_tx.send(TaskResult {
            task_id: job.id,
            error: result.err().map(|e| e.to_string()),
            start,
            end,
            duration,
            timed_out: false,
        });
    }
}

/// Convenience wrapper: run a fixed set of tasks to completion (or timeout).
pub struct BatchExecutor;

impl BatchExecutor {
    pub fn run(
        tasks: Vec<Box<dyn FnOnce(&CancellationToken) -> Result<(), SyncError> + Send + 'static>>,
        workers: Option<usize>,
        timeout: Duration,
    ) -> Vec<TaskResult> {
        let expected = tasks.len();
        let pool = WorkerPool::new(workers, Some(expected.max(1)));
        let mut submitted_ids = Vec::with_capacity(expected);
        for task in tasks {
            match pool.submit(task) {
                Ok(id) => submitted_ids.push(id),
                Err(_) => continue,
            }
        }

        let deadline = Instant::now() + timeout;
        let mut results = Vec::with_capacity(expected);
        while results.len() < submitted_ids.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match pool.results().recv_timeout(remaining.min(Duration::from_millis(100))) {
                Ok(r) => results.push(r),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        pool.stop();

        while results.len() < submitted_ids.len() {
            let id = submitted_ids[results.len()];
            results.push(TaskResult {
                task_id: id,
                error: Some("timed out".to_string()),
                start: Utc::now(),
                end: Utc::now(),
                duration: Duration::ZERO,
                timed_out: true,
            });
        }
        results
    }
}
