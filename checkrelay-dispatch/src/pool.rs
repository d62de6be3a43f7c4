//! Bounded OS-thread worker pools.
//!
//! Each pool owns a fixed set of named threads fed from one bounded queue.
//! Submission is async and waits at most the configured submission timeout
//! for queue space. Work items run on the pool threads only; all blocking
//! remote I/O therefore stays off the caller's runtime.
//!
//! Every work item carries its request fingerprint. After the item returns
//! (or panics) the pool runs its post-execution hook with that fingerprint,
//! and only then delivers the result to the submitter.

use checkrelay_core::{DispatchError, PoolKind};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// Hook run with the fingerprint of every finished work item.
pub type AfterExecute = Arc<dyn Fn(&str) + Send + Sync>;

type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

struct WorkItem<T> {
    fingerprint: String,
    job: Job<T>,
    reply: oneshot::Sender<T>,
}

static POOL_SEQUENCE: AtomicUsize = AtomicUsize::new(1);

/// Shape of one pool.
#[derive(Debug, Clone)]
pub struct PoolSpec {
    pub host: String,
    pub kind: PoolKind,
    pub workers: usize,
    pub capacity: usize,
    pub submission_timeout: Duration,
}

/// A fixed-size pool of named worker threads.
pub struct WorkerPool<T> {
    name: String,
    sender: Mutex<Option<mpsc::Sender<WorkItem<T>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
    submission_timeout: Duration,
    active: Arc<AtomicUsize>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Start the pool's threads, named `{host}-pool-{kind}-{n}-thread-{i}`.
    pub fn start(spec: PoolSpec, after_execute: AfterExecute) -> Result<Self, DispatchError> {
        let name = format!(
            "{}-pool-{}-{}",
            spec.host,
            spec.kind.as_str(),
            POOL_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let capacity = spec.capacity.max(1);
        let (sender, receiver) = mpsc::channel::<WorkItem<T>>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let active = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(spec.workers.max(1));
        for index in 1..=spec.workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let after_execute = Arc::clone(&after_execute);
            let active = Arc::clone(&active);
            let pool = name.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-thread-{}", name, index))
                .spawn(move || worker_loop(pool, receiver, after_execute, active))
                .map_err(|e| DispatchError::SpawnFailed {
                    pool: name.clone(),
                    reason: e.to_string(),
                })?;
            workers.push(handle);
        }

        debug!(pool = %name, workers = workers.len(), capacity, "Worker pool started");
        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            capacity,
            submission_timeout: spec.submission_timeout,
            active,
        })
    }

    /// Queue a work item, waiting at most the submission timeout for space.
    ///
    /// The returned receiver yields the job's result. It fails if the job panicked.
    pub async fn submit<F>(
        &self,
        fingerprint: impl Into<String>,
        job: F,
    ) -> Result<oneshot::Receiver<T>, DispatchError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let sender = {
            let guard = self.sender.lock().map_err(|_| self.shut_down())?;
            guard.clone().ok_or_else(|| self.shut_down())?
        };
        let (reply, result) = oneshot::channel();
        let item = WorkItem {
            fingerprint: fingerprint.into(),
            job: Box::new(job),
            reply,
        };

        match sender.send_timeout(item, self.submission_timeout).await {
            Ok(()) => Ok(result),
            Err(SendTimeoutError::Timeout(_)) => Err(DispatchError::QueueTimeout {
                pool: self.name.clone(),
                waited_ms: u64::try_from(self.submission_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Err(SendTimeoutError::Closed(_)) => Err(self.shut_down()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Work items currently running.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Work items waiting in the queue.
    pub fn queued(&self) -> usize {
        match self.sender.lock() {
            Ok(guard) => guard
                .as_ref()
                .map(|s| self.capacity.saturating_sub(s.capacity()))
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Stop accepting work. Queued items still run; threads exit once the queue drains.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            if guard.take().is_some() {
                debug!(pool = %self.name, "Worker pool shutting down");
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().map(|g| g.is_none()).unwrap_or(true)
    }

    /// Shut down and block until every worker thread has exited.
    pub fn join(&self) {
        self.shutdown();
        let handles = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for handle in handles {
            if handle.join().is_err() {
                error!(pool = %self.name, "Worker thread panicked");
            }
        }
    }

    fn shut_down(&self) -> DispatchError {
        DispatchError::PoolShutDown {
            pool: self.name.clone(),
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Closing the queue lets the detached threads finish and exit.
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

fn worker_loop<T>(
    pool: String,
    receiver: Arc<Mutex<mpsc::Receiver<WorkItem<T>>>>,
    after_execute: AfterExecute,
    active: Arc<AtomicUsize>,
) {
    loop {
        let next = match receiver.lock() {
            Ok(mut receiver) => receiver.blocking_recv(),
            Err(_) => {
                error!(pool = %pool, "Work queue lock poisoned, worker exiting");
                return;
            }
        };
        let Some(WorkItem {
            fingerprint,
            job,
            reply,
        }) = next
        else {
            debug!(pool = %pool, "Work queue closed, worker exiting");
            return;
        };

        active.fetch_add(1, Ordering::SeqCst);
        let outcome = panic::catch_unwind(AssertUnwindSafe(job));
        active.fetch_sub(1, Ordering::SeqCst);

        after_execute(&fingerprint);

        match outcome {
            Ok(value) => {
                // The submitter may have stopped waiting.
                let _ = reply.send(value);
            }
            Err(_) => error!(pool = %pool, "Work item panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn spec(workers: usize, capacity: usize, timeout_ms: u64) -> PoolSpec {
        PoolSpec {
            host: "h".to_string(),
            kind: PoolKind::Global,
            workers,
            capacity,
            submission_timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn recording_hook() -> (AfterExecute, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook: AfterExecute = Arc::new(move |fp: &str| sink.lock().unwrap().push(fp.to_string()));
        (hook, seen)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runs_job_on_named_thread() {
        let (hook, _) = recording_hook();
        let pool = WorkerPool::<String>::start(spec(2, 4, 1000), hook).unwrap();
        let rx = pool
            .submit("fp", || std::thread::current().name().unwrap_or("").to_string())
            .await
            .unwrap();
        let thread_name = rx.await.unwrap();
        assert!(thread_name.starts_with("h-pool-global-"));
        assert!(thread_name.contains("-thread-"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hook_runs_before_result_is_delivered() {
        let observed_in_hook = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&observed_in_hook);
        let hook: AfterExecute = Arc::new(move |_fp: &str| flag.store(true, Ordering::SeqCst));
        let pool = WorkerPool::<u32>::start(spec(1, 1, 1000), hook).unwrap();

        let rx = pool.submit("fp", || 7).await.unwrap();
        assert_eq!(rx.await.unwrap(), 7);
        assert!(observed_in_hook.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_job_still_fires_hook() {
        let (hook, seen) = recording_hook();
        let pool = WorkerPool::<u32>::start(spec(1, 1, 1000), hook).unwrap();

        let rx = pool.submit("boom", || panic!("scripted")).await.unwrap();
        assert!(rx.await.is_err());
        assert_eq!(seen.lock().unwrap().as_slice(), &["boom".to_string()]);

        // The worker survives the panic.
        let rx = pool.submit("after", || 1).await.unwrap();
        assert_eq!(rx.await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_queue_times_out() {
        let (hook, _) = recording_hook();
        let pool = WorkerPool::<()>::start(spec(1, 1, 50), hook).unwrap();
        let release = Arc::new(AtomicBool::new(false));

        let blocker = Arc::clone(&release);
        let _running = pool
            .submit("running", move || {
                while !blocker.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(2));
                }
            })
            .await
            .unwrap();
        while pool.active() == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let _queued = pool.submit("queued", || ()).await.unwrap();
        assert_eq!(pool.queued(), 1);

        let err = pool.submit("rejected", || ()).await.unwrap_err();
        assert!(matches!(err, DispatchError::QueueTimeout { waited_ms: 50, .. }));
        release.store(true, Ordering::SeqCst);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_after_shutdown_fails() {
        let (hook, _) = recording_hook();
        let pool = WorkerPool::<()>::start(spec(1, 1, 50), hook).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());
        let err = pool.submit("late", || ()).await.unwrap_err();
        assert!(matches!(err, DispatchError::PoolShutDown { .. }));
        pool.join();
    }
}
