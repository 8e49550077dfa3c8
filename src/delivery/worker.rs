//! Queue submission and the in-process worker pool.

use std::{
    fmt, io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use super::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_WORKERS, DeliveryError, DeliverySender, DeliveryTask,
    SubmitError,
};

/// Asynchronous task submission facility.
///
/// `submit` must return promptly and be callable from many threads.
pub trait TaskQueue: Send + Sync {
    /// Hand `task` to the queue called `queue`.
    fn submit(&self, task: DeliveryTask, queue: &str) -> Result<(), SubmitError>;

    /// Wait up to `timeout` for submitted tasks to settle.
    fn flush(&self, timeout: Duration) -> bool {
        let _ = timeout;
        true
    }
}

/// Called with each task whose attempts are exhausted and its last error.
pub type FailureCallback = Arc<dyn Fn(&DeliveryTask, &DeliveryError) + Send + Sync>;

/// Settings for [`WorkerPool`].
#[derive(Clone)]
pub struct WorkerPoolConfig {
    /// Queue name accepted by [`TaskQueue::submit`].
    pub name: String,
    pub workers: usize,
    /// Bounded channel capacity.
    pub capacity: usize,
    pub on_failure: Option<FailureCallback>,
}

impl WorkerPoolConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            on_failure: None,
        }
    }
}

impl fmt::Debug for WorkerPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolConfig")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .field("capacity", &self.capacity)
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Count of submitted tasks that have not settled yet.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn start(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

/// Named queue consumed by background threads.
///
/// Tasks travel over a bounded channel; a full channel rejects submissions
/// instead of blocking the logging thread, and the submitter reports the
/// drop. Each worker delivers a task,
/// waiting `retry_delay` between attempts until it succeeds or runs out of
/// attempts. Closing the pool lets workers drain what is queued, but any
/// retry wait ends immediately and the task is abandoned.
pub struct WorkerPool {
    name: String,
    tx: Mutex<Option<Sender<DeliveryTask>>>,
    stop: Mutex<Option<Sender<()>>>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
    in_flight: Arc<InFlight>,
}

impl WorkerPool {
    /// Spawn `config.workers` threads delivering through `sender`.
    pub fn spawn(config: WorkerPoolConfig, sender: DeliverySender) -> io::Result<Self> {
        let (tx, rx) = bounded(config.capacity.max(1));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let in_flight = Arc::new(InFlight::default());
        let pool = Self {
            name: config.name.clone(),
            tx: Mutex::new(Some(tx)),
            stop: Mutex::new(Some(stop_tx)),
            handles: Mutex::new(Vec::new()),
            in_flight: Arc::clone(&in_flight),
        };
        for index in 0..config.workers.max(1) {
            let worker = Worker {
                queue: config.name.clone(),
                sender: sender.clone(),
                stop: stop_rx.clone(),
                in_flight: Arc::clone(&in_flight),
                on_failure: config.on_failure.clone(),
            };
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("tglog-{}-{index}", config.name))
                .spawn(move || worker.run(rx))?;
            pool.handles.lock().push(handle);
        }
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting tasks, interrupt retry waits and join the workers.
    pub fn close(&self) {
        self.stop.lock().take();
        self.tx.lock().take();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("WorkerPool `{}`: worker thread panicked", self.name);
            }
        }
    }
}

impl TaskQueue for WorkerPool {
    fn submit(&self, task: DeliveryTask, queue: &str) -> Result<(), SubmitError> {
        if queue != self.name {
            return Err(SubmitError::UnknownQueue(queue.to_string()));
        }
        let Some(tx) = self.tx.lock().clone() else {
            return Err(SubmitError::Closed);
        };
        self.in_flight.start();
        match tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.in_flight.finish();
                Err(SubmitError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.in_flight.finish();
                Err(SubmitError::Closed)
            }
        }
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.in_flight.wait_idle(timeout)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("workers", &self.handles.lock().len())
            .field("in_flight", &*self.in_flight.count.lock())
            .finish()
    }
}

struct Worker {
    queue: String,
    sender: DeliverySender,
    stop: Receiver<()>,
    in_flight: Arc<InFlight>,
    on_failure: Option<FailureCallback>,
}

impl Worker {
    fn run(self, rx: Receiver<DeliveryTask>) {
        for task in rx.iter() {
            self.deliver(task);
            self.in_flight.finish();
        }
    }

    fn deliver(&self, mut task: DeliveryTask) {
        loop {
            let err = match self.sender.send(&task) {
                Ok(()) => return,
                Err(err) => err,
            };
            if !task.consume_attempt() {
                warn!(
                    "WorkerPool `{}`: delivery to chat {} failed permanently: {err}",
                    self.queue, task.chat_id
                );
                self.report_failure(&task, &err);
                return;
            }
            debug!(
                "WorkerPool `{}`: delivery failed ({err}); retrying in {:?}",
                self.queue, task.retry_delay
            );
            if !self.wait(task.retry_delay) {
                warn!(
                    "WorkerPool `{}`: shutting down, abandoning delivery to chat {}",
                    self.queue, task.chat_id
                );
                self.report_failure(&task, &err);
                return;
            }
        }
    }

    /// Sleep for `delay`; returns `false` when the pool is closing.
    fn wait(&self, delay: Duration) -> bool {
        matches!(self.stop.recv_timeout(delay), Err(RecvTimeoutError::Timeout))
    }

    fn report_failure(&self, task: &DeliveryTask, err: &DeliveryError) {
        if let Some(callback) = &self.on_failure {
            callback(task, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{RetryPolicy, Transport, TransportOptions};
    use crate::identifier::Identifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` attempts, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl Transport for Flaky {
        fn post_form(&self, _: &str, _: &str, _: &TransportOptions) -> Result<u16, DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Ok(503)
            } else {
                Ok(200)
            }
        }
    }

    fn task(policy: RetryPolicy) -> DeliveryTask {
        DeliveryTask::new(
            "http://localhost/hook",
            "m",
            Identifier::Int(7),
            None,
            TransportOptions::default(),
        )
        .with_retry(policy)
    }

    fn pool_with(
        transport: Arc<Flaky>,
        failures: Arc<Mutex<Vec<DeliveryError>>>,
    ) -> WorkerPool {
        let mut config = WorkerPoolConfig::new("telegram");
        config.on_failure = Some(Arc::new(move |_: &DeliveryTask, err: &DeliveryError| {
            failures.lock().push(err.clone());
        }));
        WorkerPool::spawn(config, DeliverySender::new(transport)).expect("spawn pool")
    }

    #[test]
    fn retries_until_success() {
        let transport = Arc::new(Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let failures = Arc::new(Mutex::new(Vec::new()));
        let pool = pool_with(Arc::clone(&transport), Arc::clone(&failures));
        pool.submit(
            task(RetryPolicy {
                max_attempts: 2,
                delay: Duration::from_millis(10),
            }),
            "telegram",
        )
        .expect("submit");
        assert!(pool.flush(Duration::from_secs(5)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(failures.lock().is_empty());
    }

    #[test]
    fn exhausted_attempts_are_reported() {
        let transport = Arc::new(Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let failures = Arc::new(Mutex::new(Vec::new()));
        let pool = pool_with(Arc::clone(&transport), Arc::clone(&failures));
        pool.submit(
            task(RetryPolicy {
                max_attempts: 2,
                delay: Duration::from_millis(10),
            }),
            "telegram",
        )
        .expect("submit");
        assert!(pool.flush(Duration::from_secs(5)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*failures.lock(), vec![DeliveryError::Status(503)]);
    }

    #[test]
    fn close_interrupts_retry_wait() {
        let transport = Arc::new(Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let failures = Arc::new(Mutex::new(Vec::new()));
        let pool = pool_with(Arc::clone(&transport), Arc::clone(&failures));
        pool.submit(task(RetryPolicy::default()), "telegram")
            .expect("submit");
        while transport.calls.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        let started = Instant::now();
        pool.close();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(failures.lock().len(), 1);
    }

    #[test]
    fn rejects_unknown_queue_and_closed_pool() {
        let transport = Arc::new(Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        let pool = pool_with(transport, Arc::new(Mutex::new(Vec::new())));
        assert_eq!(
            pool.submit(task(RetryPolicy::once()), "other"),
            Err(SubmitError::UnknownQueue("other".into()))
        );
        pool.close();
        assert_eq!(
            pool.submit(task(RetryPolicy::once()), "telegram"),
            Err(SubmitError::Closed)
        );
    }
}
