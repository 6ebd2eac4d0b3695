use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use entityflow_core::pipeline::{DependencyError, Reporter, Step, Verb};
use entityflow_core::record::{EntityId, EntityType};

use super::{run_with_retry, RetryPolicy};

/// What a job is about, for logs and failure reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub step: Step,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub operation: Verb,
}

impl JobContext {
    pub fn new(step: Step, entity_type: EntityType, entity_id: EntityId, operation: Verb) -> Self {
        Self {
            step,
            entity_type,
            entity_id,
            operation,
        }
    }

    pub fn failure(&self, cause: impl std::fmt::Display) -> DependencyError {
        DependencyError::new(
            self.step,
            self.entity_type.clone(),
            self.entity_id.clone(),
            self.operation,
            cause,
        )
    }
}

/// A unit of retryable post-commit work.
#[async_trait]
pub trait Job: Send + Sync {
    fn context(&self) -> &JobContext;

    /// One attempt. The error string becomes the reported cause.
    async fn run(&self) -> Result<(), String>;
}

/// Count of submitted jobs that have not finished.
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the pending count when the job it travels with is dropped.
struct PendingGuard(Arc<Pending>);

impl PendingGuard {
    fn new(pending: &Arc<Pending>) -> Self {
        pending.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(pending))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

struct Queued {
    job: Box<dyn Job>,
    _pending: PendingGuard,
}

/// Bounded queue with a fixed number of concurrent workers.
pub struct TaskQueue {
    sender: Mutex<Option<mpsc::Sender<Queued>>>,
    dispatcher: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    pending: Arc<Pending>,
    policy: RetryPolicy,
    reporter: Arc<dyn Reporter>,
}

impl TaskQueue {
    /// Starts the dispatcher. Must be called inside a Tokio runtime.
    pub fn start(
        capacity: usize,
        workers: usize,
        policy: RetryPolicy,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let dispatcher = tokio::spawn(dispatch(
            receiver,
            workers.max(1),
            policy,
            Arc::clone(&reporter),
        ));

        Self {
            sender: Mutex::new(Some(sender)),
            dispatcher: tokio::sync::Mutex::new(Some(dispatcher)),
            pending: Arc::new(Pending::default()),
            policy,
            reporter,
        }
    }

    /// Queues a job, waiting for capacity when the queue is full.
    ///
    /// After shutdown the job runs in place instead.
    pub async fn submit(&self, job: Box<dyn Job>) {
        let queued = Queued {
            job,
            _pending: PendingGuard::new(&self.pending),
        };

        let sender = self.sender.lock().ok().and_then(|guard| guard.as_ref().cloned());
        let rejected = match sender {
            Some(sender) => match sender.send(queued).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(queued)) => queued,
            },
            None => queued,
        };

        tracing::debug!(
            step = %rejected.job.context().step,
            "Task queue closed, running job in place"
        );
        if let Err(err) = run_with_retry(rejected.job.as_ref(), &self.policy).await {
            self.reporter.report(&err);
        }
    }

    /// Number of submitted jobs still queued or running.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Resolves once every submitted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Closes the queue and waits for queued and running jobs to finish.
    pub async fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }

        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "Task dispatcher panicked");
            }
        }
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<Queued>,
    workers: usize,
    policy: RetryPolicy,
    reporter: Arc<dyn Reporter>,
) {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();

    while let Some(queued) = receiver.recv().await {
        while let Some(finished) = running.try_join_next() {
            log_join_error(finished);
        }

        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let reporter = Arc::clone(&reporter);

        running.spawn(async move {
            let _permit = permit;
            if let Err(err) = run_with_retry(queued.job.as_ref(), &policy).await {
                reporter.report(&err);
            }
            drop(queued);
        });
    }

    while let Some(finished) = running.join_next().await {
        log_join_error(finished);
    }
    tracing::debug!("Task dispatcher stopped");
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        tracing::error!(error = %err, "Background task panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use super::*;
    use crate::reporter::CollectingReporter;

    struct CountingJob {
        ctx: JobContext,
        counter: Arc<AtomicU32>,
        fail: bool,
        delay: Duration,
    }

    impl CountingJob {
        fn boxed(counter: &Arc<AtomicU32>, fail: bool, delay: Duration) -> Box<dyn Job> {
            Box::new(Self {
                ctx: JobContext::new(
                    Step::Reindex,
                    EntityType::new("store"),
                    EntityId::new("s1"),
                    Verb::Create,
                ),
                counter: Arc::clone(counter),
                fail,
                delay,
            })
        }
    }

    #[async_trait]
    impl Job for CountingJob {
        fn context(&self) -> &JobContext {
            &self.ctx
        }

        async fn run(&self) -> Result<(), String> {
            tokio::time::sleep(self.delay).await;
            self.counter.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("index offline".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_all_jobs() {
        let reporter = Arc::new(CollectingReporter::new());
        let queue = TaskQueue::start(4, 2, policy(1), reporter.clone());
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..10 {
            queue
                .submit(CountingJob::boxed(&counter, false, Duration::from_millis(5)))
                .await;
        }
        queue.wait_idle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(queue.pending(), 0);
        assert!(reporter.errors().is_empty());
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_queue_returns() {
        let queue = TaskQueue::start(4, 2, policy(1), Arc::new(CollectingReporter::new()));
        queue.wait_idle().await;
    }

    #[tokio::test]
    async fn test_exhausted_job_is_reported_once() {
        let reporter = Arc::new(CollectingReporter::new());
        let queue = TaskQueue::start(4, 2, policy(3), reporter.clone());
        let counter = Arc::new(AtomicU32::new(0));

        queue
            .submit(CountingJob::boxed(&counter, true, Duration::ZERO))
            .await;
        queue.wait_idle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let errors = reporter.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, Step::Reindex);
        assert_eq!(errors[0].cause, "index offline");
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_runs_in_place() {
        let reporter = Arc::new(CollectingReporter::new());
        let queue = TaskQueue::start(8, 1, policy(1), reporter.clone());
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            queue
                .submit(CountingJob::boxed(&counter, false, Duration::from_millis(5)))
                .await;
        }
        queue.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        queue
            .submit(CountingJob::boxed(&counter, false, Duration::ZERO))
            .await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(queue.pending(), 0);
    }
}
