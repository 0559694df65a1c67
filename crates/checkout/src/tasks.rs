//! Bounded in-process job queue with retry.
//!
//! Background work is submitted as a named job: a closure producing a
//! future. Jobs run concurrently on the tokio runtime; a failing job is
//! retried with exponential backoff and, once attempts are exhausted,
//! logged and counted. One job failing never affects another.
//!
//! At most `capacity` submitted jobs are in flight at once, counting jobs
//! waiting out a backoff. `enqueue` waits for a free slot. Jobs submitted
//! by a running job ride on their parent's slot and are admitted at once,
//! so a parent can never wait on itself.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use backon::{BackoffBuilder, ExponentialBuilder};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;

use crate::config::RetryPolicy;
use crate::error::CheckoutError;

type JobFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), CheckoutError>> + Send + Sync>;

struct Job {
    name: &'static str,
    run: JobFn,
    /// Released when the job finishes; `None` for jobs submitted by jobs.
    _slot: Option<OwnedSemaphorePermit>,
}

tokio::task_local! {
    static RUNNING_JOB: &'static str;
}

#[derive(Debug, Default)]
struct Tracker {
    pending: AtomicUsize,
    idle: Notify,
}

impl Tracker {
    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Handle for submitting background jobs. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Job>,
    slots: Arc<Semaphore>,
    tracker: Arc<Tracker>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .field("free_slots", &self.slots.available_permits())
            .finish()
    }
}

fn backoff(policy: RetryPolicy) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(policy.min_delay)
        .with_max_delay(policy.max_delay)
        .with_max_times(policy.max_retries)
        .with_jitter()
}

async fn run_with_retry(job: Job, backoff: ExponentialBuilder) {
    let mut delays = backoff.build();
    let mut attempt = 1u32;

    loop {
        match (job.run)().await {
            Ok(()) => {
                tracing::debug!(task = job.name, attempt, "background task completed");
                return;
            }
            Err(e) => match delays.next() {
                Some(delay) => {
                    metrics::counter!("fanout_task_retries_total", "task" => job.name).increment(1);
                    tracing::warn!(
                        task = job.name,
                        attempt,
                        backoff_ms = %delay.as_millis(),
                        error = %e,
                        "background task failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    metrics::counter!("fanout_task_failures_total", "task" => job.name).increment(1);
                    tracing::error!(
                        task = job.name,
                        attempts = attempt,
                        error = %e,
                        "background task gave up"
                    );
                    return;
                }
            },
        }
    }
}

impl TaskQueue {
    /// Starts the worker and returns the queue handle and the worker's join handle.
    ///
    /// The worker exits once every queue handle has been dropped and the
    /// channel drained.
    pub fn start(capacity: usize, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let slots = Arc::new(Semaphore::new(capacity.max(1)));
        let tracker = Arc::new(Tracker::default());
        let backoff = backoff(policy);

        let worker_tracker = tracker.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let tracker = worker_tracker.clone();
                let name = job.name;
                tokio::spawn(RUNNING_JOB.scope(name, async move {
                    run_with_retry(job, backoff).await;
                    tracker.finish();
                }));
            }
            tracing::debug!("task queue worker stopped");
        });

        (
            Self {
                sender,
                slots,
                tracker,
            },
            worker,
        )
    }

    /// Submits a job. Waits for a free slot if `capacity` jobs are in flight.
    pub async fn enqueue<F, Fut>(&self, name: &'static str, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CheckoutError>> + Send + 'static,
    {
        let slot = if RUNNING_JOB.try_with(|_| ()).is_ok() {
            None
        } else {
            match self.slots.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    metrics::counter!("fanout_task_failures_total", "task" => name).increment(1);
                    tracing::error!(task = name, "task queue is closed, job dropped");
                    return;
                }
            }
        };

        self.tracker.pending.fetch_add(1, Ordering::AcqRel);
        let job = Job {
            name,
            run: Box::new(move || job().boxed()),
            _slot: slot,
        };
        if self.sender.send(job).is_err() {
            self.tracker.finish();
            metrics::counter!("fanout_task_failures_total", "task" => name).increment(1);
            tracing::error!(task = name, "task queue is closed, job dropped");
        }
    }

    /// Number of jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.tracker.pending.load(Ordering::Acquire)
    }

    /// Waits until every submitted job has finished, including jobs
    /// submitted by other jobs.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.tracker.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> TaskQueue {
        TaskQueue::start(16, RetryPolicy::immediate(3)).0
    }

    #[tokio::test]
    async fn runs_jobs_and_waits_idle() {
        let queue = queue();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = counter.clone();
            queue
                .enqueue("count", move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await;
        }

        queue.wait_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let queue = queue();
        let attempts = Arc::new(AtomicUsize::new(0));

        let seen = attempts.clone();
        queue
            .enqueue("flaky", move || {
                let seen = seen.clone();
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CheckoutError::Internal("transient".into()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        queue.wait_idle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries_without_affecting_others() {
        let queue = queue();
        let attempts = Arc::new(AtomicUsize::new(0));
        let other = Arc::new(AtomicUsize::new(0));

        let seen = attempts.clone();
        queue
            .enqueue("always_fails", move || {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(CheckoutError::Internal("down".into()))
                }
            })
            .await;
        let ran = other.clone();
        queue
            .enqueue("fine", move || {
                let ran = ran.clone();
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        queue.wait_idle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(other.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn enqueue_waits_for_a_free_slot() {
        let queue = TaskQueue::start(1, RetryPolicy::immediate(0)).0;
        let gate = Arc::new(Notify::new());

        let held = gate.clone();
        queue
            .enqueue("blocker", move || {
                let held = held.clone();
                async move {
                    held.notified().await;
                    Ok(())
                }
            })
            .await;

        let full = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            queue.enqueue("waiting", || async { Ok(()) }),
        )
        .await;
        assert!(full.is_err());
        assert_eq!(queue.pending(), 1);

        gate.notify_one();
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            queue.enqueue("admitted", || async { Ok(()) }),
        )
        .await
        .unwrap();
        queue.wait_idle().await;
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn jobs_can_submit_jobs() {
        // One slot: the inner job must not wait on its parent's slot.
        let queue = TaskQueue::start(1, RetryPolicy::immediate(3)).0;
        let ran = Arc::new(AtomicUsize::new(0));

        let inner_queue = queue.clone();
        let inner_ran = ran.clone();
        queue
            .enqueue("outer", move || {
                let queue = inner_queue.clone();
                let ran = inner_ran.clone();
                async move {
                    queue
                        .enqueue("inner", move || {
                            let ran = ran.clone();
                            async move {
                                ran.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            }
                        })
                        .await;
                    Ok(())
                }
            })
            .await;

        queue.wait_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
