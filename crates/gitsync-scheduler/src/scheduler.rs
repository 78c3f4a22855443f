//! Job scheduler
//!
//! Blocking jobs run on tokio's blocking pool. Recurring jobs use a fixed
//! delay: the next run starts `delay` after the previous one finished, so
//! runs of one job never overlap.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{Error, JobResult};

/// How job failures are propagated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// The first failure of any job is sent to the error channel.
    #[default]
    FailFast,
    /// Job failures are logged; recurring jobs keep their cadence.
    /// Failures of async jobs spawned with [`Scheduler::spawn`] are still
    /// reported.
    Isolate,
}

/// Runs one-shot, recurring and async jobs for one application run.
///
/// Cloning is cheap; all clones share the error channel and shutdown state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    policy: ErrorPolicy,
    errors_tx: mpsc::UnboundedSender<Error>,
    errors_rx: Mutex<mpsc::UnboundedReceiver<Error>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(ErrorPolicy::default())
    }
}

impl Scheduler {
    pub fn new(policy: ErrorPolicy) -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                policy,
                errors_tx,
                errors_rx: Mutex::new(errors_rx),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.inner.policy
    }

    /// Run `job` once on the blocking pool.
    pub fn execute<F>(&self, name: impl Into<String>, job: F)
    where
        F: FnOnce() -> JobResult + Send + 'static,
    {
        let name = name.into();
        let scheduler = self.clone();

        self.inner.tracker.spawn(async move {
            tracing::debug!(job = %name, "job started");
            match tokio::task::spawn_blocking(job).await {
                Ok(Ok(())) => tracing::debug!(job = %name, "job completed"),
                Ok(Err(source)) => scheduler.job_failed(&name, source),
                Err(e) => scheduler.report(Error::Join {
                    job: name,
                    message: e.to_string(),
                }),
            }
        });
    }

    /// Run `job` every `delay`, measured from the end of the previous run.
    ///
    /// The first run starts one `delay` after registration. Stops on
    /// shutdown, or on the first failure under [`ErrorPolicy::FailFast`].
    pub fn schedule<F>(&self, name: impl Into<String>, job: F, delay: Duration)
    where
        F: FnMut() -> JobResult + Send + 'static,
    {
        let name = name.into();
        let scheduler = self.clone();
        let cancel = self.inner.cancel.clone();

        tracing::debug!(job = %name, delay_seconds = delay.as_secs(), "job scheduled");

        self.inner.tracker.spawn(async move {
            let mut job = job;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                let run = tokio::task::spawn_blocking(move || {
                    let result = job();
                    (job, result)
                });

                match run.await {
                    Ok((returned, Ok(()))) => job = returned,
                    Ok((returned, Err(source))) => {
                        let keep_going = scheduler.policy() == ErrorPolicy::Isolate;
                        scheduler.job_failed(&name, source);
                        if !keep_going {
                            break;
                        }
                        job = returned;
                    }
                    Err(e) => {
                        scheduler.report(Error::Join {
                            job: name.clone(),
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
            tracing::debug!(job = %name, "job stopped");
        });
    }

    /// Run an async job until it completes or the scheduler shuts down.
    ///
    /// Errors are always reported, regardless of policy.
    pub fn spawn<F>(&self, name: impl Into<String>, job: F)
    where
        F: Future<Output = JobResult> + Send + 'static,
    {
        let name = name.into();
        let scheduler = self.clone();
        let cancel = self.inner.cancel.clone();

        self.inner.tracker.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                result = job => {
                    if let Err(source) = result {
                        scheduler.report(Error::Job { job: name, source });
                    }
                }
            }
        });
    }

    /// Wait for the first error, or for [`Scheduler::finish`].
    pub async fn wait_error(&self) -> Error {
        let mut rx = self.inner.errors_rx.lock().await;
        rx.recv().await.unwrap_or(Error::Finished)
    }

    /// Signal clean completion to [`Scheduler::wait_error`].
    pub fn finish(&self) {
        let _ = self.inner.errors_tx.send(Error::Finished);
    }

    /// Stop all future runs and wait for in-flight jobs to return.
    ///
    /// Running blocking jobs are never interrupted.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        tracing::debug!("scheduler stopped");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    fn job_failed(&self, name: &str, source: crate::JobError) {
        match self.inner.policy {
            ErrorPolicy::FailFast => self.report(Error::Job {
                job: name.to_string(),
                source,
            }),
            ErrorPolicy::Isolate => {
                tracing::warn!(job = %name, error = %source, "job failed, other jobs continue");
            }
        }
    }

    fn report(&self, error: Error) {
        tracing::debug!(error = %error, "reporting job error");
        let _ = self.inner.errors_tx.send(error);
    }
}
