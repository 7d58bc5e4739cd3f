use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::artifact::resolve_artifact;
use crate::dispatch::{JobBackend, StatusDispatch};
use crate::error::MonitorError;
use crate::job::{
    ArtifactLink, GenerationJob, JobId, JobInput, ResourceType, StatusClass, StatusSnapshot,
};
use crate::notify::{GenerateOptions, Notifier};
use crate::poll::{PollConfig, PollOutcome, poll_until_terminal};

/// The `(job, resource type)` pair a live poll is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollKey {
    pub job_id: JobId,
    pub resource_type: ResourceType,
}

/// Drives document generation jobs from start to download.
///
/// At most one attempt is live per monitor. Calling [`generate`] while an
/// attempt is in flight cancels and replaces it; the replaced attempt ends
/// silently. Dropping the monitor disposes it.
///
/// [`generate`]: GenerationMonitor::generate
pub struct GenerationMonitor {
    inner: Arc<Inner>,
}

struct ActiveJob {
    attempt: u64,
    cancel: CancellationToken,
    /// Set while the attempt's timer is running.
    polling: Option<PollKey>,
}

struct Inner {
    backend: Arc<dyn JobBackend>,
    dispatch: StatusDispatch,
    notifier: Arc<dyn Notifier>,
    poll: PollConfig,
    in_flight: watch::Sender<bool>,
    active: Mutex<Option<ActiveJob>>,
    attempts: AtomicU64,
}

/// Where an attempt begins.
enum Entry {
    Start(JobInput),
    Poll(PollKey),
}

/// How an attempt ended when it did not fail.
enum Finished {
    Resolved(ArtifactLink),
    /// Cancelled, replaced or disposed before it could finish.
    Abandoned,
}

impl GenerationMonitor {
    pub fn new(
        backend: Arc<dyn JobBackend>,
        dispatch: StatusDispatch,
        notifier: Arc<dyn Notifier>,
        poll: PollConfig,
    ) -> Self {
        let (in_flight, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                backend,
                dispatch,
                notifier,
                poll,
                in_flight,
                active: Mutex::new(None),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Start generating and return immediately.
    ///
    /// The in-flight flag is raised before this returns. The outcome is
    /// delivered through the [`Notifier`]; nothing is returned to the caller.
    /// Must be called from within a tokio runtime.
    pub fn generate(&self, input: JobInput, options: GenerateOptions) {
        tracing::info!(resource_type = %input.resource_type(), "Generation requested");
        self.launch(Entry::Start(input), options);
    }

    /// Poll a job that was already started elsewhere, then resolve its
    /// artifact. Replaces any in-flight attempt, like [`generate`].
    ///
    /// [`generate`]: GenerationMonitor::generate
    pub fn start_polling(
        &self,
        job_id: JobId,
        resource_type: ResourceType,
        options: GenerateOptions,
    ) {
        tracing::info!(job_id = %job_id, resource_type = %resource_type, "Polling requested");
        self.launch(
            Entry::Poll(PollKey {
                job_id,
                resource_type,
            }),
            options,
        );
    }

    fn launch(&self, entry: Entry, options: GenerateOptions) {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        {
            let mut active = self.inner.active();
            let previous = active.replace(ActiveJob {
                attempt,
                cancel: cancel.clone(),
                polling: None,
            });
            if let Some(previous) = previous {
                tracing::info!(
                    attempt,
                    replaced = previous.attempt,
                    "Replacing in-flight generation"
                );
                previous.cancel.cancel();
            }
            self.inner.in_flight.send_replace(true);
        }

        tokio::spawn(Arc::clone(&self.inner).run(attempt, cancel, entry, options));
    }

    pub fn is_generating(&self) -> bool {
        *self.inner.in_flight.borrow()
    }

    /// Follow the in-flight flag, e.g. to disable a submit button.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.in_flight.subscribe()
    }

    /// Resolves once no attempt is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    pub fn polling_key(&self) -> Option<PollKey> {
        self.inner
            .active()
            .as_ref()
            .and_then(|job| job.polling.clone())
    }

    pub fn is_polling(&self) -> bool {
        self.polling_key().is_some()
    }

    /// Stop the live attempt's timer. The attempt then finishes silently and
    /// clears the in-flight flag itself.
    pub fn stop_polling(&self) {
        if let Some(job) = self.inner.active().as_ref() {
            tracing::debug!(attempt = job.attempt, "Stopping poll");
            job.cancel.cancel();
        }
    }

    /// Tear down synchronously: no further status checks fire after this
    /// returns, and any response already on the wire is discarded.
    pub fn dispose(&self) {
        let mut active = self.inner.active();
        if let Some(job) = active.take() {
            tracing::debug!(attempt = job.attempt, "Disposing generation monitor");
            job.cancel.cancel();
        }
        self.inner.in_flight.send_replace(false);
    }
}

impl Drop for GenerationMonitor {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the poll binding. Fails if the attempt no longer owns the slot.
    fn bind(&self, attempt: u64, key: PollKey) -> bool {
        match self.active().as_mut() {
            Some(job) if job.attempt == attempt => {
                job.polling = Some(key);
                true
            }
            _ => false,
        }
    }

    fn unbind(&self, attempt: u64) {
        if let Some(job) = self.active().as_mut() {
            if job.attempt == attempt {
                job.polling = None;
            }
        }
    }

    /// Free the slot and lower the in-flight flag, if `attempt` still owns it.
    fn release(&self, attempt: u64) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|job| job.attempt == attempt) {
            *active = None;
            self.in_flight.send_replace(false);
        }
    }

    async fn run(
        self: Arc<Self>,
        attempt: u64,
        cancel: CancellationToken,
        entry: Entry,
        options: GenerateOptions,
    ) {
        let result = match entry {
            Entry::Start(input) => self.drive(attempt, &cancel, &input).await,
            Entry::Poll(key) => self.resume(attempt, &cancel, &key).await,
        };

        if cancel.is_cancelled() {
            tracing::debug!(attempt, "Attempt was cancelled or replaced, dropping its outcome");
        } else {
            match result {
                Ok(Finished::Resolved(link)) => {
                    tracing::info!(attempt, job_id = %link.job_id, "Generation completed");
                    self.notifier.success(options.success_text());
                }
                Ok(Finished::Abandoned) => {
                    tracing::debug!(attempt, "Generation abandoned");
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Generation failed");
                    self.notifier.error(&e, options.error_text(&e));
                }
            }
        }

        // Single exit path. The flag drops only after the notification went
        // out, so `wait_idle` observers see the final outcome.
        self.release(attempt);
    }

    async fn drive(
        &self,
        attempt: u64,
        cancel: &CancellationToken,
        input: &JobInput,
    ) -> Result<Finished, MonitorError> {
        let started = self.backend.start_job(input).await;
        if cancel.is_cancelled() {
            return Ok(Finished::Abandoned);
        }
        let mut job = GenerationJob::from(started.map_err(MonitorError::StartFailure)?);
        tracing::info!(
            attempt,
            job_id = %job.id,
            resource_type = %job.resource_type,
            status = %job.status,
            "Generation job started"
        );

        match job.status.class() {
            StatusClass::Succeeded => {}
            StatusClass::Failed => {
                return Err(MonitorError::from_failed_status(job.id, &job.status, None));
            }
            StatusClass::InProgress => {
                let key = PollKey {
                    job_id: job.id.clone(),
                    resource_type: job.resource_type,
                };
                match self.poll_job(attempt, cancel, &key).await? {
                    Some(snapshot) => job.observe(snapshot.status),
                    None => return Ok(Finished::Abandoned),
                }
            }
        }

        tracing::debug!(attempt, job_id = %job.id, status = %job.status, "Generation job settled");
        self.finish(&job.id, cancel).await
    }

    async fn resume(
        &self,
        attempt: u64,
        cancel: &CancellationToken,
        key: &PollKey,
    ) -> Result<Finished, MonitorError> {
        match self.poll_job(attempt, cancel, key).await? {
            Some(_) => self.finish(&key.job_id, cancel).await,
            None => Ok(Finished::Abandoned),
        }
    }

    async fn finish(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> Result<Finished, MonitorError> {
        match resolve_artifact(&*self.backend, &*self.notifier, job_id, cancel).await? {
            Some(link) => Ok(Finished::Resolved(link)),
            None => Ok(Finished::Abandoned),
        }
    }

    /// Poll until the job reaches a terminal status. `Ok(None)` means the
    /// attempt was cancelled.
    async fn poll_job(
        &self,
        attempt: u64,
        cancel: &CancellationToken,
        key: &PollKey,
    ) -> Result<Option<StatusSnapshot>, MonitorError> {
        let query = self.dispatch.route(key.resource_type)?;
        if !self.bind(attempt, key.clone()) {
            return Ok(None);
        }
        let job_id = &key.job_id;
        tracing::debug!(
            attempt,
            job_id = %job_id,
            interval_ms = self.poll.interval.as_millis() as u64,
            "Polling generation job"
        );

        let outcome = poll_until_terminal(
            self.poll,
            cancel,
            || query.poll_status(job_id),
            |snapshot| snapshot.status.class(),
        )
        .await;
        self.unbind(attempt);

        let outcome = outcome.map_err(|source| MonitorError::PollTransportFailure {
            job_id: job_id.clone(),
            source,
        })?;
        match outcome {
            PollOutcome::Succeeded(snapshot) => Ok(Some(snapshot)),
            PollOutcome::Failed(snapshot) => Err(MonitorError::from_polled_status(
                job_id.clone(),
                &snapshot.status,
                snapshot.error,
            )),
            PollOutcome::Cancelled => Ok(None),
            PollOutcome::TimedOut { polls } => Err(MonitorError::PollTimeout {
                job_id: job_id.clone(),
                polls,
            }),
        }
    }
}
