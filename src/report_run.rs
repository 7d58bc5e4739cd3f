//! Regulatory report run monitoring.
//!
//! Unlike document jobs, the report executor exposes a single "current run"
//! status. [`ReportRunMonitor`] watches it continuously, publishing a
//! [`RunView`] with ANSI-stripped logs, and can trigger a run and wait for it
//! to finish. Both paths are built on [`poll_until_terminal`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::MonitorError;
use crate::graphql::ClientError;
use crate::job::{JobId, ObservedStatus, StatusClass};
use crate::poll::{PollConfig, PollOutcome, poll_until_terminal};

/// Job id used in errors when the executor did not hand back a run id.
pub const CURRENT_RUN: &str = "current-report-run";

/// Trigger and status calls of the report executor.
#[async_trait]
pub trait ReportRunBackend: Send + Sync {
    /// Starts a run. Returns the run id when the executor reports one.
    async fn trigger_run(&self) -> Result<Option<String>, ClientError>;

    async fn run_status(&self) -> Result<RunStatus, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub running: bool,
    #[serde(default)]
    pub logs: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub last_run: Option<LastRun>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    #[serde(default)]
    pub run_id: Option<String>,
    pub status: ObservedStatus,
    #[serde(default)]
    pub logs: Option<String>,
}

/// What a status display shows. Log text has escape sequences removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunView {
    pub running: bool,
    pub logs: String,
    pub error: Option<String>,
    pub last_status: Option<ObservedStatus>,
    pub last_run_logs: String,
    /// Whether a watcher is currently polling.
    pub watching: bool,
}

impl RunView {
    pub fn from_status(status: &RunStatus, watching: bool) -> Self {
        Self {
            running: status.running,
            logs: strip_logs(status.logs.as_deref()),
            error: status.error.clone(),
            last_status: status.last_run.as_ref().map(|run| run.status.clone()),
            last_run_logs: strip_logs(status.last_run.as_ref().and_then(|run| run.logs.as_deref())),
            watching,
        }
    }
}

fn strip_logs(raw: Option<&str>) -> String {
    raw.map(|logs| console::strip_ansi_codes(logs).into_owned())
        .unwrap_or_default()
}

/// Classify a reading while waiting for a run this client triggered.
///
/// A terminal `last_run` only counts once the triggered run has been seen:
/// either its id matches, or the executor was observed running since the
/// trigger. Otherwise the reading still describes the previous run.
fn classify_triggered(status: &RunStatus, run_id: Option<&str>, seen: &mut bool) -> StatusClass {
    if status.running {
        *seen = true;
        return StatusClass::InProgress;
    }
    let Some(last) = &status.last_run else {
        return StatusClass::InProgress;
    };
    let ours = match (run_id, last.run_id.as_deref()) {
        (Some(wanted), Some(got)) => wanted == got,
        _ => *seen,
    };
    if !ours {
        return StatusClass::InProgress;
    }
    *seen = true;
    last.status.class()
}

/// Watches the current report run and waits for triggered runs.
///
/// Holds at most one watcher loop and at most one wait loop. Starting a new
/// one of either kind cancels the previous one of that kind.
pub struct ReportRunMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn ReportRunBackend>,
    poll: PollConfig,
    view: watch::Sender<RunView>,
    /// Parent of every task token; replaced on dispose.
    scope: Mutex<CancellationToken>,
    watcher: Slot,
    waiter: Slot,
    tasks: AtomicU64,
}

/// A single cancellable task, tagged with the id of the task that owns it.
#[derive(Default)]
struct Slot(Mutex<Option<(u64, CancellationToken)>>);

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the slot for `id`, cancelling whoever held it.
    fn install(&self, id: u64, cancel: CancellationToken) {
        if let Some((previous, token)) = self.lock().replace((id, cancel)) {
            tracing::debug!(previous, id, "Replacing report run task");
            token.cancel();
        }
    }

    /// Clear the slot if `id` still owns it.
    fn release(&self, id: u64) -> bool {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|(owner, _)| *owner == id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn is_live(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|(_, token)| !token.is_cancelled())
    }

    fn clear(&self) {
        if let Some((_, token)) = self.lock().take() {
            token.cancel();
        }
    }
}

impl Inner {
    fn child_token(&self) -> CancellationToken {
        self.scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token()
    }

    fn publish(&self, status: &RunStatus) {
        self.view.send_modify(|view| *view = RunView::from_status(status, view.watching));
    }

    fn next_task(&self) -> u64 {
        self.tasks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Immediate fetch, then publish every reading until cancelled.
    async fn watch(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        let first = self.backend.run_status().await;
        if cancel.is_cancelled() {
            return Ok(());
        }
        self.publish(&first?);

        poll_until_terminal(
            self.poll.with_max_polls(None),
            cancel,
            || self.backend.run_status(),
            |status| {
                self.publish(status);
                StatusClass::InProgress
            },
        )
        .await?;
        Ok(())
    }

    fn stop_watching(&self, reason: Option<String>) {
        self.view.send_modify(|view| {
            view.watching = false;
            if reason.is_some() {
                view.error = reason;
            }
        });
    }
}

impl ReportRunMonitor {
    pub fn new(backend: Arc<dyn ReportRunBackend>, poll: PollConfig) -> Self {
        let (view, _) = watch::channel(RunView::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                poll,
                view,
                scope: Mutex::new(CancellationToken::new()),
                watcher: Slot::default(),
                waiter: Slot::default(),
                tasks: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RunView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> RunView {
        self.inner.view.borrow().clone()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.watcher.is_live()
    }

    /// Fetch the current run status now, then keep polling until disposed.
    ///
    /// Replaces any watcher already running. A failed status check stops the
    /// watcher and is recorded in the view.
    pub fn start_watching(&self) {
        let id = self.inner.next_task();
        let cancel = self.inner.child_token();
        self.inner.watcher.install(id, cancel.clone());
        self.inner.view.send_modify(|view| view.watching = true);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.watch(&cancel).await;
            if cancel.is_cancelled() {
                tracing::debug!(id, "Report run watcher stopped");
                return;
            }
            if !inner.watcher.release(id) {
                return;
            }
            match result {
                Ok(()) => inner.stop_watching(None),
                Err(e) => {
                    tracing::warn!(error = %e, "Report run status check failed");
                    inner.stop_watching(Some(format!("status check failed: {e}")));
                }
            }
        });
    }

    /// Trigger a run and poll until it reaches a terminal status.
    ///
    /// Returns `Ok(None)` if the monitor was disposed, or a newer wait took
    /// over, while waiting.
    pub async fn trigger_and_wait(&self) -> Result<Option<RunView>, MonitorError> {
        let id = self.inner.next_task();
        let cancel = self.inner.child_token();
        self.inner.waiter.install(id, cancel.clone());
        let result = self.wait_for_run(&cancel).await;
        self.inner.waiter.release(id);
        result
    }

    async fn wait_for_run(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<RunView>, MonitorError> {
        let run_id = self
            .inner
            .backend
            .trigger_run()
            .await
            .map_err(MonitorError::StartFailure)?;
        let job_id = JobId::new(run_id.clone().unwrap_or_else(|| CURRENT_RUN.to_string()));
        tracing::info!(run_id = %job_id, "Report run triggered");

        let backend = Arc::clone(&self.inner.backend);
        let mut seen = false;
        let outcome = poll_until_terminal(
            self.inner.poll,
            cancel,
            || backend.run_status(),
            |status| {
                self.inner.publish(status);
                classify_triggered(status, run_id.as_deref(), &mut seen)
            },
        )
        .await
        .map_err(|source| MonitorError::PollTransportFailure {
            job_id: job_id.clone(),
            source,
        })?;

        match outcome {
            PollOutcome::Succeeded(status) => {
                tracing::info!(run_id = %job_id, "Report run completed");
                Ok(Some(RunView::from_status(&status, self.is_watching())))
            }
            PollOutcome::Failed(status) => {
                let last = status
                    .last_run
                    .as_ref()
                    .map(|run| run.status.clone())
                    .unwrap_or_else(|| ObservedStatus::Unrecognized(String::new()));
                Err(MonitorError::from_failed_status(
                    job_id,
                    &last,
                    status.error.clone(),
                ))
            }
            PollOutcome::Cancelled => Ok(None),
            PollOutcome::TimedOut { polls } => Err(MonitorError::PollTimeout { job_id, polls }),
        }
    }

    /// Cancel the watcher and any pending wait. No further status checks fire.
    pub fn dispose(&self) {
        let previous = std::mem::replace(
            &mut *self
                .inner
                .scope
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        previous.cancel();
        self.inner.watcher.clear();
        self.inner.waiter.clear();
        self.inner.stop_watching(None);
    }
}

impl Drop for ReportRunMonitor {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time;

    const INTERVAL: Duration = Duration::from_millis(5000);

    fn status(running: bool, last: Option<(&str, &str)>) -> RunStatus {
        RunStatus {
            running,
            logs: Some("\u{1b}[1mrunning dbt\u{1b}[0m".into()),
            error: None,
            last_run: last.map(|(id, s)| LastRun {
                run_id: Some(id.into()),
                status: ObservedStatus::from(s.to_string()),
                logs: None,
            }),
        }
    }

    struct MockReports {
        run_id: Option<String>,
        trigger_fails: bool,
        replies: Mutex<VecDeque<Result<RunStatus, ClientError>>>,
        fallback: RunStatus,
        status_calls: AtomicUsize,
    }

    impl MockReports {
        fn new(run_id: Option<&str>, replies: Vec<Result<RunStatus, ClientError>>) -> Self {
            Self {
                run_id: run_id.map(str::to_string),
                trigger_fails: false,
                replies: Mutex::new(replies.into()),
                fallback: status(true, None),
                status_calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReportRunBackend for MockReports {
        async fn trigger_run(&self) -> Result<Option<String>, ClientError> {
            if self.trigger_fails {
                return Err(ClientError::Graphql("not allowed".into()));
            }
            Ok(self.run_id.clone())
        }

        async fn run_status(&self) -> Result<RunStatus, ClientError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    fn monitor(backend: Arc<MockReports>) -> ReportRunMonitor {
        ReportRunMonitor::new(backend, PollConfig::every(INTERVAL))
    }

    #[test]
    fn view_strips_ansi_codes() {
        let mut s = status(false, Some(("r1", "success")));
        s.last_run.as_mut().unwrap().logs = Some("\u{1b}[31mdone\u{1b}[0m".into());
        let view = RunView::from_status(&s, true);
        assert_eq!(view.logs, "running dbt");
        assert_eq!(view.last_run_logs, "done");
        assert_eq!(view.last_status, Some(ObservedStatus::Known(JobStatus::Completed)));
    }

    #[test]
    fn previous_run_is_not_mistaken_for_the_triggered_one() {
        let mut seen = false;
        let old = status(false, Some(("r0", "success")));
        assert_eq!(
            classify_triggered(&old, Some("r1"), &mut seen),
            StatusClass::InProgress
        );
        assert_eq!(classify_triggered(&old, None, &mut seen), StatusClass::InProgress);

        let ours = status(false, Some(("r1", "failed")));
        assert_eq!(
            classify_triggered(&ours, Some("r1"), &mut seen),
            StatusClass::Failed
        );
    }

    #[test]
    fn run_without_id_counts_after_running_was_seen() {
        let mut seen = false;
        assert_eq!(
            classify_triggered(&status(true, None), None, &mut seen),
            StatusClass::InProgress
        );
        assert!(seen);
        assert_eq!(
            classify_triggered(&status(false, Some(("r0", "success"))), None, &mut seen),
            StatusClass::Succeeded
        );
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_and_wait_completes() {
        let backend = Arc::new(MockReports::new(
            Some("r1"),
            vec![
                Ok(status(false, Some(("r0", "success")))),
                Ok(status(true, Some(("r1", "running")))),
                Ok(status(false, Some(("r1", "success")))),
            ],
        ));
        let monitor = monitor(backend.clone());

        let view = monitor.trigger_and_wait().await.unwrap().unwrap();
        assert_eq!(backend.calls(), 3);
        assert_eq!(view.last_status, Some(ObservedStatus::Known(JobStatus::Completed)));
        assert!(!view.running);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_and_wait_reports_server_error() {
        let mut failed = status(false, Some(("r1", "failed")));
        failed.error = Some("dbt model failed".into());
        let backend = Arc::new(MockReports::new(Some("r1"), vec![Ok(failed)]));
        let monitor = monitor(backend);

        let err = monitor.trigger_and_wait().await.unwrap_err();
        assert_eq!(err.server_message(), Some("dbt model failed"));
        assert!(matches!(
            err,
            MonitorError::GenerationFailure {
                status: JobStatus::Failed,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_failure_does_not_poll() {
        let mut mock = MockReports::new(None, vec![]);
        mock.trigger_fails = true;
        let backend = Arc::new(mock);
        let monitor = monitor(backend.clone());

        let err = monitor.trigger_and_wait().await.unwrap_err();
        assert!(matches!(err, MonitorError::StartFailure(_)));
        time::sleep(INTERVAL * 3).await;
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_publishes_until_disposed() {
        let backend = Arc::new(MockReports::new(None, vec![]));
        let monitor = monitor(backend.clone());
        let mut rx = monitor.subscribe();

        monitor.start_watching();
        assert!(monitor.is_watching());

        rx.changed().await.unwrap();
        time::sleep(INTERVAL * 2 + Duration::from_millis(100)).await;
        // One immediate fetch plus two ticks.
        assert_eq!(backend.calls(), 3);
        let view = monitor.view();
        assert!(view.running);
        assert_eq!(view.logs, "running dbt");

        monitor.dispose();
        assert!(!monitor.is_watching());
        time::sleep(INTERVAL * 5).await;
        assert_eq!(backend.calls(), 3);
        assert!(!monitor.view().watching);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_watcher_keeps_a_single_loop() {
        let backend = Arc::new(MockReports::new(None, vec![]));
        let monitor = monitor(backend.clone());

        monitor.start_watching();
        time::sleep(Duration::from_millis(100)).await;
        monitor.start_watching();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.calls(), 2);

        time::sleep(INTERVAL).await;
        // Only the second watcher ticks.
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_stops_on_transport_error() {
        let backend = Arc::new(MockReports::new(
            None,
            vec![
                Ok(status(true, None)),
                Err(ClientError::Graphql("boom".into())),
            ],
        ));
        let monitor = monitor(backend.clone());

        monitor.start_watching();
        time::sleep(INTERVAL * 3).await;

        assert_eq!(backend.calls(), 2);
        let view = monitor.view();
        assert!(!view.watching);
        assert!(!monitor.is_watching());
        assert!(view.error.unwrap().contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_fetch_releases_the_watcher() {
        let backend = Arc::new(MockReports::new(
            None,
            vec![Err(ClientError::Graphql("unreachable".into()))],
        ));
        let monitor = monitor(backend.clone());

        monitor.start_watching();
        time::sleep(INTERVAL * 2).await;

        assert_eq!(backend.calls(), 1);
        assert!(!monitor.is_watching());
        assert!(!monitor.view().watching);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_wait_replaces_older_one() {
        let backend = Arc::new(MockReports::new(Some("r1"), vec![]));
        let monitor = monitor(backend.clone());

        let (first, second) = tokio::join!(monitor.trigger_and_wait(), async {
            time::sleep(INTERVAL + Duration::from_millis(100)).await;
            time::timeout(
                INTERVAL * 2 + Duration::from_millis(100),
                monitor.trigger_and_wait(),
            )
            .await
        });

        assert!(matches!(first, Ok(None)));
        assert!(second.is_err());
        // One tick from the first wait, two from its replacement.
        assert_eq!(backend.calls(), 3);
    }
}
