//! Generic "poll until terminal" loop shared by document jobs and report runs.
//!
//! The caller supplies a probe (one status request) and a classification
//! function; the loop owns timing, cancellation and the optional poll bound.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::job::StatusClass;

/// Shortest period the loop will tick at. Zero would make the timer panic.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Interval and bound for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before the first check and between consecutive checks.
    pub interval: Duration,
    /// Give up after this many non-terminal readings. `None` polls until the
    /// executor reports a terminal status.
    pub max_polls: Option<u32>,
}

impl PollConfig {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_polls: None,
        }
    }

    pub fn with_max_polls(mut self, max_polls: Option<u32>) -> Self {
        self.max_polls = max_polls;
        self
    }
}

/// How a polling loop ended, when it did not fail on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Succeeded(T),
    Failed(T),
    Cancelled,
    TimedOut { polls: u32 },
}

/// Repeatedly run `probe` every `config.interval` until `classify` reports a
/// terminal class, the probe errors, the bound is hit, or `cancel` fires.
///
/// Ticks never overlap: the next one is scheduled only after the probe has
/// answered. Cancellation is checked before every tick, so nothing fires
/// after the token is cancelled. A probe already in flight is not aborted;
/// its answer is dropped when it arrives.
pub async fn poll_until_terminal<T, E, P, Fut, C>(
    config: PollConfig,
    cancel: &CancellationToken,
    mut probe: P,
    mut classify: C,
) -> Result<PollOutcome<T>, E>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&T) -> StatusClass,
{
    let period = config.interval.max(MIN_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            _ = ticker.tick() => {}
        }

        polls += 1;
        let reading = probe().await;
        if cancel.is_cancelled() {
            tracing::debug!(polls, "Discarding status response for cancelled poll");
            return Ok(PollOutcome::Cancelled);
        }

        let reading = reading?;
        match classify(&reading) {
            StatusClass::Succeeded => return Ok(PollOutcome::Succeeded(reading)),
            StatusClass::Failed => return Ok(PollOutcome::Failed(reading)),
            StatusClass::InProgress => {
                tracing::trace!(polls, "Still in progress");
            }
        }

        if config.max_polls.is_some_and(|max| polls >= max) {
            return Ok(PollOutcome::TimedOut { polls });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const INTERVAL: Duration = Duration::from_millis(2000);

    /// Scripted probe that records when each call happened.
    #[derive(Clone, Default)]
    struct Script {
        replies: Arc<Mutex<VecDeque<Result<StatusClass, String>>>>,
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl Script {
        fn new(replies: Vec<Result<StatusClass, String>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        async fn next(&self) -> Result<StatusClass, String> {
            self.calls.lock().unwrap().push(Instant::now());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(StatusClass::InProgress))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_success() {
        let script = Script::new(vec![
            Ok(StatusClass::InProgress),
            Ok(StatusClass::InProgress),
            Ok(StatusClass::Succeeded),
        ]);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome = poll_until_terminal(
            PollConfig::every(INTERVAL),
            &cancel,
            || script.next(),
            |class| *class,
        )
        .await;

        assert_eq!(outcome, Ok(PollOutcome::Succeeded(StatusClass::Succeeded)));
        assert_eq!(script.calls(), 3);
        let calls = script.calls.lock().unwrap().clone();
        assert_eq!(calls[0] - start, INTERVAL);
        assert_eq!(calls[2] - start, INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_failure_terminal() {
        let script = Script::new(vec![Ok(StatusClass::InProgress), Ok(StatusClass::Failed)]);
        let cancel = CancellationToken::new();

        let outcome = poll_until_terminal(
            PollConfig::every(INTERVAL),
            &cancel,
            || script.next(),
            |class| *class,
        )
        .await;

        assert_eq!(outcome, Ok(PollOutcome::Failed(StatusClass::Failed)));
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_stops_without_retry() {
        let script = Script::new(vec![Err("connection reset".into())]);
        let cancel = CancellationToken::new();

        let outcome = poll_until_terminal(
            PollConfig::every(INTERVAL),
            &cancel,
            || script.next(),
            |class| *class,
        )
        .await;

        assert_eq!(outcome, Err("connection reset".to_string()));
        time::sleep(INTERVAL * 5).await;
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_tick_never_probes() {
        let script = Script::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poll_until_terminal(
            PollConfig::every(INTERVAL),
            &cancel,
            || script.next(),
            |class| *class,
        )
        .await;

        assert_eq!(outcome, Ok(PollOutcome::Cancelled));
        assert_eq!(script.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_poll_stops_further_ticks() {
        let script = Script::new(vec![]);
        let cancel = CancellationToken::new();

        let task = {
            let script = script.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_until_terminal(
                    PollConfig::every(INTERVAL),
                    &cancel,
                    || script.next(),
                    |class| *class,
                )
                .await
            })
        };

        time::sleep(INTERVAL * 2 + Duration::from_millis(100)).await;
        assert_eq!(script.calls(), 2);

        cancel.cancel();
        let outcome = task.await.unwrap();
        assert_eq!(outcome, Ok(PollOutcome::Cancelled));

        time::sleep(INTERVAL * 10).await;
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_cancel_is_discarded() {
        let cancel = CancellationToken::new();
        let probe_cancel = cancel.clone();

        let outcome = poll_until_terminal(
            PollConfig::every(INTERVAL),
            &cancel,
            || {
                let probe_cancel = probe_cancel.clone();
                async move {
                    // The owner goes away while this request is on the wire.
                    probe_cancel.cancel();
                    time::sleep(Duration::from_millis(300)).await;
                    Ok::<_, String>(StatusClass::Succeeded)
                }
            },
            |class| *class,
        )
        .await;

        assert_eq!(outcome, Ok(PollOutcome::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_poll_times_out() {
        let script = Script::new(vec![]);
        let cancel = CancellationToken::new();

        let outcome = poll_until_terminal(
            PollConfig::every(INTERVAL).with_max_polls(Some(3)),
            &cancel,
            || script.next(),
            |class| *class,
        )
        .await;

        assert_eq!(outcome, Ok(PollOutcome::TimedOut { polls: 3 }));
        assert_eq!(script.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let script = Script::new(vec![Ok(StatusClass::InProgress), Ok(StatusClass::Succeeded)]);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome = poll_until_terminal(
            PollConfig::every(Duration::ZERO),
            &cancel,
            || script.next(),
            |class| *class,
        )
        .await;

        assert_eq!(outcome, Ok(PollOutcome::Succeeded(StatusClass::Succeeded)));
        assert_eq!(script.calls(), 2);
        let calls = script.calls.lock().unwrap().clone();
        assert_eq!(calls[0] - start, MIN_INTERVAL);
    }
}
