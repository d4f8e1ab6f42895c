//! Exponential backoff for retryable attempts
//!
//! **Schedule:**
//! - First delay: one unit (`retry.unit_ms`, default 1 s)
//! - Each further delay doubles the previous one
//! - A delay is only taken while the cumulative delay stays below
//!   `retry.ceiling_units` (default 500); the first delay that would reach
//!   it ends the retries
//!
//! With the defaults that is eight retries (1+2+...+128 = 255 units) before a
//! track is given up. Backoff sleeps wake early when the cancellation token
//! fires.

use crate::gate::{Attempt, FetchFailure};
use lyricsift_common::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff delays in units
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    next_units: u64,
    spent_units: u64,
    ceiling_units: u64,
}

impl BackoffSchedule {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next_units: 1,
            spent_units: 0,
            ceiling_units: config.ceiling_units,
        }
    }

    /// Cumulative delay handed out so far
    pub fn spent_units(&self) -> u64 {
        self.spent_units
    }
}

impl Iterator for BackoffSchedule {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let delay = self.next_units;
        let total = self.spent_units.checked_add(delay)?;
        if total >= self.ceiling_units {
            return None;
        }
        self.spent_units = total;
        self.next_units = delay.saturating_mul(2);
        Some(delay)
    }
}

/// Final outcome of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Done(T),
    /// Permanent failure, not retried
    Fatal(FetchFailure),
    /// Last retryable failure once the ceiling was reached
    Exhausted(FetchFailure),
    Cancelled,
}

/// What the retry loop did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryTrace {
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub outcome: RetryOutcome<T>,
    pub trace: RetryTrace,
}

/// Run `operation` until it succeeds, fails fatally, exhausts the backoff
/// schedule or is cancelled
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    operation_name: &str,
    mut operation: F,
) -> Retried<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut schedule = BackoffSchedule::new(config);
    let mut trace = RetryTrace::default();

    loop {
        if cancel.is_cancelled() {
            return Retried {
                outcome: RetryOutcome::Cancelled,
                trace,
            };
        }

        trace.attempts += 1;
        if trace.attempts > 1 {
            tracing::debug!(
                operation = operation_name,
                attempt = trace.attempts,
                "Retrying"
            );
        }

        let failure = match operation().await {
            Attempt::Ok(value) => {
                return Retried {
                    outcome: RetryOutcome::Done(value),
                    trace,
                };
            }
            Attempt::Fatal(failure) => {
                tracing::error!(
                    operation = operation_name,
                    attempt = trace.attempts,
                    "Fatal failure: {}",
                    failure
                );
                return Retried {
                    outcome: RetryOutcome::Fatal(failure),
                    trace,
                };
            }
            Attempt::Retryable(failure) => failure,
        };

        let Some(units) = schedule.next() else {
            tracing::error!(
                operation = operation_name,
                attempts = trace.attempts,
                spent_units = schedule.spent_units(),
                "Giving up after retries: {}",
                failure
            );
            return Retried {
                outcome: RetryOutcome::Exhausted(failure),
                trace,
            };
        };

        let delay = Duration::from_millis(config.unit_ms.saturating_mul(units));
        tracing::warn!(
            operation = operation_name,
            attempt = trace.attempts,
            backoff_ms = delay.as_millis() as u64,
            "Soft failure ({}), will retry after backoff",
            failure
        );
        trace.delays.push(delay);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Retried {
                    outcome: RetryOutcome::Cancelled,
                    trace,
                };
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::mock::ScriptedTransport;
    use crate::gate::{ConnectionGate, FailureCause, FetchRequest};
    use std::sync::Arc;

    const URL: &str = "http://lyrics.test/song.html";

    fn config() -> RetryConfig {
        RetryConfig {
            unit_ms: 1000,
            ceiling_units: 500,
        }
    }

    fn gate_with(statuses: &[u16]) -> (ConnectionGate, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        for status in statuses {
            transport.respond(URL, *status, "body");
        }
        let gate = ConnectionGate::new(transport.clone(), &[408, 500, 503, 504]);
        (gate, transport)
    }

    #[test]
    fn test_schedule_doubles_under_ceiling() {
        let delays: Vec<u64> = BackoffSchedule::new(&config()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 128]);

        let small = RetryConfig {
            unit_ms: 1,
            ceiling_units: 8,
        };
        assert_eq!(BackoffSchedule::new(&small).collect::<Vec<_>>(), vec![1, 2, 4]);

        let none = RetryConfig {
            unit_ms: 1,
            ceiling_units: 1,
        };
        assert_eq!(BackoffSchedule::new(&none).count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_soft_failures_then_success() {
        let (gate, transport) = gate_with(&[503, 503, 503, 200]);
        let request = FetchRequest::get(URL);
        let cancel = CancellationToken::new();

        let retried =
            retry_with_backoff(&config(), &cancel, "fetch", || gate.attempt_request(&request)).await;

        assert!(matches!(retried.outcome, RetryOutcome::Done(ref r) if r.status == 200));
        assert_eq!(retried.trace.attempts, 4);
        assert_eq!(
            retried.trace.delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(transport.calls_to(URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let (gate, transport) = gate_with(&[404]);
        let request = FetchRequest::get(URL);
        let cancel = CancellationToken::new();

        let retried =
            retry_with_backoff(&config(), &cancel, "fetch", || gate.attempt_request(&request)).await;

        match retried.outcome {
            RetryOutcome::Fatal(failure) => assert_eq!(failure.cause, FailureCause::Status(404)),
            other => panic!("expected fatal, got {:?}", other),
        }
        assert_eq!(retried.trace.attempts, 1);
        assert!(retried.trace.delays.is_empty());
        assert_eq!(transport.calls_to(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_exhausts() {
        let (gate, _transport) = gate_with(&[503; 10]);
        let request = FetchRequest::get(URL);
        let cancel = CancellationToken::new();
        let config = RetryConfig {
            unit_ms: 10,
            ceiling_units: 8,
        };

        let retried =
            retry_with_backoff(&config, &cancel, "fetch", || gate.attempt_request(&request)).await;

        assert!(matches!(retried.outcome, RetryOutcome::Exhausted(_)));
        assert_eq!(retried.trace.attempts, 4);
        assert_eq!(retried.trace.delays.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let (gate, transport) = gate_with(&[503; 10]);
        let request = FetchRequest::get(URL);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let retried =
            retry_with_backoff(&config(), &cancel, "fetch", || gate.attempt_request(&request)).await;

        assert_eq!(retried.outcome, RetryOutcome::Cancelled);
        // Attempts at t=0 and t=1s; cancelled during the 2s sleep
        assert_eq!(transport.calls_to(URL), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let (gate, transport) = gate_with(&[200]);
        let request = FetchRequest::get(URL);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let retried =
            retry_with_backoff(&config(), &cancel, "fetch", || gate.attempt_request(&request)).await;

        assert_eq!(retried.outcome, RetryOutcome::Cancelled);
        assert_eq!(retried.trace.attempts, 0);
        assert_eq!(transport.total_calls(), 0);
    }
}
