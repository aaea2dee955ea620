//! Circuit breaker guarding a single remote call-site.
//!
//! ```text
//! CLOSED ──(max_failures consecutive failures)──► OPEN
//!   ▲                                              │
//!   │                                (reset_timeout elapsed,
//!   │                                 next caller becomes the probe)
//!   │                                              ▼
//!   └────────────(probe succeeds)─────────── HALF_OPEN ──(probe fails)──► OPEN
//! ```
//!
//! State lives behind a `std::sync::Mutex` that is only held while deciding
//! and recording a transition, never across the guarded call's `.await`.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker. Values below 1 behave as 1.
    pub max_failures: u32,
    /// How long the breaker stays open before letting a probe through.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Where a breaker stands in its CLOSED, OPEN, HALF_OPEN cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls pass through and failures are counted.
    #[default]
    Closed,
    /// Calls are rejected without being made.
    Open,
    /// One trial call is in flight; others are rejected until it settles.
    HalfOpen,
}

impl CircuitState {
    /// Wire name, as serialized and shown by the health endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by a guarded call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// Rejected without invoking the call.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The call ran and returned this error.
    #[error(transparent)]
    Inner(E),
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug, Default)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Circuit breaker for one protected call-site.
///
/// Share it by reference (or `Arc`) between every caller of the same
/// dependency; each caller then sees and feeds the same failure count.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a CLOSED breaker. `name` identifies it in logs and errors.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Thresholds given at construction.
    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Current state. An OPEN breaker whose timeout has elapsed still reports
    /// OPEN until the next call turns it HALF_OPEN.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// State and failure bookkeeping, read under a single lock.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure: inner.last_failure,
        }
    }

    /// Runs `op` through the breaker, counting every error as a failure.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_classified(op, |_| true).await
    }

    /// Runs `op` through the breaker.
    ///
    /// `is_failure` decides which errors count against the breaker. An error
    /// it rejects is passed through like any other, but the breaker records
    /// the round trip as healthy.
    pub async fn execute_classified<T, E, F, Fut, C>(
        &self,
        op: F,
        is_failure: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let permit = self.acquire()?;

        match op().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) => {
                if is_failure(&err) {
                    permit.fail();
                } else {
                    permit.succeed();
                }
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn acquire<E>(&self) -> Result<Permit<'_>, BreakerError<E>> {
        let mut inner = self.lock();
        let state = inner.state;
        let probe = match state {
            CircuitState::Closed => false,
            CircuitState::Open if self.reset_elapsed(&inner) => {
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                tracing::info!(breaker = %self.name, "circuit breaker half-open, probing");
                true
            }
            CircuitState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                true
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                drop(inner);
                metrics::counter!("circuit_breaker_rejections_total", "breaker" => self.name.clone())
                    .increment(1);
                tracing::debug!(breaker = %self.name, "call rejected by open circuit breaker");
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                });
            }
        };

        Ok(Permit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    fn reset_elapsed(&self, inner: &BreakerInner) -> bool {
        inner
            .last_failure
            .is_none_or(|at| at.elapsed() >= self.config.reset_timeout)
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.lock();
        if probe {
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
            inner.last_failure = None;
            inner.probe_in_flight = false;
            tracing::info!(breaker = %self.name, "circuit breaker closed");
        } else if inner.state == CircuitState::Closed {
            inner.failure_count = 0;
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut inner = self.lock();
        if probe {
            inner.state = CircuitState::Open;
            inner.last_failure = Some(Instant::now());
            inner.probe_in_flight = false;
            tracing::warn!(breaker = %self.name, "circuit breaker probe failed, reopened");
            return;
        }

        // Late results from calls admitted before the breaker opened do not
        // move an OPEN or HALF_OPEN breaker.
        if inner.state != CircuitState::Closed {
            return;
        }

        inner.failure_count += 1;
        if inner.failure_count >= self.config.max_failures.max(1) {
            inner.state = CircuitState::Open;
            inner.last_failure = Some(Instant::now());
            let failures = inner.failure_count;
            drop(inner);

            metrics::counter!("circuit_breaker_opened_total", "breaker" => self.name.clone())
                .increment(1);
            tracing::warn!(breaker = %self.name, failures, "circuit breaker opened");
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to run one guarded call.
///
/// A probe permit dropped without an outcome (the caller was cancelled)
/// reopens the breaker so the next caller can probe again.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.on_failure(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn breaker(max_failures: u32, reset_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                max_failures,
                reset_timeout: Duration::from_millis(reset_ms),
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        breaker.execute(|| async { Err("boom") }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, BreakerError<&'static str>> {
        breaker.execute(|| async { Ok(7) }).await
    }

    #[tokio::test]
    async fn success_keeps_breaker_closed() {
        let breaker = breaker(3, 1000);
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn failures_below_threshold_stay_closed() {
        let breaker = breaker(3, 1000);
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 2);
        assert!(snapshot.last_failure.is_none());
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let breaker = breaker(3, 1000);
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        succeed(&breaker).await.unwrap();
        fail(&breaker).await.unwrap_err();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn opens_after_max_failures_and_rejects_without_calling() {
        let breaker = breaker(2, 1000);
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.snapshot().last_failure.is_some());

        let calls = AtomicU32::new(0);
        let result = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;

        assert_eq!(
            result,
            Err(BreakerError::Open {
                name: "test".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_probe_closes_breaker() {
        let breaker = breaker(1, 1000);
        fail(&breaker).await.unwrap_err();

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(matches!(
            succeed(&breaker).await,
            Err(BreakerError::Open { .. })
        ));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), 7);

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert!(snapshot.last_failure.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens_with_fresh_timestamp() {
        let breaker = breaker(1, 1000);
        fail(&breaker).await.unwrap_err();
        let opened_at = breaker.snapshot().last_failure.unwrap();

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.last_failure.unwrap() > opened_at);

        // The refreshed timestamp restarts the open window.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(matches!(
            succeed(&breaker).await,
            Err(BreakerError::Open { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_one_probe_while_half_open() {
        let breaker = breaker(1, 1000);
        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_millis(1000)).await;

        let (release_probe, probe_gate) = tokio::sync::oneshot::channel::<()>();
        let probe_calls = AtomicU32::new(0);

        let probe = breaker.execute(|| async {
            probe_calls.fetch_add(1, Ordering::SeqCst);
            probe_gate.await.ok();
            Ok::<_, &str>(1)
        });
        let others = async {
            tokio::task::yield_now().await;
            assert_eq!(breaker.state(), CircuitState::HalfOpen);
            let second = succeed(&breaker).await;
            let third = succeed(&breaker).await;
            release_probe.send(()).ok();
            (second, third)
        };

        let (probe_result, (second, third)) = tokio::join!(probe, others);

        assert_eq!(probe_result.unwrap(), 1);
        assert!(matches!(second, Err(BreakerError::Open { .. })));
        assert!(matches!(third, Err(BreakerError::Open { .. })));
        assert_eq!(probe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_probe_reopens_breaker() {
        let breaker = breaker(1, 1000);
        fail(&breaker).await.unwrap_err();
        tokio::time::advance(Duration::from_millis(1000)).await;

        let probe = breaker.execute(std::future::pending::<Result<(), &str>>);
        let timed_out = tokio::time::timeout(Duration::from_millis(10), probe).await;
        assert!(timed_out.is_err());

        assert_eq!(breaker.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn classified_errors_do_not_count_as_failures() {
        let breaker = breaker(1, 1000);

        let result: Result<(), _> = breaker
            .execute_classified(|| async { Err("declined") }, |e| *e != "declined")
            .await;
        assert_eq!(result, Err(BreakerError::Inner("declined")));
        assert_eq!(breaker.state(), CircuitState::Closed);

        let result: Result<(), _> = breaker
            .execute_classified(|| async { Err("down") }, |e| *e != "declined")
            .await;
        assert_eq!(result, Err(BreakerError::Inner("down")));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn zero_threshold_behaves_as_one() {
        let breaker = breaker(0, 1000);
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
