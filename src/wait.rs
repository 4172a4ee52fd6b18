//! The polling primitive every element interaction is built on.
//!
//! A [`ConditionalWaiter`] turns an unreliable probe (one that may fail, or may report that its
//! condition does not hold yet) into a bounded wait. Transient failures are recorded as the
//! worker's *last error* and retried; when the timeout elapses the last recorded error is
//! returned as-is, since it usually names the real problem ("no such element"), and a
//! synthetic [`CmdError::WaitTimeout`] is returned only if no attempt ever failed.

use crate::error::CmdError;
use crate::wd::WorkerId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// The timeout used when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The pause between two attempts of the same wait.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(50);

/// The last failure observed by each worker.
///
/// Clones share the same table. Every worker only ever reads and writes its own slot.
#[derive(Clone, Debug, Default)]
pub struct LastErrors {
    slots: Arc<Mutex<HashMap<WorkerId, CmdError>>>,
}

impl LastErrors {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last failure recorded for `worker`, if any.
    pub fn get(&self, worker: &WorkerId) -> Option<CmdError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(worker)
            .cloned()
    }

    pub(crate) fn record(&self, worker: &WorkerId, e: &CmdError) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(worker.clone(), e.clone());
    }

    pub(crate) fn clear(&self, worker: &WorkerId) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(worker);
    }
}

/// Waits for conditions on behalf of one worker.
///
/// Retries are unlimited in number and bounded only by elapsed time. There is at least one
/// attempt, and the last attempt happens no earlier than the deadline. A probe that hangs is not
/// interrupted, so it can stretch a wait past its nominal timeout.
///
/// ```no_run
/// # use karpatium::{ConditionalWaiter, WorkerId};
/// # use std::time::Duration;
/// # async fn doc() -> Result<(), karpatium::error::CmdError> {
/// let waiter = ConditionalWaiter::new(WorkerId::single()).at_most(Duration::from_secs(3));
/// waiter
///     .for_true("`file downloaded` failed.", || async {
///         Ok(tokio::fs::metadata("report.csv").await.is_ok())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ConditionalWaiter {
    worker: WorkerId,
    last_errors: LastErrors,
    timeout: Duration,
    period: Duration,
}

impl ConditionalWaiter {
    /// A waiter for `worker` with its own last-error table.
    pub fn new(worker: WorkerId) -> Self {
        Self::with_registry(worker, LastErrors::new())
    }

    /// A waiter for `worker` that records failures in a shared table.
    pub fn with_registry(worker: WorkerId, last_errors: LastErrors) -> Self {
        ConditionalWaiter {
            worker,
            last_errors,
            timeout: DEFAULT_TIMEOUT,
            period: DEFAULT_PERIOD,
        }
    }

    /// Use a different timeout.
    pub fn at_most(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pause for `period` between attempts. A zero period only yields to the runtime.
    pub fn every(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// The current timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The current pause between attempts.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The worker this waiter acts for.
    pub fn worker(&self) -> &WorkerId {
        &self.worker
    }

    /// The last failure this worker observed while polling.
    pub fn last_error(&self) -> Option<CmdError> {
        self.last_errors.get(&self.worker)
    }

    /// Wait until `probe` reports `true`.
    ///
    /// Errors from the probe count as failed attempts. On timeout, the last such error is
    /// returned, or [`CmdError::WaitTimeout`] if the probe only ever reported `false`.
    pub async fn for_true<F, Fut>(&self, label: &str, mut probe: F) -> Result<(), CmdError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, CmdError>>,
    {
        self.poll(label, || {
            let attempt = probe();
            async move { Ok::<_, CmdError>(attempt.await?.then_some(())) }
        })
        .await
    }

    /// Wait until `probe` reports `false`.
    pub async fn for_false<F, Fut>(&self, label: &str, mut probe: F) -> Result<(), CmdError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, CmdError>>,
    {
        self.for_true(label, || {
            let attempt = probe();
            async move { Ok::<_, CmdError>(!attempt.await?) }
        })
        .await
    }

    /// Wait until `action` completes without an error.
    pub async fn for_no_exception<F, Fut>(&self, label: &str, action: F) -> Result<(), CmdError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), CmdError>>,
    {
        self.for_result(label, action).await
    }

    /// Wait until `probe` completes without an error, and return what it produced.
    pub async fn for_result<T, F, Fut>(&self, label: &str, mut probe: F) -> Result<T, CmdError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CmdError>>,
    {
        self.poll(label, || {
            let attempt = probe();
            async move { attempt.await.map(Some) }
        })
        .await
    }

    /// Like [`for_true`](Self::for_true), but a timeout is not an error.
    ///
    /// Returns whether the condition was met.
    pub async fn for_true_if_possible<F, Fut>(&self, label: &str, probe: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, CmdError>>,
    {
        self.swallow(label, self.for_true(label, probe).await).is_some()
    }

    /// Like [`for_false`](Self::for_false), but a timeout is not an error.
    pub async fn for_false_if_possible<F, Fut>(&self, label: &str, probe: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, CmdError>>,
    {
        self.swallow(label, self.for_false(label, probe).await).is_some()
    }

    /// Like [`for_no_exception`](Self::for_no_exception), but a timeout is not an error.
    pub async fn for_no_exception_if_possible<F, Fut>(&self, label: &str, action: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), CmdError>>,
    {
        self.swallow(label, self.for_no_exception(label, action).await).is_some()
    }

    /// Like [`for_result`](Self::for_result), but a timeout yields `None`.
    pub async fn for_result_if_possible<T, F, Fut>(&self, label: &str, probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CmdError>>,
    {
        self.swallow(label, self.for_result(label, probe).await)
    }

    fn swallow<T>(&self, label: &str, res: Result<T, CmdError>) -> Option<T> {
        match res {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(worker = %self.worker, error = %e, "{} (ignored)", label);
                None
            }
        }
    }

    /// The loop behind every wait.
    ///
    /// An attempt yields `Ok(Some(_))` on success, `Ok(None)` if the condition does not hold yet,
    /// and `Err(_)` if it failed.
    async fn poll<T, F, Fut>(&self, label: &str, mut attempt: F) -> Result<T, CmdError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, CmdError>>,
    {
        self.last_errors.clear(&self.worker);
        let mut last: Option<CmdError> = None;
        let started = Instant::now();

        loop {
            match attempt().await {
                Ok(Some(v)) => return Ok(v),
                Ok(None) => {}
                Err(e) if !e.is_transient() => {
                    self.last_errors.record(&self.worker, &e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::trace!(worker = %self.worker, error = %e, "{} attempt failed", label);
                    self.last_errors.record(&self.worker, &e);
                    last = Some(e);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                break;
            }

            let pause = self.period.min(self.timeout - elapsed);
            if pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(pause).await;
            }
        }

        tracing::error!(
            worker = %self.worker,
            "{} Timeout of '{}' seconds reached.",
            label,
            self.timeout.as_secs_f64()
        );

        Err(last.unwrap_or_else(|| CmdError::WaitTimeout {
            label: label.to_string(),
            timeout: self.timeout,
        }))
    }
}
