//! Per-request context
//!
//! Carries the request's trace context, an optional deadline and a
//! cancellation signal. Child contexts share the parent's signal and never
//! outlive the parent's deadline.

use std::future::Future;
use std::time::Duration;

use opentelemetry::Context;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ResolveError;

/// Bound applied to every outbound provider call
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RequestContext {
    trace: Context,
    deadline: Option<Instant>,
    cancelled: watch::Receiver<bool>,
}

/// Cancels every context derived from the one it was created with
#[derive(Debug)]
pub struct Canceller(watch::Sender<bool>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl RequestContext {
    /// Create a cancellable context carrying `trace`.
    ///
    /// The HTTP handlers only use [`RequestContext::detached`], since axum
    /// drops the request future on disconnect. An explicit [`Canceller`] is
    /// for embedders driving the pipeline themselves and for tests.
    pub fn new(trace: Context) -> (Self, Canceller) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            trace,
            deadline: None,
            cancelled: rx,
        };
        (ctx, Canceller(tx))
    }

    /// Context that can only end through its deadline
    pub fn detached(trace: Context) -> Self {
        Self::new(trace).0
    }

    /// Child context whose deadline is the earlier of the parent's and `deadline`
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            trace: self.trace.clone(),
            deadline: Some(deadline),
            cancelled: self.cancelled.clone(),
        }
    }

    /// Child context bounded by `timeout` from now
    #[must_use]
    pub fn bounded(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn trace_context(&self) -> &Context {
        &self.trace
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once cancelled or past the deadline
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        let mut signal = self.cancelled.clone();
        let cancel = async move {
            let closed = signal.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                // Canceller dropped without firing, only the deadline can end us.
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = cancel => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => cancel.await,
        }
    }

    /// Run `fut` unless the context ends first, in which case it is dropped.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ResolveError>
    where
        F: Future<Output = Result<T, ResolveError>>,
    {
        if self.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancelled() => Err(ResolveError::Cancelled),
            result = fut => result,
        }
    }
}
