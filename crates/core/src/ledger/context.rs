//! Execution context passed explicitly to every store call.
//!
//! A context is either detached (no unit of work is active, stores use a fresh
//! pooled connection) or bound to the transaction handle of the enclosing unit
//! of work. It also carries the caller's cancellation so that every store call
//! can give up as soon as the caller does.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::LedgerError;

/// Caller-owned cancellation: an explicit token plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A cancellation that only fires when [`Cancellation::cancel`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cancellation that also fires once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Time left before the deadline, zero once it has passed.
    ///
    /// `None` when there is no deadline. Stores use it to bound waits they
    /// cannot interrupt from the client side, such as row-lock waits.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancels every guarded call sharing this cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once canceled or past the deadline.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Runs `fut` unless the caller gives up first.
    ///
    /// When cancellation wins, `fut` is dropped (aborting any in-flight I/O)
    /// and `LedgerError::Canceled` is returned.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Canceled` or whatever `fut` returns.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        if self.is_canceled() {
            return Err(LedgerError::Canceled);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(LedgerError::Canceled),
            () = deadline => Err(LedgerError::Canceled),
            result = fut => result,
        }
    }
}

/// Explicit handle routing store calls to the right connection.
pub struct ExecutionContext<'a, Tx> {
    tx: Option<&'a Tx>,
    cancel: Cancellation,
}

impl<'a, Tx> ExecutionContext<'a, Tx> {
    /// No active unit of work.
    #[must_use]
    pub const fn detached(cancel: Cancellation) -> Self {
        Self { tx: None, cancel }
    }

    /// Inside the unit of work owning `tx`.
    #[must_use]
    pub const fn bound(tx: &'a Tx, cancel: Cancellation) -> Self {
        Self {
            tx: Some(tx),
            cancel,
        }
    }

    /// The active transaction handle, if any.
    #[must_use]
    pub const fn transaction(&self) -> Option<&'a Tx> {
        self.tx
    }

    /// Whether a unit of work is active.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.tx.is_some()
    }

    /// The caller's cancellation.
    #[must_use]
    pub const fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    /// Shorthand for `self.cancellation().guard(fut)`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Canceled` or whatever `fut` returns.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        self.cancel.guard(fut).await
    }
}

impl<Tx> Clone for ExecutionContext<'_, Tx> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx,
            cancel: self.cancel.clone(),
        }
    }
}

impl<Tx> fmt::Debug for ExecutionContext<'_, Tx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("bound", &self.is_bound())
            .field("cancel", &self.cancel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_passes_through_result() {
        let cancel = Cancellation::new();
        let value = cancel.guard(async { Ok::<_, LedgerError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_guard_rejects_already_canceled() {
        let cancel = Cancellation::new();
        cancel.cancel();
        assert!(cancel.is_canceled());

        let result = cancel.guard(async { Ok::<_, LedgerError>(()) }).await;
        assert!(matches!(result, Err(LedgerError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_deadline_interrupts_pending_future() {
        let cancel = Cancellation::with_timeout(Duration::from_millis(50));
        let result = cancel
            .guard(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, LedgerError>(())
            })
            .await;
        assert!(matches!(result, Err(LedgerError::Canceled)));
    }

    #[tokio::test]
    async fn test_cancel_from_another_task() {
        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = cancel
            .guard(std::future::pending::<Result<(), LedgerError>>())
            .await;
        assert!(matches!(result, Err(LedgerError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down_to_zero() {
        assert_eq!(Cancellation::new().remaining(), None);

        let cancel = Cancellation::with_timeout(Duration::from_millis(300));
        assert_eq!(cancel.remaining(), Some(Duration::from_millis(300)));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cancel.remaining(), Some(Duration::from_millis(200)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cancel.remaining(), Some(Duration::ZERO));
        assert!(cancel.is_canceled());
    }

    #[test]
    fn test_context_binding() {
        let tx = 5_u8;
        let detached = ExecutionContext::<u8>::detached(Cancellation::new());
        assert!(!detached.is_bound());

        let bound = ExecutionContext::bound(&tx, Cancellation::new());
        assert_eq!(bound.transaction(), Some(&5));
        assert!(bound.clone().is_bound());
    }
}
