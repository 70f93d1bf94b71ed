use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::SyncError;

/// Budget class of an upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallClass {
    /// Unauthenticated endpoints.
    #[default]
    Public,
    /// Authenticated endpoints with their own, usually higher, budget.
    Private,
}

/// Gate enforcing a sustained request budget shared by every series.
///
/// Implementations must be FIFO-fair and must never permit a burst beyond
/// the configured capacity. Dropping an `acquire` future removes the caller
/// from the queue without consuming budget.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Suspend until one call of `class` is permitted, then consume it.
    async fn acquire(&self, class: CallClass);

    /// Consume one call of `class` if immediately available.
    ///
    /// # Errors
    /// Returns `RateLimitExceeded` with the expected wait when no budget is left.
    fn try_acquire(&self, class: CallClass) -> Result<(), SyncError>;

    /// Like [`acquire`](Self::acquire), but gives up when `cancel` fires.
    ///
    /// # Errors
    /// Returns `Cancelled` if the token fired first; no budget is consumed then.
    async fn acquire_cancellable(
        &self,
        class: CallClass,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SyncError::Cancelled),
            () = self.acquire(class) => Ok(()),
        }
    }
}
