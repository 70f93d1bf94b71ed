use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use candle_sync_core::{CancellationToken, LeasePolicy, SeriesKey, SyncError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<SeriesKey, Arc<AsyncMutex<()>>>>>;

/// Exclusive right to write one series, released on drop.
///
/// Releasing the last reference to a series slot removes it from the
/// registry.
pub struct SyncLease {
    series: SeriesKey,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl SyncLease {
    /// Series this lease covers.
    #[must_use]
    pub const fn series(&self) -> &SeriesKey {
        &self.series
    }
}

impl Drop for SyncLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        // Waiters and other holders keep their own clone of the slot.
        if slots
            .get(&self.series)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.series);
        }
    }
}

impl std::fmt::Debug for SyncLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLease")
            .field("series", &self.series)
            .finish_non_exhaustive()
    }
}

/// In-process registry of series leases.
///
/// One async mutex per series; waiters queue FIFO behind the holder. A slot
/// lives only while some run holds or waits for it.
#[derive(Default)]
pub struct LeaseRegistry {
    slots: Slots,
}

impl LeaseRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, series: &SeriesKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().expect("mutex poisoned");
        Arc::clone(slots.entry(series.clone()).or_default())
    }

    /// Take the lease of `series` under `policy`.
    ///
    /// A free lease is taken without looking at `cancel`; only the wait
    /// behind another holder is cancellable.
    ///
    /// # Errors
    /// Returns `LeaseHeld` when the lease is taken and `policy` is `Reject`,
    /// and `Cancelled` when `cancel` fires while waiting.
    ///
    /// # Panics
    /// Panics if the registry mutex is poisoned.
    pub async fn acquire(
        &self,
        series: &SeriesKey,
        policy: LeasePolicy,
        cancel: &CancellationToken,
    ) -> Result<SyncLease, SyncError> {
        let slot = self.slot(series);
        let guard = match Arc::clone(&slot).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) if policy == LeasePolicy::Reject => {
                return Err(SyncError::LeaseHeld {
                    pair: series.pair.clone(),
                    timeframe_minutes: series.timeframe_minutes,
                });
            }
            Err(_) => tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SyncError::Cancelled),
                guard = slot.lock_owned() => guard,
            },
        };
        Ok(SyncLease {
            series: series.clone(),
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        })
    }

    /// Number of series currently held or waited on.
    ///
    /// # Panics
    /// Panics if the registry mutex is poisoned.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots.lock().expect("mutex poisoned").len()
    }

    /// Returns true if a run currently holds the lease of `series`.
    ///
    /// # Panics
    /// Panics if the registry mutex is poisoned.
    #[must_use]
    pub fn is_held(&self, series: &SeriesKey) -> bool {
        let slots = self.slots.lock().expect("mutex poisoned");
        slots.get(series).is_some_and(|slot| slot.try_lock().is_err())
    }
}
