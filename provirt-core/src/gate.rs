//! Admission control for hypervisor-bound operations.
//!
//! The hypervisor serializes long-running operations (clone, resize, start,
//! stop) internally; issuing too many of them at once makes requests fail or
//! leaves the target half-applied. [`AdmissionGate`] caps how many operations
//! are in flight at any moment. Callers hold an [`OperationPermit`] for the
//! duration of the hypervisor call; the permit frees its slot when dropped,
//! so every exit path, early error returns included, gives the slot back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};

/// Bounds the number of concurrently admitted hypervisor operations.
///
/// One gate is created per provider session and lives as long as the
/// session does; the limit is fixed at construction. The gate only limits
/// concurrency, it does not queue or execute work. Waiters are woken in
/// FIFO order, so no caller starves as long as every admitted operation
/// eventually finishes.
pub struct AdmissionGate {
    limit: usize,
    permits: Arc<Semaphore>,
}

/// One unit of admitted concurrency. Dropping the permit frees the slot.
#[derive(Debug)]
pub struct OperationPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate admitting at most `limit` concurrent operations.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Wait until a slot is free, then claim it.
    ///
    /// There is no deadline: a caller that never drops its permit will
    /// eventually starve everyone else. Use
    /// [`acquire_timeout`](AdmissionGate::acquire_timeout) where a bounded
    /// wait is needed.
    pub async fn acquire(&self) -> Result<OperationPermit> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal {
                message: "admission gate semaphore closed".to_string(),
            })?;
        debug!(
            "operation admitted ({}/{} slots in use)",
            self.in_use(),
            self.limit
        );
        Ok(OperationPermit { _permit: permit })
    }

    /// Like [`acquire`](AdmissionGate::acquire), but gives up after
    /// `duration`.
    pub async fn acquire_timeout(&self, duration: Duration) -> Result<OperationPermit> {
        match timeout(duration, self.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: "acquire admission permit".to_string(),
                duration,
            }),
        }
    }

    /// Claim a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<OperationPermit> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| OperationPermit { _permit: permit })
    }

    /// Maximum number of concurrently admitted operations.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of permits currently held. Never exceeds
    /// [`limit`](AdmissionGate::limit).
    pub fn in_use(&self) -> usize {
        self.limit - self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn permit_count_never_exceeds_limit() {
        let gate = Arc::new(AdmissionGate::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let gate = gate.clone();
                let active = active.clone();
                let high_water = high_water.clone();
                tokio::spawn(async move {
                    let _permit = gate.acquire().await.unwrap();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in join_all(tasks).await {
            task.unwrap();
        }

        assert!(high_water.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn all_waiters_eventually_admitted() {
        let gate = Arc::new(AdmissionGate::new(2));
        let completed = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let gate = gate.clone();
                let completed = completed.clone();
                tokio::spawn(async move {
                    let permit = gate.acquire().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    drop(permit);
                    completed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in join_all(tasks).await {
            task.unwrap();
        }

        assert_eq!(completed.load(Ordering::SeqCst), 5);
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn permit_released_when_guard_drops() {
        let gate = AdmissionGate::new(1);
        {
            let _permit = gate.acquire().await.unwrap();
            assert_eq!(gate.in_use(), 1);
            assert!(gate.try_acquire().is_none());
        }
        assert_eq!(gate.in_use(), 0);
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_timeout_expires_while_gate_is_full() {
        let gate = AdmissionGate::new(1);
        let _held = gate.acquire().await.unwrap();

        let err = gate
            .acquire_timeout(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(gate.in_use(), 1);
    }
}
