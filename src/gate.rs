//! Admission control for rendering work.
//!
//! The [`AdmissionGate`] hands out a fixed number of [`AdmissionSlot`]s.
//! A conversion must hold a slot before it may open a render session, so
//! the number of live sessions never exceeds the gate's capacity.
//!
//! # Slot Lifecycle
//!
//! ```text
//! acquire() ──▶ AdmissionSlot ──▶ render ──▶ drop / release()
//!     ▲                                            │
//!     └────────────── permit returned ◀────────────┘
//! ```
//!
//! Slots return to the gate exactly once, on every exit path, because the
//! only way to give one back is to drop it. A waiter whose future is dropped
//! (caller timeout or disconnect) simply leaves the queue without taking a
//! permit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{ConversionError, Result};

/// Live view of the gate's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStatus {
    /// Total number of slots.
    pub max: usize,

    /// Slots currently held by conversions.
    pub in_use: usize,

    /// Slots free right now.
    pub available: usize,
}

impl GateStatus {
    /// Whether a request arriving now would be admitted without waiting.
    #[inline]
    pub fn has_available(&self) -> bool {
        self.available > 0
    }

    /// Whether every slot is held.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.available == 0
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GateStatus {{ max: {}, in_use: {}, available: {} }}",
            self.max, self.in_use, self.available
        )
    }
}

/// Bounded-concurrency gate backed by a tokio semaphore.
///
/// Cloning is cheap and every clone shares the same permits.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl AdmissionGate {
    /// Create a gate with `max` slots.
    pub fn new(max: usize) -> Self {
        log::debug!("🚦 Creating admission gate with {} slots", max);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Wait until a slot is free.
    ///
    /// Never fails on its own; dropping the returned future abandons the
    /// wait without consuming a permit.
    pub async fn acquire(&self) -> Result<AdmissionSlot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| ConversionError::Internal(format!("admission gate closed: {}", e)))?;

        log::trace!("🎟️ Slot acquired ({} left)", self.semaphore.available_permits());
        Ok(AdmissionSlot { _permit: permit })
    }

    /// Wait for a slot, giving up at `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::AdmissionTimeout`] when the deadline
    /// passes first. The waited duration is carried in the error.
    pub async fn acquire_until(&self, deadline: Instant) -> Result<AdmissionSlot> {
        let started = Instant::now();

        match tokio::time::timeout_at(deadline.into(), self.acquire()).await {
            Ok(slot) => slot,
            Err(_) => {
                let waited = started.elapsed();
                log::warn!(
                    "⏳ No rendering slot freed within {:?} ({})",
                    waited,
                    self.status()
                );
                Err(ConversionError::AdmissionTimeout(waited))
            }
        }
    }

    /// Wait for a slot for at most `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<AdmissionSlot> {
        self.acquire_until(Instant::now() + timeout).await
    }

    /// Current occupancy.
    pub fn status(&self) -> GateStatus {
        let available = self.semaphore.available_permits();
        GateStatus {
            max: self.max,
            in_use: self.max.saturating_sub(available),
            available,
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.max
    }
}

/// Permission to run one rendering task.
///
/// Returned to the gate when dropped.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionSlot {
    /// Give the slot back explicitly.
    ///
    /// Equivalent to dropping it; consuming `self` makes a second release
    /// impossible.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        log::trace!("🎟️ Slot released");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let status = GateStatus {
            max: 4,
            in_use: 1,
            available: 3,
        };
        assert_eq!(
            status.to_string(),
            "GateStatus { max: 4, in_use: 1, available: 3 }"
        );
        assert!(status.has_available());
        assert!(!status.is_saturated());
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let gate = AdmissionGate::new(2);

        let first = gate.acquire().await.unwrap();
        let second = gate.acquire().await.unwrap();
        assert_eq!(gate.status().in_use, 2);
        assert!(gate.status().is_saturated());

        first.release();
        assert_eq!(gate.status().available, 1);

        drop(second);
        assert_eq!(gate.status().available, 2);
    }

    #[tokio::test]
    async fn test_acquire_until_times_out_when_saturated() {
        let gate = AdmissionGate::new(1);
        let _held = gate.acquire().await.unwrap();

        let result = gate.acquire_timeout(Duration::from_millis(50)).await;

        assert!(matches!(result, Err(ConversionError::AdmissionTimeout(_))));
        assert_eq!(gate.status().in_use, 1, "Timed-out waiter must not take a slot");
    }

    /// A waiter that gives up leaves the permit count untouched.
    #[tokio::test]
    async fn test_abandoned_wait_does_not_leak() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        let _ = waiter.await;

        drop(held);
        assert_eq!(gate.status().available, 1);
    }

    #[tokio::test]
    async fn test_waiter_admitted_after_release() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire_timeout(Duration::from_secs(2)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        let slot = waiter.await.unwrap();
        assert!(slot.is_ok());
    }
}
