//! Admission control for outstanding song fetches
//!
//! Bounds the number of concurrently in-flight operations with a FIFO-fair
//! Tokio semaphore. This is not a rate limiter: it caps how many fetches are
//! outstanding at once, not how many start per second.
//!
//! ```ignore
//! let admission = AdmissionController::new(25)?;
//! let _permit = admission.acquire().await?;
//! // fetch happens here; the slot is returned when `_permit` drops
//! ```

use songmap_common::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent fetches
pub const DEFAULT_PERMITS: usize = 25;

/// Admission errors
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Admission controller closed")]
    Closed,
}

/// Counting semaphore shared by every entry of a pipeline run
///
/// Cloning yields another handle to the same permit pool.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl AdmissionController {
    /// Create a controller with a fixed number of permits
    ///
    /// Zero permits would starve every caller and is rejected.
    pub fn new(permits: usize) -> Result<Self> {
        if permits == 0 {
            return Err(Error::Config("admission permits must be > 0".to_string()));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            capacity: permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wait for a free slot
    ///
    /// Waiters are woken in arrival order. The slot is released when the
    /// returned permit is dropped, on every exit path.
    pub async fn acquire(&self) -> std::result::Result<AdmissionPermit, AdmissionError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AdmissionError::Closed)?;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        Ok(AdmissionPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously held permits observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// A held admission slot, returned to the pool on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[test]
    fn test_new_controller() {
        let admission = AdmissionController::new(DEFAULT_PERMITS).unwrap();
        assert_eq!(admission.capacity(), 25);
        assert_eq!(admission.available(), 25);
        assert_eq!(admission.in_flight(), 0);
        assert_eq!(admission.peak_in_flight(), 0);
    }

    #[test]
    fn test_zero_permits_rejected() {
        let result = AdmissionController::new(0);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_acquire_releases_on_drop() {
        let admission = AdmissionController::new(2).unwrap();

        {
            let _p1 = admission.acquire().await.unwrap();
            assert_eq!(admission.available(), 1);

            {
                let _p2 = admission.acquire().await.unwrap();
                assert_eq!(admission.available(), 0);
                assert_eq!(admission.in_flight(), 2);
            }

            assert_eq!(admission.available(), 1);
            assert_eq!(admission.in_flight(), 1);
        }

        assert_eq!(admission.available(), 2);
        assert_eq!(admission.in_flight(), 0);
        assert_eq!(admission.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_pool() {
        let admission = AdmissionController::new(1).unwrap();
        let other = admission.clone();

        let _held = admission.acquire().await.unwrap();
        assert_eq!(other.available(), 0);
        assert_eq!(other.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_waiters_woken_in_fifo_order() {
        let admission = AdmissionController::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let gate = admission.acquire().await.unwrap();

        let mut handles = Vec::new();
        for id in 0..4 {
            let admission = admission.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _permit = admission.acquire().await.unwrap();
                order.lock().await.push(id);
            }));
            // Let the task reach the wait queue before spawning the next one
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        drop(gate);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_release_on_error_path() {
        let admission = AdmissionController::new(1).unwrap();

        async fn failing(admission: &AdmissionController) -> std::result::Result<(), String> {
            let _permit = admission.acquire().await.map_err(|e| e.to_string())?;
            Err("fetch failed".to_string())
        }

        assert!(failing(&admission).await.is_err());
        assert_eq!(admission.available(), 1);
        assert_eq!(admission.in_flight(), 0);
    }
}
