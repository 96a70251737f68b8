//! Concurrency limit for historical-metrics requests.
//!
//! Google Ads rate-limits keyword planning calls per developer token, so
//! forecast chunks take a permit before calling out. The default is one
//! request in flight.
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = ForecastScheduler::new(2);
//! let permit = scheduler.acquire().await?;
//! // call the API while holding the permit
//! drop(permit);
//! ```

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// ForecastScheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Semaphore-backed limit on concurrent metrics requests.
#[derive(Clone)]
pub struct ForecastScheduler {
    sem: Arc<Semaphore>,
    max: usize,
}

impl ForecastScheduler {
    /// A limit of 0 is treated as 1.
    pub fn new(max_concurrent: usize) -> Self {
        let max = max_concurrent.max(1);
        Self {
            sem: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Waits for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<ForecastPermit, AppError> {
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("Forecast scheduler was closed".to_string()))?;
        Ok(ForecastPermit { _permit: permit })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max
    }
}

/// An occupied request slot.
pub struct ForecastPermit {
    _permit: OwnedSemaphorePermit,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
