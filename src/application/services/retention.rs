use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::ports::store::{AlertStore, SampleStore, StoreError};

/// Counts of rows removed by one cleanup pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanupResult {
    pub samples_removed: u64,
    pub alerts_removed: u64,
}

/// Prunes history past the retention window: old status samples, and
/// resolved or closed alerts. Open alerts are never touched, whatever
/// their age.
#[derive(Clone)]
pub struct CleanupService {
    samples: Arc<dyn SampleStore>,
    alerts: Arc<dyn AlertStore>,
    retention_days: u32,
}

impl CleanupService {
    #[must_use]
    pub fn new(samples: Arc<dyn SampleStore>, alerts: Arc<dyn AlertStore>, retention_days: u32) -> Self {
        Self {
            samples,
            alerts,
            retention_days,
        }
    }

    /// # Errors
    ///
    /// Returns `StoreError` if either delete fails.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<CleanupResult, StoreError> {
        let cutoff = now - Duration::days(i64::from(self.retention_days));
        let result = CleanupResult {
            samples_removed: self.samples.delete_samples_before(cutoff)?,
            alerts_removed: self.alerts.delete_finished_alerts_before(cutoff)?,
        };
        if result.samples_removed > 0 || result.alerts_removed > 0 {
            tracing::info!(
                "cleanup: removed {} sample(s) and {} finished alert(s) older than {} day(s)",
                result.samples_removed,
                result.alerts_removed,
                self.retention_days
            );
        }
        Ok(result)
    }
}
