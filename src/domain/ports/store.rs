use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::entities::alert::{Alert, AlertStatus};
use crate::domain::entities::attempt::NotificationAttempt;
use crate::domain::entities::device::{Device, DeviceCandidate, DeviceStatus};
use crate::domain::entities::maintenance::MaintenanceRecord;
use crate::domain::entities::rule::AlertRule;
use crate::domain::entities::sample::StatusSample;
use crate::domain::entities::summary::{ConsumptionSummary, SummaryPeriod};
use crate::domain::entities::supply::SupplyLevel;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    ReadFailed(String),
    #[error("storage write failed: {0}")]
    WriteFailed(String),
    #[error("entry not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

pub trait DeviceStore: Send + Sync {
    /// Insert a device, returning it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a device with the same address
    /// already exists, or `WriteFailed` on storage failure.
    fn add_device(&self, device: &Device) -> Result<Device, StoreError>;

    /// Retrieve a device by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such device exists.
    fn get_device(&self, id: i64) -> Result<Device, StoreError>;

    /// Retrieve all devices.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn list_devices(&self) -> Result<Vec<Device>, StoreError>;

    /// Retrieve devices flagged for monitoring.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn monitored_devices(&self) -> Result<Vec<Device>, StoreError>;

    /// Update a device's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn set_device_status(&self, id: i64, status: DeviceStatus) -> Result<(), StoreError>;

    /// Record the moment a device last answered a poll.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// True if a device with this address is already registered.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn address_known(&self, address: &str) -> Result<bool, StoreError>;

    /// Record a discovered but unregistered device, replacing any
    /// previous candidate at the same address.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn upsert_candidate(&self, candidate: &DeviceCandidate) -> Result<(), StoreError>;

    /// Retrieve all discovery candidates.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn list_candidates(&self) -> Result<Vec<DeviceCandidate>, StoreError>;
}

pub trait SampleStore: Send + Sync {
    /// Persist one poll result.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn save_sample(&self, sample: &StatusSample) -> Result<(), StoreError>;

    /// Most recent sample for a device, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn latest_sample(&self, device_id: i64) -> Result<Option<StatusSample>, StoreError>;

    /// Samples for a device recorded within `[from, to)`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn samples_between(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatusSample>, StoreError>;

    /// Delete samples older than `cutoff`, returning the count removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

pub trait SupplyStore: Send + Sync {
    /// Upsert the current level of one supply on one device.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn save_supply(&self, supply: &SupplyLevel) -> Result<(), StoreError>;

    /// Current supply levels for a device.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn supplies_for_device(&self, device_id: i64) -> Result<Vec<SupplyLevel>, StoreError>;
}

pub trait RuleStore: Send + Sync {
    /// Insert a rule, returning it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn add_rule(&self, rule: &AlertRule) -> Result<AlertRule, StoreError>;

    /// Retrieve all rules.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError>;

    /// Retrieve rules currently enabled for evaluation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn active_rules(&self) -> Result<Vec<AlertRule>, StoreError>;

    /// Enable or disable a rule.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such rule exists.
    fn set_rule_active(&self, id: i64, active: bool) -> Result<(), StoreError>;
}

pub trait AlertStore: Send + Sync {
    /// Insert an alert, returning it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn add_alert(&self, alert: &Alert) -> Result<Alert, StoreError>;

    /// Retrieve an alert by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such alert exists.
    fn get_alert(&self, id: i64) -> Result<Alert, StoreError>;

    /// Most recent alerts, newest first, up to `count`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn recent_alerts(&self, count: usize) -> Result<Vec<Alert>, StoreError>;

    /// Alerts currently in the given status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn alerts_with_status(&self, status: AlertStatus) -> Result<Vec<Alert>, StoreError>;

    /// Count of alerts created by `rule_id` at or after `since`,
    /// regardless of device. Drives cooldown suppression.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn count_alerts_for_rule_since(
        &self,
        rule_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Non-terminal alerts that have no delivery attempts recorded.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn alerts_without_attempts(&self) -> Result<Vec<Alert>, StoreError>;

    /// Persist lifecycle fields after a state transition.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such alert exists.
    fn update_alert(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Delete resolved and closed alerts older than `cutoff`, returning
    /// the count removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn delete_finished_alerts_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

pub trait AttemptStore: Send + Sync {
    /// Insert a delivery attempt, returning it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn add_attempt(&self, attempt: &NotificationAttempt)
        -> Result<NotificationAttempt, StoreError>;

    /// Pending attempts whose failure count is below `max_attempts`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn pending_attempts(&self, max_attempts: u32) -> Result<Vec<NotificationAttempt>, StoreError>;

    /// Attempts recorded for one alert.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn attempts_for_alert(&self, alert_id: i64) -> Result<Vec<NotificationAttempt>, StoreError>;

    /// Persist status, failure count, and timestamps after a send.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such attempt exists.
    fn update_attempt(&self, attempt: &NotificationAttempt) -> Result<(), StoreError>;
}

pub trait MaintenanceStore: Send + Sync {
    /// Insert a maintenance record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn add_record(&self, record: &MaintenanceRecord) -> Result<(), StoreError>;

    /// When the device last received preventive service, if ever.
    /// Repairs, inspections and supply replacements do not count.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn last_maintenance(&self, device_id: i64) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Read access to the print-queue table maintained by the spooler
/// integration. Only the backlog count feeds monitoring.
pub trait JobStore: Send + Sync {
    /// Number of jobs queued or printing on a device right now.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn active_job_count(&self, device_id: i64) -> Result<u32, StoreError>;
}

pub trait SummaryStore: Send + Sync {
    /// Upsert the summary for `(device, period, period_start)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn save_summary(&self, summary: &ConsumptionSummary) -> Result<(), StoreError>;

    /// Summaries for a device over a period type, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn summaries_for_device(
        &self,
        device_id: i64,
        period: SummaryPeriod,
    ) -> Result<Vec<ConsumptionSummary>, StoreError>;

    /// True if a summary already exists for `(device, period, start)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read operation fails.
    fn summary_exists(
        &self,
        device_id: i64,
        period: SummaryPeriod,
        period_start: NaiveDate,
    ) -> Result<bool, StoreError>;
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::ReadFailed("disk I/O".to_string());
        assert_eq!(err.to_string(), "storage read failed: disk I/O");

        let err = StoreError::Conflict("device 10.0.0.5 already registered".to_string());
        assert_eq!(
            err.to_string(),
            "conflict: device 10.0.0.5 already registered"
        );
    }
}
