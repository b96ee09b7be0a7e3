use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::entities::alert::{Alert, AlertStatus};
use crate::domain::entities::attempt::{AttemptStatus, NotificationAttempt};
use crate::domain::entities::device::{Device, DeviceCandidate, DeviceStatus};
use crate::domain::entities::maintenance::{MaintenanceKind, MaintenanceRecord};
use crate::domain::entities::rule::AlertRule;
use crate::domain::entities::sample::StatusSample;
use crate::domain::entities::summary::{ConsumptionSummary, SummaryPeriod};
use crate::domain::entities::supply::SupplyLevel;
use crate::domain::entities::user::UserContact;
use crate::domain::ports::directory::UserDirectory;
use crate::domain::ports::store::{
    AlertStore, AttemptStore, DeviceStore, JobStore, MaintenanceStore, RuleStore, SampleStore,
    StoreError, SummaryStore, SupplyStore,
};

/// In-memory store for testing purposes. Serves the same ports as the
/// SQLite store with identical ordering semantics.
#[derive(Default)]
pub struct InMemoryStore {
    next_id: AtomicI64,
    devices: Mutex<Vec<Device>>,
    candidates: Mutex<Vec<DeviceCandidate>>,
    samples: Mutex<Vec<StatusSample>>,
    supplies: Mutex<Vec<SupplyLevel>>,
    rules: Mutex<Vec<AlertRule>>,
    alerts: Mutex<Vec<Alert>>,
    attempts: Mutex<Vec<NotificationAttempt>>,
    maintenance: Mutex<Vec<MaintenanceRecord>>,
    job_counts: Mutex<Vec<(i64, u32)>>,
    users: Mutex<Vec<UserContact>>,
    summaries: Mutex<Vec<ConsumptionSummary>>,
}

fn read<'a, T>(m: &'a Mutex<Vec<T>>) -> Result<MutexGuard<'a, Vec<T>>, StoreError> {
    m.lock()
        .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))
}

fn write<'a, T>(m: &'a Mutex<Vec<T>>) -> Result<MutexGuard<'a, Vec<T>>, StoreError> {
    m.lock()
        .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    fn assign_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed).max(1)
    }

    /// Seed a user contact, assigning an id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lock is poisoned.
    pub fn add_user(&self, user: &UserContact) -> Result<UserContact, StoreError> {
        let mut saved = user.clone();
        saved.id = self.assign_id();
        write(&self.users)?.push(saved.clone());
        Ok(saved)
    }

    /// Set the active print-job backlog reported for a device.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the lock is poisoned.
    pub fn set_job_count(&self, device_id: i64, count: u32) -> Result<(), StoreError> {
        let mut counts = write(&self.job_counts)?;
        if let Some(entry) = counts.iter_mut().find(|(id, _)| *id == device_id) {
            entry.1 = count;
        } else {
            counts.push((device_id, count));
        }
        Ok(())
    }
}

impl DeviceStore for InMemoryStore {
    fn add_device(&self, device: &Device) -> Result<Device, StoreError> {
        let mut devices = write(&self.devices)?;
        if devices.iter().any(|d| d.address == device.address) {
            return Err(StoreError::Conflict(format!(
                "device at {} already registered",
                device.address
            )));
        }
        let mut saved = device.clone();
        saved.id = self.assign_id();
        devices.push(saved.clone());
        Ok(saved)
    }

    fn get_device(&self, id: i64) -> Result<Device, StoreError> {
        read(&self.devices)?
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("device {id}")))
    }

    fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        Ok(read(&self.devices)?.clone())
    }

    fn monitored_devices(&self) -> Result<Vec<Device>, StoreError> {
        Ok(read(&self.devices)?
            .iter()
            .filter(|d| d.is_monitored)
            .cloned()
            .collect())
    }

    fn set_device_status(&self, id: i64, status: DeviceStatus) -> Result<(), StoreError> {
        let mut devices = write(&self.devices)?;
        let device = devices
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("device {id}")))?;
        device.status = status;
        Ok(())
    }

    fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut devices = write(&self.devices)?;
        if let Some(device) = devices.iter_mut().find(|d| d.id == id) {
            device.last_seen = Some(at);
        }
        Ok(())
    }

    fn address_known(&self, address: &str) -> Result<bool, StoreError> {
        Ok(read(&self.devices)?
            .iter()
            .any(|d| d.address.to_string() == address))
    }

    fn upsert_candidate(&self, candidate: &DeviceCandidate) -> Result<(), StoreError> {
        let mut candidates = write(&self.candidates)?;
        if let Some(existing) = candidates.iter_mut().find(|c| c.address == candidate.address) {
            *existing = candidate.clone();
        } else {
            candidates.push(candidate.clone());
        }
        Ok(())
    }

    fn list_candidates(&self) -> Result<Vec<DeviceCandidate>, StoreError> {
        Ok(read(&self.candidates)?.clone())
    }
}

impl SampleStore for InMemoryStore {
    fn save_sample(&self, sample: &StatusSample) -> Result<(), StoreError> {
        write(&self.samples)?.push(sample.clone());
        Ok(())
    }

    fn latest_sample(&self, device_id: i64) -> Result<Option<StatusSample>, StoreError> {
        Ok(read(&self.samples)?
            .iter()
            .rev()
            .find(|s| s.device_id == device_id)
            .cloned())
    }

    fn samples_between(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatusSample>, StoreError> {
        let mut samples: Vec<StatusSample> = read(&self.samples)?
            .iter()
            .filter(|s| s.device_id == device_id && s.recorded_at >= from && s.recorded_at < to)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.recorded_at);
        Ok(samples)
    }

    fn delete_samples_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut samples = write(&self.samples)?;
        let before = samples.len();
        samples.retain(|s| s.recorded_at >= cutoff);
        Ok((before - samples.len()) as u64)
    }
}

impl SupplyStore for InMemoryStore {
    fn save_supply(&self, supply: &SupplyLevel) -> Result<(), StoreError> {
        let mut supplies = write(&self.supplies)?;
        if let Some(existing) = supplies
            .iter_mut()
            .find(|s| s.device_id == supply.device_id && s.supply_type == supply.supply_type)
        {
            *existing = supply.clone();
        } else {
            supplies.push(supply.clone());
        }
        Ok(())
    }

    fn supplies_for_device(&self, device_id: i64) -> Result<Vec<SupplyLevel>, StoreError> {
        let mut supplies: Vec<SupplyLevel> = read(&self.supplies)?
            .iter()
            .filter(|s| s.device_id == device_id)
            .cloned()
            .collect();
        supplies.sort_by_key(|s| s.supply_type);
        Ok(supplies)
    }
}

impl RuleStore for InMemoryStore {
    fn add_rule(&self, rule: &AlertRule) -> Result<AlertRule, StoreError> {
        let mut saved = rule.clone();
        saved.id = self.assign_id();
        write(&self.rules)?.push(saved.clone());
        Ok(saved)
    }

    fn list_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        Ok(read(&self.rules)?.clone())
    }

    fn active_rules(&self) -> Result<Vec<AlertRule>, StoreError> {
        Ok(read(&self.rules)?
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    fn set_rule_active(&self, id: i64, active: bool) -> Result<(), StoreError> {
        let mut rules = write(&self.rules)?;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("rule {id}")))?;
        rule.is_active = active;
        Ok(())
    }
}

impl AlertStore for InMemoryStore {
    fn add_alert(&self, alert: &Alert) -> Result<Alert, StoreError> {
        let mut saved = alert.clone();
        saved.id = self.assign_id();
        write(&self.alerts)?.push(saved.clone());
        Ok(saved)
    }

    fn get_alert(&self, id: i64) -> Result<Alert, StoreError> {
        read(&self.alerts)?
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("alert {id}")))
    }

    fn recent_alerts(&self, count: usize) -> Result<Vec<Alert>, StoreError> {
        let mut alerts = read(&self.alerts)?.clone();
        alerts.reverse();
        alerts.truncate(count);
        Ok(alerts)
    }

    fn alerts_with_status(&self, status: AlertStatus) -> Result<Vec<Alert>, StoreError> {
        let mut alerts: Vec<Alert> = read(&self.alerts)?
            .iter()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        alerts.reverse();
        Ok(alerts)
    }

    fn count_alerts_for_rule_since(
        &self,
        rule_id: i64,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        Ok(read(&self.alerts)?
            .iter()
            .filter(|a| a.rule_id == rule_id && a.created_at >= since)
            .count() as u64)
    }

    fn alerts_without_attempts(&self) -> Result<Vec<Alert>, StoreError> {
        let attempted: Vec<i64> = read(&self.attempts)?.iter().map(|a| a.alert_id).collect();
        Ok(read(&self.alerts)?
            .iter()
            .filter(|a| !a.status.is_terminal() && !attempted.contains(&a.id))
            .cloned()
            .collect())
    }

    fn update_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let mut alerts = write(&self.alerts)?;
        let existing = alerts
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {}", alert.id)))?;
        *existing = alert.clone();
        Ok(())
    }

    fn delete_finished_alerts_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut alerts = write(&self.alerts)?;
        let before = alerts.len();
        alerts.retain(|a| !(a.status.is_terminal() && a.created_at < cutoff));
        Ok((before - alerts.len()) as u64)
    }
}

impl AttemptStore for InMemoryStore {
    fn add_attempt(
        &self,
        attempt: &NotificationAttempt,
    ) -> Result<NotificationAttempt, StoreError> {
        let mut saved = attempt.clone();
        saved.id = self.assign_id();
        write(&self.attempts)?.push(saved.clone());
        Ok(saved)
    }

    fn pending_attempts(&self, max_attempts: u32) -> Result<Vec<NotificationAttempt>, StoreError> {
        Ok(read(&self.attempts)?
            .iter()
            .filter(|a| a.status == AttemptStatus::Pending && a.attempts < max_attempts)
            .cloned()
            .collect())
    }

    fn attempts_for_alert(&self, alert_id: i64) -> Result<Vec<NotificationAttempt>, StoreError> {
        Ok(read(&self.attempts)?
            .iter()
            .filter(|a| a.alert_id == alert_id)
            .cloned()
            .collect())
    }

    fn update_attempt(&self, attempt: &NotificationAttempt) -> Result<(), StoreError> {
        let mut attempts = write(&self.attempts)?;
        let existing = attempts
            .iter_mut()
            .find(|a| a.id == attempt.id)
            .ok_or_else(|| StoreError::NotFound(format!("attempt {}", attempt.id)))?;
        *existing = attempt.clone();
        Ok(())
    }
}

impl MaintenanceStore for InMemoryStore {
    fn add_record(&self, record: &MaintenanceRecord) -> Result<(), StoreError> {
        write(&self.maintenance)?.push(record.clone());
        Ok(())
    }

    fn last_maintenance(&self, device_id: i64) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(read(&self.maintenance)?
            .iter()
            .filter(|r| r.device_id == device_id && r.kind == MaintenanceKind::Preventive)
            .map(|r| r.performed_at)
            .max())
    }
}

impl JobStore for InMemoryStore {
    fn active_job_count(&self, device_id: i64) -> Result<u32, StoreError> {
        Ok(read(&self.job_counts)?
            .iter()
            .find(|(id, _)| *id == device_id)
            .map_or(0, |(_, count)| *count))
    }
}

impl SummaryStore for InMemoryStore {
    fn save_summary(&self, summary: &ConsumptionSummary) -> Result<(), StoreError> {
        let mut summaries = write(&self.summaries)?;
        if let Some(existing) = summaries.iter_mut().find(|s| {
            s.device_id == summary.device_id
                && s.period == summary.period
                && s.period_start == summary.period_start
        }) {
            let id = existing.id;
            *existing = summary.clone();
            existing.id = id;
        } else {
            let mut saved = summary.clone();
            saved.id = self.assign_id();
            summaries.push(saved);
        }
        Ok(())
    }

    fn summaries_for_device(
        &self,
        device_id: i64,
        period: SummaryPeriod,
    ) -> Result<Vec<ConsumptionSummary>, StoreError> {
        let mut summaries: Vec<ConsumptionSummary> = read(&self.summaries)?
            .iter()
            .filter(|s| s.device_id == device_id && s.period == period)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| b.period_start.cmp(&a.period_start));
        Ok(summaries)
    }

    fn summary_exists(
        &self,
        device_id: i64,
        period: SummaryPeriod,
        period_start: NaiveDate,
    ) -> Result<bool, StoreError> {
        Ok(read(&self.summaries)?.iter().any(|s| {
            s.device_id == device_id && s.period == period && s.period_start == period_start
        }))
    }
}

impl UserDirectory for InMemoryStore {
    fn contacts(&self, user_ids: &[i64]) -> Result<Vec<UserContact>, StoreError> {
        let users = read(&self.users)?;
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                users
                    .iter()
                    .find(|u| u.id == *id && u.is_active)
                    .cloned()
            })
            .collect())
    }

    fn staff_contacts(&self) -> Result<Vec<UserContact>, StoreError> {
        use crate::domain::entities::user::Role;
        Ok(read(&self.users)?
            .iter()
            .filter(|u| u.is_active && matches!(u.role, Role::Admin | Role::Technician))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::entities::rule::test_support::make_rule;
    use crate::domain::value_objects::{Severity, TriggerType};

    fn make_device(address: &str) -> Device {
        Device {
            id: 0,
            name: "print-lab".into(),
            model: "LaserJet M404".into(),
            serial_number: "CN777".into(),
            address: address.parse().expect("ip"),
            snmp_community: "public".into(),
            snmp_port: 161,
            location: None,
            is_monitored: true,
            status: DeviceStatus::Active,
            last_seen: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn new_creates_empty_store() {
        let store = InMemoryStore::new();
        assert!(store.list_devices().expect("devices").is_empty());
        assert!(store.recent_alerts(10).expect("alerts").is_empty());
    }

    #[test]
    fn device_ids_are_assigned() {
        let store = InMemoryStore::new();
        let a = store.add_device(&make_device("10.0.0.1")).expect("device");
        let b = store.add_device(&make_device("10.0.0.2")).expect("device");
        assert!(b.id > a.id);
    }

    #[test]
    fn duplicate_address_conflicts() {
        let store = InMemoryStore::new();
        store.add_device(&make_device("10.0.0.1")).expect("device");
        assert!(matches!(
            store.add_device(&make_device("10.0.0.1")),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn rule_activation_toggles() {
        let store = InMemoryStore::new();
        let rule = store
            .add_rule(&make_rule(0, TriggerType::SupplyLow, Severity::Low))
            .expect("rule");
        assert_eq!(store.active_rules().expect("active").len(), 1);
        store.set_rule_active(rule.id, false).expect("toggle");
        assert!(store.active_rules().expect("active").is_empty());
    }

    #[test]
    fn job_count_defaults_to_zero() {
        let store = InMemoryStore::new();
        assert_eq!(store.active_job_count(1).expect("count"), 0);
        store.set_job_count(1, 12).expect("set");
        assert_eq!(store.active_job_count(1).expect("count"), 12);
    }
}
