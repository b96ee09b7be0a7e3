use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::services::alerts::AlertService;
use crate::domain::entities::alert::AlertContext;
use crate::domain::entities::device::Device;
use crate::domain::entities::rule::AlertRule;
use crate::domain::ports::store::{
    AlertStore, DeviceStore, MaintenanceStore, RuleStore, SampleStore, StoreError, SupplyStore,
};
use crate::domain::value_objects::TriggerType;

/// Devices with no maintenance history fire the maintenance-due trigger
/// this many days after they were added, regardless of the rule threshold.
const NEVER_MAINTAINED_GRACE_DAYS: i64 = 30;

/// Counts from one evaluation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvaluationResult {
    pub rules_checked: usize,
    pub rules_suppressed: usize,
    pub alerts_created: usize,
}

/// Runs every active rule against its device set and opens alerts for the
/// ones that fire.
///
/// Cooldown is scoped to the rule: a rule that produced any alert inside
/// its window is skipped entirely, but a single pass is allowed to open
/// alerts for several devices at once.
#[derive(Clone)]
pub struct EvaluatorService {
    devices: Arc<dyn DeviceStore>,
    samples: Arc<dyn SampleStore>,
    supplies: Arc<dyn SupplyStore>,
    rules: Arc<dyn RuleStore>,
    alerts: Arc<dyn AlertStore>,
    maintenance: Arc<dyn MaintenanceStore>,
    alert_manager: AlertService,
}

impl EvaluatorService {
    #[must_use]
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        samples: Arc<dyn SampleStore>,
        supplies: Arc<dyn SupplyStore>,
        rules: Arc<dyn RuleStore>,
        alerts: Arc<dyn AlertStore>,
        maintenance: Arc<dyn MaintenanceStore>,
        alert_manager: AlertService,
    ) -> Self {
        Self {
            devices,
            samples,
            supplies,
            rules,
            alerts,
            maintenance,
            alert_manager,
        }
    }

    /// One evaluation pass over the active status and supply rules at
    /// `now`. Maintenance-due rules run on their own, slower cadence; see
    /// [`Self::run_maintenance`].
    ///
    /// A device whose state cannot be read is logged and treated as not
    /// triggered; the pass never aborts halfway through the fleet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the rule list or a cooldown count cannot be
    /// read.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<EvaluationResult, StoreError> {
        let result = self.run_rules(now, false)?;
        tracing::info!(
            "evaluation pass: {} rule(s), {} cooling down, {} alert(s) opened",
            result.rules_checked,
            result.rules_suppressed,
            result.alerts_created
        );
        Ok(result)
    }

    /// One pass over the active maintenance-due rules at `now`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the rule list or a cooldown count cannot be
    /// read.
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> Result<EvaluationResult, StoreError> {
        let result = self.run_rules(now, true)?;
        tracing::info!(
            "maintenance pass: {} rule(s), {} cooling down, {} alert(s) opened",
            result.rules_checked,
            result.rules_suppressed,
            result.alerts_created
        );
        Ok(result)
    }

    fn run_rules(
        &self,
        now: DateTime<Utc>,
        maintenance_pass: bool,
    ) -> Result<EvaluationResult, StoreError> {
        let mut result = EvaluationResult::default();

        for rule in self.rules.active_rules()? {
            if (rule.trigger == TriggerType::MaintenanceDue) != maintenance_pass {
                continue;
            }
            result.rules_checked += 1;

            if rule.cooldown_minutes > 0 {
                let since = now - rule.cooldown();
                if self.alerts.count_alerts_for_rule_since(rule.id, since)? > 0 {
                    tracing::debug!("rule '{}' is cooling down, skipped", rule.name);
                    result.rules_suppressed += 1;
                    continue;
                }
            }

            for device in self.rule_devices(&rule)? {
                match self.evaluate(&rule, &device, now) {
                    Ok(Some(context)) => {
                        match self.alert_manager.open_alert(&rule, &device, context, now) {
                            Ok(_) => result.alerts_created += 1,
                            Err(e) => tracing::warn!(
                                "could not open alert for rule '{}' on {}: {e}",
                                rule.name,
                                device.name
                            ),
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        "evaluation of rule '{}' on {} failed: {e}",
                        rule.name,
                        device.name
                    ),
                }
            }
        }

        Ok(result)
    }

    /// The device set a rule applies to: its explicit list, or the whole
    /// monitored fleet when the list is empty. Listed devices that no
    /// longer exist are dropped.
    fn rule_devices(&self, rule: &AlertRule) -> Result<Vec<Device>, StoreError> {
        if rule.device_ids.is_empty() {
            return self.devices.monitored_devices();
        }
        let mut devices = Vec::with_capacity(rule.device_ids.len());
        for &id in &rule.device_ids {
            match self.devices.get_device(id) {
                Ok(device) => devices.push(device),
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!("rule '{}' references missing device {id}", rule.name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(devices)
    }

    fn evaluate(
        &self,
        rule: &AlertRule,
        device: &Device,
        now: DateTime<Utc>,
    ) -> Result<Option<AlertContext>, StoreError> {
        match rule.trigger {
            TriggerType::SupplyLow | TriggerType::SupplyEmpty => self.check_supplies(rule, device),
            TriggerType::PaperJam => {
                let fired = self
                    .samples
                    .latest_sample(device.id)?
                    .is_some_and(|s| s.paper_status == crate::domain::entities::sample::PaperStatus::Jam);
                Ok(fired.then(AlertContext::default))
            }
            TriggerType::DeviceOffline => {
                let fired = self
                    .samples
                    .latest_sample(device.id)?
                    .is_some_and(|s| !s.is_online);
                Ok(fired.then(AlertContext::default))
            }
            TriggerType::ErrorCode => {
                let Some(sample) = self.samples.latest_sample(device.id)? else {
                    return Ok(None);
                };
                let Some(code) = sample.error_code else {
                    return Ok(None);
                };
                let detail = match sample.error_message {
                    Some(msg) => format!("{code}: {msg}"),
                    None => code,
                };
                Ok(Some(AlertContext {
                    error_details: Some(detail),
                    ..AlertContext::default()
                }))
            }
            TriggerType::HighTemperature => {
                let Some(threshold) = rule.effective_threshold() else {
                    return Ok(None);
                };
                let fired = self
                    .samples
                    .latest_sample(device.id)?
                    .and_then(|s| s.temperature)
                    .is_some_and(|t| rule.effective_comparison().holds(t, threshold));
                Ok(fired.then(AlertContext::default))
            }
            TriggerType::QueueFull => {
                let Some(threshold) = rule.effective_threshold() else {
                    return Ok(None);
                };
                let fired = self
                    .samples
                    .latest_sample(device.id)?
                    .is_some_and(|s| {
                        rule.effective_comparison().holds(f64::from(s.queue_size), threshold)
                    });
                Ok(fired.then(AlertContext::default))
            }
            TriggerType::MaintenanceDue => self.check_maintenance(rule, device, now),
        }
    }

    /// Supply triggers fire on any supply whose level satisfies the rule's
    /// comparison; every matching supply is recorded in the context.
    fn check_supplies(
        &self,
        rule: &AlertRule,
        device: &Device,
    ) -> Result<Option<AlertContext>, StoreError> {
        let Some(threshold) = rule.effective_threshold() else {
            return Ok(None);
        };
        let mut context = AlertContext::default();
        for supply in self.supplies.supplies_for_device(device.id)? {
            if rule.effective_comparison().holds(f64::from(supply.level), threshold) {
                context.supply_levels.insert(supply.supply_type, supply.level);
            }
        }
        Ok((!context.is_empty()).then_some(context))
    }

    /// Maintenance is "due" once more days than the threshold have passed
    /// since the last recorded service. A device that was never serviced
    /// fires after a fixed grace period from its creation instead, so a
    /// freshly installed fleet does not alert on day one.
    fn check_maintenance(
        &self,
        rule: &AlertRule,
        device: &Device,
        now: DateTime<Utc>,
    ) -> Result<Option<AlertContext>, StoreError> {
        let fired = match self.maintenance.last_maintenance(device.id)? {
            Some(last) => {
                let threshold = rule.effective_threshold().unwrap_or(90.0);
                (now - last).num_days() as f64 > threshold
            }
            None => (now - device.created_at).num_days() > NEVER_MAINTAINED_GRACE_DAYS,
        };
        Ok(fired.then(AlertContext::default))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::services::dispatch::DispatchService;
    use crate::domain::entities::device::DeviceStatus;
    use crate::domain::entities::maintenance::{MaintenanceKind, MaintenanceRecord};
    use crate::domain::entities::rule::test_support::make_rule;
    use crate::domain::entities::sample::{PaperStatus, StatusSample};
    use crate::domain::entities::supply::{SupplyLevel, SupplyType};
    use crate::domain::value_objects::{Comparison, Severity};
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;
    use chrono::Duration;

    fn seed_device(store: &Arc<InMemoryStore>, name: &str) -> Device {
        // Each device needs a distinct address: the store rejects duplicates.
        static NEXT_OCTET: std::sync::atomic::AtomicU8 = std::sync::atomic::AtomicU8::new(30);
        let octet = NEXT_OCTET.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        store
            .add_device(&Device {
                id: 0,
                name: name.into(),
                model: "LaserJet M404".into(),
                serial_number: format!("SN-{name}"),
                address: format!("10.0.0.{octet}").parse().expect("ip"),
                snmp_community: "public".into(),
                snmp_port: 161,
                location: None,
                is_monitored: true,
                status: DeviceStatus::Active,
                last_seen: None,
                created_at: Utc::now(),
            })
            .expect("device")
    }

    fn seed_sample(store: &Arc<InMemoryStore>, device_id: i64, patch: impl FnOnce(&mut StatusSample)) {
        let mut sample = StatusSample::offline(device_id, Utc::now());
        sample.is_online = true;
        sample.paper_status = PaperStatus::Ok;
        patch(&mut sample);
        store.save_sample(&sample).expect("sample");
    }

    fn service(store: &Arc<InMemoryStore>) -> EvaluatorService {
        let dispatcher =
            DispatchService::new(store.clone(), store.clone(), store.clone(), vec![], 3);
        let alert_manager = AlertService::new(store.clone(), store.clone(), dispatcher);
        EvaluatorService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            alert_manager,
        )
    }

    #[test]
    fn low_toner_fires_and_records_the_level() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store, "print-lab");
        store
            .save_supply(&SupplyLevel::from_reading(
                device.id,
                SupplyType::TonerBlack,
                4,
                1000,
                Utc::now(),
            ))
            .expect("supply");
        store
            .add_rule(&make_rule(1, TriggerType::SupplyEmpty, Severity::Critical))
            .expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 1);
        let alert = &store.recent_alerts(1).expect("alerts")[0];
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.context.supply_levels.get(&SupplyType::TonerBlack), Some(&4));
    }

    #[test]
    fn cooldown_mutes_the_whole_rule() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store, "print-lab");
        seed_sample(&store, device.id, |s| s.is_online = false);
        store
            .add_rule(&make_rule(1, TriggerType::DeviceOffline, Severity::High))
            .expect("rule");

        let svc = service(&store);
        let now = Utc::now();
        let first = svc.run_once(now).expect("run");
        assert_eq!(first.alerts_created, 1);

        // Still offline, but inside the 60 minute window.
        let second = svc.run_once(now + Duration::minutes(5)).expect("run");
        assert_eq!(second.alerts_created, 0);
        assert_eq!(second.rules_suppressed, 1);

        // Past the window the rule fires again.
        let third = svc.run_once(now + Duration::minutes(61)).expect("run");
        assert_eq!(third.alerts_created, 1);
    }

    #[test]
    fn one_pass_alerts_every_firing_device() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed_device(&store, "print-a");
        let b = seed_device(&store, "print-b");
        let c = seed_device(&store, "print-c");
        seed_sample(&store, a.id, |s| s.is_online = false);
        seed_sample(&store, b.id, |s| s.is_online = false);
        seed_sample(&store, c.id, |_| {});
        store
            .add_rule(&make_rule(1, TriggerType::DeviceOffline, Severity::High))
            .expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 2);
    }

    #[test]
    fn device_scoped_rules_ignore_the_rest_of_the_fleet() {
        let store = Arc::new(InMemoryStore::new());
        let watched = seed_device(&store, "print-a");
        let other = seed_device(&store, "print-b");
        seed_sample(&store, watched.id, |s| s.paper_status = PaperStatus::Jam);
        seed_sample(&store, other.id, |s| s.paper_status = PaperStatus::Jam);
        let mut rule = make_rule(1, TriggerType::PaperJam, Severity::Low);
        rule.device_ids = vec![watched.id, 999];
        store.add_rule(&rule).expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 1);
        let alert = &store.recent_alerts(1).expect("alerts")[0];
        assert_eq!(alert.device_id, watched.id);
    }

    #[test]
    fn queue_rule_fires_only_above_the_threshold() {
        let store = Arc::new(InMemoryStore::new());
        let busy = seed_device(&store, "print-busy");
        let idle = seed_device(&store, "print-idle");
        seed_sample(&store, busy.id, |s| s.queue_size = 50);
        seed_sample(&store, idle.id, |s| s.queue_size = 0);
        store
            .add_rule(&make_rule(1, TriggerType::QueueFull, Severity::Medium))
            .expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 1);
        let alert = &store.recent_alerts(1).expect("alerts")[0];
        assert_eq!(alert.device_id, busy.id);
    }

    #[test]
    fn queue_rule_honors_an_explicit_comparison() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store, "print-lab");
        seed_sample(&store, device.id, |s| s.queue_size = 12);
        let mut rule = make_rule(1, TriggerType::QueueFull, Severity::Medium);
        rule.comparison = Some(Comparison::Gte);
        rule.threshold = Some(12.0);
        store.add_rule(&rule).expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 1);
    }

    #[test]
    fn supply_at_the_exact_threshold_fires() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store, "print-lab");
        store
            .save_supply(&SupplyLevel::from_reading(
                device.id,
                SupplyType::TonerBlack,
                25,
                1000,
                Utc::now(),
            ))
            .expect("supply");
        store
            .add_rule(&make_rule(1, TriggerType::SupplyLow, Severity::Medium))
            .expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 1);
    }

    #[test]
    fn error_code_alert_carries_the_detail() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store, "print-lab");
        seed_sample(&store, device.id, |s| {
            s.error_code = Some("49.4C02".into());
            s.error_message = Some("firmware fault".into());
        });
        store
            .add_rule(&make_rule(1, TriggerType::ErrorCode, Severity::High))
            .expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 1);
        let alert = &store.recent_alerts(1).expect("alerts")[0];
        assert_eq!(
            alert.context.error_details.as_deref(),
            Some("49.4C02: firmware fault")
        );
    }

    #[test]
    fn never_maintained_devices_wait_out_the_grace_period() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store, "print-lab");
        store
            .add_rule(&make_rule(1, TriggerType::MaintenanceDue, Severity::Low))
            .expect("rule");

        let svc = service(&store);
        // Created just now: no alert.
        assert_eq!(svc.run_maintenance(Utc::now()).expect("run").alerts_created, 0);
        // Past the grace period it fires, but only on the maintenance pass.
        let later = Utc::now() + Duration::days(31);
        assert_eq!(svc.run_once(later).expect("run").alerts_created, 0);
        assert_eq!(svc.run_maintenance(later).expect("run").alerts_created, 1);
        let _ = device;
    }

    #[test]
    fn repairs_do_not_reset_the_preventive_clock() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store, "print-lab");
        let now = Utc::now();
        store
            .add_record(&MaintenanceRecord {
                id: 0,
                device_id: device.id,
                kind: MaintenanceKind::Repair,
                description: "fuser swap".into(),
                technician: None,
                performed_at: now + Duration::days(395),
                created_at: now + Duration::days(395),
            })
            .expect("record");
        store
            .add_rule(&make_rule(1, TriggerType::MaintenanceDue, Severity::Low))
            .expect("rule");

        // Never preventively serviced: the recent repair does not count,
        // and the creation-time grace period is long past.
        let result = service(&store)
            .run_maintenance(now + Duration::days(400))
            .expect("run");
        assert_eq!(result.alerts_created, 1);
    }

    #[test]
    fn devices_without_samples_never_count_as_offline() {
        let store = Arc::new(InMemoryStore::new());
        seed_device(&store, "print-lab");
        store
            .add_rule(&make_rule(1, TriggerType::DeviceOffline, Severity::High))
            .expect("rule");

        let result = service(&store).run_once(Utc::now()).expect("run");
        assert_eq!(result.alerts_created, 0);
    }
}
