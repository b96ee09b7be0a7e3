use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::application::services::dispatch::DispatchService;
use crate::domain::entities::alert::{Alert, AlertContext, AlertStatus};
use crate::domain::entities::device::Device;
use crate::domain::entities::rule::AlertRule;
use crate::domain::ports::store::{AlertStore, RuleStore, StoreError};
use crate::domain::value_objects::TriggerType;

/// Orphaned alerts younger than this are left for the normal fan-out
/// path; the reconciliation sweep only picks up ones old enough that the
/// inline fan-out clearly failed.
const RECONCILE_GRACE: Duration = Duration::minutes(5);

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert {id} is {status}, transition rejected")]
    Conflict { id: i64, status: AlertStatus },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the alert lifecycle: creation with rendered title and message,
/// the state machine transitions, and the reconciliation sweep for
/// alerts whose fan-out never happened.
#[derive(Clone)]
pub struct AlertService {
    alerts: Arc<dyn AlertStore>,
    rules: Arc<dyn RuleStore>,
    dispatcher: DispatchService,
}

impl AlertService {
    #[must_use]
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        rules: Arc<dyn RuleStore>,
        dispatcher: DispatchService,
    ) -> Self {
        Self {
            alerts,
            rules,
            dispatcher,
        }
    }

    /// Create a new alert for `rule` firing on `device`, snapshotting the
    /// rule's severity, then fan it out. Fan-out failures are logged and
    /// the alert is kept; the reconciliation sweep retries it later.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Store` if the alert cannot be persisted.
    pub fn open_alert(
        &self,
        rule: &AlertRule,
        device: &Device,
        context: AlertContext,
        now: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let alert = Alert {
            id: 0,
            rule_id: rule.id,
            device_id: device.id,
            title: render_title(rule.trigger, device),
            message: render_message(rule.trigger, device, &context),
            severity: rule.severity,
            status: AlertStatus::New,
            context,
            created_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        };
        let alert = self.alerts.add_alert(&alert)?;
        tracing::info!(
            "alert {} opened: {} ({} on {})",
            alert.id,
            alert.title,
            rule.trigger,
            device.name
        );

        if let Err(e) = self.dispatcher.fan_out(&alert, rule, now) {
            tracing::warn!("fan-out for alert {} failed, will reconcile: {e}", alert.id);
        }
        Ok(alert)
    }

    /// Mark an alert as seen by an operator. Valid from `New` and
    /// `Escalated`.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Conflict` if the alert is in any other state.
    pub fn acknowledge(
        &self,
        id: i64,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let mut alert = self.alerts.get_alert(id)?;
        if !matches!(alert.status, AlertStatus::New | AlertStatus::Escalated) {
            return Err(AlertError::Conflict {
                id,
                status: alert.status,
            });
        }
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_at = Some(now);
        alert.acknowledged_by = Some(actor.to_owned());
        self.alerts.update_alert(&alert)?;
        tracing::info!("alert {id} acknowledged by {actor}");
        Ok(alert)
    }

    /// Resolve an alert. Valid from `New`, `Acknowledged`, and
    /// `Escalated`.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Conflict` if the alert is already terminal.
    pub fn resolve(
        &self,
        id: i64,
        actor: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let mut alert = self.alerts.get_alert(id)?;
        if alert.status.is_terminal() {
            return Err(AlertError::Conflict {
                id,
                status: alert.status,
            });
        }
        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(now);
        alert.resolved_by = Some(actor.to_owned());
        alert.resolution_notes = notes.map(ToOwned::to_owned);
        self.alerts.update_alert(&alert)?;
        tracing::info!("alert {id} resolved by {actor}");
        Ok(alert)
    }

    /// Raise an unhandled alert's visibility. Valid from any non-terminal
    /// state; escalating an already escalated alert is a no-op transition
    /// and is rejected.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Conflict` if the alert is terminal or already
    /// escalated.
    pub fn escalate(&self, id: i64) -> Result<Alert, AlertError> {
        let mut alert = self.alerts.get_alert(id)?;
        if alert.status.is_terminal() || alert.status == AlertStatus::Escalated {
            return Err(AlertError::Conflict {
                id,
                status: alert.status,
            });
        }
        alert.status = AlertStatus::Escalated;
        self.alerts.update_alert(&alert)?;
        tracing::warn!("alert {id} escalated");
        Ok(alert)
    }

    /// Close an alert without resolution, e.g. a duplicate or a false
    /// positive. Valid from any non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Conflict` if the alert is already terminal.
    pub fn close(&self, id: i64, actor: &str, now: DateTime<Utc>) -> Result<Alert, AlertError> {
        let mut alert = self.alerts.get_alert(id)?;
        if alert.status.is_terminal() {
            return Err(AlertError::Conflict {
                id,
                status: alert.status,
            });
        }
        alert.status = AlertStatus::Closed;
        alert.resolved_at = Some(now);
        alert.resolved_by = Some(actor.to_owned());
        self.alerts.update_alert(&alert)?;
        tracing::info!("alert {id} closed by {actor}");
        Ok(alert)
    }

    /// Re-run fan-out for non-terminal alerts that still have no delivery
    /// attempts after the grace window. Returns the number of alerts
    /// reconciled.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the orphan set or the rule list cannot be
    /// read.
    pub fn reconcile(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let orphans = self.alerts.alerts_without_attempts()?;
        if orphans.is_empty() {
            return Ok(0);
        }
        let rules: HashMap<i64, AlertRule> =
            self.rules.list_rules()?.into_iter().map(|r| (r.id, r)).collect();

        let mut reconciled = 0;
        for alert in orphans {
            if now - alert.created_at < RECONCILE_GRACE {
                continue;
            }
            let Some(rule) = rules.get(&alert.rule_id) else {
                tracing::warn!(
                    "alert {} references missing rule {}, cannot reconcile",
                    alert.id,
                    alert.rule_id
                );
                continue;
            };
            match self.dispatcher.fan_out(&alert, rule, now) {
                Ok(_) => reconciled += 1,
                Err(e) => tracing::warn!("reconcile fan-out for alert {} failed: {e}", alert.id),
            }
        }
        if reconciled > 0 {
            tracing::info!("reconciled {reconciled} alert(s) without attempts");
        }
        Ok(reconciled)
    }
}

fn render_title(trigger: TriggerType, device: &Device) -> String {
    match trigger {
        TriggerType::SupplyLow => format!("Low supply on {}", device.name),
        TriggerType::SupplyEmpty => format!("Supply empty on {}", device.name),
        TriggerType::PaperJam => format!("Paper jam on {}", device.name),
        TriggerType::DeviceOffline => format!("{} is unreachable", device.name),
        TriggerType::ErrorCode => format!("Error reported by {}", device.name),
        TriggerType::MaintenanceDue => format!("Maintenance due for {}", device.name),
        TriggerType::HighTemperature => format!("High temperature on {}", device.name),
        TriggerType::QueueFull => format!("Print queue backed up on {}", device.name),
    }
}

fn render_message(trigger: TriggerType, device: &Device, context: &AlertContext) -> String {
    let lead = match trigger {
        TriggerType::SupplyLow => "reports low supply levels",
        TriggerType::SupplyEmpty => "reports an exhausted supply",
        TriggerType::PaperJam => "reports a paper jam",
        TriggerType::DeviceOffline => "did not answer the status probe",
        TriggerType::ErrorCode => "reports a device error",
        TriggerType::MaintenanceDue => "is overdue for maintenance",
        TriggerType::HighTemperature => "reports a high internal temperature",
        TriggerType::QueueFull => "has a backed up print queue",
    };
    let mut message = format!("Device {} ({}) {lead}.", device.name, device.address);
    for (supply, level) in &context.supply_levels {
        let _ = write!(message, "\n - {supply}: {level}%");
    }
    if let Some(detail) = &context.error_details {
        let _ = write!(message, "\n - detail: {detail}");
    }
    message
}
