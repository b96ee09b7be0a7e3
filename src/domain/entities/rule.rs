use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Comparison, Severity, TriggerType};

/// An operator-defined alerting condition.
///
/// `device_ids` empty means "all monitored devices"; `subscriber_ids` empty
/// means "every active user with an elevated role". Cooldown is scoped to
/// the rule as a whole: once any device fires it, the rule is muted for the
/// entire window. That asymmetry comes from the product requirements and is
/// kept deliberately; see DESIGN.md before changing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub trigger: TriggerType,
    pub severity: Severity,
    pub threshold: Option<f64>,
    /// Explicit override of the trigger's own comparison direction.
    pub comparison: Option<Comparison>,
    pub cooldown_minutes: u32,
    pub device_ids: Vec<i64>,
    pub subscriber_ids: Vec<i64>,
    pub send_email: bool,
    pub send_sms: bool,
    pub send_system: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Effective threshold: the rule's own value, or the trigger default.
    #[must_use]
    pub fn effective_threshold(&self) -> Option<f64> {
        self.threshold.or_else(|| self.trigger.default_threshold())
    }

    /// Comparison used by threshold triggers: the explicit override, or
    /// the direction the trigger itself implies.
    #[must_use]
    pub fn effective_comparison(&self) -> Comparison {
        self.comparison
            .unwrap_or_else(|| self.trigger.default_comparison())
    }

    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.cooldown_minutes))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Rule builder for tests: active, no device filter, all channels off
    /// except system, 60 minute cooldown.
    #[must_use]
    pub fn make_rule(id: i64, trigger: TriggerType, severity: Severity) -> AlertRule {
        AlertRule {
            id,
            name: format!("rule-{id}"),
            description: None,
            trigger,
            severity,
            threshold: None,
            comparison: None,
            cooldown_minutes: 60,
            device_ids: vec![],
            subscriber_ids: vec![],
            send_email: false,
            send_sms: false,
            send_system: true,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_rule;
    use super::*;

    #[test]
    fn effective_threshold_prefers_explicit_value() {
        let mut rule = make_rule(1, TriggerType::SupplyLow, Severity::Medium);
        assert_eq!(rule.effective_threshold(), Some(25.0));
        rule.threshold = Some(15.0);
        assert_eq!(rule.effective_threshold(), Some(15.0));
    }

    #[test]
    fn effective_comparison_prefers_explicit_override() {
        let mut rule = make_rule(1, TriggerType::QueueFull, Severity::Medium);
        assert_eq!(rule.effective_comparison(), Comparison::Gt);
        rule.comparison = Some(Comparison::Gte);
        assert_eq!(rule.effective_comparison(), Comparison::Gte);
    }

    #[test]
    fn cooldown_converts_minutes() {
        let rule = make_rule(1, TriggerType::DeviceOffline, Severity::High);
        assert_eq!(rule.cooldown(), chrono::Duration::minutes(60));
    }
}
