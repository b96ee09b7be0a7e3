use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::supply::SupplyType;
use crate::domain::value_objects::Severity;

/// Alert lifecycle state.
///
/// `New → Acknowledged → Resolved` is the main path; `Escalated` and
/// `Closed` are side branches reachable from any non-terminal state.
/// `Resolved` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
    Escalated,
    Closed,
}

impl AlertStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Escalated => "escalated",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            "escalated" => Some(Self::Escalated),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured context captured at alert creation and appended to the
/// rendered message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertContext {
    /// Per-supply percentages, for supply triggers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub supply_levels: BTreeMap<SupplyType, u8>,
    /// Free-text error detail, for error-code triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl AlertContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.supply_levels.is_empty() && self.error_details.is_none()
    }
}

/// One firing instance of a rule against a device.
///
/// `severity` is snapshotted from the rule at creation and never follows
/// later rule edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub rule_id: i64,
    pub device_id: i64,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub context: AlertContext,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(AlertStatus::Resolved.is_terminal());
        assert!(AlertStatus::Closed.is_terminal());
        assert!(!AlertStatus::New.is_terminal());
        assert!(!AlertStatus::Acknowledged.is_terminal());
        assert!(!AlertStatus::Escalated.is_terminal());
    }

    #[test]
    fn empty_context() {
        assert!(AlertContext::default().is_empty());
        let ctx = AlertContext {
            error_details: Some("E-0042".into()),
            ..AlertContext::default()
        };
        assert!(!ctx.is_empty());
    }
}
