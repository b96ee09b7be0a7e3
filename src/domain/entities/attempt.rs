use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Channel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
}

impl AttemptStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Delivered => "delivered",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery attempt record for an alert on a single channel to a
/// single recipient. `attempts` counts failed tries only; a successful
/// send is recorded with the count unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttempt {
    pub id: i64,
    pub alert_id: i64,
    pub channel: Channel,
    pub recipient: String,
    pub status: AttemptStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationAttempt {
    /// A fresh pending attempt, not yet tried.
    #[must_use]
    pub fn pending(alert_id: i64, channel: Channel, recipient: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            alert_id,
            channel,
            recipient: recipient.to_owned(),
            status: AttemptStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            sent_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_starts_untried() {
        let a = NotificationAttempt::pending(7, Channel::Email, "ops@example.com", Utc::now());
        assert_eq!(a.status, AttemptStatus::Pending);
        assert_eq!(a.attempts, 0);
        assert!(a.sent_at.is_none());
    }

    #[test]
    fn status_round_trip() {
        for s in [
            AttemptStatus::Pending,
            AttemptStatus::Sent,
            AttemptStatus::Failed,
            AttemptStatus::Delivered,
        ] {
            assert_eq!(AttemptStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(AttemptStatus::parse("bounced"), None);
    }
}
