use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator-visible device status, cached on the device row.
///
/// Only `Offline`/`Active` are touched by the monitoring core (when a poll
/// flips the online flag); the other states are set by operators through
/// the inventory layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Maintenance,
    Error,
    Offline,
}

impl DeviceStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "maintenance" => Some(Self::Maintenance),
            "error" => Some(Self::Error),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network-attached printing device under monitoring.
///
/// Owned by the inventory layer; the core reads the addressing fields and
/// updates only `status` and `last_seen`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub model: String,
    pub serial_number: String,
    pub address: IpAddr,
    pub snmp_community: String,
    pub snmp_port: u16,
    pub location: Option<String>,
    pub is_monitored: bool,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Online means neither offline nor in an error state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        !matches!(self.status, DeviceStatus::Offline | DeviceStatus::Error)
    }
}

/// A host accepted by the discovery sweep: responded to the connectivity
/// probe and reported a vendor-matching description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCandidate {
    pub address: IpAddr,
    pub name: String,
    pub model: String,
    pub serial_number: String,
    pub description: String,
    pub discovered_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn make_device(status: DeviceStatus) -> Device {
        Device {
            id: 1,
            name: "print-floor2".into(),
            model: "LaserJet M404".into(),
            serial_number: "CN12345".into(),
            address: "192.168.1.20".parse().expect("ip"),
            snmp_community: "public".into(),
            snmp_port: 161,
            location: Some("floor 2".into()),
            is_monitored: true,
            status,
            last_seen: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn online_excludes_offline_and_error() {
        assert!(make_device(DeviceStatus::Active).is_online());
        assert!(make_device(DeviceStatus::Maintenance).is_online());
        assert!(!make_device(DeviceStatus::Offline).is_online());
        assert!(!make_device(DeviceStatus::Error).is_online());
    }

    #[test]
    fn status_parse_round_trips() {
        for status in [
            DeviceStatus::Active,
            DeviceStatus::Inactive,
            DeviceStatus::Maintenance,
            DeviceStatus::Error,
            DeviceStatus::Offline,
        ] {
            assert_eq!(DeviceStatus::parse(status.as_str()), Some(status));
        }
    }
}
