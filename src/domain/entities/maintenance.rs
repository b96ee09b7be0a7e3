use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceKind {
    Preventive,
    Repair,
    SupplyReplacement,
    Inspection,
}

impl MaintenanceKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Preventive => "preventive",
            Self::Repair => "repair",
            Self::SupplyReplacement => "supply_replacement",
            Self::Inspection => "inspection",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preventive" => Some(Self::Preventive),
            "repair" => Some(Self::Repair),
            "supply_replacement" => Some(Self::SupplyReplacement),
            "inspection" => Some(Self::Inspection),
            _ => None,
        }
    }
}

/// A completed service intervention on a device. The most recent
/// `performed_at` per device drives the maintenance-due trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: i64,
    pub device_id: i64,
    pub kind: MaintenanceKind,
    pub description: String,
    pub technician: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
