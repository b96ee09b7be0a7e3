use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paper tray state reported by the device.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Ok,
    Low,
    Empty,
    Jam,
    #[default]
    Unknown,
}

impl PaperStatus {
    /// Map the hrPrinterDetectedErrorState-style tray code to a status.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            3 => Self::Ok,
            4 => Self::Low,
            5 => Self::Empty,
            8 => Self::Jam,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Low => "low",
            Self::Empty => "empty",
            Self::Jam => "jam",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "low" => Some(Self::Low),
            "empty" => Some(Self::Empty),
            "jam" => Some(Self::Jam),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable, timestamped status snapshot for a device.
///
/// Samples are append-only: the store never mutates or deduplicates them,
/// and only the retention cleanup job deletes old rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSample {
    pub device_id: i64,
    pub is_online: bool,
    pub paper_status: PaperStatus,
    /// Remaining paper as a percentage of tray capacity, 0–100.
    pub paper_level: u8,
    pub queue_size: u32,
    pub total_pages: u64,
    pub color_pages: u64,
    pub temperature: Option<f64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub response_time_ms: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl StatusSample {
    /// An offline sample: the connectivity test failed, so every deeper
    /// field stays at its default.
    #[must_use]
    pub fn offline(device_id: i64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            device_id,
            is_online: false,
            paper_status: PaperStatus::Unknown,
            paper_level: 0,
            queue_size: 0,
            total_pages: 0,
            color_pages: 0,
            temperature: None,
            error_code: None,
            error_message: None,
            response_time_ms: None,
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_code_mapping() {
        assert_eq!(PaperStatus::from_code(3), PaperStatus::Ok);
        assert_eq!(PaperStatus::from_code(4), PaperStatus::Low);
        assert_eq!(PaperStatus::from_code(5), PaperStatus::Empty);
        assert_eq!(PaperStatus::from_code(8), PaperStatus::Jam);
        assert_eq!(PaperStatus::from_code(0), PaperStatus::Unknown);
        assert_eq!(PaperStatus::from_code(99), PaperStatus::Unknown);
    }

    #[test]
    fn paper_status_displays_as_its_wire_name() {
        assert_eq!(PaperStatus::Jam.to_string(), "jam");
        assert_eq!(PaperStatus::Ok.to_string(), "ok");
    }

    #[test]
    fn offline_sample_has_no_detail_fields() {
        let sample = StatusSample::offline(7, Utc::now());
        assert!(!sample.is_online);
        assert_eq!(sample.paper_status, PaperStatus::Unknown);
        assert_eq!(sample.queue_size, 0);
        assert!(sample.error_code.is_none());
        assert!(sample.temperature.is_none());
    }
}
