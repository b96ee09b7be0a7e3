use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummaryPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl SummaryPeriod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }
}

/// Aggregated page output for one device over one period.
///
/// Computed from page-counter deltas between the first and last sample
/// of the period; counters are monotonic so negative deltas (device
/// replacement mid-period) clamp to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionSummary {
    pub id: i64,
    pub device_id: i64,
    pub period: SummaryPeriod,
    pub period_start: NaiveDate,
    pub pages_printed: u64,
    pub color_pages: u64,
    pub mono_pages: u64,
    pub computed_at: DateTime<Utc>,
}

impl ConsumptionSummary {
    /// Builds a summary from counter deltas, clamping rollovers to zero.
    #[must_use]
    pub fn from_deltas(
        device_id: i64,
        period: SummaryPeriod,
        period_start: NaiveDate,
        total_delta: i64,
        color_delta: i64,
        computed_at: DateTime<Utc>,
    ) -> Self {
        let pages_printed = total_delta.max(0) as u64;
        let color_pages = (color_delta.max(0) as u64).min(pages_printed);
        Self {
            id: 0,
            device_id,
            period,
            period_start,
            pages_printed,
            color_pages,
            mono_pages: pages_printed - color_pages,
            computed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn deltas_split_mono_and_color() {
        let s = ConsumptionSummary::from_deltas(
            1,
            SummaryPeriod::Daily,
            day("2026-08-27"),
            120,
            45,
            Utc::now(),
        );
        assert_eq!(s.pages_printed, 120);
        assert_eq!(s.color_pages, 45);
        assert_eq!(s.mono_pages, 75);
    }

    #[test]
    fn counter_rollover_clamps_to_zero() {
        let s = ConsumptionSummary::from_deltas(
            1,
            SummaryPeriod::Daily,
            day("2026-08-27"),
            -4000,
            -900,
            Utc::now(),
        );
        assert_eq!(s.pages_printed, 0);
        assert_eq!(s.color_pages, 0);
        assert_eq!(s.mono_pages, 0);
    }

    #[test]
    fn color_never_exceeds_total() {
        let s = ConsumptionSummary::from_deltas(
            1,
            SummaryPeriod::Daily,
            day("2026-08-27"),
            10,
            30,
            Utc::now(),
        );
        assert_eq!(s.color_pages, 10);
        assert_eq!(s.mono_pages, 0);
    }
}
