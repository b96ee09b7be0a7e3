use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::domain::entities::summary::{ConsumptionSummary, SummaryPeriod};
use crate::domain::ports::store::{DeviceStore, SampleStore, StoreError, SummaryStore};

/// Counts from one summary pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryResult {
    pub computed: usize,
    pub skipped: usize,
}

/// Computes per-device page consumption for the most recent closed
/// daily, weekly, and monthly period.
///
/// Summaries are idempotent: a (device, period, start) triple that
/// already exists is skipped, as is any period with fewer than two
/// samples to take a delta from.
#[derive(Clone)]
pub struct SummaryService {
    devices: Arc<dyn DeviceStore>,
    samples: Arc<dyn SampleStore>,
    summaries: Arc<dyn SummaryStore>,
}

impl SummaryService {
    #[must_use]
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        samples: Arc<dyn SampleStore>,
        summaries: Arc<dyn SummaryStore>,
    ) -> Self {
        Self {
            devices,
            samples,
            summaries,
        }
    }

    /// One pass over the fleet, filling in whichever of yesterday, last
    /// week, and last month is still missing per device.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the device list cannot be read. Per-device
    /// failures are logged and skipped.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<SummaryResult, StoreError> {
        let mut result = SummaryResult::default();
        let periods = [
            (SummaryPeriod::Daily, daily_window(now)),
            (SummaryPeriod::Weekly, weekly_window(now)),
            (SummaryPeriod::Monthly, monthly_window(now)),
        ];

        for device in self.devices.monitored_devices()? {
            for (period, (start, from, to)) in &periods {
                match self.compute(device.id, *period, *start, *from, *to, now) {
                    Ok(true) => result.computed += 1,
                    Ok(false) => result.skipped += 1,
                    Err(e) => tracing::warn!(
                        "{} summary for device {} failed: {e}",
                        period.as_str(),
                        device.id
                    ),
                }
            }
        }

        tracing::info!(
            "summary pass: {} computed, {} skipped",
            result.computed,
            result.skipped
        );
        Ok(result)
    }

    fn compute(
        &self,
        device_id: i64,
        period: SummaryPeriod,
        start: NaiveDate,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.summaries.summary_exists(device_id, period, start)? {
            return Ok(false);
        }
        let samples = self.samples.samples_between(device_id, from, to)?;
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Ok(false);
        };
        if samples.len() < 2 {
            return Ok(false);
        }

        let summary = ConsumptionSummary::from_deltas(
            device_id,
            period,
            start,
            last.total_pages as i64 - first.total_pages as i64,
            last.color_pages as i64 - first.color_pages as i64,
            now,
        );
        self.summaries.save_summary(&summary)?;
        Ok(true)
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Yesterday, midnight to midnight.
fn daily_window(now: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive() - Duration::days(1);
    (start, day_start(start), day_start(start + Duration::days(1)))
}

/// The last fully elapsed Monday-started week.
fn weekly_window(now: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let this_monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let start = this_monday - Duration::days(7);
    (start, day_start(start), day_start(this_monday))
}

/// The previous calendar month.
fn monthly_window(now: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let this_month = today.with_day(1).unwrap_or(today);
    let start = if this_month.month() == 1 {
        NaiveDate::from_ymd_opt(this_month.year() - 1, 12, 1).unwrap_or(this_month)
    } else {
        NaiveDate::from_ymd_opt(this_month.year(), this_month.month() - 1, 1).unwrap_or(this_month)
    };
    (start, day_start(start), day_start(this_month))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::domain::entities::device::{Device, DeviceStatus};
    use crate::domain::entities::sample::StatusSample;
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().expect("timestamp")
    }

    fn seed_device(store: &Arc<InMemoryStore>) -> Device {
        store
            .add_device(&Device {
                id: 0,
                name: "print-lab".into(),
                model: "LaserJet M404".into(),
                serial_number: "SN1".into(),
                address: "10.0.0.40".parse().expect("ip"),
                snmp_community: "public".into(),
                snmp_port: 161,
                location: None,
                is_monitored: true,
                status: DeviceStatus::Active,
                last_seen: None,
                created_at: at("2026-01-01T00:00:00Z"),
            })
            .expect("device")
    }

    fn seed_counters(store: &Arc<InMemoryStore>, device_id: i64, when: &str, total: u64, color: u64) {
        let mut sample = StatusSample::offline(device_id, at(when));
        sample.is_online = true;
        sample.total_pages = total;
        sample.color_pages = color;
        store.save_sample(&sample).expect("sample");
    }

    fn service(store: &Arc<InMemoryStore>) -> SummaryService {
        SummaryService::new(store.clone(), store.clone(), store.clone())
    }

    #[test]
    fn window_math_lands_on_the_previous_periods() {
        // A Friday.
        let now = at("2026-08-28T10:00:00Z");

        let (start, from, to) = daily_window(now);
        assert_eq!(start, "2026-08-27".parse::<NaiveDate>().expect("date"));
        assert_eq!(from, at("2026-08-27T00:00:00Z"));
        assert_eq!(to, at("2026-08-28T00:00:00Z"));

        let (start, from, to) = weekly_window(now);
        assert_eq!(start, "2026-08-17".parse::<NaiveDate>().expect("date"));
        assert_eq!(from, at("2026-08-17T00:00:00Z"));
        assert_eq!(to, at("2026-08-24T00:00:00Z"));

        let (start, from, to) = monthly_window(now);
        assert_eq!(start, "2026-07-01".parse::<NaiveDate>().expect("date"));
        assert_eq!(from, at("2026-07-01T00:00:00Z"));
        assert_eq!(to, at("2026-08-01T00:00:00Z"));
    }

    #[test]
    fn monthly_window_wraps_the_year() {
        let (start, _, to) = monthly_window(at("2026-01-15T08:00:00Z"));
        assert_eq!(start, "2025-12-01".parse::<NaiveDate>().expect("date"));
        assert_eq!(to, at("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn daily_summary_takes_the_counter_delta() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store);
        seed_counters(&store, device.id, "2026-08-27T06:00:00Z", 1000, 200);
        seed_counters(&store, device.id, "2026-08-27T22:00:00Z", 1120, 245);

        let result = service(&store).run_once(at("2026-08-28T03:00:00Z")).expect("run");
        assert_eq!(result.computed, 1);

        let summaries = store
            .summaries_for_device(device.id, SummaryPeriod::Daily)
            .expect("summaries");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].pages_printed, 120);
        assert_eq!(summaries[0].color_pages, 45);
        assert_eq!(summaries[0].mono_pages, 75);
    }

    #[test]
    fn a_second_pass_recomputes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store);
        seed_counters(&store, device.id, "2026-08-27T06:00:00Z", 1000, 200);
        seed_counters(&store, device.id, "2026-08-27T22:00:00Z", 1120, 245);

        let svc = service(&store);
        let now = at("2026-08-28T03:00:00Z");
        assert_eq!(svc.run_once(now).expect("run").computed, 1);
        assert_eq!(svc.run_once(now).expect("run").computed, 0);
        let summaries = store
            .summaries_for_device(device.id, SummaryPeriod::Daily)
            .expect("summaries");
        assert_eq!(summaries.len(), 1);
    }

    #[test]
    fn a_single_sample_is_not_enough_for_a_delta() {
        let store = Arc::new(InMemoryStore::new());
        let device = seed_device(&store);
        seed_counters(&store, device.id, "2026-08-27T06:00:00Z", 1000, 200);

        let result = service(&store).run_once(at("2026-08-28T03:00:00Z")).expect("run");
        assert_eq!(result.computed, 0);
        assert!(store
            .summaries_for_device(device.id, SummaryPeriod::Daily)
            .expect("summaries")
            .is_empty());
    }
}
