use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::application::config::SnmpConfig;
use crate::application::services::ingest::IngestService;
use crate::domain::entities::device::{Device, DeviceStatus};
use crate::domain::entities::sample::{PaperStatus, StatusSample};
use crate::domain::entities::supply::{map_supply_description, SupplyLevel};
use crate::domain::ports::protocol::{ProtocolClient, SnmpTarget};
use crate::domain::ports::store::{DeviceStore, JobStore};
use crate::infrastructure::snmp::oids;

/// Everything one poll learned about a device: the status sample plus the
/// walked supply table.
#[derive(Debug, Clone)]
pub struct DeviceReading {
    pub sample: StatusSample,
    pub supplies: Vec<SupplyLevel>,
}

/// Counts from one poll pass over the monitored fleet.
#[derive(Debug, Default, Clone, Copy)]
pub struct PollCycleResult {
    pub polled: usize,
    pub online: usize,
    pub offline: usize,
    pub failed: usize,
}

/// Counts from one supply refresh pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SupplyRefreshResult {
    pub polled: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Polls devices over the management protocol and hands readings to the
/// ingestion service. Device I/O is blocking; the cycle drives it through
/// a bounded worker pool.
#[derive(Clone)]
pub struct PollerService {
    protocol: Arc<dyn ProtocolClient>,
    devices: Arc<dyn DeviceStore>,
    jobs: Arc<dyn JobStore>,
    ingest: Arc<IngestService>,
    snmp: SnmpConfig,
}

impl PollerService {
    #[must_use]
    pub fn new(
        protocol: Arc<dyn ProtocolClient>,
        devices: Arc<dyn DeviceStore>,
        jobs: Arc<dyn JobStore>,
        ingest: Arc<IngestService>,
        snmp: SnmpConfig,
    ) -> Self {
        Self {
            protocol,
            devices,
            jobs,
            ingest,
            snmp,
        }
    }

    /// Poll every monitored device once, bounded by the configured worker
    /// pool, and ingest each reading. Per-device failures are logged and
    /// counted; they never abort the pass.
    ///
    /// # Errors
    ///
    /// Returns an error only if the device list itself cannot be read.
    pub async fn run_cycle(&self) -> anyhow::Result<PollCycleResult> {
        let fleet = self.devices.monitored_devices()?;
        let semaphore = Arc::new(Semaphore::new(self.snmp.max_concurrent_polls.max(1)));
        let mut tasks = JoinSet::new();

        for device in fleet {
            let permit = semaphore.clone().acquire_owned().await?;
            let service = self.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let reading = service.poll_device(&device);
                let online = reading.sample.is_online;
                let ingested = service.ingest.ingest(&device, &reading);
                if let Err(e) = &ingested {
                    tracing::warn!("failed to ingest reading for {}: {e}", device.name);
                }
                (online, ingested.is_ok())
            });
        }

        let mut result = PollCycleResult::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((online, ingested)) => {
                    result.polled += 1;
                    if online {
                        result.online += 1;
                    } else {
                        result.offline += 1;
                    }
                    if !ingested {
                        result.failed += 1;
                    }
                }
                Err(e) => {
                    result.failed += 1;
                    tracing::warn!("poll task panicked: {e}");
                }
            }
        }

        tracing::info!(
            "poll pass complete: {} device(s), {} online, {} offline, {} failed",
            result.polled,
            result.online,
            result.offline,
            result.failed
        );
        Ok(result)
    }

    /// Re-walk the supply table for every active monitored device without
    /// recording a status sample. Runs on its own, tighter cadence than the
    /// full poll so consumable levels stay fresh between status passes.
    ///
    /// # Errors
    ///
    /// Returns an error only if the device list itself cannot be read.
    pub async fn refresh_supplies(&self) -> anyhow::Result<SupplyRefreshResult> {
        let fleet: Vec<Device> = self
            .devices
            .monitored_devices()?
            .into_iter()
            .filter(|d| d.status == DeviceStatus::Active)
            .collect();
        let semaphore = Arc::new(Semaphore::new(self.snmp.max_concurrent_polls.max(1)));
        let mut tasks = JoinSet::new();

        for device in fleet {
            let permit = semaphore.clone().acquire_owned().await?;
            let service = self.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let target = service.target_for(&device);
                let supplies = service.walk_supplies(&target, device.id);
                if supplies.is_empty() {
                    return (false, true);
                }
                let ingested = service.ingest.ingest_supplies(&supplies);
                if let Err(e) = &ingested {
                    tracing::warn!("failed to store supplies for {}: {e}", device.name);
                }
                (true, ingested.is_ok())
            });
        }

        let mut result = SupplyRefreshResult::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((updated, ok)) => {
                    result.polled += 1;
                    if updated {
                        result.updated += 1;
                    }
                    if !ok {
                        result.failed += 1;
                    }
                }
                Err(e) => {
                    result.failed += 1;
                    tracing::warn!("supply refresh task panicked: {e}");
                }
            }
        }

        tracing::info!(
            "supply refresh complete: {} device(s), {} updated, {} failed",
            result.polled,
            result.updated,
            result.failed
        );
        Ok(result)
    }

    /// Poll one device. A failed connectivity probe short-circuits to an
    /// offline sample; after that, each sub-query degrades to a default
    /// field on failure so partial data is still a valid reading.
    #[must_use]
    pub fn poll_device(&self, device: &Device) -> DeviceReading {
        let target = self.target_for(device);
        let started = Instant::now();

        if let Err(e) = self.protocol.get(&target, oids::DEVICE_STATUS) {
            if e.is_connectivity() {
                tracing::debug!("{} unreachable: {e}", device.name);
            } else {
                tracing::warn!("{} failed the connectivity probe: {e}", device.name);
            }
            return DeviceReading {
                sample: StatusSample::offline(device.id, Utc::now()),
                supplies: vec![],
            };
        }
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let paper_status = self
            .get_i64(&target, oids::PAPER_INPUT_STATUS)
            .map_or(PaperStatus::Unknown, PaperStatus::from_code);
        let paper_level = self.paper_level(&target);
        let total_pages = self
            .get_i64(&target, oids::TOTAL_PAGES)
            .map_or(0, |v| v.max(0) as u64);
        let color_pages = self
            .get_i64(&target, oids::COLOR_PAGES)
            .map_or(0, |v| v.max(0) as u64);
        let temperature = self.get_i64(&target, oids::TEMPERATURE).map(|v| v as f64);
        let error_code = self
            .get_i64(&target, oids::ERROR_CODE)
            .filter(|code| *code != 0)
            .map(|code| code.to_string());
        let error_message = if error_code.is_some() {
            self.get_text(&target, oids::ERROR_DESCRIPTION)
        } else {
            None
        };

        let queue_size = match self.jobs.active_job_count(device.id) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("failed to read queue depth for {}: {e}", device.name);
                0
            }
        };

        let sample = StatusSample {
            device_id: device.id,
            is_online: true,
            paper_status,
            paper_level,
            queue_size,
            total_pages,
            color_pages,
            temperature,
            error_code,
            error_message,
            response_time_ms: Some(response_time_ms),
            recorded_at: Utc::now(),
        };

        DeviceReading {
            supplies: self.walk_supplies(&target, device.id),
            sample,
        }
    }

    fn target_for(&self, device: &Device) -> SnmpTarget {
        let community = if device.snmp_community.is_empty() {
            &self.snmp.default_community
        } else {
            &device.snmp_community
        };
        let mut target = SnmpTarget::new(device.address, device.snmp_port, community);
        target.timeout = std::time::Duration::from_millis(self.snmp.timeout_ms);
        target.retries = self.snmp.retries;
        target
    }

    /// Remaining paper as a percentage of default-tray capacity. A level
    /// the agent reports as negative means "not measurable" and maps to 0.
    fn paper_level(&self, target: &SnmpTarget) -> u8 {
        let level = self.get_i64(target, oids::PAPER_INPUT_LEVEL).unwrap_or(-1);
        let capacity = self
            .get_i64(target, oids::PAPER_INPUT_CAPACITY)
            .unwrap_or(0);
        if level < 0 || capacity <= 0 {
            return 0;
        }
        (level.saturating_mul(100) / capacity).clamp(0, 100) as u8
    }

    /// Walk the supply table: descriptions first, then the level and
    /// capacity cells for each recognized row. Rows whose description
    /// matches no known supply keyword are dropped, not guessed.
    fn walk_supplies(&self, target: &SnmpTarget, device_id: i64) -> Vec<SupplyLevel> {
        let steps = match self
            .protocol
            .walk(target, oids::SUPPLY_DESCRIPTION, self.snmp.supply_walk_limit)
        {
            Ok(steps) => steps,
            Err(e) => {
                tracing::debug!("supply walk aborted for device {device_id}: {e}");
                return vec![];
            }
        };

        let now = Utc::now();
        let mut supplies = vec![];
        for step in steps {
            let Some(index) = step.oid.last().copied() else {
                continue;
            };
            let Some(description) = step.value.as_text() else {
                continue;
            };
            let Some(supply_type) = map_supply_description(&description) else {
                tracing::debug!("unrecognized supply dropped: {description:?}");
                continue;
            };

            let level = self
                .get_i64(target, &column_cell(oids::SUPPLY_LEVEL, index))
                .unwrap_or(-1);
            let max_capacity = self
                .get_i64(target, &column_cell(oids::SUPPLY_MAX_CAPACITY, index))
                .unwrap_or(0);
            let percent = if max_capacity > 0 {
                level.saturating_mul(100) / max_capacity
            } else {
                // Some agents report the level as a percentage directly.
                level
            };
            supplies.push(SupplyLevel::from_reading(
                device_id,
                supply_type,
                percent,
                max_capacity,
                now,
            ));
        }
        supplies
    }

    fn get_i64(&self, target: &SnmpTarget, oid: &[u32]) -> Option<i64> {
        match self.protocol.get(target, oid) {
            Ok(value) => value.as_i64(),
            Err(e) => {
                tracing::debug!("get {} failed: {e}", format_oid(oid));
                None
            }
        }
    }

    fn get_text(&self, target: &SnmpTarget, oid: &[u32]) -> Option<String> {
        match self.protocol.get(target, oid) {
            Ok(value) => value.as_text().filter(|s| !s.is_empty()),
            Err(e) => {
                tracing::debug!("get {} failed: {e}", format_oid(oid));
                None
            }
        }
    }
}

fn column_cell(column: &[u32], index: u32) -> Vec<u32> {
    let mut oid = column.to_vec();
    oid.push(index);
    oid
}

fn format_oid(oid: &[u32]) -> String {
    oid.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::ports::protocol::{
        ProtocolClient, ProtocolError, ProtocolValue, SnmpTarget, WalkStep,
    };

    /// Scripted agent: a fixed oid-to-value table, unreachable when empty.
    /// Per-host entries take precedence over the shared table.
    #[derive(Default)]
    pub struct ScriptedAgent {
        values: HashMap<Vec<u32>, ProtocolValue>,
        host_values: HashMap<(IpAddr, Vec<u32>), ProtocolValue>,
        walks: HashMap<Vec<u32>, Vec<WalkStep>>,
        pub gets: AtomicUsize,
    }

    impl ScriptedAgent {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_value(mut self, oid: &[u32], value: ProtocolValue) -> Self {
            self.values.insert(oid.to_vec(), value);
            self
        }

        pub fn with_host_value(mut self, addr: IpAddr, oid: &[u32], value: ProtocolValue) -> Self {
            self.host_values.insert((addr, oid.to_vec()), value);
            self
        }

        pub fn with_walk(mut self, root: &[u32], steps: Vec<WalkStep>) -> Self {
            self.walks.insert(root.to_vec(), steps);
            self
        }

        fn is_silent(&self) -> bool {
            self.values.is_empty() && self.host_values.is_empty() && self.walks.is_empty()
        }
    }

    impl ProtocolClient for ScriptedAgent {
        fn get(
            &self,
            target: &SnmpTarget,
            oid: &[u32],
        ) -> Result<ProtocolValue, ProtocolError> {
            self.gets.fetch_add(1, Ordering::Relaxed);
            if self.is_silent() {
                return Err(ProtocolError::Timeout(target.addr));
            }
            self.host_values
                .get(&(target.addr, oid.to_vec()))
                .or_else(|| self.values.get(oid))
                .cloned()
                .ok_or_else(|| ProtocolError::NoSuchObject(super::format_oid(oid)))
        }

        fn walk(
            &self,
            target: &SnmpTarget,
            root: &[u32],
            limit: usize,
        ) -> Result<Vec<WalkStep>, ProtocolError> {
            if self.is_silent() {
                return Err(ProtocolError::Timeout(target.addr));
            }
            let mut steps = self.walks.get(root).cloned().unwrap_or_default();
            steps.truncate(limit);
            Ok(steps)
        }
    }
}
