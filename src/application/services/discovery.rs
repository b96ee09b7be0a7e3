use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::application::config::{DiscoveryConfig, SnmpConfig};
use crate::domain::entities::device::DeviceCandidate;
use crate::domain::ports::protocol::{ProtocolClient, SnmpTarget};
use crate::domain::ports::store::DeviceStore;
use crate::infrastructure::snmp::oids;

/// A sweep wider than this floods the network for no benefit.
const MIN_PREFIX_LEN: u8 = 16;

/// Counts from one discovery sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryResult {
    pub probed: usize,
    pub found: usize,
    pub known_skipped: usize,
}

/// Sweeps the configured subnet for printers that answer the management
/// probe but are not registered yet. Responders whose system description
/// matches a vendor signature are recorded as candidates for an operator
/// to confirm; nothing is ever auto-registered.
#[derive(Clone)]
pub struct DiscoveryService {
    protocol: Arc<dyn ProtocolClient>,
    devices: Arc<dyn DeviceStore>,
    discovery: DiscoveryConfig,
    snmp: SnmpConfig,
}

impl DiscoveryService {
    #[must_use]
    pub fn new(
        protocol: Arc<dyn ProtocolClient>,
        devices: Arc<dyn DeviceStore>,
        discovery: DiscoveryConfig,
        snmp: SnmpConfig,
    ) -> Self {
        Self {
            protocol,
            devices,
            discovery,
            snmp,
        }
    }

    /// One sweep over the configured network. Addresses already present
    /// in the inventory are skipped before any probe goes out; probes run
    /// through the same bounded worker pool as polling.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIDR cannot be parsed or the inventory
    /// cannot be read.
    pub async fn run_sweep(&self) -> anyhow::Result<DiscoveryResult> {
        let hosts = expand_cidr(&self.discovery.network)?;
        let mut result = DiscoveryResult::default();

        let semaphore = Arc::new(Semaphore::new(self.snmp.max_concurrent_polls.max(1)));
        let mut tasks = JoinSet::new();
        for addr in hosts {
            if self.devices.address_known(&addr.to_string())? {
                result.known_skipped += 1;
                continue;
            }
            let permit = semaphore.clone().acquire_owned().await?;
            let service = self.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                service.probe_host(addr)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            result.probed += 1;
            match joined {
                Ok(Some(candidate)) => {
                    tracing::info!(
                        "discovered printer at {}: {}",
                        candidate.address,
                        candidate.description
                    );
                    self.devices.upsert_candidate(&candidate)?;
                    result.found += 1;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("probe task panicked: {e}"),
            }
        }

        tracing::info!(
            "discovery sweep of {}: {} probed, {} found, {} already known",
            self.discovery.network,
            result.probed,
            result.found,
            result.known_skipped
        );
        Ok(result)
    }

    /// Probe one host: a single short-timeout, no-retry description get.
    /// Non-responders and non-matching descriptions both come back `None`.
    #[must_use]
    pub fn probe_host(&self, addr: IpAddr) -> Option<DeviceCandidate> {
        let target = SnmpTarget {
            addr,
            port: self.snmp.default_port,
            community: self.snmp.default_community.clone(),
            timeout: Duration::from_millis(self.discovery.probe_timeout_ms),
            retries: 0,
        };

        let description = self
            .protocol
            .get(&target, oids::SYSTEM_DESCRIPTION)
            .ok()?
            .as_text()?;
        let lowered = description.to_lowercase();
        if !self
            .discovery
            .vendor_signatures
            .iter()
            .any(|sig| lowered.contains(sig.as_str()))
        {
            tracing::debug!("{addr} answered but is not a printer: {description:?}");
            return None;
        }

        // Identity fields are best-effort; an empty string is fine here,
        // the operator confirms candidates by hand anyway.
        let name = self
            .best_effort_text(&target, oids::SYSTEM_NAME)
            .unwrap_or_else(|| addr.to_string());
        let model = self
            .best_effort_text(&target, oids::DEVICE_MODEL)
            .unwrap_or_default();
        let serial_number = self
            .best_effort_text(&target, oids::SERIAL_NUMBER)
            .unwrap_or_default();

        Some(DeviceCandidate {
            address: addr,
            name,
            model,
            serial_number,
            description,
            discovered_at: Utc::now(),
        })
    }

    fn best_effort_text(&self, target: &SnmpTarget, oid: &[u32]) -> Option<String> {
        self.protocol
            .get(target, oid)
            .ok()
            .and_then(|v| v.as_text())
            .filter(|s| !s.is_empty())
    }
}

/// Expand an IPv4 CIDR like "192.168.1.0/24" into its host addresses.
/// The network and broadcast addresses are excluded except for /31 and
/// /32, which have none.
///
/// # Errors
///
/// Returns an error on a malformed CIDR, a non-IPv4 network, or a prefix
/// wider than /16.
pub fn expand_cidr(cidr: &str) -> anyhow::Result<Vec<IpAddr>> {
    let (addr_part, len_part) = cidr
        .split_once('/')
        .with_context(|| format!("'{cidr}' is not in a.b.c.d/len form"))?;
    let base: Ipv4Addr = addr_part
        .parse()
        .with_context(|| format!("'{addr_part}' is not an IPv4 address"))?;
    let prefix_len: u8 = len_part
        .parse()
        .with_context(|| format!("'{len_part}' is not a prefix length"))?;
    if prefix_len > 32 {
        bail!("prefix length /{prefix_len} is out of range");
    }
    if prefix_len < MIN_PREFIX_LEN {
        bail!("refusing to sweep more than a /{MIN_PREFIX_LEN} ({cidr})");
    }

    let base = u32::from(base);
    let mask = u32::MAX << (32 - prefix_len);
    let network = base & mask;
    let broadcast = network | !mask;

    let range: Vec<u32> = if prefix_len >= 31 {
        (network..=broadcast).collect()
    } else {
        (network + 1..broadcast).collect()
    };
    Ok(range
        .into_iter()
        .map(|raw| IpAddr::V4(Ipv4Addr::from(raw)))
        .collect())
}
