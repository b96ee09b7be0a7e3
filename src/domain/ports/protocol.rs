use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("request to {0} timed out")]
    Timeout(IpAddr),
    #[error("network error talking to {addr}: {source}")]
    Io {
        addr: IpAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed response from {addr}: {detail}")]
    Malformed { addr: IpAddr, detail: String },
    #[error("agent at {addr} reported error status {status} at index {index}")]
    AgentError { addr: IpAddr, status: i64, index: i64 },
    #[error("object {0} not present on agent")]
    NoSuchObject(String),
}

impl ProtocolError {
    /// Connectivity failures mean the device is unreachable; the poller
    /// records an offline sample instead of propagating these.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Io { .. })
    }
}

/// Addressing and credentials for one management agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpTarget {
    pub addr: IpAddr,
    pub port: u16,
    pub community: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl SnmpTarget {
    #[must_use]
    pub fn new(addr: IpAddr, port: u16, community: &str) -> Self {
        Self {
            addr,
            port,
            community: community.to_owned(),
            timeout: Duration::from_secs(2),
            retries: 1,
        }
    }
}

/// Decoded value of a single managed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Oid(Vec<u32>),
    Counter(u64),
    Null,
}

impl ProtocolValue {
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Counter(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Lossy UTF-8 view of an octet-string value, trimmed of NULs and
    /// surrounding whitespace.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::OctetString(bytes) => Some(
                String::from_utf8_lossy(bytes)
                    .trim_matches(['\0', ' ', '\t', '\r', '\n'])
                    .to_owned(),
            ),
            _ => None,
        }
    }
}

/// One step of a table walk: the object's identifier and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkStep {
    pub oid: Vec<u32>,
    pub value: ProtocolValue,
}

/// Read access to a device management agent.
pub trait ProtocolClient: Send + Sync {
    /// Fetch a single object by identifier.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` on timeout, transport failure, or a
    /// malformed or error response.
    fn get(&self, target: &SnmpTarget, oid: &[u32]) -> Result<ProtocolValue, ProtocolError>;

    /// Walk the subtree under `root`, returning objects in lexicographic
    /// identifier order. The walk stops at the end of the subtree or
    /// after `limit` entries.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` on timeout, transport failure, or a
    /// malformed response mid-walk.
    fn walk(
        &self,
        target: &SnmpTarget,
        root: &[u32],
        limit: usize,
    ) -> Result<Vec<WalkStep>, ProtocolError>;
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_classification() {
        let addr: IpAddr = "10.0.0.9".parse().expect("addr");
        assert!(ProtocolError::Timeout(addr).is_connectivity());
        assert!(!ProtocolError::NoSuchObject("1.3.6.1".into()).is_connectivity());
    }

    #[test]
    fn octet_string_text_is_trimmed() {
        let v = ProtocolValue::OctetString(b"  HP LaserJet\0\0".to_vec());
        assert_eq!(v.as_text().expect("text"), "HP LaserJet");
        assert!(ProtocolValue::Null.as_text().is_none());
    }
}
