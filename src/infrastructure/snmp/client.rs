use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicI32, Ordering};

use tracing::{debug, trace};

use crate::domain::ports::protocol::{
    ProtocolClient, ProtocolError, ProtocolValue, SnmpTarget, WalkStep,
};
use crate::infrastructure::snmp::codec::{self, PduKind, RawValue, Response};

const MAX_DATAGRAM: usize = 4096;

/// SNMP v2c client over one ephemeral UDP socket per request.
///
/// Requests are synchronous with a per-call timeout; callers drive
/// concurrency from blocking worker tasks.
pub struct UdpSnmpClient {
    request_id: AtomicI32,
}

impl UdpSnmpClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: AtomicI32::new(1),
        }
    }

    fn next_request_id(&self) -> i32 {
        self.request_id.fetch_add(1, Ordering::Relaxed).max(1)
    }

    fn exchange(
        &self,
        target: &SnmpTarget,
        kind: PduKind,
        oid: &[u32],
    ) -> Result<Response, ProtocolError> {
        let io_err = |source| ProtocolError::Io {
            addr: target.addr,
            source,
        };

        let socket = UdpSocket::bind(local_bind(target)).map_err(io_err)?;
        socket.set_read_timeout(Some(target.timeout)).map_err(io_err)?;
        let peer = SocketAddr::new(target.addr, target.port);

        let mut buf = [0u8; MAX_DATAGRAM];
        for attempt in 0..=target.retries {
            let request_id = self.next_request_id();
            let msg = codec::encode_request(kind, &target.community, request_id, oid);
            socket.send_to(&msg, peer).map_err(io_err)?;
            trace!(addr = %target.addr, request_id, attempt, "sent request");

            loop {
                let (n, from) = match socket.recv_from(&mut buf) {
                    Ok(ok) => ok,
                    Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                        break;
                    }
                    Err(e) => return Err(io_err(e)),
                };
                if from.ip() != target.addr {
                    continue;
                }
                let resp = codec::decode_response(&buf[..n]).map_err(|e| {
                    ProtocolError::Malformed {
                        addr: target.addr,
                        detail: e.to_string(),
                    }
                })?;
                // Stale answer to an earlier timed-out request.
                if resp.request_id != i64::from(request_id) {
                    continue;
                }
                if resp.error_status != 0 {
                    return Err(ProtocolError::AgentError {
                        addr: target.addr,
                        status: resp.error_status,
                        index: resp.error_index,
                    });
                }
                return Ok(resp);
            }
        }

        debug!(addr = %target.addr, oid = %format_oid(oid), "request timed out");
        Err(ProtocolError::Timeout(target.addr))
    }
}

impl Default for UdpSnmpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolClient for UdpSnmpClient {
    fn get(&self, target: &SnmpTarget, oid: &[u32]) -> Result<ProtocolValue, ProtocolError> {
        let resp = self.exchange(target, PduKind::Get, oid)?;
        let (_, raw) = resp
            .varbinds
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::Malformed {
                addr: target.addr,
                detail: "empty varbind list".to_owned(),
            })?;
        match raw {
            RawValue::Value(v) => Ok(v),
            RawValue::NoSuchObject | RawValue::NoSuchInstance | RawValue::EndOfMibView => {
                Err(ProtocolError::NoSuchObject(format_oid(oid)))
            }
        }
    }

    fn walk(
        &self,
        target: &SnmpTarget,
        root: &[u32],
        limit: usize,
    ) -> Result<Vec<WalkStep>, ProtocolError> {
        let mut steps = Vec::new();
        let mut cursor = root.to_vec();
        while steps.len() < limit {
            let resp = self.exchange(target, PduKind::GetNext, &cursor)?;
            let Some((oid, raw)) = resp.varbinds.into_iter().next() else {
                break;
            };
            if !oid.starts_with(root) || oid == cursor {
                break;
            }
            match raw {
                RawValue::Value(value) => {
                    cursor.clone_from(&oid);
                    steps.push(WalkStep { oid, value });
                }
                RawValue::EndOfMibView | RawValue::NoSuchObject | RawValue::NoSuchInstance => break,
            }
        }
        Ok(steps)
    }
}

fn local_bind(target: &SnmpTarget) -> SocketAddr {
    if target.addr.is_ipv4() {
        SocketAddr::from((std::net::Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, 0))
    }
}

fn format_oid(oid: &[u32]) -> String {
    oid.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn oid_formatting() {
        assert_eq!(format_oid(&[1, 3, 6, 1, 2, 1, 1, 1, 0]), "1.3.6.1.2.1.1.1.0");
    }

    #[test]
    fn request_ids_increment() {
        let client = UdpSnmpClient::new();
        let a = client.next_request_id();
        let b = client.next_request_id();
        assert!(b > a);
    }
}
