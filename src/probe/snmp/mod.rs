// SNMPv2c probe over UDP: sysUpTime as the liveness check, then the
// HOST-RESOURCES and IF-MIB tables for CPU, memory and interface state.

pub mod ber;

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::instrument;

use self::ber::{Oid, PduType, Response, Value};
use super::{Probe, ProbeError};
use crate::models::{DeviceDescriptor, DeviceMetrics};

const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
const SYS_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];
const HR_PROCESSOR_LOAD: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 3, 3, 1, 2];
const HR_STORAGE_SIZE: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 5];
const HR_STORAGE_USED: &[u32] = &[1, 3, 6, 1, 2, 1, 25, 2, 3, 1, 6];
const IF_OPER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];

/// ifOperStatus value for "up".
const IF_STATUS_UP: u64 = 1;
/// Resend an unanswered request after this long, until the probe deadline.
const RETRANSMIT_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on rows per walk, in case an agent never leaves the subtree.
const MAX_WALK_ROWS: usize = 4096;
const MAX_DATAGRAM: usize = 65_535;

pub struct SnmpProbe {
    next_request_id: AtomicI32,
}

impl Default for SnmpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SnmpProbe {
    pub fn new() -> Self {
        Self {
            next_request_id: AtomicI32::new(1),
        }
    }

    fn request_id(&self) -> i32 {
        // Wraps back to 1 instead of going negative.
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        if id <= 0 {
            self.next_request_id.store(2, Ordering::Relaxed);
            1
        } else {
            id
        }
    }

    #[instrument(skip(self, device), fields(device = %device.name, operation = "snmp_probe"))]
    async fn collect(
        &self,
        device: &DeviceDescriptor,
        deadline: Instant,
    ) -> Result<DeviceMetrics, ProbeError> {
        let target = resolve(device).await?;
        let bind = if target.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(target).await?;
        let session = Session {
            probe: self,
            socket,
            community: &device.community,
            deadline,
        };

        let uptime = session
            .get(&oid(SYS_UPTIME))
            .await?
            .ok_or_else(|| ProbeError::Malformed("sysUpTime.0 not available".into()))?;
        let uptime_ticks = uptime
            .as_u64()
            .ok_or_else(|| ProbeError::Malformed(format!("sysUpTime.0 is {:?}", uptime)))?;

        let sys_name = match session.get(&oid(SYS_NAME)).await {
            Ok(v) => v.and_then(|v| v.as_text()),
            Err(ProbeError::Timeout) => return Err(ProbeError::Timeout),
            Err(e) => {
                tracing::debug!(error = %e, "sysName.0 unavailable");
                None
            }
        };

        let cpu_values = session.walk(&oid(HR_PROCESSOR_LOAD)).await?;
        let used_values = session.walk(&oid(HR_STORAGE_USED)).await?;
        let size_values = session.walk(&oid(HR_STORAGE_SIZE)).await?;
        let if_values = session.walk(&oid(IF_OPER_STATUS)).await?;

        let (interfaces_up, interfaces_total) = interface_counts(&if_values);
        Ok(DeviceMetrics {
            sys_name,
            uptime_secs: uptime_ticks / 100,
            cpu_load: cpu_load(&cpu_values),
            memory_used_pct: memory_used_pct(&used_values, &size_values),
            interfaces_up,
            interfaces_total,
        })
    }
}

impl Probe for SnmpProbe {
    async fn probe(
        &self,
        device: &DeviceDescriptor,
        timeout: Duration,
    ) -> Result<DeviceMetrics, ProbeError> {
        self.collect(device, Instant::now() + timeout).await
    }
}

struct Session<'a> {
    probe: &'a SnmpProbe,
    socket: UdpSocket,
    community: &'a str,
    deadline: Instant,
}

impl Session<'_> {
    /// GET one OID. Ok(None) when the agent reports the variable as missing.
    async fn get(&self, oid: &Oid) -> Result<Option<Value>, ProbeError> {
        let resp = self.exchange(PduType::GetRequest, oid).await?;
        check_status(&resp)?;
        Ok(resp
            .varbinds
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .filter(|v| !v.is_exception()))
    }

    /// GETNEXT through the subtree under `base`. Agent errors end the walk with what was
    /// collected so far; a timeout fails the walk.
    async fn walk(&self, base: &Oid) -> Result<Vec<Value>, ProbeError> {
        let mut values = Vec::new();
        let mut current = base.clone();
        while values.len() < MAX_WALK_ROWS {
            let resp = match self.exchange(PduType::GetNextRequest, &current).await {
                Ok(r) => r,
                Err(ProbeError::Timeout) => return Err(ProbeError::Timeout),
                Err(e) => {
                    tracing::debug!(error = %e, base = %base, "walk ended early");
                    break;
                }
            };
            if check_status(&resp).is_err() {
                break;
            }
            let Some((next, value)) = resp.varbinds.into_iter().next() else {
                break;
            };
            // Stop at the end of the subtree, and on agents that do not advance.
            if !next.starts_with(base) || next <= current || value.is_exception() {
                break;
            }
            values.push(value);
            current = next;
        }
        Ok(values)
    }

    async fn exchange(&self, pdu: PduType, oid: &Oid) -> Result<Response, ProbeError> {
        let request_id = self.probe.request_id();
        let request = ber::encode_request(self.community, pdu, request_id, std::slice::from_ref(oid));
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let now = Instant::now();
            if now >= self.deadline {
                return Err(ProbeError::Timeout);
            }
            self.socket.send(&request).await.map_err(unreachable)?;
            let attempt_deadline = (now + RETRANSMIT_INTERVAL).min(self.deadline);
            match tokio::time::timeout_at(attempt_deadline, self.recv_matching(&mut buf, request_id))
                .await
            {
                Ok(result) => return result,
                Err(_) => continue,
            }
        }
    }

    async fn recv_matching(
        &self,
        buf: &mut [u8],
        request_id: i32,
    ) -> Result<Response, ProbeError> {
        loop {
            let n = self.socket.recv(buf).await.map_err(unreachable)?;
            match ber::decode_response(&buf[..n]) {
                Ok(resp) if resp.request_id == request_id => return Ok(resp),
                // Answer to an earlier exchange, or stray traffic.
                Ok(_) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn check_status(resp: &Response) -> Result<(), ProbeError> {
    if resp.error_status != 0 {
        return Err(ProbeError::Agent(format!(
            "error-status {} at index {}",
            resp.error_status, resp.error_index
        )));
    }
    Ok(())
}

/// ICMP port-unreachable surfaces as ECONNREFUSED on a connected UDP socket.
fn unreachable(e: std::io::Error) -> ProbeError {
    ProbeError::Unreachable(e.to_string())
}

async fn resolve(device: &DeviceDescriptor) -> Result<SocketAddr, ProbeError> {
    let mut addrs = tokio::net::lookup_host((device.host.as_str(), device.port))
        .await
        .map_err(|e| ProbeError::Unreachable(format!("resolving {}: {}", device.host, e)))?;
    addrs
        .next()
        .ok_or_else(|| ProbeError::Unreachable(format!("no address for {}", device.host)))
}

fn oid(arcs: &[u32]) -> Oid {
    Oid::from(arcs)
}

/// Mean of hrProcessorLoad rows. None when the table is empty or has non-numeric rows.
fn cpu_load(values: &[Value]) -> Option<f64> {
    let loads: Option<Vec<u64>> = values.iter().map(Value::as_u64).collect();
    let loads = loads?;
    if loads.is_empty() {
        return None;
    }
    Some(loads.iter().sum::<u64>() as f64 / loads.len() as f64)
}

/// Sum of hrStorageUsed over sum of hrStorageSize, percent.
fn memory_used_pct(used: &[Value], size: &[Value]) -> Option<f64> {
    if used.is_empty() || used.len() != size.len() {
        return None;
    }
    let used_total: u64 = used.iter().map(Value::as_u64).sum::<Option<u64>>()?;
    let size_total: u64 = size.iter().map(Value::as_u64).sum::<Option<u64>>()?;
    if size_total == 0 {
        return None;
    }
    Some(used_total as f64 / size_total as f64 * 100.0)
}

/// (up, total) from ifOperStatus rows. Non-numeric rows count toward the total but never as up.
fn interface_counts(values: &[Value]) -> (u32, u32) {
    let total = values.len() as u32;
    let up = values
        .iter()
        .filter(|v| v.as_u64() == Some(IF_STATUS_UP))
        .count() as u32;
    (up, total)
}
