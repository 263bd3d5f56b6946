use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence, SurgeError, ICMP};
use thiserror::Error;
use tracing::warn;

const ECHO_PAYLOAD: [u8; 32] = [0; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnreachableKind {
    Host,
    Net,
}

/// Outcome of one echo probe. `TransmitFailed` doubles as the mapping for any
/// client error, so a broken probe never escapes a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProbeResult {
    Reply { rtt: Duration, bytes: usize, ttl: u8 },
    Unreachable(UnreachableKind),
    TimedOut,
    TransmitFailed,
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("icmp socket unavailable: {0}")]
    Socket(String),
    #[error("probe failed: {0}")]
    Transmit(String),
}

#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<ProbeResult, ProbeError>;
}

/// Echo prober over raw ICMP sockets. One shared socket per address family;
/// probes for different targets run concurrently on it.
pub struct IcmpProbeClient {
    v4: Client,
    v6: Option<Client>,
    sequence: AtomicU16,
}

impl IcmpProbeClient {
    pub fn new() -> Result<Self, ProbeError> {
        let v4 = Client::new(&Config::default())
            .map_err(|err| ProbeError::Socket(err.to_string()))?;
        let v6 = match Client::new(&Config::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(err) => {
                warn!(error = %err, "ipv6 probing unavailable");
                None
            }
        };

        Ok(Self {
            v4,
            v6,
            sequence: AtomicU16::new(0),
        })
    }

    fn classify_io(err: io::Error) -> ProbeResult {
        match err.kind() {
            io::ErrorKind::HostUnreachable => ProbeResult::Unreachable(UnreachableKind::Host),
            io::ErrorKind::NetworkUnreachable => ProbeResult::Unreachable(UnreachableKind::Net),
            _ => ProbeResult::TransmitFailed,
        }
    }
}

#[async_trait]
impl ProbeClient for IcmpProbeClient {
    async fn probe(&self, address: IpAddr, timeout: Duration) -> Result<ProbeResult, ProbeError> {
        let client = match address {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => self
                .v6
                .as_ref()
                .ok_or_else(|| ProbeError::Socket("ipv6 probing unavailable".to_string()))?,
        };

        let mut pinger = client.pinger(address, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let outcome = pinger.ping(PingSequence(sequence), &ECHO_PAYLOAD).await;

        Ok(match outcome {
            Ok((IcmpPacket::V4(packet), rtt)) => ProbeResult::Reply {
                rtt,
                bytes: packet.get_size(),
                ttl: packet.get_ttl().unwrap_or_default(),
            },
            Ok((IcmpPacket::V6(packet), rtt)) => ProbeResult::Reply {
                rtt,
                bytes: packet.get_size(),
                ttl: packet.get_max_hop_limit(),
            },
            Err(SurgeError::Timeout { .. }) => ProbeResult::TimedOut,
            Err(SurgeError::IOError(err)) => Self::classify_io(err),
            Err(err) => ProbeResult::Unknown(err.to_string()),
        })
    }
}
