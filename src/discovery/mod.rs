//! Discovery module
//!
//! Passive resolution of the telemetry peer: ForeFlight broadcasts a JSON
//! announcement on a well-known UDP port; the resolver listens for one,
//! extracts the sender address and announced GDL-90 port, and is done.
//! Anything that is not a matching announcement is silently ignored.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::protocol::DEFAULT_TELEMETRY_PORT;

/// Well-known port ForeFlight broadcasts its announcement on
pub const DISCOVERY_PORT: u16 = 63093;

/// Required value of the announcement's `App` field
pub const APP_MARKER: &str = "ForeFlight";

/// Discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// The resolved telemetry peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Outcome of one resolution attempt. A timeout is an ordinary result,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Endpoint),
    TimedOut,
}

/// Broadcast announcement schema. Parsed defensively; unknown fields are
/// ignored and a failed parse just means "not a match".
#[derive(Debug, Deserialize)]
struct Announcement {
    #[serde(rename = "App")]
    app: String,
    #[serde(rename = "GDL90")]
    gdl90: Option<Gdl90Section>,
}

#[derive(Debug, Deserialize)]
struct Gdl90Section {
    port: Option<u16>,
}

/// One-shot discovery listener
pub struct Resolver {
    socket: UdpSocket,
}

impl Resolver {
    /// Bind the inbound discovery socket. Bind failure is fatal for the
    /// attempt and surfaced to the caller.
    pub async fn bind(port: u16) -> DiscoveryResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        tracing::info!("Listening for {} broadcast on port {}", APP_MARKER, port);
        Ok(Self { socket })
    }

    /// Port the resolver is actually bound to
    pub fn local_port(&self) -> DiscoveryResult<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Wait for a valid announcement or the timeout, whichever comes
    /// first. Consumes the resolver: resolution is one-shot and the socket
    /// is closed on return.
    pub async fn resolve(self, timeout: Duration) -> DiscoveryResult<Resolution> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 2048];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Resolution::TimedOut);
            }

            let (len, sender) =
                match tokio::time::timeout(remaining, self.socket.recv_from(&mut buf)).await {
                    Err(_) => return Ok(Resolution::TimedOut),
                    Ok(result) => result?,
                };

            match announced_port(&buf[..len]) {
                Some(port) => {
                    let endpoint = Endpoint {
                        ip: sender.ip(),
                        port,
                    };
                    tracing::info!("{} discovered at {}:{}", APP_MARKER, endpoint.ip, endpoint.port);
                    return Ok(Resolution::Found(endpoint));
                }
                None => {
                    tracing::debug!("Ignoring non-matching datagram from {}", sender);
                }
            }
        }
    }
}

/// Parse a datagram as an announcement and extract the telemetry port.
/// Returns None for non-JSON payloads, missing markers, or announcements
/// without a GDL90 section.
fn announced_port(datagram: &[u8]) -> Option<u16> {
    let announcement: Announcement = serde_json::from_slice(datagram).ok()?;
    if announcement.app != APP_MARKER {
        return None;
    }
    let section = announcement.gdl90?;
    Some(section.port.unwrap_or(DEFAULT_TELEMETRY_PORT))
}
