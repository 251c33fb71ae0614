//! Network reachability probes
//!
//! A probe answers "is there a usable network interface right now?". The
//! answer is a heuristic and never a guarantee that the data source is
//! reachable: an interface can be up while the server is down, behind a
//! captive portal, or firewalled. The repository therefore treats a positive
//! answer as permission to try the network, and relies on the fetch client's
//! retries plus its own cache fallback when that attempt fails anyway.

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tracing::debug;

/// Default address the route probe aims at (a public DNS resolver)
pub const DEFAULT_PROBE_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53);

/// Reports current network reachability
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Whether a network interface appears usable
    ///
    /// False positives are expected; false negatives should be rare.
    async fn is_connected(&self) -> bool;
}

/// Probe that asks the OS for a route to a public address
///
/// Connecting a UDP socket sends no packets; it only resolves a route and a
/// local source address. Success means some non-loopback interface (Wi-Fi,
/// Ethernet, cellular tether) is up with a route out. It says nothing about
/// whether the remote server will answer.
#[derive(Debug, Clone)]
pub struct RouteProbe {
    target: SocketAddr,
}

impl RouteProbe {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Default for RouteProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ADDR)
    }
}

#[async_trait]
impl ConnectivityProbe for RouteProbe {
    async fn is_connected(&self) -> bool {
        let bind_addr: SocketAddr = if self.target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => socket,
            Err(e) => {
                debug!(error = %e, "could not bind probe socket");
                return false;
            }
        };

        if let Err(e) = socket.connect(self.target).await {
            debug!(target = %self.target, error = %e, "no route to probe target");
            return false;
        }

        match socket.local_addr() {
            Ok(local) => !local.ip().is_unspecified(),
            Err(e) => {
                debug!(error = %e, "probe socket has no local address");
                false
            }
        }
    }
}

/// Probe with a fixed, switchable answer
///
/// Used to force offline mode and in tests.
#[derive(Debug, Default)]
pub struct StaticProbe {
    connected: AtomicBool,
}

impl StaticProbe {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
