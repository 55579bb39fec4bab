//! Peer identity and address definitions.
//!
//! Peers are identified by a registry-assigned sequence number and keep the
//! address they were accepted from for their whole lifetime.

use std::net::SocketAddr;
use std::str::FromStr;

/// Alias given to every peer until the operator renames it
pub const DEFAULT_ALIAS: &str = "none";

/// Unique identifier for a connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// Wrap a raw sequence number
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the underlying sequence number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

/// Address snapshot captured when a peer was accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    /// Remote host as text
    pub host: String,
    /// Remote port
    pub port: u16,
}

impl PeerAddress {
    /// Create an address snapshot
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
