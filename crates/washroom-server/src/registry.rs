//! Peer registry for tracking connected peers.
//!
//! The registry is the only state shared between the acceptor task and the
//! console. Every operation holds one mutex for the duration of the map
//! update only; network I/O always happens on owned copies after the lock is
//! released.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};

use washroom_core::{PeerAddress, PeerId, Result, WashroomError, DEFAULT_ALIAS};
use washroom_protocol::PeerChannel;

/// Exclusive access to a live peer channel
pub type ChannelGuard = OwnedMappedMutexGuard<Option<PeerChannel>, PeerChannel>;

/// Shared handle to a peer's channel.
///
/// The channel is taken out exactly once by [`PeerLink::close`]; any clone
/// used afterwards gets `PeerClosed`.
#[derive(Clone)]
pub struct PeerLink {
    channel: Arc<AsyncMutex<Option<PeerChannel>>>,
}

impl PeerLink {
    fn new(channel: PeerChannel) -> Self {
        Self {
            channel: Arc::new(AsyncMutex::new(Some(channel))),
        }
    }

    /// Lock the channel for one exchange
    pub async fn acquire(&self) -> Result<ChannelGuard> {
        let guard = Arc::clone(&self.channel).lock_owned().await;
        OwnedMutexGuard::try_map(guard, Option::as_mut).map_err(|_| WashroomError::PeerClosed)
    }

    /// Shut the transport down; returns false if it was already closed
    pub async fn close(&self) -> bool {
        let taken = self.channel.lock().await.take();
        match taken {
            Some(mut channel) => {
                channel.close().await;
                true
            }
            None => false,
        }
    }

    /// Check if the channel has been closed
    pub async fn is_closed(&self) -> bool {
        self.channel.lock().await.is_none()
    }
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerLink").finish_non_exhaustive()
    }
}

/// Descriptive fields of a registered peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Registry-assigned id
    pub id: PeerId,
    /// Address captured at accept time
    pub address: PeerAddress,
    /// Operator-chosen display name
    pub alias: String,
    /// When the peer was accepted
    pub connected_at: DateTime<Utc>,
}

/// Owned copy of a registry entry
#[derive(Debug, Clone)]
pub struct Peer {
    /// Peer metadata
    pub info: PeerInfo,
    /// Handle to the peer's channel
    pub link: PeerLink,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    peers: BTreeMap<PeerId, Peer>,
}

/// Thread-safe registry of connected peers
#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl PeerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a newly accepted peer and assign it the next id
    pub fn register(&self, channel: PeerChannel, address: PeerAddress) -> PeerId {
        let link = PeerLink::new(channel);
        let id = {
            let mut inner = self.lock();
            let id = PeerId::new(inner.next_id);
            inner.next_id += 1;
            inner.peers.insert(
                id,
                Peer {
                    info: PeerInfo {
                        id,
                        address: address.clone(),
                        alias: DEFAULT_ALIAS.to_string(),
                        connected_at: Utc::now(),
                    },
                    link,
                },
            );
            id
        };

        info!(peer_id = %id, address = %address, "Peer registered");
        id
    }

    /// Remove a peer and close its channel; unknown ids are a no-op
    pub async fn unregister(&self, id: PeerId) -> bool {
        let removed = self.lock().peers.remove(&id);
        match removed {
            Some(peer) => {
                peer.link.close().await;
                info!(peer_id = %id, address = %peer.info.address, "Peer unregistered");
                true
            }
            None => {
                debug!(peer_id = %id, "Unregister of unknown peer ignored");
                false
            }
        }
    }

    /// Give a peer a display alias
    pub fn rename(&self, id: PeerId, alias: &str) -> Result<()> {
        let mut inner = self.lock();
        match inner.peers.get_mut(&id) {
            Some(peer) => {
                peer.info.alias = alias.to_string();
                debug!(peer_id = %id, alias, "Peer renamed");
                Ok(())
            }
            None => {
                warn!(peer_id = %id, "Rename of unknown peer");
                Err(WashroomError::PeerNotFound(id))
            }
        }
    }

    /// Get an owned copy of a peer
    pub fn lookup(&self, id: PeerId) -> Result<Peer> {
        self.lock()
            .peers
            .get(&id)
            .cloned()
            .ok_or(WashroomError::PeerNotFound(id))
    }

    /// Get all peers ordered by id
    pub fn snapshot(&self) -> Vec<PeerInfo> {
        self.lock().peers.values().map(|p| p.info.clone()).collect()
    }

    /// Get number of peers
    pub fn len(&self) -> usize {
        self.lock().peers.len()
    }

    /// Check if no peer is registered
    pub fn is_empty(&self) -> bool {
        self.lock().peers.is_empty()
    }

    /// Remove and close every peer, returning how many were closed
    pub async fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut self.lock().peers);
        let count = drained.len();
        for (id, peer) in drained {
            peer.link.close().await;
            debug!(peer_id = %id, "Peer closed at shutdown");
        }
        count
    }
}

impl std::fmt::Debug for PeerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRegistry")
            .field("peers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use washroom_protocol::{BoxedTransport, Channel, ChannelConfig};

    fn test_addr() -> PeerAddress {
        PeerAddress::new("127.0.0.1", 40000)
    }

    fn test_channel() -> (PeerChannel, DuplexStream) {
        let (local, remote) = duplex(256);
        let channel = Channel::new(Box::new(local) as BoxedTransport, ChannelConfig::default());
        (channel, remote)
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let registry = PeerRegistry::new();
        let ids: Vec<PeerId> = (0..3).map(|_| registry.register(test_channel().0, test_addr())).collect();

        assert_eq!(ids, vec![PeerId::new(0), PeerId::new(1), PeerId::new(2)]);
        assert_eq!(registry.len(), 3);

        let info = registry.lookup(PeerId::new(1)).unwrap().info;
        assert_eq!(info.alias, DEFAULT_ALIAS);
        assert_eq!(info.address, test_addr());
    }

    #[tokio::test]
    async fn test_ids_never_reused() {
        let registry = PeerRegistry::new();
        let first = registry.register(test_channel().0, test_addr());
        let second = registry.register(test_channel().0, test_addr());

        assert!(registry.unregister(second).await);
        assert!(registry.unregister(first).await);
        assert!(registry.is_empty());

        let third = registry.register(test_channel().0, test_addr());
        assert_eq!(third, PeerId::new(2));
    }

    #[tokio::test]
    async fn test_unregister_removes_from_snapshot() {
        let registry = PeerRegistry::new();
        let a = registry.register(test_channel().0, test_addr());
        let b = registry.register(test_channel().0, test_addr());

        assert!(registry.unregister(a).await);

        let ids: Vec<PeerId> = registry.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b]);
        assert!(matches!(registry.lookup(a), Err(WashroomError::PeerNotFound(_))));
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let registry = PeerRegistry::new();
        registry.register(test_channel().0, test_addr());

        assert!(!registry.unregister(PeerId::new(99)).await);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_closes_transport_once() {
        let registry = PeerRegistry::new();
        let (channel, mut remote) = test_channel();
        let id = registry.register(channel, test_addr());
        let stale = registry.lookup(id).unwrap();

        assert!(registry.unregister(id).await);

        // Remote end observes EOF
        let mut buf = Vec::new();
        let n = remote.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        // A copy taken before eviction cannot reach the transport any more
        assert!(stale.link.is_closed().await);
        assert!(matches!(stale.link.acquire().await, Err(WashroomError::PeerClosed)));
        assert!(!stale.link.close().await);
    }

    #[test]
    fn test_rename() {
        let registry = PeerRegistry::new();
        let id = registry.register(test_channel().0, test_addr());

        registry.rename(id, "build-box").unwrap();
        assert_eq!(registry.lookup(id).unwrap().info.alias, "build-box");

        let result = registry.rename(PeerId::new(5), "ghost");
        assert!(matches!(result, Err(WashroomError::PeerNotFound(_))));
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_owned_copies_are_detached() {
        let registry = PeerRegistry::new();
        let id = registry.register(test_channel().0, test_addr());

        let before = registry.lookup(id).unwrap();
        registry.rename(id, "later").unwrap();
        assert_eq!(before.info.alias, DEFAULT_ALIAS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration() {
        let registry = PeerRegistry::new();

        let handles: Vec<_> = (0..1000)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.register(test_channel().0, test_addr()) })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 1000);
        assert_eq!(registry.len(), 1000);
        assert!(ids.iter().all(|id| id.as_u64() < 1000));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = PeerRegistry::new();
        let (channel, mut remote) = test_channel();
        registry.register(channel, test_addr());
        registry.register(test_channel().0, test_addr());

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty());

        let mut buf = Vec::new();
        assert_eq!(remote.read_to_end(&mut buf).await.unwrap(), 0);
    }
}
