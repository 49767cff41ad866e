// logtail - app/registry.rs
//
// The primary's list of known peers.
//
// Seeded from config at startup and mutated through the registration API.
// Aggregate calls take a snapshot, so a registration racing with an
// in-flight fan-out never changes the set of peers that fan-out queries.

use crate::core::model::PeerDescriptor;
use crate::platform::config::is_http_url;
use crate::util::error::RegistryError;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct PeerRegistry {
    peers: RwLock<Vec<PeerDescriptor>>,
    max_peers: usize,
}

impl PeerRegistry {
    /// Registry holding `initial` (in order) with room for `max_peers`.
    pub fn new(initial: Vec<PeerDescriptor>, max_peers: usize) -> Self {
        Self {
            peers: RwLock::new(initial),
            max_peers,
        }
    }

    /// Copy of the current peer list in registration order.
    pub async fn snapshot(&self) -> Vec<PeerDescriptor> {
        self.peers.read().await.clone()
    }

    pub async fn get(&self, name: &str) -> Option<PeerDescriptor> {
        self.peers
            .read()
            .await
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Checks that `peer` could be registered right now without touching
    /// the network: URL shape, name clash and capacity.
    pub async fn check_admissible(&self, peer: &PeerDescriptor) -> Result<(), RegistryError> {
        let peers = self.peers.read().await;
        admissible(&peers, peer, self.max_peers)
    }

    /// Add `peer`, returning the new peer count.
    ///
    /// The admissibility checks are repeated under the write lock, so two
    /// concurrent registrations of one name cannot both succeed.
    pub async fn register(&self, peer: PeerDescriptor) -> Result<usize, RegistryError> {
        let mut peers = self.peers.write().await;
        admissible(&peers, &peer, self.max_peers)?;
        tracing::info!(peer = %peer.name, url = %peer.url, "Registered peer");
        peers.push(peer);
        Ok(peers.len())
    }

    /// Remove the peer called `name`, returning its descriptor.
    pub async fn unregister(&self, name: &str) -> Result<PeerDescriptor, RegistryError> {
        let mut peers = self.peers.write().await;
        let index = peers
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;
        let removed = peers.remove(index);
        tracing::info!(peer = %removed.name, "Unregistered peer");
        Ok(removed)
    }
}

fn admissible(
    peers: &[PeerDescriptor],
    peer: &PeerDescriptor,
    max_peers: usize,
) -> Result<(), RegistryError> {
    if !is_http_url(&peer.url) {
        return Err(RegistryError::InvalidUrl {
            url: peer.url.clone(),
        });
    }
    if peers.iter().any(|p| p.name == peer.name) {
        return Err(RegistryError::AlreadyRegistered {
            name: peer.name.clone(),
        });
    }
    if peers.len() >= max_peers {
        return Err(RegistryError::Full { max: max_peers });
    }
    Ok(())
}
