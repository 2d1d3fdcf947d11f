use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// A directory entry: logical name and the address it answers on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    name: String,
    addr: String,
}

impl Peer {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Peer {
        Peer {
            name: name.into(),
            addr: addr.into(),
        }
    }

    pub fn get_name(&self) -> &str {
        self.name.as_str()
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }
}

/// Cached peer set. Only the network layer writes to it.
#[derive(Debug, Default)]
pub struct Peers {
    inner: RwLock<Vec<Peer>>,
}

impl Peers {
    pub fn new() -> Peers {
        Peers {
            inner: RwLock::new(vec![]),
        }
    }

    /// Replace the whole set with a directory listing
    pub fn replace_all(&self, listing: &BTreeMap<String, String>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *inner = listing
            .iter()
            .map(|(name, addr)| Peer::new(name.clone(), addr.clone()))
            .collect();
    }

    pub fn add_peer(&self, peer: Peer) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.iter().any(|x| x.name == peer.name) {
            inner.push(peer);
        }
    }

    pub fn evict_peer(&self, name: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.retain(|x| x.name != name);
    }

    /// Stable copy to iterate over while the set may change
    pub fn get_peers(&self) -> Vec<Peer> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peer_is_known(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|x| x.name == name)
    }
}
