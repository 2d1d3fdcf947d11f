use crate::error::{LedgerError, Result};
use crate::network::{Directory, Package, Peer, Peers, Transport};
use log::{debug, info, warn};
use std::sync::Arc;

/// Outcome of one broadcast round, per peer name
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    /// Unreachable peers, already removed from the cached set
    pub pruned: Vec<String>,
    /// Reached but rejected; these peers stay in the set
    pub failed: Vec<(String, LedgerError)>,
}

/// Peer discovery through the directory plus broadcast with pruning
pub struct Network {
    group: String,
    directory: Arc<dyn Directory>,
    transport: Arc<dyn Transport>,
    peers: Peers,
}

impl Network {
    pub fn new(
        group: impl Into<String>,
        directory: Arc<dyn Directory>,
        transport: Arc<dyn Transport>,
    ) -> Network {
        Network {
            group: group.into(),
            directory,
            transport,
            peers: Peers::new(),
        }
    }

    pub fn get_group(&self) -> &str {
        self.group.as_str()
    }

    pub fn get_peers(&self) -> Vec<Peer> {
        self.peers.get_peers()
    }

    /// Replace the cached peer set with everything registered under the group
    pub fn scan(&self) -> Result<usize> {
        let listing = self.directory.list(&self.group)?;
        self.peers.replace_all(&listing);
        debug!("Scan of {} found {} peers", self.group, listing.len());
        Ok(listing.len())
    }

    /// Deliver `package` to every cached peer, once each.
    ///
    /// Iterates over a snapshot so handlers that re-enter the network (a
    /// node broadcasting to itself) never contend with this round; peers that
    /// could not be reached are evicted after the round.
    pub fn broadcast(&self, package: &Package) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for peer in self.peers.get_peers() {
            match self.transport.call(peer.get_addr(), package) {
                Ok(_) => report.delivered.push(peer.get_name().to_string()),
                Err(e) if e.is_connectivity() => {
                    warn!("Peer {} unreachable, pruning: {e}", peer.get_name());
                    report.pruned.push(peer.get_name().to_string());
                }
                Err(e) => {
                    warn!("Peer {} rejected {}: {e}", peer.get_name(), package_name(package));
                    report.failed.push((peer.get_name().to_string(), e));
                }
            }
        }

        for name in &report.pruned {
            self.peers.evict_peer(name);
        }
        if !report.pruned.is_empty() {
            info!(
                "Pruned {} peers, {} remain",
                report.pruned.len(),
                self.peers.len()
            );
        }

        report
    }
}

pub(crate) fn package_name(package: &Package) -> &'static str {
    match package {
        Package::AddTransaction { .. } => "add_transaction",
        Package::Commit => "commit",
        Package::StartProofing { .. } => "start_proofing",
        Package::ProofFound { .. } => "proof_found",
        Package::AddBlock { .. } => "add_block",
        Package::GetLastBlock => "get_last_block",
        Package::Echo { .. } => "echo",
        Package::Register { .. } => "register",
        Package::List { .. } => "list",
        Package::Remove { .. } => "remove",
        Package::SaveBlock { .. } => "save_block",
    }
}
