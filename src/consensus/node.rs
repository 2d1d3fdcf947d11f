use crate::consensus::{Admission, RejectReason, UserRegistry};
use crate::core::{Block, ProofOfWork, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::broadcast::package_name;
use crate::network::{Handler, Network, Package, Reply};
use crate::storage::LedgerStore;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

/// Where the pending block is in its proofing round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    /// Open for transactions
    Accumulating,
    /// Frozen, waiting for a valid proof
    Proofing,
    /// A proof was accepted, waiting for `add_block`
    Resolved,
}

struct ReplicaState {
    registry: UserRegistry,
    committed_blocks: Vec<Block>,
    pending_block: Option<Block>,
    round: Round,
    last_seen_transaction: String,
    mining: Option<Arc<AtomicBool>>,
}

impl ReplicaState {
    fn new() -> ReplicaState {
        ReplicaState {
            registry: UserRegistry::new(),
            committed_blocks: Vec::new(),
            pending_block: None,
            round: Round::Accumulating,
            last_seen_transaction: String::new(),
            mining: None,
        }
    }

    fn stop_mining(&mut self) {
        if let Some(cancel) = self.mining.take() {
            cancel.store(true, Ordering::SeqCst);
        }
    }

    fn chain_tip_hash(&self) -> Result<String> {
        match self.committed_blocks.last() {
            Some(block) => block.hash(),
            None => Ok(String::new()),
        }
    }

    fn is_committed(&self, index: u64) -> bool {
        self.committed_blocks
            .iter()
            .any(|block| block.get_index() == index)
    }
}

/// A ledger replica.
///
/// All replica state sits behind a single lock that is never held across a
/// broadcast or a store call: a node is one of its own peers, so every
/// broadcast re-enters this node's handlers.
pub struct Node {
    name: String,
    difficulty: usize,
    network: Network,
    store: Arc<dyn LedgerStore>,
    state: Mutex<ReplicaState>,
    me: Weak<Node>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        difficulty: usize,
        network: Network,
        store: Arc<dyn LedgerStore>,
    ) -> Arc<Node> {
        let name = name.into();
        Arc::new_cyclic(|me| Node {
            name,
            difficulty,
            network,
            store,
            state: Mutex::new(ReplicaState::new()),
            me: me.clone(),
        })
    }

    pub fn get_name(&self) -> &str {
        self.name.as_str()
    }

    pub fn get_difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn get_network(&self) -> &Network {
        &self.network
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ReplicaState>> {
        self.state
            .lock()
            .map_err(|e| LedgerError::State(format!("Replica state poisoned: {e}")))
    }

    /// Refresh peers, then broadcast. A failed scan falls back to the
    /// cached peer set.
    fn gossip(&self, package: &Package) {
        if let Err(e) = self.network.scan() {
            warn!("{}: peer scan failed, using cached peers: {e}", self.name);
        }
        let report = self.network.broadcast(package);
        debug!(
            "{}: {} delivered to {} peers",
            self.name,
            package_name(package),
            report.delivered.len()
        );
    }

    /// Verify a raw transaction and append it to the pending block.
    ///
    /// Malformed JSON is the only error; every verification outcome is an
    /// [`Admission`].
    pub fn add_transaction(&self, raw: &str) -> Result<Admission> {
        let mut state = self.lock_state()?;
        if state.last_seen_transaction == raw {
            debug!("{}: dropping duplicate transaction", self.name);
            return Ok(Admission::Duplicate);
        }

        let tx = Transaction::from_json(raw)?;

        if state.round != Round::Accumulating {
            warn!(
                "{}: rejected transaction from {}: {}",
                self.name,
                tx.get_user_guid(),
                RejectReason::BlockFrozen
            );
            return Ok(Admission::Rejected(RejectReason::BlockFrozen));
        }

        if let Err(reason) = state.registry.admit(&tx) {
            warn!(
                "{}: rejected {:?} transaction from {}: {reason}",
                self.name,
                tx.get_data().get_type(),
                tx.get_user_guid()
            );
            return Ok(Admission::Rejected(reason));
        }

        if state.pending_block.is_none() {
            let block = Block::next_after(&state.committed_blocks)?;
            debug!("{}: opened pending block {}", self.name, block.get_index());
            state.pending_block = Some(block);
        }
        if let Some(pending) = state.pending_block.as_mut() {
            pending.add_transaction(tx);
        }
        // only accepted payloads count as seen; a rejected one may be retried
        state.last_seen_transaction = raw.to_string();
        Ok(Admission::Accepted)
    }

    /// Freeze the pending block and ask every peer to start mining it.
    /// `false` when there is nothing to commit or a round is already running.
    pub fn commit(&self) -> Result<bool> {
        let block = {
            let mut state = self.lock_state()?;
            if state.round != Round::Accumulating {
                info!("{}: commit ignored, a proofing round is running", self.name);
                return Ok(false);
            }
            let block = match state.pending_block.as_mut() {
                Some(pending) => {
                    pending.freeze();
                    pending.clone()
                }
                None => {
                    info!("{}: nothing to commit", self.name);
                    return Ok(false);
                }
            };
            state.round = Round::Proofing;
            block
        };

        info!(
            "{}: committing block {} with {} transactions",
            self.name,
            block.get_index(),
            block.get_transactions().len()
        );
        self.gossip(&Package::StartProofing { block });
        Ok(true)
    }

    /// Adopt `block` as the pending block and mine it on a background
    /// thread. Blocks that do not extend the local chain are ignored.
    pub fn start_proofing(&self, block: Block) -> Result<bool> {
        let cancel = {
            let mut state = self.lock_state()?;
            let expected_index = state.committed_blocks.len() as u64;
            if block.get_index() != expected_index {
                debug!(
                    "{}: ignoring proofing request for block {}, expected {expected_index}",
                    self.name,
                    block.get_index()
                );
                return Ok(false);
            }
            if block.get_prev_hash() != state.chain_tip_hash()? {
                warn!(
                    "{}: block {} does not extend the local chain",
                    self.name,
                    block.get_index()
                );
                return Ok(false);
            }
            if state.round == Round::Resolved || state.mining.is_some() {
                debug!(
                    "{}: already proofing block {}",
                    self.name,
                    block.get_index()
                );
                return Ok(false);
            }
            let discarded = match state.pending_block.as_ref() {
                Some(pending) if pending != &block => pending.get_transactions().len(),
                _ => 0,
            };
            if discarded > 0 {
                warn!(
                    "{}: replacing local pending block ({discarded} transactions) with the committed one",
                    self.name
                );
                // key changes of the dropped transactions must not outlive them
                state.registry = UserRegistry::from_blocks(&state.committed_blocks);
            }

            let cancel = Arc::new(AtomicBool::new(false));
            state.mining = Some(Arc::clone(&cancel));
            state.pending_block = Some(block.clone());
            state.round = Round::Proofing;
            cancel
        };

        let node = self
            .me
            .upgrade()
            .ok_or_else(|| LedgerError::State("Node is shutting down".to_string()))?;
        let index = block.get_index();
        thread::Builder::new()
            .name(format!("miner-{index}"))
            .spawn(move || node.run_miner(block, cancel))
            .map_err(|e| LedgerError::State(format!("Failed to start miner: {e}")))?;
        info!("{}: mining block {index}", self.name);
        Ok(true)
    }

    fn run_miner(&self, mut block: Block, cancel: Arc<AtomicBool>) {
        let proof = match ProofOfWork::mine(&mut block, self.difficulty, &cancel) {
            Ok(Some(proof)) => proof,
            Ok(None) => {
                debug!("{}: mining of block {} cancelled", self.name, block.get_index());
                return;
            }
            Err(e) => {
                error!("{}: mining failed: {e}", self.name);
                return;
            }
        };
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        match block.hash() {
            Ok(hash) => {
                info!(
                    "{}: found proof {proof} for block {}",
                    self.name,
                    block.get_index()
                );
                self.gossip(&Package::ProofFound {
                    proof,
                    hash,
                    timestamp: block.get_timestamp_str().to_string(),
                });
            }
            Err(e) => error!("{}: failed to hash mined block: {e}", self.name),
        }
    }

    /// Accept the first valid proof for the pending block and announce it.
    /// Late, duplicate and invalid proofs return `false`.
    pub fn proof_found(&self, proof: u64, hash: &str, timestamp: &str) -> Result<bool> {
        {
            let mut state = self.lock_state()?;
            if state.round != Round::Proofing {
                debug!("{}: ignoring proof {proof}, no round in progress", self.name);
                return Ok(false);
            }
            let mut candidate = match state.pending_block.as_ref() {
                Some(pending) => pending.clone(),
                None => return Ok(false),
            };
            candidate.set_proof(proof);
            candidate.set_timestamp(timestamp.to_string());
            if candidate.hash()? != hash {
                warn!("{}: proof {proof} does not match its hash", self.name);
                return Ok(false);
            }
            if !ProofOfWork::meets_difficulty(hash, self.difficulty) {
                warn!("{}: proof {proof} is below difficulty", self.name);
                return Ok(false);
            }

            state.stop_mining();
            state.pending_block = Some(candidate);
            state.round = Round::Resolved;
        }

        info!("{}: accepted proof {proof}", self.name);
        self.gossip(&Package::AddBlock {
            proof,
            hash: hash.to_string(),
        });
        Ok(true)
    }

    /// Commit the pending block with `proof` and hand it to the ledger store.
    /// Each index is committed once.
    pub fn add_block(&self, proof: u64, hash: &str) -> Result<bool> {
        let block = {
            let mut state = self.lock_state()?;
            if state.round == Round::Accumulating {
                debug!("{}: ignoring add_block, no frozen block", self.name);
                return Ok(false);
            }
            let mut block = match state.pending_block.as_ref() {
                Some(pending) => pending.clone(),
                None => return Ok(false),
            };
            if state.is_committed(block.get_index()) {
                debug!("{}: block {} already committed", self.name, block.get_index());
                return Ok(false);
            }
            block.set_proof(proof);
            if block.hash()? != hash {
                warn!(
                    "{}: add_block hash does not match block {}",
                    self.name,
                    block.get_index()
                );
                return Ok(false);
            }

            state.stop_mining();
            state.registry.apply_committed(&block);
            state.committed_blocks.push(block.clone());
            state.pending_block = None;
            state.round = Round::Accumulating;
            block
        };

        info!(
            "{}: committed block {} (proof {proof})",
            self.name,
            block.get_index()
        );
        match block
            .to_json()
            .and_then(|json| self.store.save_block(&json))
        {
            Ok(true) => debug!("{}: block {} stored", self.name, block.get_index()),
            Ok(false) => debug!("{}: block {} was already stored", self.name, block.get_index()),
            Err(e) => error!(
                "{}: failed to store block {}: {e}",
                self.name,
                block.get_index()
            ),
        }
        Ok(true)
    }

    pub fn last_block(&self) -> Result<Option<Block>> {
        Ok(self.lock_state()?.committed_blocks.last().cloned())
    }

    pub fn echo(&self, message: &str) -> String {
        format!("{}: {message}", self.name)
    }

    pub fn committed_blocks(&self) -> Result<Vec<Block>> {
        Ok(self.lock_state()?.committed_blocks.clone())
    }

    pub fn pending_block(&self) -> Result<Option<Block>> {
        Ok(self.lock_state()?.pending_block.clone())
    }

    pub fn round(&self) -> Result<Round> {
        Ok(self.lock_state()?.round)
    }

    pub fn proof_accepted(&self) -> Result<bool> {
        Ok(self.round()? == Round::Resolved)
    }

    pub fn is_registered(&self, user_guid: &str) -> Result<bool> {
        Ok(self.lock_state()?.registry.is_registered(user_guid))
    }

    #[cfg(test)]
    fn mining_flag(&self) -> Option<Arc<AtomicBool>> {
        self.lock_state().ok()?.mining.clone()
    }
}

impl Handler for Node {
    fn handle(&self, package: Package) -> Result<Reply> {
        match package {
            Package::AddTransaction { transaction } => {
                Ok(Reply::Admission(self.add_transaction(&transaction)?))
            }
            Package::Commit => Ok(Reply::Committed(self.commit()?)),
            Package::StartProofing { block } => {
                self.start_proofing(block)?;
                Ok(Reply::Ok)
            }
            Package::ProofFound {
                proof,
                hash,
                timestamp,
            } => {
                self.proof_found(proof, &hash, &timestamp)?;
                Ok(Reply::Ok)
            }
            Package::AddBlock { proof, hash } => {
                self.add_block(proof, &hash)?;
                Ok(Reply::Ok)
            }
            Package::GetLastBlock => Ok(Reply::Block(self.last_block()?)),
            Package::Echo { message } => Ok(Reply::Text(self.echo(&message))),
            other => Err(LedgerError::Remote(format!(
                "Node does not handle {}",
                package_name(&other)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Directory, InMemoryDirectory};
    use crate::testnet::{
        wait_until, LocalTransport, PackageLog, RecordingStore, TestCluster, TestUser,
    };
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(30);

    /// A node with no peers: broadcasts go nowhere, so rounds are driven by hand
    fn isolated_node(difficulty: usize) -> (Arc<Node>, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::new());
        let network = Network::new(
            "node.endpoint",
            Arc::new(InMemoryDirectory::new()),
            Arc::new(LocalTransport::new()),
        );
        (Node::new("node.endpoint.0", difficulty, network, store.clone()), store)
    }

    fn mine_pending(node: &Node) -> (u64, String, String) {
        let mut block = node.pending_block().unwrap().unwrap();
        let proof = ProofOfWork::mine(&mut block, node.get_difficulty(), &AtomicBool::new(false))
            .unwrap()
            .unwrap();
        (
            proof,
            block.hash().unwrap(),
            block.get_timestamp_str().to_string(),
        )
    }

    #[test]
    fn test_registration_flow() {
        let (node, _) = isolated_node(1);
        let user = TestUser::new("U");

        let unknown = Admission::Rejected(RejectReason::UnknownUser);

        assert_eq!(node.add_transaction(&user.data_json("early")).unwrap(), unknown);
        assert_eq!(node.add_transaction(&user.register_json()).unwrap(), Admission::Accepted);
        assert_eq!(node.add_transaction(&user.data_json("hello")).unwrap(), Admission::Accepted);
        assert_eq!(node.add_transaction(&user.revoke_json()).unwrap(), Admission::Accepted);
        assert_eq!(node.add_transaction(&user.data_json("late")).unwrap(), unknown);

        let pending = node.pending_block().unwrap().unwrap();
        assert_eq!(pending.get_index(), 0);
        assert_eq!(pending.get_prev_hash(), "");
        assert_eq!(pending.get_transactions().len(), 3);
        assert!(!node.is_registered("U").unwrap());
    }

    fn finish_round(node: &Node) -> u64 {
        let (proof, hash, timestamp) = mine_pending(node);
        assert!(node.proof_found(proof, &hash, &timestamp).unwrap());
        assert!(node.add_block(proof, &hash).unwrap());
        proof
    }

    #[test]
    fn test_frozen_rejection_can_be_resubmitted() {
        let (node, _) = isolated_node(1);
        let user = TestUser::new("U");
        node.add_transaction(&user.register_json()).unwrap();
        node.commit().unwrap();

        let retry = user.data_json("retry me");
        assert_eq!(
            node.add_transaction(&retry).unwrap(),
            Admission::Rejected(RejectReason::BlockFrozen)
        );
        finish_round(&node);

        assert_eq!(node.add_transaction(&retry).unwrap(), Admission::Accepted);
        assert_eq!(node.add_transaction(&retry).unwrap(), Admission::Duplicate);
        assert_eq!(node.pending_block().unwrap().unwrap().get_index(), 1);
    }

    #[test]
    fn test_unknown_user_can_retry_after_registering() {
        let (node, _) = isolated_node(1);
        let user = TestUser::new("U");
        let early = user.data_json("early");

        assert_eq!(
            node.add_transaction(&early).unwrap(),
            Admission::Rejected(RejectReason::UnknownUser)
        );
        node.add_transaction(&user.register_json()).unwrap();
        assert_eq!(node.add_transaction(&early).unwrap(), Admission::Accepted);
    }

    #[test]
    fn test_replaced_pending_block_drops_its_key_changes() {
        let (node, _) = isolated_node(1);
        let v = TestUser::with_slot("V", 0);
        let w = TestUser::with_slot("W", 1);
        node.add_transaction(&v.register_json()).unwrap();
        assert!(node.is_registered("V").unwrap());

        let mut foreign = Block::new_block(0, String::new());
        foreign.add_transaction(w.register());
        foreign.freeze();
        assert!(node.start_proofing(foreign).unwrap());
        assert!(!node.is_registered("V").unwrap());

        finish_round(&node);

        let chain = node.committed_blocks().unwrap();
        assert_eq!(chain[0].get_transactions()[0].get_user_guid(), "W");
        assert!(node.is_registered("W").unwrap());
        assert!(!node.is_registered("V").unwrap());
        assert_eq!(
            node.add_transaction(&v.data_json("hi")).unwrap(),
            Admission::Rejected(RejectReason::UnknownUser)
        );
    }

    #[test]
    fn test_external_proof_cancels_running_miner() {
        // first difficulty-6 proof of an empty genesis block stamped
        // 2021-01-01T00:00:00.000, far beyond what the miner reaches in time
        const PROOF: u64 = 5_651_861;
        const HASH: &str = "00000035a7d269538b826446e376f01e3992feb679971e0ec9110513babcaf5e";
        const TIMESTAMP: &str = "2021-01-01T00:00:00.000";

        let directory = Arc::new(InMemoryDirectory::new());
        let transport = Arc::new(LocalTransport::new());
        let log = Arc::new(PackageLog::new());
        let handler: Arc<dyn Handler> = log.clone();
        transport.attach("observer", &handler);
        directory.register("node.endpoint.9", "observer").unwrap();
        let network = Network::new("node.endpoint", directory, transport);
        let node = Node::new("node.endpoint.0", 6, network, Arc::new(RecordingStore::new()));

        let block = Block::from_parts(0, TIMESTAMP.to_string(), Vec::new(), String::new(), 0);
        let mut solved = block.clone();
        solved.set_proof(PROOF);
        assert_eq!(solved.hash().unwrap(), HASH);

        assert!(node.start_proofing(block).unwrap());
        let cancel = node.mining_flag().unwrap();
        assert!(!cancel.load(Ordering::SeqCst));

        assert!(node.proof_found(PROOF, HASH, TIMESTAMP).unwrap());
        assert!(cancel.load(Ordering::SeqCst));
        assert!(node.mining_flag().is_none());

        // the cancelled miner never announces a proof of its own
        thread::sleep(Duration::from_millis(300));
        assert_eq!(log.names(), vec!["add_block"]);
    }

    #[test]
    fn test_duplicate_delivery_is_dropped() {
        let (node, _) = isolated_node(1);
        let user = TestUser::new("U");
        let register = user.register_json();

        assert_eq!(node.add_transaction(&register).unwrap(), Admission::Accepted);
        assert_eq!(node.add_transaction(&register).unwrap(), Admission::Duplicate);
        assert_eq!(node.pending_block().unwrap().unwrap().get_transactions().len(), 1);
    }

    #[test]
    fn test_malformed_transaction_is_an_error() {
        let (node, _) = isolated_node(1);
        assert!(node.add_transaction("{\"user_guid\": ").is_err());
        assert!(node.pending_block().unwrap().is_none());
    }

    #[test]
    fn test_commit_without_pending_block() {
        let (node, _) = isolated_node(1);
        assert!(!node.commit().unwrap());
        assert_eq!(node.round().unwrap(), Round::Accumulating);
    }

    #[test]
    fn test_frozen_block_rejects_transactions() {
        let (node, _) = isolated_node(1);
        let alice = TestUser::new("alice");
        let bob = TestUser::new("bob");
        node.add_transaction(&alice.register_json()).unwrap();
        assert!(node.commit().unwrap());

        assert_eq!(
            node.add_transaction(&bob.register_json()).unwrap(),
            Admission::Rejected(RejectReason::BlockFrozen)
        );
        assert!(!node.is_registered("bob").unwrap());
        assert_eq!(node.pending_block().unwrap().unwrap().get_transactions().len(), 1);
        assert!(!node.commit().unwrap());
    }

    #[test]
    fn test_invalid_and_late_proofs_are_ignored() {
        let (node, _) = isolated_node(2);
        let user = TestUser::new("U");
        node.add_transaction(&user.register_json()).unwrap();

        // no frozen block yet
        let (proof, hash, timestamp) = mine_pending(&node);
        assert!(!node.proof_found(proof, &hash, &timestamp).unwrap());

        node.commit().unwrap();
        let (proof, hash, timestamp) = mine_pending(&node);

        assert!(!node.proof_found(proof, "00ff", &timestamp).unwrap());
        // hash matches the block but misses the difficulty
        let mut below = node.pending_block().unwrap().unwrap();
        let mut bad_proof = 0;
        loop {
            below.set_proof(bad_proof);
            if !ProofOfWork::meets_difficulty(&below.hash().unwrap(), 2) {
                break;
            }
            bad_proof += 1;
        }
        assert!(!node
            .proof_found(bad_proof, &below.hash().unwrap(), below.get_timestamp_str())
            .unwrap());
        assert_eq!(node.round().unwrap(), Round::Proofing);

        assert!(node.proof_found(proof, &hash, &timestamp).unwrap());
        assert!(node.proof_accepted().unwrap());
        assert!(!node.proof_found(proof, &hash, &timestamp).unwrap());
    }

    #[test]
    fn test_add_block_twice_commits_once() {
        let (node, store) = isolated_node(1);
        let user = TestUser::new("U");
        node.add_transaction(&user.register_json()).unwrap();
        node.add_transaction(&user.data_json("payload")).unwrap();
        node.commit().unwrap();
        let (proof, hash, timestamp) = mine_pending(&node);
        node.proof_found(proof, &hash, &timestamp).unwrap();

        assert!(node.add_block(proof, &hash).unwrap());
        assert!(!node.add_block(proof, &hash).unwrap());

        let blocks = node.committed_blocks().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get_proof(), proof);
        assert_eq!(blocks[0].hash().unwrap(), hash);
        assert_eq!(store.saved_indexes(), vec![0]);
        assert_eq!(node.round().unwrap(), Round::Accumulating);
        assert!(node.pending_block().unwrap().is_none());
        assert!(node.is_registered("U").unwrap());
    }

    #[test]
    fn test_next_block_links_to_committed_tip() {
        let (node, _) = isolated_node(1);
        let user = TestUser::new("U");
        node.add_transaction(&user.register_json()).unwrap();
        node.commit().unwrap();
        let (proof, hash, timestamp) = mine_pending(&node);
        node.proof_found(proof, &hash, &timestamp).unwrap();
        node.add_block(proof, &hash).unwrap();

        node.add_transaction(&user.data_json("second")).unwrap();
        let pending = node.pending_block().unwrap().unwrap();
        assert_eq!(pending.get_index(), 1);
        assert_eq!(pending.get_prev_hash(), hash);
        assert_eq!(node.last_block().unwrap().unwrap().hash().unwrap(), hash);
    }

    #[test]
    fn test_start_proofing_ignores_blocks_off_the_chain() {
        let (node, _) = isolated_node(1);
        let ahead = Block::new_block(3, String::new());
        assert!(!node.start_proofing(ahead).unwrap());

        let forked = Block::new_block(0, "abc".to_string());
        assert!(!node.start_proofing(forked).unwrap());
        assert_eq!(node.round().unwrap(), Round::Accumulating);
    }

    #[test]
    fn test_round_across_two_nodes() {
        let cluster = TestCluster::new(2, 1);
        let (a, b) = (&cluster.nodes[0], &cluster.nodes[1]);
        let user = TestUser::new("U");

        a.add_transaction(&user.register_json()).unwrap();
        a.add_transaction(&user.data_json("hello")).unwrap();
        assert!(a.commit().unwrap());

        assert!(wait_until(WAIT, || {
            cluster
                .nodes
                .iter()
                .all(|node| node.committed_blocks().unwrap().len() == 1)
        }));
        assert_eq!(a.committed_blocks().unwrap(), b.committed_blocks().unwrap());
        for store in &cluster.stores {
            assert!(wait_until(WAIT, || store.saved_indexes() == vec![0]));
        }

        // `b` learned the key from the committed block
        assert!(b.is_registered("U").unwrap());
        assert_eq!(
            b.add_transaction(&user.data_json("from b")).unwrap(),
            Admission::Accepted
        );
        assert!(b.commit().unwrap());
        assert!(wait_until(WAIT, || {
            cluster
                .nodes
                .iter()
                .all(|node| node.committed_blocks().unwrap().len() == 2)
        }));
        let chain = a.committed_blocks().unwrap();
        assert_eq!(chain[1].get_prev_hash(), chain[0].hash().unwrap());
        assert_eq!(chain, b.committed_blocks().unwrap());
    }

    #[test]
    fn test_round_survives_unreachable_peer() {
        let cluster = TestCluster::new(3, 1);
        cluster.take_down(2);
        let user = TestUser::new("U");

        cluster.nodes[0].add_transaction(&user.register_json()).unwrap();
        cluster.nodes[0].commit().unwrap();

        assert!(wait_until(WAIT, || {
            cluster.nodes[..2]
                .iter()
                .all(|node| node.committed_blocks().unwrap().len() == 1)
        }));
        assert!(cluster.nodes[2].committed_blocks().unwrap().is_empty());
    }

    #[test]
    fn test_handle_rejects_directory_packages() {
        let (node, _) = isolated_node(1);
        let err = node
            .handle(Package::List {
                prefix: "node".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Remote(_)));
        assert_eq!(
            node.handle(Package::GetLastBlock).unwrap(),
            Reply::Block(None)
        );
    }
}
