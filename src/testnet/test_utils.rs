//! Test utilities for running replicas in one process

use crate::config::DEFAULT_NODE_GROUP;
use crate::consensus::Node;
use crate::core::{Block, Data, DataType, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::broadcast::package_name;
use crate::network::{Directory, Handler, InMemoryDirectory, Network, Package, Reply, Transport};
use crate::storage::LedgerStore;
use crate::utils::{encode_public_key, new_private_key, DEFAULT_RSA_BITS};
use rsa::RsaPrivateKey;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

const KEY_POOL_SIZE: usize = 8;

static KEY_POOL: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
static NEXT_KEY: AtomicUsize = AtomicUsize::new(0);

/// Keys are generated once per test binary; RSA key generation dominates
/// test time otherwise.
pub fn test_key(slot: usize) -> RsaPrivateKey {
    let pool = KEY_POOL.get_or_init(|| {
        (0..KEY_POOL_SIZE)
            .map(|_| new_private_key(DEFAULT_RSA_BITS).unwrap())
            .collect()
    });
    pool[slot % KEY_POOL_SIZE].clone()
}

/// A ledger user holding a signing key
pub struct TestUser {
    guid: String,
    key: RsaPrivateKey,
}

impl TestUser {
    pub fn new(guid: &str) -> TestUser {
        TestUser::with_slot(guid, NEXT_KEY.fetch_add(1, Ordering::SeqCst))
    }

    pub fn with_slot(guid: &str, slot: usize) -> TestUser {
        TestUser {
            guid: guid.to_string(),
            key: test_key(slot),
        }
    }

    pub fn get_guid(&self) -> &str {
        self.guid.as_str()
    }

    pub fn public_key(&self) -> String {
        encode_public_key(&self.key.to_public_key()).unwrap()
    }

    pub fn sign(&self, data: Data) -> Transaction {
        let mut tx = Transaction::new(self.guid.as_str(), data);
        tx.sign(&self.key).unwrap();
        tx
    }

    pub fn register(&self) -> Transaction {
        self.sign(Data::new(DataType::Register, self.public_key()))
    }

    /// Registers this user's key under a signature made by `signer`
    pub fn register_signed_by(&self, signer: &TestUser) -> Transaction {
        let mut tx = Transaction::new(
            self.guid.as_str(),
            Data::new(DataType::Register, self.public_key()),
        );
        tx.sign(&signer.key).unwrap();
        tx
    }

    pub fn data(&self, payload: &str) -> Transaction {
        self.sign(Data::new(DataType::Data, payload))
    }

    pub fn revoke(&self) -> Transaction {
        self.sign(Data::new(DataType::Revoke, self.public_key()))
    }

    pub fn register_json(&self) -> String {
        self.register().to_json().unwrap()
    }

    pub fn data_json(&self, payload: &str) -> String {
        self.data(payload).to_json().unwrap()
    }

    pub fn revoke_json(&self) -> String {
        self.revoke().to_json().unwrap()
    }
}

/// Delivers packages by direct call to handlers attached under an address
#[derive(Default)]
pub struct LocalTransport {
    handlers: RwLock<HashMap<String, Weak<dyn Handler>>>,
    down: RwLock<HashSet<String>>,
}

impl LocalTransport {
    pub fn new() -> LocalTransport {
        LocalTransport::default()
    }

    pub fn attach(&self, address: &str, handler: &Arc<dyn Handler>) {
        self.handlers
            .write()
            .unwrap()
            .insert(address.to_string(), Arc::downgrade(handler));
    }

    /// Calls to `address` fail as if nothing was listening
    pub fn set_down(&self, address: &str) {
        self.down.write().unwrap().insert(address.to_string());
    }
}

impl Transport for LocalTransport {
    fn call(&self, address: &str, package: &Package) -> Result<Reply> {
        if self.down.read().unwrap().contains(address) {
            return Err(LedgerError::Connectivity(format!("{address} is down")));
        }
        let handler = self
            .handlers
            .read()
            .unwrap()
            .get(address)
            .and_then(Weak::upgrade)
            .ok_or_else(|| LedgerError::Connectivity(format!("Nothing listens on {address}")))?;

        match handler.handle(package.clone()) {
            Ok(Reply::Error(message)) => Err(LedgerError::Remote(message)),
            Ok(reply) => Ok(reply),
            Err(e) => Err(LedgerError::Remote(e.to_string())),
        }
    }
}

/// Peer that only records what it was sent
#[derive(Default)]
pub struct PackageLog {
    received: Mutex<Vec<Package>>,
}

impl PackageLog {
    pub fn new() -> PackageLog {
        PackageLog::default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.received.lock().unwrap().iter().map(package_name).collect()
    }
}

impl Handler for PackageLog {
    fn handle(&self, package: Package) -> Result<Reply> {
        self.received.lock().unwrap().push(package);
        Ok(Reply::Ok)
    }
}

/// Ledger store that remembers which indexes it saved
#[derive(Default)]
pub struct RecordingStore {
    saved: Mutex<Vec<u64>>,
}

impl RecordingStore {
    pub fn new() -> RecordingStore {
        RecordingStore::default()
    }

    pub fn saved_indexes(&self) -> Vec<u64> {
        self.saved.lock().unwrap().clone()
    }
}

impl LedgerStore for RecordingStore {
    fn save_block(&self, block_json: &str) -> Result<bool> {
        let index = Block::from_json(block_json)?.get_index();
        let mut saved = self.saved.lock().unwrap();
        if saved.contains(&index) {
            return Ok(false);
        }
        saved.push(index);
        Ok(true)
    }
}

/// `count` replicas registered in a shared directory, wired through a
/// [`LocalTransport`]
pub struct TestCluster {
    pub directory: Arc<InMemoryDirectory>,
    pub transport: Arc<LocalTransport>,
    pub nodes: Vec<Arc<Node>>,
    pub stores: Vec<Arc<RecordingStore>>,
}

impl TestCluster {
    pub fn new(count: usize, difficulty: usize) -> TestCluster {
        let directory = Arc::new(InMemoryDirectory::new());
        let transport = Arc::new(LocalTransport::new());
        let mut nodes = Vec::new();
        let mut stores = Vec::new();

        for i in 0..count {
            let name = format!("{DEFAULT_NODE_GROUP}.{i}");
            let address = Self::address(i);
            directory.register(&name, &address).unwrap();

            let store = Arc::new(RecordingStore::new());
            let network = Network::new(DEFAULT_NODE_GROUP, directory.clone(), transport.clone());
            let node = Node::new(name, difficulty, network, store.clone());
            let handler: Arc<dyn Handler> = node.clone();
            transport.attach(&address, &handler);

            nodes.push(node);
            stores.push(store);
        }

        TestCluster {
            directory,
            transport,
            nodes,
            stores,
        }
    }

    fn address(i: usize) -> String {
        format!("local-{i}")
    }

    /// Node `i` stays in the directory but can no longer be reached
    pub fn take_down(&self, i: usize) {
        self.transport.set_down(&Self::address(i));
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}
