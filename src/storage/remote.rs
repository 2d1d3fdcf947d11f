use crate::error::{LedgerError, Result};
use crate::network::{Directory, Package, Reply, Transport};
use crate::storage::LedgerStore;
use std::sync::Arc;

/// Ledger store running in another process, found by name in the directory.
/// The address is resolved on every call so a restarted store is picked up.
pub struct RemoteLedgerStore {
    name: String,
    directory: Arc<dyn Directory>,
    transport: Arc<dyn Transport>,
}

impl RemoteLedgerStore {
    pub fn new(
        name: impl Into<String>,
        directory: Arc<dyn Directory>,
        transport: Arc<dyn Transport>,
    ) -> RemoteLedgerStore {
        RemoteLedgerStore {
            name: name.into(),
            directory,
            transport,
        }
    }
}

impl LedgerStore for RemoteLedgerStore {
    fn save_block(&self, block_json: &str) -> Result<bool> {
        let address = self.directory.lookup(&self.name)?;
        let package = Package::SaveBlock {
            block: block_json.to_string(),
        };
        match self.transport.call(&address, &package)? {
            Reply::Saved(saved) => Ok(saved),
            other => Err(LedgerError::Database(format!(
                "Unexpected reply from {}: {other:?}",
                self.name
            ))),
        }
    }
}
