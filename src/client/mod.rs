//! Ledger user
//!
//! Builds and signs transactions with the user's RSA key and submits them
//! to the first node listed in the directory.

use crate::consensus::Admission;
use crate::core::{Block, Data, DataType, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::{Directory, Package, Reply, Transport};
use crate::utils::encode_public_key;
use log::info;
use rsa::RsaPrivateKey;
use std::sync::Arc;
use uuid::Uuid;

pub struct Client {
    guid: String,
    key: Option<RsaPrivateKey>,
    node_group: String,
    directory: Arc<dyn Directory>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// A fresh v4 guid is drawn when `guid` is `None`
    pub fn new(
        guid: Option<String>,
        key: RsaPrivateKey,
        node_group: impl Into<String>,
        directory: Arc<dyn Directory>,
        transport: Arc<dyn Transport>,
    ) -> Client {
        Client {
            guid: guid.unwrap_or_else(|| Uuid::new_v4().to_string()),
            key: Some(key),
            node_group: node_group.into(),
            directory,
            transport,
        }
    }

    /// Client without a key, for commit, lastblock and echo
    pub fn observer(
        node_group: impl Into<String>,
        directory: Arc<dyn Directory>,
        transport: Arc<dyn Transport>,
    ) -> Client {
        Client {
            guid: Uuid::new_v4().to_string(),
            key: None,
            node_group: node_group.into(),
            directory,
            transport,
        }
    }

    pub fn get_guid(&self) -> &str {
        self.guid.as_str()
    }

    fn signing_key(&self) -> Result<&RsaPrivateKey> {
        self.key
            .as_ref()
            .ok_or_else(|| LedgerError::Signing(format!("{} has no signing key", self.guid)))
    }

    pub fn public_key(&self) -> Result<String> {
        encode_public_key(&self.signing_key()?.to_public_key())
    }

    fn signed(&self, data: Data) -> Result<Transaction> {
        let mut tx = Transaction::new(self.guid.as_str(), data);
        tx.sign(self.signing_key()?)?;
        Ok(tx)
    }

    pub fn register_transaction(&self) -> Result<Transaction> {
        self.signed(Data::new(DataType::Register, self.public_key()?))
    }

    pub fn data_transaction(&self, payload: &str) -> Result<Transaction> {
        self.signed(Data::new(DataType::Data, payload))
    }

    pub fn revoke_transaction(&self) -> Result<Transaction> {
        self.signed(Data::new(DataType::Revoke, self.public_key()?))
    }

    fn first_node(&self) -> Result<String> {
        self.directory
            .list(&self.node_group)?
            .into_values()
            .next()
            .ok_or_else(|| {
                LedgerError::Directory(format!("No node registered under {}", self.node_group))
            })
    }

    fn call_node(&self, package: &Package) -> Result<Reply> {
        let address = self.first_node()?;
        self.transport.call(&address, package)
    }

    pub fn submit(&self, tx: &Transaction) -> Result<Admission> {
        let package = Package::AddTransaction {
            transaction: tx.to_json()?,
        };
        match self.call_node(&package)? {
            Reply::Admission(admission) => {
                info!(
                    "{:?} transaction from {}: {admission:?}",
                    tx.get_data().get_type(),
                    self.guid
                );
                Ok(admission)
            }
            other => Err(unexpected(other)),
        }
    }

    pub fn register(&self) -> Result<Admission> {
        self.submit(&self.register_transaction()?)
    }

    pub fn send(&self, payload: &str) -> Result<Admission> {
        self.submit(&self.data_transaction(payload)?)
    }

    pub fn revoke(&self) -> Result<Admission> {
        self.submit(&self.revoke_transaction()?)
    }

    pub fn commit(&self) -> Result<bool> {
        match self.call_node(&Package::Commit)? {
            Reply::Committed(started) => Ok(started),
            other => Err(unexpected(other)),
        }
    }

    pub fn last_block(&self) -> Result<Option<Block>> {
        match self.call_node(&Package::GetLastBlock)? {
            Reply::Block(block) => Ok(block),
            other => Err(unexpected(other)),
        }
    }

    pub fn echo(&self, message: &str) -> Result<String> {
        let package = Package::Echo {
            message: message.to_string(),
        };
        match self.call_node(&package)? {
            Reply::Text(text) => Ok(text),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: Reply) -> LedgerError {
    LedgerError::Remote(format!("Unexpected reply from node: {reply:?}"))
}
