// Durable sink for committed blocks. Delivery is at-least-once, so every
// store deduplicates by block index on its own.

use crate::core::{Block, DataType};
use crate::error::{LedgerError, Result};
use crate::network::{Handler, Package, Reply};
use log::{debug, info};
use sled::transaction::TransactionError;
use sled::{Db, Transactional};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";
const PAYLOADS_TREE: &str = "payloads";

pub trait LedgerStore: Send + Sync {
    /// Persist a committed block. `Ok(false)` when its index was already stored.
    fn save_block(&self, block_json: &str) -> Result<bool>;
}

/// Blocks keyed by big-endian index, `data` payloads keyed by index and
/// position inside the block
#[derive(Clone)]
pub struct SledLedgerStore {
    db: Db,
}

impl SledLedgerStore {
    pub fn open(path: impl AsRef<Path>) -> Result<SledLedgerStore> {
        let db = sled::open(path.as_ref())
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        Ok(SledLedgerStore { db })
    }

    fn payload_key(index: u64, position: usize) -> Vec<u8> {
        let mut key = index.to_be_bytes().to_vec();
        key.extend((position as u64).to_be_bytes());
        key
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        let blocks = self.db.open_tree(BLOCKS_TREE)?;
        match blocks.get(index.to_be_bytes())? {
            Some(bytes) => {
                let json = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    LedgerError::Database(format!("Stored block {index} is not UTF-8: {e}"))
                })?;
                Ok(Some(Block::from_json(&json)?))
            }
            None => Ok(None),
        }
    }

    pub fn block_count(&self) -> Result<usize> {
        Ok(self.db.open_tree(BLOCKS_TREE)?.len())
    }

    /// `data` payloads of the block at `index`, in block order
    pub fn get_payloads(&self, index: u64) -> Result<Vec<String>> {
        let payloads = self.db.open_tree(PAYLOADS_TREE)?;
        payloads
            .scan_prefix(index.to_be_bytes())
            .values()
            .map(|value| {
                let bytes = value?;
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| LedgerError::Database(format!("Invalid payload: {e}")))
            })
            .collect()
    }
}

impl LedgerStore for SledLedgerStore {
    fn save_block(&self, block_json: &str) -> Result<bool> {
        let block = Block::from_json(block_json)?;
        let index = block.get_index();
        let key = index.to_be_bytes();

        let blocks = self.db.open_tree(BLOCKS_TREE)?;
        let payloads = self.db.open_tree(PAYLOADS_TREE)?;

        let saved = (&blocks, &payloads)
            .transaction(|(tx_blocks, tx_payloads)| {
                if tx_blocks.get(key)?.is_some() {
                    return Ok(false);
                }
                tx_blocks.insert(key.to_vec(), block_json.as_bytes())?;
                for (position, tx) in block.get_transactions().iter().enumerate() {
                    if tx.get_data().get_type() == DataType::Data {
                        tx_payloads.insert(
                            Self::payload_key(index, position),
                            tx.get_data().get_payload().as_bytes(),
                        )?;
                    }
                }
                Ok(true)
            })
            .map_err(|e: TransactionError| {
                LedgerError::Database(format!("Failed to save block {index}: {e}"))
            })?;

        if saved {
            self.db.flush()?;
            info!("Saved block {index}");
        } else {
            debug!("Block {index} already saved");
        }
        Ok(saved)
    }
}

impl Handler for SledLedgerStore {
    fn handle(&self, package: Package) -> Result<Reply> {
        match package {
            Package::SaveBlock { block } => Ok(Reply::Saved(self.save_block(&block)?)),
            Package::Echo { message } => Ok(Reply::Text(format!("echo: {message}"))),
            other => Err(LedgerError::Remote(format!(
                "Ledger store does not handle {other:?}"
            ))),
        }
    }
}
