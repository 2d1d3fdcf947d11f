use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{current_timestamp, from_json, parse_timestamp, sha256_hex, to_canonical_json};
use serde::{Deserialize, Serialize};

/// A batch of transactions. Field order is the wire and hashing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: String,
    transactions: Vec<Transaction>,
    prev_hash: String,
    proof: u64,
}

impl Block {
    /// Empty pending block stamped with the current time
    pub fn new_block(index: u64, prev_hash: String) -> Block {
        Block {
            index,
            timestamp: current_timestamp(),
            transactions: vec![],
            prev_hash,
            proof: 0,
        }
    }

    pub fn from_parts(
        index: u64,
        timestamp: String,
        transactions: Vec<Transaction>,
        prev_hash: String,
        proof: u64,
    ) -> Block {
        Block {
            index,
            timestamp,
            transactions,
            prev_hash,
            proof,
        }
    }

    /// Next block on top of `committed`: index is the chain length and
    /// `prev_hash` the hash of the last committed block (empty for the first)
    pub fn next_after(committed: &[Block]) -> Result<Block> {
        let prev_hash = match committed.last() {
            Some(last) => last.hash()?,
            None => String::new(),
        };
        Ok(Block::new_block(committed.len() as u64, prev_hash))
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp_str(&self) -> &str {
        self.timestamp.as_str()
    }

    pub fn get_timestamp(&self) -> Result<chrono::NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_proof(&self) -> u64 {
        self.proof
    }

    pub fn set_proof(&mut self, proof: u64) {
        self.proof = proof;
    }

    pub fn set_timestamp(&mut self, timestamp: String) {
        self.timestamp = timestamp;
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Fix the timestamp for mining
    pub fn freeze(&mut self) {
        self.timestamp = current_timestamp();
    }

    /// Hex SHA-256 over the canonical JSON, including the current proof
    pub fn hash(&self) -> Result<String> {
        Ok(sha256_hex(&self.to_json()?))
    }

    pub fn to_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    pub fn from_json(json: &str) -> Result<Block> {
        from_json(json)
    }
}
