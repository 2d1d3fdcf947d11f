//! Ledger data model
//!
//! Transactions, blocks and the proof-of-work search. Everything here is
//! serialized through the canonical JSON layout because that byte sequence is
//! what gets signed, verified and hashed across peers.

pub mod block;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use proof_of_work::{ProofOfWork, DEFAULT_DIFFICULTY};
pub use transaction::{Data, DataType, Transaction};
