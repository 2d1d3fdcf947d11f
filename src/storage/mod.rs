//! Persistence hand-off
//!
//! The consensus engine hands every committed block to a [`LedgerStore`].
//! Stores are idempotent by block index and keep the `data` payloads they
//! find inside each block.

pub mod ledger_store;
pub mod remote;

pub use ledger_store::{LedgerStore, SledLedgerStore};
pub use remote::RemoteLedgerStore;
