//! # bb-ledger - a small replicated ledger of signed user data
//!
//! Users register an RSA public key, then submit signed `data` payloads and
//! finally revoke the key. Every node keeps a replica of the chain; a commit
//! freezes the pending block, all nodes race a proof of work on it, and the
//! first valid proof makes every replica commit the same block and hand it to
//! the ledger store.
//!
//! ## How the code is organized
//! - `core/`: transactions, blocks, canonical hashing and proof of work
//! - `consensus/`: the replica state machine and the user registry
//! - `network/`: wire packages, the request server, the directory and broadcast
//! - `storage/`: the ledger store (sled) and its remote client
//! - `client/`: building, signing and submitting transactions as a user
//! - `config/`: defaults, TOML file and environment overrides
//! - `utils/`: RSA-PSS, hashing, base64 and canonical JSON helpers
//! - `cli/`: command-line parsing for every process role
//!
//! ## Processes
//! One binary runs every role: `directory`, `store`, `node`, and the user
//! commands. Nodes find each other by listing the `node.endpoint` prefix in
//! the directory.

pub mod cli;
pub mod client;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use client::Client;
pub use config::{Config, DEFAULT_NODE_GROUP, DEFAULT_STORE_NAME};
pub use consensus::{Admission, Node, RejectReason, Round, UserRegistry};
pub use core::{Block, Data, DataType, ProofOfWork, Transaction, DEFAULT_DIFFICULTY};
pub use error::{LedgerError, Result};
pub use network::{
    Directory, DirectoryClient, Handler, InMemoryDirectory, Network, Package, Reply, Server,
    TcpTransport, Transport,
};
pub use storage::{LedgerStore, RemoteLedgerStore, SledLedgerStore};
pub use utils::{current_timestamp, rsa_pss_sign, rsa_pss_verify, sha256_hex};
