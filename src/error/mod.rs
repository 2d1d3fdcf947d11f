//! Error handling for the ledger
//!
//! Expected business outcomes (a transaction that fails verification, a late
//! proof) are not errors; they are reported through return values by the
//! consensus engine. The variants here cover everything that can actually go
//! wrong while talking to peers, stores and keys.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone)]
pub enum LedgerError {
    /// Key decoding, hashing and signature plumbing errors
    Crypto(String),
    /// A transaction could not be signed with the given key
    Signing(String),
    /// Malformed wire payloads and JSON encoding failures
    Serialization(String),
    /// The peer could not be reached at all
    Connectivity(String),
    /// The peer was reached but rejected the request
    Remote(String),
    /// Directory lookups that returned nothing usable
    Directory(String),
    /// Ledger store errors
    Database(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
    /// Block construction or validation errors
    InvalidBlock(String),
    /// Replica state could not be accessed (poisoned lock)
    State(String),
}

impl LedgerError {
    /// Connectivity errors are the only ones that prune a peer
    pub fn is_connectivity(&self) -> bool {
        matches!(self, LedgerError::Connectivity(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Signing(msg) => write!(f, "Signing error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Connectivity(msg) => write!(f, "Connectivity error: {msg}"),
            LedgerError::Remote(msg) => write!(f, "Remote error: {msg}"),
            LedgerError::Directory(msg) => write!(f, "Directory error: {msg}"),
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            LedgerError::State(msg) => write!(f, "State error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
