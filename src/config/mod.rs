//! Configuration management
//!
//! Node, directory and store addresses, the consensus group, and mining
//! difficulty. Loaded from defaults, an optional TOML file and the
//! environment; command-line flags are applied last by the binary.

pub mod settings;

pub use settings::{Config, DEFAULT_NODE_GROUP, DEFAULT_STORE_NAME};
