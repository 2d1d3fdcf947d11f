use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory prefix shared by every consensus node
pub const DEFAULT_NODE_GROUP: &str = "node.endpoint";
/// Directory name of the ledger store
pub const DEFAULT_STORE_NAME: &str = "persistence.db";

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_DIRECTORY_ADDR: &str = "127.0.0.1:2000";
static DEFAULT_STORE_ADDR: &str = "127.0.0.1:2100";

const NODE_NAME_KEY: &str = "NODE_NAME";
const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const DIRECTORY_ADDRESS_KEY: &str = "DIRECTORY_ADDRESS";
const STORE_ADDRESS_KEY: &str = "STORE_ADDRESS";
const DIFFICULTY_KEY: &str = "DIFFICULTY";
const DATA_DIR_KEY: &str = "DATA_DIR";

/// Leading hex zeros a hash can have
const MAX_DIFFICULTY: usize = 64;

/// Process settings. Every field has a default, so a TOML file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node_name: String,
    pub node_address: String,
    pub directory_address: String,
    pub store_address: String,
    pub node_group: String,
    pub store_name: String,
    pub difficulty: usize,
    pub data_dir: PathBuf,
    /// Hand committed blocks to the store registered under `store_name`
    /// instead of opening one in-process
    pub remote_store: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_name: format!("{DEFAULT_NODE_GROUP}.1"),
            node_address: String::from(DEFAULT_NODE_ADDR),
            directory_address: String::from(DEFAULT_DIRECTORY_ADDR),
            store_address: String::from(DEFAULT_STORE_ADDR),
            node_group: String::from(DEFAULT_NODE_GROUP),
            store_name: String::from(DEFAULT_STORE_NAME),
            difficulty: crate::core::DEFAULT_DIFFICULTY,
            data_dir: PathBuf::from("data"),
            remote_store: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Config::from_toml_str(&contents)
    }

    /// Defaults, then the optional file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `NODE_NAME`, `NODE_ADDRESS`, `DIRECTORY_ADDRESS`,
    /// `STORE_ADDRESS`, `DIFFICULTY` and `DATA_DIR` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(NODE_NAME_KEY) {
            self.node_name = name;
        }
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node_address = addr;
        }
        if let Some(addr) = lookup(DIRECTORY_ADDRESS_KEY) {
            self.directory_address = addr;
        }
        if let Some(addr) = lookup(STORE_ADDRESS_KEY) {
            self.store_address = addr;
        }
        if let Some(difficulty) = lookup(DIFFICULTY_KEY) {
            self.difficulty = difficulty.parse().map_err(|e| {
                LedgerError::Config(format!("{DIFFICULTY_KEY}={difficulty:?}: {e}"))
            })?;
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} is above {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        if !self.node_name.starts_with(&self.node_group) {
            return Err(LedgerError::Config(format!(
                "node name {} is outside group {}",
                self.node_name, self.node_group
            )));
        }
        Ok(())
    }

    /// Sled path of the local ledger store
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_name)
    }
}
