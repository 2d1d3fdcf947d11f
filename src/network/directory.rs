//! Name-to-address lookup used for peer and service discovery.

use crate::error::{LedgerError, Result};
use crate::network::{Handler, Package, Reply, TcpTransport, Transport};
use log::info;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

pub trait Directory: Send + Sync {
    fn register(&self, name: &str, address: &str) -> Result<()>;

    /// Every entry whose name starts with `prefix`
    fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>>;

    fn remove(&self, name: &str) -> Result<()>;

    /// Address registered under exactly `name`
    fn lookup(&self, name: &str) -> Result<String> {
        self.list(name)?
            .remove(name)
            .ok_or_else(|| LedgerError::Directory(format!("{name} is not registered")))
    }
}

/// Directory kept in process memory; also what the `directory` server serves
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> InMemoryDirectory {
        InMemoryDirectory::default()
    }
}

impl Directory for InMemoryDirectory {
    fn register(&self, name: &str, address: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(name.to_string(), address.to_string());
        info!("Registered {name} at {address}");
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, addr)| (name.clone(), addr.clone()))
            .collect())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(name).is_some() {
            info!("Removed {name}");
        }
        Ok(())
    }
}

impl Handler for InMemoryDirectory {
    fn handle(&self, package: Package) -> Result<Reply> {
        match package {
            Package::Register { name, address } => {
                self.register(&name, &address)?;
                Ok(Reply::Ok)
            }
            Package::List { prefix } => Ok(Reply::Names(self.list(&prefix)?)),
            Package::Remove { name } => {
                self.remove(&name)?;
                Ok(Reply::Ok)
            }
            Package::Echo { message } => Ok(Reply::Text(format!("echo: {message}"))),
            other => Err(LedgerError::Remote(format!(
                "Directory does not handle {other:?}"
            ))),
        }
    }
}

/// Remote directory reached over [`TcpTransport`]
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    address: String,
    transport: TcpTransport,
}

impl DirectoryClient {
    pub fn new(address: impl Into<String>) -> DirectoryClient {
        DirectoryClient {
            address: address.into(),
            transport: TcpTransport::new(),
        }
    }

    fn expect_ok(&self, package: &Package) -> Result<()> {
        match self.transport.call(&self.address, package)? {
            Reply::Ok => Ok(()),
            other => Err(LedgerError::Directory(format!("Unexpected reply: {other:?}"))),
        }
    }
}

impl Directory for DirectoryClient {
    fn register(&self, name: &str, address: &str) -> Result<()> {
        self.expect_ok(&Package::Register {
            name: name.to_string(),
            address: address.to_string(),
        })
    }

    fn list(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        let package = Package::List {
            prefix: prefix.to_string(),
        };
        match self.transport.call(&self.address, &package)? {
            Reply::Names(names) => Ok(names),
            other => Err(LedgerError::Directory(format!("Unexpected reply: {other:?}"))),
        }
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.expect_ok(&Package::Remove {
            name: name.to_string(),
        })
    }
}
