use crate::config::Config;
use crate::error::Result;
use crate::utils::DEFAULT_RSA_BITS;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bb-ledger", about = "Replicated ledger of signed user data")]
pub struct Opt {
    #[arg(long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
    #[arg(
        long = "directory-address",
        global = true,
        help = "Address of the directory service"
    )]
    pub directory_address: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

impl Opt {
    /// Defaults, file and environment, then the global flags
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(addr) = &self.directory_address {
            config.directory_address = addr.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "directory", about = "Serve the directory")]
    Directory,
    #[command(name = "store", about = "Serve the ledger store and register it")]
    Store {
        #[arg(long, help = "Address to listen on")]
        addr: Option<String>,
        #[arg(long = "data-dir", help = "Where the ledger database lives")]
        data_dir: Option<PathBuf>,
    },
    #[command(name = "node", about = "Run a consensus node")]
    Node {
        #[arg(long, help = "Name to register under, inside the node group")]
        name: Option<String>,
        #[arg(long, help = "Address to listen on")]
        addr: Option<String>,
        #[arg(long, help = "Leading zero hex digits a proof must produce")]
        difficulty: Option<usize>,
        #[arg(long = "remote-store", help = "Hand blocks to the registered ledger store")]
        remote_store: bool,
    },
    #[command(name = "keygen", about = "Write a new RSA private key")]
    Keygen {
        #[arg(help = "Output PEM file")]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_RSA_BITS)]
        bits: usize,
    },
    #[command(name = "register", about = "Register a user's public key")]
    Register {
        #[arg(long, help = "Private key PEM file")]
        key: PathBuf,
        #[arg(long, help = "User guid, generated when omitted")]
        guid: Option<String>,
    },
    #[command(name = "send", about = "Submit a data payload")]
    Send {
        #[arg(long, help = "Private key PEM file")]
        key: PathBuf,
        #[arg(long)]
        guid: String,
        #[arg(help = "Payload to store")]
        payload: String,
    },
    #[command(name = "revoke", about = "Revoke a user's public key")]
    Revoke {
        #[arg(long, help = "Private key PEM file")]
        key: PathBuf,
        #[arg(long)]
        guid: String,
    },
    #[command(name = "commit", about = "Freeze the pending block and start a proofing round")]
    Commit,
    #[command(name = "lastblock", about = "Print the last committed block")]
    Lastblock,
    #[command(name = "echo", about = "Check that a node answers")]
    Echo {
        #[arg(default_value = "ping")]
        message: String,
    },
}
