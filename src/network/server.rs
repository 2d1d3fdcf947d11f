use crate::consensus::Admission;
use crate::core::Block;
use crate::error::{LedgerError, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::collections::BTreeMap;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const TCP_READ_TIMEOUT: u64 = 60;

/// Every message a process in the ledger can receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Package {
    /// Raw transaction JSON, kept as sent so duplicate deliveries compare equal
    AddTransaction {
        transaction: String,
    },
    Commit,
    /// Frozen block every replica should start mining
    StartProofing {
        block: Block,
    },
    ProofFound {
        proof: u64,
        hash: String,
        timestamp: String,
    },
    AddBlock {
        proof: u64,
        hash: String,
    },
    GetLastBlock,
    Echo {
        message: String,
    },
    Register {
        name: String,
        address: String,
    },
    List {
        prefix: String,
    },
    Remove {
        name: String,
    },
    SaveBlock {
        block: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Ok,
    Committed(bool),
    Saved(bool),
    Admission(Admission),
    Text(String),
    Block(Option<Block>),
    Names(BTreeMap<String, String>),
    Error(String),
}

/// Receiving side of a [`Package`]
pub trait Handler: Send + Sync {
    fn handle(&self, package: Package) -> Result<Reply>;
}

/// Thread-per-connection request server
pub struct Server {
    listener: TcpListener,
    handler: Arc<dyn Handler>,
}

impl Server {
    pub fn bind(addr: &str, handler: Arc<dyn Handler>) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| LedgerError::Connectivity(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Server { listener, handler })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails
    pub fn run(&self) -> Result<()> {
        info!("Server listening on {}", self.local_addr()?);

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };

                    let handler = Arc::clone(&self.handler);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(handler.as_ref(), stream, peer_addr)
                        {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    /// Run on a background thread
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || {
            if let Err(e) = self.run() {
                error!("Server stopped: {e}");
            }
        })
    }

    fn handle_connection(
        handler: &dyn Handler,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_secs(TCP_READ_TIMEOUT)))
            .map_err(|e| LedgerError::Connectivity(format!("Failed to set read timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        let mut pkg_reader = Deserializer::from_reader(reader).into_iter::<Package>();

        let reply = match pkg_reader.next() {
            Some(Ok(pkg)) => {
                debug!("Received request from {peer_addr}: {pkg:?}");
                handler.handle(pkg).unwrap_or_else(|e| {
                    error!("Error processing message from {peer_addr}: {e}");
                    Reply::Error(e.to_string())
                })
            }
            Some(Err(e)) => {
                error!("Malformed package from {peer_addr}: {e}");
                Reply::Error(format!("Malformed package: {e}"))
            }
            None => return Ok(()),
        };

        let mut writer = &stream;
        serde_json::to_writer(writer, &reply)
            .map_err(|e| LedgerError::Connectivity(format!("Failed to send reply: {e}")))?;
        let _ = writer.flush();
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }
}
