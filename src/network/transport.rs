use crate::error::{LedgerError, Result};
use crate::network::{Package, Reply};
use log::debug;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

const TCP_CONNECT_TIMEOUT: u64 = 5000;
const TCP_IO_TIMEOUT: u64 = 30000;

/// Named-method call on a remote endpoint.
///
/// Implementations must report an unreachable peer as
/// [`LedgerError::Connectivity`] and an application-level rejection as
/// [`LedgerError::Remote`]; broadcast pruning depends on the difference.
pub trait Transport: Send + Sync {
    fn call(&self, address: &str, package: &Package) -> Result<Reply>;
}

/// One JSON package per connection, one JSON reply back
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> TcpTransport {
        TcpTransport {
            connect_timeout: Duration::from_millis(TCP_CONNECT_TIMEOUT),
            io_timeout: Duration::from_millis(TCP_IO_TIMEOUT),
        }
    }

    pub fn with_timeouts(connect_timeout: Duration, io_timeout: Duration) -> TcpTransport {
        TcpTransport {
            connect_timeout,
            io_timeout,
        }
    }

    fn resolve(address: &str) -> Result<SocketAddr> {
        address
            .to_socket_addrs()
            .map_err(|e| LedgerError::Connectivity(format!("Cannot resolve {address}: {e}")))?
            .next()
            .ok_or_else(|| LedgerError::Connectivity(format!("No address for {address}")))
    }
}

impl Transport for TcpTransport {
    fn call(&self, address: &str, package: &Package) -> Result<Reply> {
        let socket_addr = Self::resolve(address)?;
        debug!("Sending package to {socket_addr}: {package:?}");

        let stream = TcpStream::connect_timeout(&socket_addr, self.connect_timeout)
            .map_err(|e| LedgerError::Connectivity(format!("Failed to connect to {address}: {e}")))?;
        stream
            .set_write_timeout(Some(self.io_timeout))
            .and_then(|_| stream.set_read_timeout(Some(self.io_timeout)))
            .map_err(|e| LedgerError::Connectivity(format!("Failed to set timeouts: {e}")))?;

        serde_json::to_writer(&stream, package)
            .map_err(|e| LedgerError::Connectivity(format!("Failed to send to {address}: {e}")))?;
        let _ = stream.shutdown(Shutdown::Write);

        let reply: Reply = serde_json::from_reader(&stream).map_err(|e| {
            if e.is_io() || e.is_eof() {
                LedgerError::Connectivity(format!("No reply from {address}: {e}"))
            } else {
                LedgerError::Serialization(format!("Malformed reply from {address}: {e}"))
            }
        })?;

        match reply {
            Reply::Error(msg) => Err(LedgerError::Remote(msg)),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_unreachable_peer_is_connectivity_error() {
        // bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let transport =
            TcpTransport::with_timeouts(Duration::from_millis(500), Duration::from_millis(500));

        let err = transport
            .call(&format!("127.0.0.1:{port}"), &Package::GetLastBlock)
            .unwrap_err();
        assert!(err.is_connectivity());
    }

    #[test]
    fn test_unresolvable_address_is_connectivity_error() {
        let err = TcpTransport::new()
            .call("not an address", &Package::GetLastBlock)
            .unwrap_err();
        assert!(err.is_connectivity());
    }
}
