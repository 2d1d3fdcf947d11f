//! Peer-to-peer plumbing
//!
//! Wire packages and the request server, the transport used to call peers,
//! the directory used to find them, and broadcast-with-pruning over the
//! cached peer set.

pub mod broadcast;
pub mod directory;
pub mod peers;
pub mod server;
pub mod transport;

pub use broadcast::{BroadcastReport, Network};
pub use directory::{Directory, DirectoryClient, InMemoryDirectory};
pub use peers::{Peer, Peers};
pub use server::{Handler, Package, Reply, Server};
pub use transport::{TcpTransport, Transport};
