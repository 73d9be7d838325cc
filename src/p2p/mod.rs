//! P2P protocol (C6b): LAN discovery over UDP multicast plus TCP
//! transfer of a matched cache. A node owns exactly two sockets and
//! its own peer/cache state (§5's shared-resource discipline); nothing
//! here is shared across threads.

pub mod discovery;
pub mod transfer;
pub mod wire;

pub use discovery::{DiscoveryNode, DiscoverySocket, LocalCache, DISCOVERY_PORT, MULTICAST_GROUP, TRANSFER_PORT};
pub use transfer::{receive_file, send_file, TransferHeader};

use std::net::TcpListener;
use std::time::Duration;

use crate::error::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the discovery node and the transfer listener; `run()` is the
/// cooperative ~100 ms poll loop described in §5.
pub struct P2PNode {
    discovery: DiscoveryNode,
    listener: TcpListener,
    running: bool,
}

impl P2PNode {
    pub fn new(discovery: DiscoveryNode, listener: TcpListener) -> Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(Self {
            discovery,
            listener,
            running: true,
        })
    }

    /// One non-blocking pass: service discovery (re-announce, answer
    /// queries) and accept any pending transfer connection.
    pub fn poll_once(&mut self) -> Result<Option<std::net::TcpStream>> {
        self.discovery.poll_once()?;
        match self.listener.accept() {
            Ok((stream, _addr)) => Ok(Some(stream)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(crate::error::CacheError::Io(e)),
        }
    }

    pub fn run(&mut self, mut on_transfer: impl FnMut(std::net::TcpStream)) -> Result<()> {
        while self.running {
            if let Some(stream) = self.poll_once()? {
                on_transfer(stream);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running = false;
    }
}
