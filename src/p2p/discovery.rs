//! Discovery: UDP multicast announce/query/offer over
//! `239.255.42.99:34789`. Built on `socket2` rather than bare
//! `std::net::UdpSocket`, since address-reuse must be set before
//! `bind()` and `std`'s socket has no such hook — grounded on the
//! wider ecosystem's standard pattern for reusable multicast sockets.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{CacheError, Result};

use super::wire::{self, AnnounceMessage, OfferMessage, QueryMessage, MSG_QUERY};

pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 42, 99);
pub const DISCOVERY_PORT: u16 = 34789;
pub const TRANSFER_PORT: u16 = 34790;
const REANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);

/// A locally-advertised cache, matched against incoming `query`s.
#[derive(Debug, Clone)]
pub struct LocalCache {
    pub game_id: String,
    pub game_name: String,
    pub size_bytes: u64,
}

pub struct DiscoverySocket {
    socket: UdpSocket,
    group: SocketAddrV4,
}

impl DiscoverySocket {
    /// Bind port 34789 with address-reuse and join the multicast group
    /// on the default (unspecified) interface.
    pub fn bind() -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| CacheError::SocketCreateFailed(e.to_string()))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| CacheError::BindFailed(e.to_string()))?;
        let bind_addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DISCOVERY_PORT).into();
        socket
            .bind(&bind_addr.into())
            .map_err(|e| CacheError::BindFailed(e.to_string()))?;
        socket
            .join_multicast_v4(&MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| CacheError::BindFailed(e.to_string()))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| CacheError::BindFailed(e.to_string()))?;

        Ok(Self {
            socket: socket.into(),
            group: SocketAddrV4::new(MULTICAST_GROUP, DISCOVERY_PORT),
        })
    }

    fn send(&self, datagram: &[u8]) -> Result<()> {
        self.socket
            .send_to(datagram, self.group)
            .map_err(|e| CacheError::SendFailed(e.to_string()))?;
        Ok(())
    }

    pub fn announce(&self, msg: &AnnounceMessage) -> Result<()> {
        for datagram in wire::encode_announce(msg) {
            self.send(&datagram)?;
        }
        Ok(())
    }

    pub fn query(&self, msg: &QueryMessage) -> Result<()> {
        for datagram in wire::encode_query(msg) {
            self.send(&datagram)?;
        }
        Ok(())
    }

    pub fn offer(&self, msg: &OfferMessage) -> Result<()> {
        for datagram in wire::encode_offer(msg) {
            self.send(&datagram)?;
        }
        Ok(())
    }

    /// Non-blocking receive. `Ok(None)` when nothing is queued;
    /// malformed datagrams are silently discarded by returning
    /// `Ok(None)` rather than propagating a parse error.
    pub fn try_recv(&self) -> Result<Option<(u8, Vec<u8>)>> {
        let mut buf = [0u8; 65536];
        match self.socket.recv_from(&mut buf) {
            Ok((len, _from)) => match wire::decode_prefix(&buf[..len]) {
                Some(raw) => Ok(Some((raw.msg_type, raw.payload.to_vec()))),
                None => Ok(None),
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}

/// A node's full discovery-loop state: its own identity, the caches it
/// serves, and the re-announce clock.
pub struct DiscoveryNode {
    pub socket: DiscoverySocket,
    pub hostname: String,
    pub arch: String,
    pub driver: String,
    pub caches: Vec<LocalCache>,
    last_announce: Option<Instant>,
}

impl DiscoveryNode {
    pub fn new(socket: DiscoverySocket, hostname: String, arch: String, driver: String) -> Self {
        Self {
            socket,
            hostname,
            arch,
            driver,
            caches: Vec::new(),
            last_announce: None,
        }
    }

    fn announce_message(&self) -> AnnounceMessage {
        AnnounceMessage {
            msg_type: "announce".to_string(),
            hostname: self.hostname.clone(),
            port: TRANSFER_PORT,
            arch: self.arch.clone(),
            driver: self.driver.clone(),
            caches: self.caches.iter().map(|c| c.game_id.clone()).collect(),
        }
    }

    /// Re-announce if 60s have elapsed since the last one (or never).
    pub fn maybe_announce(&mut self) -> Result<()> {
        let due = match self.last_announce {
            None => true,
            Some(last) => last.elapsed() >= REANNOUNCE_INTERVAL,
        };
        if due {
            self.socket.announce(&self.announce_message())?;
            self.last_announce = Some(Instant::now());
        }
        Ok(())
    }

    /// Invariant 8: offer iff this node owns a matching `game_id` AND
    /// its architecture equals the querier's.
    fn matching_cache(&self, game_id: &str, querier_arch: &str) -> Option<&LocalCache> {
        offer_for_query(&self.arch, &self.caches, game_id, querier_arch)
    }

    /// Process one non-blocking poll: drain the socket, respond to any
    /// matching `query`, and re-announce on schedule.
    pub fn poll_once(&mut self) -> Result<()> {
        self.maybe_announce()?;
        while let Some((msg_type, payload)) = self.socket.try_recv()? {
            if msg_type != MSG_QUERY {
                continue;
            }
            let Ok(query): std::result::Result<QueryMessage, _> = serde_json::from_slice(&payload)
            else {
                continue;
            };
            if let Some(cache) = self.matching_cache(&query.game_id, &query.arch) {
                let offer = OfferMessage {
                    msg_type: "offer".to_string(),
                    game_id: cache.game_id.clone(),
                    game_name: cache.game_name.clone(),
                    size: cache.size_bytes,
                    port: TRANSFER_PORT,
                };
                self.socket.offer(&offer)?;
            }
        }
        Ok(())
    }
}

/// Invariant 8 / S4: a node offers a cache iff `game_id` matches one
/// it owns AND its own architecture equals the querier's `arch`.
fn offer_for_query<'a>(
    own_arch: &str,
    caches: &'a [LocalCache],
    game_id: &str,
    querier_arch: &str,
) -> Option<&'a LocalCache> {
    if own_arch != querier_arch {
        return None;
    }
    caches.iter().find(|c| c.game_id == game_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_offers_only_when_game_id_and_arch_both_match() {
        let caches = vec![LocalCache {
            game_id: "steam:1086940".to_string(),
            game_name: "Test Game".to_string(),
            size_bytes: 1024,
        }];
        assert!(offer_for_query("Ada Lovelace", &caches, "steam:1086940", "Ada Lovelace").is_some());
        assert!(offer_for_query("Ada Lovelace", &caches, "steam:1086940", "Ampere").is_none());
        assert!(offer_for_query("Ada Lovelace", &caches, "steam:9999999", "Ada Lovelace").is_none());
    }
}
