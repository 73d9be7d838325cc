//! Transfer: the TCP side of the P2P protocol. A sender writes the
//! ASCII header followed by the file streamed in 64 KiB chunks; the
//! receiver parses four header lines, then reads exactly the declared
//! byte count.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use socket2::{Domain, Socket, Type};

use crate::error::{CacheError, Result};

use super::discovery::TRANSFER_PORT;
use super::wire;

const CHUNK_SIZE: usize = 64 * 1024;

/// Bind the transfer port with address-reuse, matching the discovery
/// socket's reuse discipline.
pub fn bind_listener() -> Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)
        .map_err(|e| CacheError::SocketCreateFailed(e.to_string()))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| CacheError::BindFailed(e.to_string()))?;
    let addr: std::net::SocketAddr =
        std::net::SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, TRANSFER_PORT).into();
    socket
        .bind(&addr.into())
        .map_err(|e| CacheError::BindFailed(e.to_string()))?;
    socket
        .listen(16)
        .map_err(|e| CacheError::ListenFailed(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| CacheError::ListenFailed(e.to_string()))?;
    Ok(socket.into())
}

/// Parse a dotted-quad IPv4 address by hand rather than delegating to
/// `Ipv4Addr`'s own `FromStr`, so a manually-entered peer address (for
/// networks where multicast discovery is blocked) raises the crate's
/// own `InvalidAddress` instead of a generic parse error.
pub fn parse_ipv4(s: &str) -> Result<std::net::Ipv4Addr> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return Err(CacheError::InvalidAddress(s.to_string()));
    }
    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(parts) {
        *slot = part
            .parse::<u16>()
            .ok()
            .filter(|n| *n <= 255)
            .ok_or_else(|| CacheError::InvalidAddress(s.to_string()))? as u8;
    }
    Ok(std::net::Ipv4Addr::from(octets))
}

/// Resolve a manually-entered `host:port`-less peer address (no DNS,
/// dotted-quad only) for direct transfer when discovery is unavailable.
pub fn resolve_peer_addr(host: &str, port: u16) -> Result<std::net::SocketAddr> {
    let ip = parse_ipv4(host)?;
    Ok(std::net::SocketAddrV4::new(ip, port).into())
}

/// Connect to `addr` and stream `file_path`'s contents, preceded by
/// the transfer header, in 64 KiB chunks.
pub fn send_file(
    addr: std::net::SocketAddr,
    game_id: &str,
    game_name: &str,
    file_path: &Path,
) -> anyhow::Result<()> {
    let size_bytes = std::fs::metadata(file_path)?.len();
    let mut stream = TcpStream::connect(addr)
        .map_err(|e| anyhow!(CacheError::ConnectFailed(e.to_string())))?;

    let header = wire::transfer_header(game_id, game_name, size_bytes);
    stream
        .write_all(header.as_bytes())
        .map_err(|e| anyhow!(CacheError::SendFailed(e.to_string())))?;

    let mut reader = std::fs::File::open(file_path)?;
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        stream
            .write_all(&buffer[..read])
            .map_err(|e| anyhow!(CacheError::SendFailed(e.to_string())))?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHeader {
    pub game_id: String,
    pub game_name: String,
    pub size_bytes: u64,
}

/// Parse the four header lines (magic, game_id, game_name, size_bytes)
/// then read exactly `size_bytes` of payload into `destination`.
pub fn receive_file(stream: TcpStream, destination: &Path) -> anyhow::Result<TransferHeader> {
    let mut reader = BufReader::new(stream);

    let mut magic_line = String::new();
    reader.read_line(&mut magic_line)?;
    if magic_line != wire::TRANSFER_HEADER_MAGIC {
        bail!("transfer stream missing NVCACHE_TRANSFER header");
    }

    let game_id = read_header_line(&mut reader)?;
    let game_name = read_header_line(&mut reader)?;
    let size_line = read_header_line(&mut reader)?;
    let size_bytes: u64 = size_line
        .parse()
        .with_context(|| format!("bad size_bytes header: {size_line}"))?;

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::fs::File::create(destination)?;
    let mut remaining = size_bytes;
    let mut buffer = [0u8; CHUNK_SIZE];
    while remaining > 0 {
        let to_read = (buffer.len() as u64).min(remaining) as usize;
        reader.read_exact(&mut buffer[..to_read])?;
        out.write_all(&buffer[..to_read])?;
        remaining -= to_read as u64;
    }

    Ok(TransferHeader {
        game_id,
        game_name,
        size_bytes,
    })
}

fn read_header_line(reader: &mut BufReader<TcpStream>) -> anyhow::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim_end_matches('\n').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener as StdTcpListener};
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn transfer_round_trips_header_and_payload() {
        let listener = StdTcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        let source_dir = tempdir().unwrap();
        let source_path = source_dir.path().join("game.foz");
        std::fs::write(&source_path, b"pipeline payload bytes").unwrap();

        let sender_path = source_path.clone();
        let sender = thread::spawn(move || {
            send_file(addr, "steam:1086940", "Baldur's Gate 3", &sender_path).unwrap();
        });

        let (stream, _) = listener.accept().unwrap();
        let dest_dir = tempdir().unwrap();
        let dest_path = dest_dir.path().join("received.foz");
        let header = receive_file(stream, &dest_path).unwrap();

        sender.join().unwrap();

        assert_eq!(header.game_id, "steam:1086940");
        assert_eq!(header.game_name, "Baldur's Gate 3");
        assert_eq!(header.size_bytes, 22);
        assert_eq!(std::fs::read(&dest_path).unwrap(), b"pipeline payload bytes");
    }

    #[test]
    fn parse_ipv4_accepts_dotted_quad() {
        let addr = parse_ipv4("192.168.1.5").unwrap();
        assert_eq!(addr, std::net::Ipv4Addr::new(192, 168, 1, 5));
    }

    #[test]
    fn parse_ipv4_rejects_out_of_range_octet() {
        assert!(matches!(
            parse_ipv4("192.168.1.999"),
            Err(CacheError::InvalidAddress(_))
        ));
    }

    #[test]
    fn parse_ipv4_rejects_wrong_segment_count() {
        assert!(matches!(
            parse_ipv4("192.168.1"),
            Err(CacheError::InvalidAddress(_))
        ));
    }

    #[test]
    fn receive_file_rejects_missing_magic() {
        let listener = StdTcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let writer = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"NOT_THE_HEADER\n").unwrap();
        });

        let (stream, _) = listener.accept().unwrap();
        let dest_dir = tempdir().unwrap();
        let result = receive_file(stream, &dest_dir.path().join("out.foz"));
        writer.join().unwrap();
        assert!(result.is_err());
    }
}
