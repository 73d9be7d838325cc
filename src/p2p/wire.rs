//! Wire format: the 8-byte `"NVCACHE"` + type-byte prefix and the JSON
//! message bodies that follow it, plus the TCP transfer header.

use serde::{Deserialize, Serialize};

pub const PREFIX: &[u8; 7] = b"NVCACHE";
pub const TRANSFER_HEADER_MAGIC: &str = "NVCACHE_TRANSFER\n";

pub const MSG_ANNOUNCE: u8 = 0x01;
pub const MSG_QUERY: u8 = 0x02;
pub const MSG_OFFER: u8 = 0x03;
#[allow(dead_code)] // reserved, not emitted by this implementation (spec Open Questions)
pub const MSG_REQUEST: u8 = 0x04;
#[allow(dead_code)]
pub const MSG_ACK: u8 = 0x05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub hostname: String,
    pub port: u16,
    pub arch: String,
    pub driver: String,
    pub caches: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub game_id: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub game_id: String,
    pub game_name: String,
    pub size: u64,
    pub port: u16,
}

/// Decoded inbound datagram: the type byte plus the still-raw JSON
/// payload bytes, so the caller can dispatch before committing to a
/// concrete message struct.
pub struct RawMessage<'a> {
    pub msg_type: u8,
    pub payload: &'a [u8],
}

/// Split a datagram into its type byte and JSON payload. Returns
/// `None` if the datagram is shorter than the 8-byte prefix or the
/// first 7 bytes don't match `"NVCACHE"` — callers silently discard
/// such datagrams per spec §4.6.
pub fn decode_prefix(datagram: &[u8]) -> Option<RawMessage<'_>> {
    if datagram.len() < 8 {
        return None;
    }
    if &datagram[0..7] != PREFIX {
        return None;
    }
    Some(RawMessage {
        msg_type: datagram[7],
        payload: &datagram[8..],
    })
}

pub fn encode_announce(msg: &AnnounceMessage) -> Vec<Vec<u8>> {
    encode(MSG_ANNOUNCE, msg)
}

pub fn encode_query(msg: &QueryMessage) -> Vec<Vec<u8>> {
    encode(MSG_QUERY, msg)
}

pub fn encode_offer(msg: &OfferMessage) -> Vec<Vec<u8>> {
    encode(MSG_OFFER, msg)
}

fn encode<T: Serialize>(msg_type: u8, msg: &T) -> Vec<Vec<u8>> {
    // Returns a `Vec<u8>` wrapped in a one-element `Vec` to keep the
    // call sites uniform with a potential future multi-datagram split;
    // today every message fits in one datagram.
    let mut datagram = Vec::with_capacity(8 + 128);
    datagram.extend_from_slice(PREFIX);
    datagram.push(msg_type);
    datagram.extend_from_slice(&serde_json::to_vec(msg).expect("message always serializes"));
    vec![datagram]
}

pub fn transfer_header(game_id: &str, game_name: &str, size_bytes: u64) -> String {
    format!("{TRANSFER_HEADER_MAGIC}{game_id}\n{game_name}\n{size_bytes}\n")
}
