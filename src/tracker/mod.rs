//! Tracker client logic for the BitTorrent protocol.
//!
//! This module implements communication with a BitTorrent tracker: building
//! the announce GET request, and parsing the compact peer list out of the
//! bencoded response.
use crate::bencode::decoder;
use crate::torrent::metainfo::Metainfo;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;
use tracing::instrument;

/// Fixed local peer identity used for every announce and handshake. Real
/// clients generate random bytes per process; this core uses a constant so
/// runs are reproducible.
pub const LOCAL_PEER_ID: [u8; 20] = *b"11111111111111111111";

/// Port advertised to trackers. This core never actually listens on it.
pub const LOCAL_PORT: u16 = 6881;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid announce URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("malformed tracker response: {0}")]
    Response(#[from] crate::bencode::BencodeError),

    #[error("tracker response missing or invalid field: {0}")]
    MissingField(&'static str),

    #[error("tracker returned failure reason: {0}")]
    Failure(String),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// A peer address as returned by the tracker's compact peer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// The parsed response to an announce request.
#[derive(Debug)]
pub struct AnnounceResponse {
    pub interval: i64,
    pub peers: Vec<Peer>,
}

/// Issues the tracker announce GET request and returns the discovered peers.
#[instrument(skip(torrent), level = "debug")]
pub async fn announce(torrent: &Metainfo) -> TrackerResult<AnnounceResponse> {
    let mut url = url::Url::parse(&torrent.announce)?;
    // `info_hash`/`peer_id` are raw 20-byte strings, not UTF-8 text, so they
    // must be percent-encoded byte-by-byte ourselves; `Url::query_pairs_mut`
    // only knows how to form-encode `&str`s and would mangle them.
    let query = format!(
        "info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1",
        url_encode(&torrent.info_hash),
        url_encode(&LOCAL_PEER_ID),
        LOCAL_PORT,
        torrent.length,
    );
    url.set_query(Some(&query));
    tracing::debug!(%url, "sending tracker announce request");

    let body = reqwest::get(url).await?.bytes().await?;
    parse_announce_response(&body)
}

/// Parses a bencoded tracker announce response.
///
/// `peers` may be a compact byte string (multiples of 6 bytes: 4-byte IPv4 +
/// 2-byte big-endian port) or absent, which yields an empty peer list.
fn parse_announce_response(bytes: &[u8]) -> TrackerResult<AnnounceResponse> {
    let root = decoder::decode(bytes)?;
    let dict = root.as_dict()?;

    if let Some(reason) = dict.get(b"failure reason".as_slice()) {
        let reason = String::from_utf8_lossy(reason.as_bytes()?).into_owned();
        return Err(TrackerError::Failure(reason));
    }

    let interval = dict
        .get(b"interval".as_slice())
        .map(|v| v.as_int())
        .transpose()?
        .unwrap_or(0);

    let peers = match dict.get(b"peers".as_slice()) {
        Some(value) => {
            let raw = value.as_bytes()?;
            if raw.len() % 6 != 0 {
                return Err(TrackerError::MissingField("peers"));
            }
            raw.chunks_exact(6)
                .map(|chunk| {
                    let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
                    let port = u16::from_be_bytes([chunk[4], chunk[5]]);
                    Peer {
                        addr: SocketAddr::new(IpAddr::V4(ip), port),
                    }
                })
                .collect()
        }
        None => Vec::new(),
    };

    Ok(AnnounceResponse { interval, peers })
}

/// Percent-encodes a byte slice per RFC 3986: unreserved characters
/// (`a-z A-Z 0-9 - . _ ~`) are left as-is, everything else becomes `%XX`.
fn url_encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for &byte in bytes {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_encodes_unreserved_chars_verbatim() {
        assert_eq!(url_encode(b"abc-._~XYZ"), "abc-._~XYZ");
    }

    #[test]
    fn url_encodes_raw_bytes_as_percent_hex() {
        assert_eq!(url_encode(&[0x12, 0xab, 0x00]), "%12%AB%00");
    }

    #[test]
    fn parses_compact_peer_list() {
        let mut response = b"d8:intervali900e5:peers".to_vec();
        let peers: Vec<u8> = vec![127, 0, 0, 1, 0x1a, 0xe1, 10, 0, 0, 2, 0x1a, 0xe2];
        response.extend_from_slice(format!("{}:", peers.len()).as_bytes());
        response.extend_from_slice(&peers);
        response.push(b'e');

        let parsed = parse_announce_response(&response).unwrap();
        assert_eq!(parsed.interval, 900);
        assert_eq!(parsed.peers.len(), 2);
        assert_eq!(parsed.peers[0].addr.to_string(), "127.0.0.1:6881");
        assert_eq!(parsed.peers[1].addr.to_string(), "10.0.0.2:6882");
    }

    #[test]
    fn missing_peers_key_yields_empty_list() {
        let response = b"d8:intervali900ee";
        let parsed = parse_announce_response(response).unwrap();
        assert!(parsed.peers.is_empty());
    }

    #[test]
    fn surfaces_failure_reason() {
        let response = b"d14:failure reason13:not a torrente";
        let err = parse_announce_response(response).unwrap_err();
        assert!(matches!(err, TrackerError::Failure(reason) if reason == "not a torrent"));
    }
}
