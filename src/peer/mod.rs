//! Peer wire protocol: handshake, message framing, sessions, and the
//! single-piece download state machine.
use thiserror::Error;

pub mod handshake;
pub mod message;
pub mod piece;
pub mod session;

/// Length of the BitTorrent protocol identifier string.
pub const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";

/// Size of one requested block, per the de facto protocol convention: 16 KiB.
pub const BLOCK_SIZE: u32 = 16 * 1024;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer rejected handshake: {0}")]
    Rejected(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("piece hash mismatch at index {0}")]
    HashMismatch(usize),

    #[error("timed out waiting for peer")]
    Timeout,
}

pub type PeerResult<T> = std::result::Result<T, PeerError>;
