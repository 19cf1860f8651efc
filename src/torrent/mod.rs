//! Torrent metainfo parsing and error handling.
//!
//! A `.torrent` file is a bencoded dictionary; this module turns it into a
//! [`metainfo::Metainfo`] with the info-hash and per-piece SHA-1 digests
//! already derived.
use thiserror::Error;

pub mod metainfo;

#[derive(Debug, Error)]
pub enum TorrentError {
    #[error(transparent)]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("root value is not a dictionary")]
    RootNotDict,

    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),

    #[error("field {field} value {value} is out of range for a 32-bit unsigned size")]
    FieldOutOfRange { field: &'static str, value: i64 },

    #[error("'pieces' length {0} is not a multiple of 20")]
    InvalidPiecesLength(usize),

    #[error("piece count {pieces} does not match ceil(length / piece_length) = {expected}")]
    PieceCountMismatch { pieces: usize, expected: usize },

    #[error("announce URL is not valid UTF-8")]
    AnnounceNotUtf8,

    #[error("name is not valid UTF-8")]
    NameNotUtf8,
}

pub type TorrentResult<T> = std::result::Result<T, TorrentError>;
