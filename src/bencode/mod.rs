//! Bencode value model and shared error type.
//!
//! Bencode is BitTorrent's self-delimiting encoding over four value kinds:
//! byte strings, integers, lists, and dictionaries. This module defines the
//! tagged [`BencodeValue`] variant the decoder/encoder operate on, plus the
//! typed extraction helpers ([`BencodeValue::as_bytes`] and friends) that the
//! rest of the crate uses instead of matching on the enum at every call site.
use std::collections::BTreeMap;
use thiserror::Error;

pub mod decoder;
pub mod encoder;

/// A decoded Bencode value.
///
/// Byte strings are kept as raw `Vec<u8>`, never `String`: the `pieces` field
/// of a torrent is a concatenation of binary SHA-1 digests and must round-trip
/// losslessly.
///
/// Dictionaries use a `BTreeMap` keyed by raw bytes so iteration order is
/// always the canonical lexicographic order the encoder must emit - there is
/// no separate sort step at encode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    ByteString(Vec<u8>),
    Integer(i64),
    List(Vec<BencodeValue>),
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    pub fn as_bytes(&self) -> BencodeResult<&[u8]> {
        match self {
            BencodeValue::ByteString(s) => Ok(s),
            _ => Err(BencodeError::TypeMismatch { expected: "string" }),
        }
    }

    pub fn as_int(&self) -> BencodeResult<i64> {
        match self {
            BencodeValue::Integer(i) => Ok(*i),
            _ => Err(BencodeError::TypeMismatch {
                expected: "integer",
            }),
        }
    }

    pub fn as_list(&self) -> BencodeResult<&[BencodeValue]> {
        match self {
            BencodeValue::List(l) => Ok(l),
            _ => Err(BencodeError::TypeMismatch { expected: "list" }),
        }
    }

    pub fn as_dict(&self) -> BencodeResult<&BTreeMap<Vec<u8>, BencodeValue>> {
        match self {
            BencodeValue::Dict(d) => Ok(d),
            _ => Err(BencodeError::TypeMismatch { expected: "dict" }),
        }
    }

    /// Looks up `key` in a dict value, failing if this value isn't a dict.
    pub fn get(&self, key: &[u8]) -> BencodeResult<Option<&BencodeValue>> {
        Ok(self.as_dict()?.get(key))
    }
}

/// Errors produced while decoding or encoding Bencode.
///
/// Every variant here is a facet of the `BencodeSyntax` error kind at the CLI
/// boundary; they're kept distinct internally so tests can assert on the
/// specific malformation.
#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid string length")]
    InvalidStringLength,

    #[error("invalid integer")]
    InvalidInteger,

    #[error("unexpected byte {0:#04x} at offset {1}")]
    UnexpectedByte(u8, usize),

    #[error("trailing bytes after top-level value")]
    TrailingData,

    #[error("expected a {expected}")]
    TypeMismatch { expected: &'static str },
}

pub type BencodeResult<T> = std::result::Result<T, BencodeError>;
