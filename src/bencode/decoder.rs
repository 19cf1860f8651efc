//! Bencode decoder.
//!
//! The decoder walks a byte slice with an explicit cursor rather than an
//! `io::Read` stream: the metainfo loader needs the exact byte range spanned
//! by the `info` dictionary to compute the info-hash, and a cursor makes that
//! a matter of recording positions before and after a call to
//! [`decode_prefix`], with no intermediate buffering.
use super::{BencodeError, BencodeResult, BencodeValue};
use std::collections::BTreeMap;
use tracing::instrument;

/// Decodes exactly one top-level value from `input`.
///
/// Fails with [`BencodeError::TrailingData`] if bytes remain after the value.
#[instrument(skip(input), level = "trace")]
pub fn decode(input: &[u8]) -> BencodeResult<BencodeValue> {
    let mut pos = 0;
    let value = decode_value(input, &mut pos)?;
    if pos != input.len() {
        return Err(BencodeError::TrailingData);
    }
    Ok(value)
}

/// Decodes one value starting at `*pos`, advancing `*pos` past exactly that
/// value and leaving any trailing bytes in `input` untouched.
///
/// Used by the metainfo loader to find the raw byte span of the `info`
/// dictionary: call with `pos` pointing at `d`, then the span is
/// `input[start..*pos]` after the call returns.
pub fn decode_prefix(input: &[u8], pos: &mut usize) -> BencodeResult<BencodeValue> {
    decode_value(input, pos)
}

fn peek(input: &[u8], pos: usize) -> BencodeResult<u8> {
    input.get(pos).copied().ok_or(BencodeError::UnexpectedEof)
}

#[instrument(skip(input), level = "trace")]
fn decode_value(input: &[u8], pos: &mut usize) -> BencodeResult<BencodeValue> {
    match peek(input, *pos)? {
        b'0'..=b'9' => decode_string(input, pos).map(BencodeValue::ByteString),
        b'i' => decode_integer(input, pos).map(BencodeValue::Integer),
        b'l' => decode_list(input, pos).map(BencodeValue::List),
        b'd' => decode_dict(input, pos).map(BencodeValue::Dict),
        other => Err(BencodeError::UnexpectedByte(other, *pos)),
    }
}

/// Decodes a byte string `<decimal-length>:<bytes>`.
#[instrument(skip(input), level = "trace")]
fn decode_string(input: &[u8], pos: &mut usize) -> BencodeResult<Vec<u8>> {
    let digits_start = *pos;
    while peek(input, *pos)?.is_ascii_digit() {
        *pos += 1;
    }
    if *pos == digits_start {
        return Err(BencodeError::InvalidStringLength);
    }
    if peek(input, *pos)? != b':' {
        return Err(BencodeError::InvalidStringLength);
    }
    let len_str = std::str::from_utf8(&input[digits_start..*pos])
        .map_err(|_| BencodeError::InvalidStringLength)?;
    let len: usize = len_str
        .parse()
        .map_err(|_| BencodeError::InvalidStringLength)?;
    *pos += 1; // consume ':'

    let start = *pos;
    let end = start
        .checked_add(len)
        .ok_or(BencodeError::InvalidStringLength)?;
    if end > input.len() {
        return Err(BencodeError::UnexpectedEof);
    }
    *pos = end;
    Ok(input[start..end].to_vec())
}

/// Decodes an integer `i<decimal>e`.
///
/// Rejects leading zeros (except the literal `i0e`) and `i-0e`, per the
/// Bencode grammar - both are malformed even though `str::parse` would
/// happily accept them.
#[instrument(skip(input), level = "trace")]
fn decode_integer(input: &[u8], pos: &mut usize) -> BencodeResult<i64> {
    if peek(input, *pos)? != b'i' {
        return Err(BencodeError::InvalidInteger);
    }
    *pos += 1;
    let start = *pos;
    while peek(input, *pos)? != b'e' {
        *pos += 1;
    }
    let digits = &input[start..*pos];
    *pos += 1; // consume 'e'

    let s = std::str::from_utf8(digits).map_err(|_| BencodeError::InvalidInteger)?;
    if s.is_empty() {
        return Err(BencodeError::InvalidInteger);
    }
    let (negative, magnitude) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BencodeError::InvalidInteger);
    }
    if magnitude.len() > 1 && magnitude.starts_with('0') {
        return Err(BencodeError::InvalidInteger); // leading zero
    }
    if negative && magnitude == "0" {
        return Err(BencodeError::InvalidInteger); // "-0"
    }
    s.parse::<i64>().map_err(|_| BencodeError::InvalidInteger)
}

/// Decodes a list `l<values>e`.
#[instrument(skip(input), level = "trace")]
fn decode_list(input: &[u8], pos: &mut usize) -> BencodeResult<Vec<BencodeValue>> {
    *pos += 1; // consume 'l'
    let mut items = Vec::new();
    loop {
        if peek(input, *pos)? == b'e' {
            *pos += 1;
            return Ok(items);
        }
        items.push(decode_value(input, pos)?);
    }
}

/// Decodes a dictionary `d<key><value>...e`.
///
/// Keys need not be sorted in the input - the decoder accepts any order;
/// canonical ordering is only enforced on re-encode.
#[instrument(skip(input), level = "trace")]
fn decode_dict(input: &[u8], pos: &mut usize) -> BencodeResult<BTreeMap<Vec<u8>, BencodeValue>> {
    *pos += 1; // consume 'd'
    let mut dict = BTreeMap::new();
    loop {
        if peek(input, *pos)? == b'e' {
            *pos += 1;
            return Ok(dict);
        }
        let key = decode_string(input, pos)?;
        let value = decode_value(input, pos)?;
        dict.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(bytes: &[u8]) -> BencodeValue {
        BencodeValue::ByteString(bytes.to_vec())
    }

    #[test]
    fn decodes_strings() {
        assert_eq!(decode(b"4:spam").unwrap(), s(b"spam"));
        assert_eq!(decode(b"0:").unwrap(), s(b""));
        assert_eq!(decode(b"5:hello").unwrap(), s(b"hello"));
    }

    #[test]
    fn decodes_integers() {
        assert_eq!(decode(b"i42e").unwrap(), BencodeValue::Integer(42));
        assert_eq!(decode(b"i-42e").unwrap(), BencodeValue::Integer(-42));
        assert_eq!(decode(b"i0e").unwrap(), BencodeValue::Integer(0));
        assert_eq!(decode(b"i-1e").unwrap(), BencodeValue::Integer(-1));
    }

    #[test]
    fn rejects_malformed_integers() {
        assert!(decode(b"i01e").is_err());
        assert!(decode(b"i-0e").is_err());
        assert!(decode(b"ie").is_err());
    }

    #[test]
    fn decodes_empty_list_and_dict() {
        assert_eq!(decode(b"le").unwrap(), BencodeValue::List(vec![]));
        assert_eq!(decode(b"de").unwrap(), BencodeValue::Dict(BTreeMap::new()));
    }

    #[test]
    fn decodes_nested_list() {
        assert_eq!(
            decode(b"l5:helloi52ee").unwrap(),
            BencodeValue::List(vec![s(b"hello"), BencodeValue::Integer(52)])
        );
    }

    #[test]
    fn decodes_dict_any_key_order() {
        let value = decode(b"d3:foo3:bar5:helloi52ee").unwrap();
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.get(&b"foo".to_vec()), Some(&s(b"bar")));
        assert_eq!(
            dict.get(&b"hello".to_vec()),
            Some(&BencodeValue::Integer(52))
        );
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(decode(b"i1ei2e").is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(decode(b"5:hel").is_err());
        assert!(decode(b"i42").is_err());
        assert!(decode(b"l1:ae").is_ok());
        assert!(decode(b"l1:a").is_err());
    }

    #[test]
    fn preserves_binary_strings() {
        let binary = vec![0u8, 1, 2, 255, 254, b':', b'e'];
        let mut encoded = format!("{}:", binary.len()).into_bytes();
        encoded.extend_from_slice(&binary);
        assert_eq!(decode(&encoded).unwrap(), BencodeValue::ByteString(binary));
    }
}
