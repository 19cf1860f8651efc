//! Bencode encoder.
//!
//! Dictionaries are emitted with keys in lexicographic byte order, byte
//! strings verbatim with no escaping, and integers in shortest-decimal form.
//! This is not a style choice: the info-hash is the SHA-1 of this encoder's
//! output over the parsed `info` dictionary, and every peer and tracker
//! expects that exact canonical form.
use super::BencodeValue;
use tracing::instrument;

/// Encodes `value` to its canonical Bencode byte representation.
#[instrument(skip(value), level = "debug")]
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &BencodeValue, out: &mut Vec<u8>) {
    match value {
        BencodeValue::ByteString(s) => encode_string(s, out),
        BencodeValue::Integer(i) => encode_integer(*i, out),
        BencodeValue::List(list) => encode_list(list, out),
        BencodeValue::Dict(dict) => encode_dict(dict, out),
    }
}

fn encode_string(s: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(s.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(s);
}

fn encode_integer(i: i64, out: &mut Vec<u8>) {
    out.push(b'i');
    out.extend_from_slice(i.to_string().as_bytes());
    out.push(b'e');
}

fn encode_list(list: &[BencodeValue], out: &mut Vec<u8>) {
    out.push(b'l');
    for item in list {
        encode_into(item, out);
    }
    out.push(b'e');
}

/// `BTreeMap<Vec<u8>, _>` already iterates in lexicographic key order, so
/// canonical ordering falls out of the type rather than a sort at encode
/// time.
fn encode_dict(dict: &std::collections::BTreeMap<Vec<u8>, BencodeValue>, out: &mut Vec<u8>) {
    out.push(b'd');
    for (key, value) in dict {
        encode_string(key, out);
        encode_into(value, out);
    }
    out.push(b'e');
}
