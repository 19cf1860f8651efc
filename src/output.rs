//! Renders a decoded [`BencodeValue`] as JSON for the `decode` command.
//!
//! Byte strings are rendered as lossy UTF-8 text, never hex - the `decode`
//! command is for human inspection of arbitrary bencoded input, not for
//! round-tripping binary torrent fields.
use crate::bencode::BencodeValue;
use serde_json::Value;

pub fn to_json(value: &BencodeValue) -> Value {
    match value {
        BencodeValue::ByteString(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        BencodeValue::Integer(i) => Value::Number((*i).into()),
        BencodeValue::List(list) => Value::Array(list.iter().map(to_json).collect()),
        BencodeValue::Dict(dict) => Value::Object(
            dict.iter()
                .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::decoder::decode;

    #[test]
    fn renders_string_as_lossy_utf8() {
        let value = decode(b"4:spam").unwrap();
        assert_eq!(to_json(&value), Value::String("spam".into()));
    }

    #[test]
    fn renders_integer() {
        let value = decode(b"i42e").unwrap();
        assert_eq!(to_json(&value), Value::from(42));
    }

    #[test]
    fn renders_nested_list_and_dict() {
        let value = decode(b"d3:fool4:spami42eee").unwrap();
        let json = to_json(&value);
        assert_eq!(json["foo"][0], Value::String("spam".into()));
        assert_eq!(json["foo"][1], Value::from(42));
    }
}
