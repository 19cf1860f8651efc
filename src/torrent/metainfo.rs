//! Parses a single-file `.torrent` metainfo dictionary.
//!
//! Besides the plain field extraction, this is where the info-hash is
//! derived: the raw byte span of the `info` dictionary is captured while
//! decoding the root dictionary (see [`Metainfo::from_bytes`]) and hashed
//! directly, rather than re-encoded. Re-encoding is only exercised by tests,
//! to prove the encoder reproduces the exact same bytes.
use super::{TorrentError, TorrentResult};
use crate::bencode::decoder;
use sha1::{Digest, Sha1};
use tracing::instrument;

/// A parsed, validated `.torrent` metainfo.
///
/// Immutable after construction; `info_hash` and `piece_hashes` are derived
/// once in [`Metainfo::from_bytes`] and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metainfo {
    pub announce: String,
    pub name: String,
    pub length: u32,
    pub piece_length: u32,
    pub info_hash: [u8; 20],
    pub piece_hashes: Vec<[u8; 20]>,
}

impl Metainfo {
    /// Parses a `.torrent` file's bytes into a [`Metainfo`].
    ///
    /// Steps: decode the root dictionary, pull out `announce`, locate the
    /// raw byte span of `info` and SHA-1 it for the info-hash, then extract
    /// and validate `name`/`length`/`piece length`/`pieces`.
    #[instrument(skip(data), level = "debug")]
    pub fn from_bytes(data: &[u8]) -> TorrentResult<Metainfo> {
        let root = decoder::decode(data)?;
        let dict = root.as_dict()?;

        let announce = dict
            .get(b"announce".as_slice())
            .ok_or(TorrentError::MissingField("announce"))?
            .as_bytes()?;
        let announce =
            String::from_utf8(announce.to_vec()).map_err(|_| TorrentError::AnnounceNotUtf8)?;

        let info_hash = Self::hash_info_span(data)?;

        let info = dict
            .get(b"info".as_slice())
            .ok_or(TorrentError::MissingField("info"))?;
        let info_dict = info.as_dict()?;

        let name = info_dict
            .get(b"name".as_slice())
            .ok_or(TorrentError::MissingField("name"))?
            .as_bytes()?;
        let name = String::from_utf8(name.to_vec()).map_err(|_| TorrentError::NameNotUtf8)?;

        let length = info_dict
            .get(b"length".as_slice())
            .ok_or(TorrentError::MissingField("length"))?
            .as_int()?;
        let piece_length = info_dict
            .get(b"piece length".as_slice())
            .ok_or(TorrentError::MissingField("piece length"))?
            .as_int()?;
        if length <= 0 {
            return Err(TorrentError::MissingField("length"));
        }
        if piece_length <= 0 {
            return Err(TorrentError::MissingField("piece length"));
        }
        if length > u32::MAX as i64 {
            return Err(TorrentError::FieldOutOfRange {
                field: "length",
                value: length,
            });
        }
        if piece_length > u32::MAX as i64 {
            return Err(TorrentError::FieldOutOfRange {
                field: "piece length",
                value: piece_length,
            });
        }
        let length = length as u32;
        let piece_length = piece_length as u32;

        let pieces = info_dict
            .get(b"pieces".as_slice())
            .ok_or(TorrentError::MissingField("pieces"))?
            .as_bytes()?;
        if pieces.len() % 20 != 0 {
            return Err(TorrentError::InvalidPiecesLength(pieces.len()));
        }
        let piece_hashes: Vec<[u8; 20]> = pieces
            .chunks_exact(20)
            .map(|chunk| chunk.try_into().expect("chunks_exact(20) yields 20 bytes"))
            .collect();

        let expected_pieces =
            (length as u64).div_ceil(piece_length as u64) as usize;
        if piece_hashes.len() != expected_pieces {
            return Err(TorrentError::PieceCountMismatch {
                pieces: piece_hashes.len(),
                expected: expected_pieces,
            });
        }

        Ok(Metainfo {
            announce,
            name,
            length,
            piece_length,
            info_hash,
            piece_hashes,
        })
    }

    /// Locates the `info` dictionary's raw byte span in the source and hashes
    /// it directly, so the info-hash matches byte-for-byte what every peer
    /// computed from the same file - independent of whatever canonical form
    /// our own encoder would produce.
    fn hash_info_span(data: &[u8]) -> TorrentResult<[u8; 20]> {
        let mut cursor = 0usize;
        find_info_span(data, &mut cursor)
    }

    pub fn num_pieces(&self) -> usize {
        self.piece_hashes.len()
    }

    /// Size in bytes of the piece at `index`: `piece_length` for every piece
    /// but the last, whose size is whatever remains of `length`.
    pub fn piece_size(&self, index: usize) -> u32 {
        if index + 1 == self.num_pieces() {
            let full = self.piece_length as u64 * (self.num_pieces() - 1) as u64;
            (self.length as u64 - full) as u32
        } else {
            self.piece_length
        }
    }
}

/// Bencode-decode assistant for [`Metainfo::hash_info_span`]: walks the root
/// dictionary's raw bytes looking for the `info` key, using
/// [`decoder::decode_prefix`] to skip past values without interpreting them,
/// and records the byte range of the `info` value itself.
fn find_info_span(data: &[u8], pos: &mut usize) -> TorrentResult<[u8; 20]> {
    use crate::bencode::BencodeError;

    if data.get(*pos) != Some(&b'd') {
        return Err(TorrentError::RootNotDict);
    }
    *pos += 1;
    loop {
        match data.get(*pos) {
            Some(b'e') => {
                *pos += 1;
                return Err(TorrentError::MissingField("info"));
            }
            Some(_) => {}
            None => return Err(TorrentError::Bencode(BencodeError::UnexpectedEof)),
        }
        let key = {
            let mut key_pos = *pos;
            let key_value = decoder::decode_prefix(data, &mut key_pos)?;
            *pos = key_pos;
            key_value.as_bytes()?.to_vec()
        };
        let value_start = *pos;
        let mut value_end = *pos;
        decoder::decode_prefix(data, &mut value_end)?;
        if key == b"info" {
            let mut hasher = Sha1::new();
            hasher.update(&data[value_start..value_end]);
            let digest = hasher.finalize();
            let mut info_hash = [0u8; 20];
            info_hash.copy_from_slice(&digest);
            return Ok(info_hash);
        }
        *pos = value_end;
    }
}

/// Re-encodes a decoded `info` [`BencodeValue`] and hashes it. Exposed only
/// so tests can assert the encoder's canonical output matches the info-hash
/// derived from the original bytes.
#[cfg(test)]
pub(crate) fn hash_reencoded_info(info: &crate::bencode::BencodeValue) -> [u8; 20] {
    let bytes = crate::bencode::encoder::encode(info);
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::decoder::decode;

    fn sample_bytes(name: &str, length: u32, piece_length: u32, num_pieces: usize) -> Vec<u8> {
        let pieces: Vec<u8> = (0..num_pieces)
            .flat_map(|i| {
                let mut hash = [0u8; 20];
                hash[0] = i as u8;
                hash
            })
            .collect();
        let info = format!(
            "d6:lengthi{}e4:name{}:{}12:piece lengthi{}e6:pieces{}:",
            length,
            name.len(),
            name,
            piece_length,
            pieces.len(),
        );
        let mut out = format!(
            "d8:announce{}:{}4:info",
            "http://tracker.example/announce".len(),
            "http://tracker.example/announce",
        )
        .into_bytes();
        out.extend_from_slice(info.as_bytes());
        out.extend_from_slice(&pieces);
        out.push(b'e'); // close info dict
        out.push(b'e'); // close root dict
        out
    }

    #[test]
    fn parses_sample_torrent() {
        let bytes = sample_bytes("sample.txt", 92063, 32768, 3);
        let m = Metainfo::from_bytes(&bytes).unwrap();
        assert_eq!(m.announce, "http://tracker.example/announce");
        assert_eq!(m.length, 92063);
        assert_eq!(m.piece_length, 32768);
        assert_eq!(m.num_pieces(), 3);
        assert_eq!(m.piece_size(0), 32768);
        assert_eq!(m.piece_size(1), 32768);
        assert_eq!(m.piece_size(2), 92063 - 2 * 32768);
    }

    #[test]
    fn rejects_pieces_length_mismatch() {
        let mut bytes = sample_bytes("sample.txt", 92063, 32768, 3);
        // Corrupt the pieces count by truncating one hash's worth of bytes.
        bytes.truncate(bytes.len() - 21);
        bytes.push(b'e');
        assert!(Metainfo::from_bytes(&bytes).is_err());
    }

    #[test]
    fn info_hash_matches_reencoded_info_dict() {
        let bytes = sample_bytes("sample.txt", 92063, 32768, 3);
        let m = Metainfo::from_bytes(&bytes).unwrap();

        let root = decode(&bytes).unwrap();
        let info = root.get(b"info").unwrap().unwrap();
        assert_eq!(hash_reencoded_info(info), m.info_hash);
    }

    #[test]
    fn single_piece_torrent_has_one_piece_equal_to_length() {
        let bytes = sample_bytes("x", 100, 100, 1);
        let m = Metainfo::from_bytes(&bytes).unwrap();
        assert_eq!(m.num_pieces(), 1);
        assert_eq!(m.piece_size(0), 100);
    }

    #[test]
    fn last_piece_exactly_equal_to_piece_length() {
        let bytes = sample_bytes("x", 200, 100, 2);
        let m = Metainfo::from_bytes(&bytes).unwrap();
        assert_eq!(m.piece_size(1), 100);
    }

    #[test]
    fn rejects_length_above_u32_max() {
        let oversized: i64 = u32::MAX as i64 + 1;
        let info = format!(
            "d6:lengthi{}e4:name1:x12:piece lengthi100e6:pieces20:{}",
            oversized,
            "x".repeat(20),
        );
        let mut out = format!(
            "d8:announce{}:{}4:info",
            "http://tracker.example/announce".len(),
            "http://tracker.example/announce",
        )
        .into_bytes();
        out.extend_from_slice(info.as_bytes());
        out.push(b'e'); // close info dict
        out.push(b'e'); // close root dict

        let err = Metainfo::from_bytes(&out).unwrap_err();
        assert!(matches!(
            err,
            TorrentError::FieldOutOfRange { field: "length", .. }
        ));
    }
}
