//! Post-handshake message framing: `length:u32_be || [type:u8 || payload]`.
//!
//! A length of 0 is a keep-alive with no type byte. Message types this core
//! doesn't act on (`have`, and anything else unrecognized) are read and
//! discarded rather than treated as an error, since they're a normal part of
//! the protocol even though nothing here consumes them.
use super::{PeerError, PeerResult};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const ID_CHOKE: u8 = 0;
const ID_UNCHOKE: u8 = 1;
const ID_INTERESTED: u8 = 2;
const ID_NOT_INTERESTED: u8 = 3;
const ID_HAVE: u8 = 4;
const ID_BITFIELD: u8 = 5;
const ID_REQUEST: u8 = 6;
const ID_PIECE: u8 = 7;
const ID_CANCEL: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    /// One bit per piece, MSB first within each byte.
    Bitfield(Vec<u8>),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, block: Vec<u8> },
    /// A message type the core doesn't act on (`have`, `cancel`, or anything
    /// unrecognized); payload already consumed from the stream.
    Discarded(u8),
}

impl PeerMessage {
    /// Writes this message's wire form to `writer`.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> PeerResult<()> {
        let mut buf = BytesMut::with_capacity(13);
        match self {
            PeerMessage::KeepAlive => buf.put_u32(0),
            PeerMessage::Choke => push_typed(&mut buf, ID_CHOKE, &[]),
            PeerMessage::Unchoke => push_typed(&mut buf, ID_UNCHOKE, &[]),
            PeerMessage::Interested => push_typed(&mut buf, ID_INTERESTED, &[]),
            PeerMessage::NotInterested => push_typed(&mut buf, ID_NOT_INTERESTED, &[]),
            PeerMessage::Bitfield(bits) => push_typed(&mut buf, ID_BITFIELD, bits),
            PeerMessage::Request {
                index,
                begin,
                length,
            } => {
                let mut payload = BytesMut::with_capacity(12);
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_u32(*length);
                push_typed(&mut buf, ID_REQUEST, &payload);
            }
            PeerMessage::Piece {
                index,
                begin,
                block,
            } => {
                let mut payload = BytesMut::with_capacity(8 + block.len());
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_slice(block);
                push_typed(&mut buf, ID_PIECE, &payload);
            }
            PeerMessage::Discarded(_) => {
                return Err(PeerError::Protocol(
                    "cannot re-serialize a discarded message".into(),
                ));
            }
        }
        writer.write_all(&buf).await?;
        Ok(())
    }

    /// Reads one framed message from `reader`, blocking until the full
    /// length-prefixed frame has arrived.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> PeerResult<Self> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf);
        if len == 0 {
            return Ok(PeerMessage::KeepAlive);
        }

        let mut id_buf = [0u8; 1];
        reader.read_exact(&mut id_buf).await?;
        let id = id_buf[0];
        let payload_len = (len - 1) as usize;

        match id {
            ID_CHOKE => skip_payload(reader, payload_len).await.map(|_| PeerMessage::Choke),
            ID_UNCHOKE => skip_payload(reader, payload_len)
                .await
                .map(|_| PeerMessage::Unchoke),
            ID_INTERESTED => skip_payload(reader, payload_len)
                .await
                .map(|_| PeerMessage::Interested),
            ID_NOT_INTERESTED => skip_payload(reader, payload_len)
                .await
                .map(|_| PeerMessage::NotInterested),
            ID_BITFIELD => {
                let mut bits = vec![0u8; payload_len];
                reader.read_exact(&mut bits).await?;
                Ok(PeerMessage::Bitfield(bits))
            }
            ID_REQUEST => {
                let mut payload = [0u8; 12];
                reader.read_exact(&mut payload).await?;
                Ok(PeerMessage::Request {
                    index: u32::from_be_bytes(payload[0..4].try_into().unwrap()),
                    begin: u32::from_be_bytes(payload[4..8].try_into().unwrap()),
                    length: u32::from_be_bytes(payload[8..12].try_into().unwrap()),
                })
            }
            ID_PIECE => {
                let mut header = [0u8; 8];
                reader.read_exact(&mut header).await?;
                let mut block = vec![0u8; payload_len - 8];
                reader.read_exact(&mut block).await?;
                Ok(PeerMessage::Piece {
                    index: u32::from_be_bytes(header[0..4].try_into().unwrap()),
                    begin: u32::from_be_bytes(header[4..8].try_into().unwrap()),
                    block,
                })
            }
            ID_HAVE | ID_CANCEL => {
                skip_payload(reader, payload_len).await?;
                Ok(PeerMessage::Discarded(id))
            }
            other => {
                skip_payload(reader, payload_len).await?;
                Ok(PeerMessage::Discarded(other))
            }
        }
    }
}

fn push_typed(buf: &mut BytesMut, id: u8, payload: &[u8]) {
    let len = 1 + payload.len() as u32;
    buf.put_u32(len);
    buf.put_u8(id);
    buf.put_slice(payload);
}

async fn skip_payload<R: AsyncRead + Unpin>(reader: &mut R, len: usize) -> PeerResult<()> {
    if len == 0 {
        return Ok(());
    }
    let mut discard = vec![0u8; len];
    reader.read_exact(&mut discard).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_interested_message() {
        let (mut a, mut b) = duplex(64);
        PeerMessage::Interested.write_to(&mut a).await.unwrap();
        let msg = PeerMessage::read_from(&mut b).await.unwrap();
        assert_eq!(msg, PeerMessage::Interested);
    }

    #[tokio::test]
    async fn round_trips_keepalive() {
        let (mut a, mut b) = duplex(64);
        PeerMessage::KeepAlive.write_to(&mut a).await.unwrap();
        let msg = PeerMessage::read_from(&mut b).await.unwrap();
        assert_eq!(msg, PeerMessage::KeepAlive);
    }

    #[tokio::test]
    async fn round_trips_bitfield() {
        let (mut a, mut b) = duplex(64);
        let bits = vec![0b1010_0000, 0b0000_0001];
        PeerMessage::Bitfield(bits.clone())
            .write_to(&mut a)
            .await
            .unwrap();
        let msg = PeerMessage::read_from(&mut b).await.unwrap();
        assert_eq!(msg, PeerMessage::Bitfield(bits));
    }

    #[tokio::test]
    async fn round_trips_request() {
        let (mut a, mut b) = duplex(64);
        let req = PeerMessage::Request {
            index: 1,
            begin: 16384,
            length: 16384,
        };
        req.write_to(&mut a).await.unwrap();
        let msg = PeerMessage::read_from(&mut b).await.unwrap();
        assert_eq!(msg, req);
    }

    #[tokio::test]
    async fn round_trips_piece_with_block() {
        let (mut a, mut b) = duplex(1024);
        let piece = PeerMessage::Piece {
            index: 2,
            begin: 0,
            block: vec![0xAB; 100],
        };
        piece.write_to(&mut a).await.unwrap();
        let msg = PeerMessage::read_from(&mut b).await.unwrap();
        assert_eq!(msg, piece);
    }

    #[tokio::test]
    async fn discards_have_message_without_erroring() {
        let (mut a, mut b) = duplex(64);
        // have message: len=5, id=4, piece index payload.
        a.write_all(&5u32.to_be_bytes()).await.unwrap();
        a.write_all(&[4u8]).await.unwrap();
        a.write_all(&7u32.to_be_bytes()).await.unwrap();
        let msg = PeerMessage::read_from(&mut b).await.unwrap();
        assert_eq!(msg, PeerMessage::Discarded(4));
    }
}
