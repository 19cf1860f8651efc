//! The fixed 68-byte handshake exchanged immediately after TCP connect.
//!
//! The frame is a byte-level layout, not a little/big-endian encoded struct:
//! the 20-byte info-hash and peer-id arrays are copied verbatim, with no
//! endian conversion applied.
use super::{PeerError, PeerResult, PROTOCOL};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::instrument;

/// A parsed handshake frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    /// Serializes this handshake into its 68-byte wire form:
    /// `len(1) || protocol(19) || reserved(8) || info_hash(20) || peer_id(20)`.
    pub fn serialize(&self) -> [u8; 68] {
        let mut buf = [0u8; 68];
        buf[0] = 19;
        buf[1..20].copy_from_slice(PROTOCOL);
        // buf[20..28] reserved, already zeroed.
        buf[28..48].copy_from_slice(&self.info_hash);
        buf[48..68].copy_from_slice(&self.peer_id);
        buf
    }

    /// Reads and validates a 68-byte handshake frame from `stream`.
    ///
    /// Does not check the info-hash against anything; callers compare the
    /// returned `info_hash` to their own and reject the peer themselves (see
    /// [`do_handshake`]).
    #[instrument(level = "trace", skip(stream))]
    pub async fn read(stream: &mut TcpStream) -> PeerResult<Self> {
        let mut buf = [0u8; 68];
        stream.read_exact(&mut buf).await?;

        let protocol_len = buf[0];
        if protocol_len != 19 {
            return Err(PeerError::Rejected(format!(
                "protocol length {protocol_len}, expected 19"
            )));
        }
        if &buf[1..20] != PROTOCOL.as_slice() {
            return Err(PeerError::Rejected("unexpected protocol string".into()));
        }

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&buf[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&buf[48..68]);

        Ok(Self { info_hash, peer_id })
    }
}

/// Connects to `peer_addr`, performs the handshake, and returns the open
/// stream together with the peer's handshake. The connection is left ready
/// for framed messages; the caller owns the stream from here on.
#[instrument(level = "debug", skip(info_hash, local_peer_id))]
pub async fn do_handshake(
    peer_addr: std::net::SocketAddr,
    info_hash: [u8; 20],
    local_peer_id: [u8; 20],
) -> PeerResult<(TcpStream, Handshake)> {
    let mut stream = TcpStream::connect(peer_addr).await?;

    let outgoing = Handshake::new(info_hash, local_peer_id);
    stream.write_all(&outgoing.serialize()).await?;

    let incoming = Handshake::read(&mut stream).await?;
    if incoming.info_hash != info_hash {
        return Err(PeerError::Rejected("info_hash mismatch".into()));
    }

    Ok((stream, incoming))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_68_bytes_with_fixed_layout() {
        let hs = Handshake::new([1u8; 20], [2u8; 20]);
        let buf = hs.serialize();
        assert_eq!(buf.len(), 68);
        assert_eq!(buf[0], 19);
        assert_eq!(&buf[1..20], PROTOCOL.as_slice());
        assert_eq!(&buf[20..28], &[0u8; 8]);
        assert_eq!(&buf[28..48], &[1u8; 20]);
        assert_eq!(&buf[48..68], &[2u8; 20]);
    }

    #[tokio::test]
    async fn round_trips_handshake_over_a_socket_pair() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let info_hash = [7u8; 20];
        let server_peer_id = [9u8; 20];

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 68];
            socket.read_exact(&mut buf).await.unwrap();
            let reply = Handshake::new(info_hash, server_peer_id);
            socket.write_all(&reply.serialize()).await.unwrap();
        });

        let (_, their_handshake) = do_handshake(addr, info_hash, [1u8; 20]).await.unwrap();
        assert_eq!(their_handshake.info_hash, info_hash);
        assert_eq!(their_handshake.peer_id, server_peer_id);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejects_info_hash_mismatch() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 68];
            socket.read_exact(&mut buf).await.unwrap();
            let reply = Handshake::new([0xffu8; 20], [9u8; 20]);
            socket.write_all(&reply.serialize()).await.unwrap();
        });

        let result = do_handshake(addr, [1u8; 20], [2u8; 20]).await;
        assert!(matches!(result, Err(PeerError::Rejected(_))));
        server.await.unwrap();
    }
}
