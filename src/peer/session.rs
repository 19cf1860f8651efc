//! A single peer connection and its negotiated state.
//!
//! One logical owner drives a session: it's created on connect and consumed
//! by the piece download engine, which reads and writes directly against the
//! wrapped stream rather than sharing it across tasks.
use super::handshake::{self, Handshake};
use super::message::PeerMessage;
use super::PeerResult;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::instrument;

/// An open, handshaken connection to one peer.
pub struct PeerSession {
    pub addr: SocketAddr,
    pub remote_peer_id: [u8; 20],
    pub choked: bool,
    pub interested: bool,
    pub bitfield: Option<Vec<u8>>,
    stream: TcpStream,
}

impl PeerSession {
    /// Connects to `addr` and performs the handshake.
    #[instrument(level = "debug", skip(info_hash, local_peer_id))]
    pub async fn connect(
        addr: SocketAddr,
        info_hash: [u8; 20],
        local_peer_id: [u8; 20],
    ) -> PeerResult<Self> {
        let (stream, Handshake { peer_id, .. }) =
            handshake::do_handshake(addr, info_hash, local_peer_id).await?;
        Ok(Self {
            addr,
            remote_peer_id: peer_id,
            choked: true,
            interested: false,
            bitfield: None,
            stream,
        })
    }

    pub async fn send(&mut self, message: &PeerMessage) -> PeerResult<()> {
        message.write_to(&mut self.stream).await
    }

    pub async fn recv(&mut self) -> PeerResult<PeerMessage> {
        let message = PeerMessage::read_from(&mut self.stream).await?;
        match &message {
            PeerMessage::Choke => self.choked = true,
            PeerMessage::Unchoke => self.choked = false,
            PeerMessage::Bitfield(bits) => self.bitfield = Some(bits.clone()),
            _ => {}
        }
        Ok(message)
    }
}
