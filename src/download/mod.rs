//! File download orchestrator: drives the piece engine across every piece of
//! a torrent and writes the reassembled file to disk.
//!
//! This core opens a fresh peer connection per piece and is not
//! fault-tolerant across peers: a failed piece (bad handshake, protocol
//! error, hash mismatch) aborts the whole download rather than retrying
//! against another peer.
use crate::peer::session::PeerSession;
use crate::peer::{piece, PeerError};
use crate::torrent::metainfo::Metainfo;
use crate::tracker::{self, Peer};
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Tracker(#[from] tracker::TrackerError),

    #[error("no peers available from tracker")]
    NoPeers,

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("output file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Downloads every piece of `torrent` in order and writes the reassembled
/// file to `output_path`.
#[instrument(skip(torrent), fields(name = %torrent.name))]
pub async fn download_file(torrent: &Metainfo, output_path: &Path) -> DownloadResult<()> {
    let peers = discover_peers(torrent).await?;
    let mut file = File::create(output_path).await?;

    for piece_index in 0..torrent.num_pieces() {
        let piece_size = torrent.piece_size(piece_index);
        let expected_hash = torrent.piece_hashes[piece_index];
        let data = download_one_piece(torrent, &peers, piece_index, piece_size, expected_hash)
            .await?;

        let offset = piece_index as u64 * torrent.piece_length as u64;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.write_all(&data).await?;
        info!(piece_index, "piece written");
    }

    Ok(())
}

/// Downloads a single piece of `torrent` and writes just that piece's bytes
/// to `output_path` (used by the `download_piece` CLI command).
#[instrument(skip(torrent), fields(name = %torrent.name))]
pub async fn download_piece_to_file(
    torrent: &Metainfo,
    piece_index: usize,
    output_path: &Path,
) -> DownloadResult<()> {
    let peers = discover_peers(torrent).await?;
    let piece_size = torrent.piece_size(piece_index);
    let expected_hash = torrent.piece_hashes[piece_index];
    let data = download_one_piece(torrent, &peers, piece_index, piece_size, expected_hash).await?;

    let mut file = File::create(output_path).await?;
    file.write_all(&data).await?;
    Ok(())
}

async fn discover_peers(torrent: &Metainfo) -> DownloadResult<Vec<Peer>> {
    let response = tracker::announce(torrent).await?;
    if response.peers.is_empty() {
        return Err(DownloadError::NoPeers);
    }
    Ok(response.peers)
}

/// Opens a fresh connection to the first available peer and runs the piece
/// engine against it. Per-piece, not shared with other pieces.
async fn download_one_piece(
    torrent: &Metainfo,
    peers: &[Peer],
    piece_index: usize,
    piece_size: u32,
    expected_hash: [u8; 20],
) -> DownloadResult<Vec<u8>> {
    let peer = peers.first().ok_or(DownloadError::NoPeers)?;
    let mut session =
        PeerSession::connect(peer.addr, torrent.info_hash, crate::tracker::LOCAL_PEER_ID).await?;
    let data = piece::download_piece(&mut session, piece_index, piece_size, expected_hash).await?;
    Ok(data)
}
