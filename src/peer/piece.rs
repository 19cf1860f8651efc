//! Single-piece download state machine, driven against an established
//! [`PeerSession`].
//!
//! The states are explicit rather than folded into a loop of ad hoc
//! conditionals, so the transitions described in the protocol - bitfield,
//! interested, unchoke, pipelined requests, offset-addressed reassembly,
//! verify - each have exactly one place they happen.
use super::message::PeerMessage;
use super::session::PeerSession;
use super::{PeerError, PeerResult, BLOCK_SIZE};
use sha1::{Digest, Sha1};
use tracing::{debug, instrument};

enum State {
    AwaitBitfield,
    SendInterested,
    AwaitUnchoke,
    RequestingBlocks,
    AwaitBlocks { pending: usize },
    Verifying,
}

/// Downloads and verifies one piece over `session`.
///
/// `piece_index`/`piece_size`/`expected_hash` come from the torrent's
/// metainfo; the caller is responsible for picking which piece this session
/// is asked to fetch.
#[instrument(level = "debug", skip(session, expected_hash))]
pub async fn download_piece(
    session: &mut PeerSession,
    piece_index: usize,
    piece_size: u32,
    expected_hash: [u8; 20],
) -> PeerResult<Vec<u8>> {
    let mut buffer = vec![0u8; piece_size as usize];
    let blocks = plan_blocks(piece_size);
    let mut state = State::AwaitBitfield;

    loop {
        state = match state {
            State::AwaitBitfield => {
                match session.recv().await? {
                    PeerMessage::Bitfield(_) => {}
                    other => {
                        return Err(PeerError::Protocol(format!(
                            "expected bitfield, got {other:?}"
                        )))
                    }
                }
                State::SendInterested
            }
            State::SendInterested => {
                session.send(&PeerMessage::Interested).await?;
                session.interested = true;
                State::AwaitUnchoke
            }
            State::AwaitUnchoke => loop {
                match session.recv().await? {
                    PeerMessage::Unchoke => break State::RequestingBlocks,
                    PeerMessage::Choke | PeerMessage::Discarded(_) => continue,
                    other => {
                        return Err(PeerError::Protocol(format!(
                            "expected unchoke, got {other:?}"
                        )))
                    }
                }
            },
            State::RequestingBlocks => {
                for &(begin, length) in &blocks {
                    session
                        .send(&PeerMessage::Request {
                            index: piece_index as u32,
                            begin,
                            length,
                        })
                        .await?;
                }
                State::AwaitBlocks {
                    pending: blocks.len(),
                }
            }
            State::AwaitBlocks { pending } => match session.recv().await? {
                PeerMessage::Piece {
                    index,
                    begin,
                    block,
                } => {
                    if index as usize != piece_index {
                        return Err(PeerError::Protocol(format!(
                            "piece index mismatch: got {index}, want {piece_index}"
                        )));
                    }
                    if begin % BLOCK_SIZE != 0 {
                        return Err(PeerError::Protocol(format!(
                            "block begin {begin} not aligned to {BLOCK_SIZE}"
                        )));
                    }
                    let end = begin as usize + block.len();
                    if end > piece_size as usize {
                        return Err(PeerError::Protocol(format!(
                            "block end {end} exceeds piece size {piece_size}"
                        )));
                    }
                    buffer[begin as usize..end].copy_from_slice(&block);
                    let remaining = pending - 1;
                    if remaining == 0 {
                        State::Verifying
                    } else {
                        State::AwaitBlocks {
                            pending: remaining,
                        }
                    }
                }
                PeerMessage::Choke | PeerMessage::Discarded(_) => State::AwaitBlocks { pending },
                other => {
                    return Err(PeerError::Protocol(format!(
                        "unexpected message while awaiting blocks: {other:?}"
                    )))
                }
            },
            State::Verifying => {
                let mut hasher = Sha1::new();
                hasher.update(&buffer);
                let digest = hasher.finalize();
                if digest.as_slice() == expected_hash {
                    debug!(piece_index, "piece verified");
                    return Ok(buffer);
                }
                return Err(PeerError::HashMismatch(piece_index));
            }
        };
    }
}

/// Splits a piece of `piece_size` bytes into `(begin, length)` block
/// requests of [`BLOCK_SIZE`], with the final block sized to whatever
/// remains.
fn plan_blocks(piece_size: u32) -> Vec<(u32, u32)> {
    let mut blocks = Vec::new();
    let mut begin = 0u32;
    while begin < piece_size {
        let remaining = piece_size - begin;
        let length = remaining.min(BLOCK_SIZE);
        blocks.push((begin, length));
        begin += length;
    }
    blocks
}
