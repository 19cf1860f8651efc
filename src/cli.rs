//! Command-line surface: six subcommands, all positional except the output
//! path flag on `download_piece`/`download`.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "A minimal BitTorrent v1 client")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a bencoded value and print it as JSON
    Decode {
        /// The bencoded string to decode
        input: String,
    },
    /// Print a torrent's tracker URL, length, info hash, and piece hashes
    Info {
        /// Path to the .torrent file
        path: PathBuf,
    },
    /// Query the tracker and print the discovered peers
    Peers {
        /// Path to the .torrent file
        path: PathBuf,
    },
    /// Perform the peer handshake and print the remote peer id
    Handshake {
        /// Path to the .torrent file
        path: PathBuf,
        /// Peer address, "ip:port"
        peer_addr: String,
    },
    /// Download a single piece and write it to a file
    DownloadPiece {
        /// Where to write the downloaded piece
        #[arg(short = 'o')]
        output: PathBuf,
        /// Path to the .torrent file
        path: PathBuf,
        /// Index of the piece to download
        piece_index: usize,
    },
    /// Download the whole file
    Download {
        /// Where to write the downloaded file
        #[arg(short = 'o')]
        output: PathBuf,
        /// Path to the .torrent file
        path: PathBuf,
    },
}

impl Args {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
