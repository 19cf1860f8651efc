//! Binary entry point: parses the CLI, dispatches to the library, and turns
//! any error into a single-line message on stderr with a non-zero exit.
use anyhow::{Context, Result};
use bittorrent_client::{cli, download, output, tracker};
use bittorrent_client::torrent::metainfo::Metainfo;
use tracing::info;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

/// Reads verbosity from `LOG_LEVEL` (`debug`/`info`/`warn`/`error`),
/// defaulting to `error` so a normal run stays quiet on stderr.
fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "error".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(&level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Decode { input } => {
            let decoded = bittorrent_client::bencode::decoder::decode(input.as_bytes())
                .context("decoding input")?;
            let json = output::to_json(&decoded);
            println!("{json}");
        }
        cli::Command::Info { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let torrent = Metainfo::from_bytes(&bytes).context("parsing torrent file")?;
            println!("Tracker URL: {}", torrent.announce);
            println!("Length: {}", torrent.length);
            println!("Info Hash: {}", hex::encode(torrent.info_hash));
            println!("Piece Length: {}", torrent.piece_length);
            println!("Piece Hashes:");
            for hash in &torrent.piece_hashes {
                println!("{}", hex::encode(hash));
            }
        }
        cli::Command::Peers { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let torrent = Metainfo::from_bytes(&bytes).context("parsing torrent file")?;
            let response = tracker::announce(&torrent).await.context("contacting tracker")?;
            for peer in response.peers {
                println!("{peer}");
            }
        }
        cli::Command::Handshake { path, peer_addr } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let torrent = Metainfo::from_bytes(&bytes).context("parsing torrent file")?;
            let addr = peer_addr
                .parse()
                .with_context(|| format!("parsing peer address {peer_addr}"))?;
            let (_stream, handshake) = bittorrent_client::peer::handshake::do_handshake(
                addr,
                torrent.info_hash,
                tracker::LOCAL_PEER_ID,
            )
            .await
            .context("performing handshake")?;
            println!("Peer ID: {}", hex::encode(handshake.peer_id));
        }
        cli::Command::DownloadPiece {
            output,
            path,
            piece_index,
        } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let torrent = Metainfo::from_bytes(&bytes).context("parsing torrent file")?;
            download::download_piece_to_file(&torrent, piece_index, &output)
                .await
                .context("downloading piece")?;
            println!("Piece {} downloaded to {}.", piece_index, output.display());
        }
        cli::Command::Download { output, path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let torrent = Metainfo::from_bytes(&bytes).context("parsing torrent file")?;
            download::download_file(&torrent, &output)
                .await
                .context("downloading file")?;
            println!("Downloaded {} to {}.", path.display(), output.display());
        }
    }

    info!("command completed");
    Ok(())
}
