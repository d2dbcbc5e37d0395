//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use undertow_core::config::UndertowConfig;
use undertow_core::source::{
    ContentHandle, ContentLocator, ContentSource, DirectoryContentSource, InfoHash, SimulatedContentSource,
    SimulatedFile, sample_magnet,
};
use undertow_core::streaming::{content_type_for, select_media_file};
use undertow_web::run_server;

/// Info hash of the bundle served by `server --demo`.
const DEMO_INFO_HASH: [u8; 20] = [
    0x08, 0xad, 0xa5, 0xa7, 0xa6, 0x18, 0x3a, 0xae, 0x1e, 0x09, 0xd8, 0x31, 0xdf, 0x67, 0x48, 0xd5,
    0x66, 0x09, 0x5a, 0x10,
];

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Server(ServerArgs),
    /// Show which file a magnet link would stream from the storage directory
    Probe {
        /// Magnet link to resolve
        magnet: String,
        /// Storage directory override
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Options for `undertow server`. Flags win over `UNDERTOW_*` variables.
#[derive(Args)]
pub struct ServerArgs {
    /// Host to bind to
    #[arg(long)]
    host: Option<String>,
    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,
    /// Storage directory holding one subdirectory per info hash
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Seconds between storage reaper cycles
    #[arg(long)]
    reap_interval_secs: Option<u64>,
    /// Seconds a request may wait for torrent metadata
    #[arg(long)]
    metadata_timeout_secs: Option<u64>,
    /// Serve a generated in-memory bundle instead of the storage directory
    #[arg(long)]
    demo: bool,
}

impl ServerArgs {
    fn apply(&self, config: &mut UndertowConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.dir {
            config.storage.root = dir.clone();
        }
        if let Some(seconds) = self.reap_interval_secs {
            config.storage.reap_interval = Duration::from_secs(seconds);
        }
        if let Some(seconds) = self.metadata_timeout_secs {
            config.streaming.metadata_timeout = Duration::from_secs(seconds);
        }
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of whichever command ran
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Server(args) => start_server(args).await,
        Commands::Probe { magnet, dir } => probe(magnet, dir).await,
    }
}

async fn start_server(args: ServerArgs) -> anyhow::Result<()> {
    let mut config = UndertowConfig::from_env();
    args.apply(&mut config);

    let source: Arc<dyn ContentSource> = if args.demo {
        let source = SimulatedContentSource::new();
        let info_hash = InfoHash::new(DEMO_INFO_HASH);
        source.publish(info_hash, demo_bundle());

        let magnet = sample_magnet(&info_hash, "Undertow Demo");
        println!("Demo bundle ready. Try:");
        println!(
            "  curl -H 'Range: bytes=0-1023' 'http://{}/stream?magnet={}' -o /dev/null",
            config.server.bind_address(),
            urlencoding::encode(&magnet)
        );
        Arc::new(source)
    } else {
        tokio::fs::create_dir_all(&config.storage.root)
            .await
            .with_context(|| {
                format!("failed to create storage directory {}", config.storage.root.display())
            })?;
        Arc::new(DirectoryContentSource::new(
            config.storage.root.clone(),
            config.storage.poll_interval,
        ))
    };

    run_server(config, source).await.context("server failed")
}

async fn probe(magnet: String, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = UndertowConfig::from_env();
    if let Some(dir) = dir {
        config.storage.root = dir;
    }

    let Some(locator) = ContentLocator::new(Some(magnet)) else {
        bail!("Magnet link is required");
    };
    let source = DirectoryContentSource::new(config.storage.root.clone(), config.storage.poll_interval);
    let handle = source
        .resolve(&locator)
        .await
        .context("Error adding magnet")?;

    let waited = config.streaming.metadata_timeout;
    if tokio::time::timeout(waited, handle.when_ready()).await.is_err() {
        bail!(
            "no files for {} under {} after {:?}",
            handle.bundle_id(),
            config.storage.root.display(),
            waited
        );
    }

    let files = handle.files();
    let selected = select_media_file(&files);
    println!("Bundle {} ({} files):", handle.bundle_id(), files.len());
    for file in &files {
        let marker = match selected {
            Some(chosen) if chosen.name() == file.name() => "*",
            _ => " ",
        };
        println!("  {marker} {:>12}  {}", file.length(), file.name());
    }

    match selected {
        Some(file) => println!(
            "Would stream {} as {}",
            file.name(),
            content_type_for(file.name())
        ),
        None => println!("No video file found in the torrent"),
    }
    Ok(())
}

/// Generates a small bundle with one obvious pick, a smaller decoy and a non-video file.
fn demo_bundle() -> Vec<SimulatedFile> {
    let pattern = |len: usize, seed: u8| -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    };

    vec![
        SimulatedFile::new("Undertow Demo/README.txt", b"Generated by undertow --demo\n".to_vec()),
        SimulatedFile::new("Undertow Demo/sample.mkv", pattern(256 * 1024, 7)),
        SimulatedFile::new("Undertow Demo/Undertow Demo.mp4", pattern(8 * 1024 * 1024, 1)),
    ]
}
