//! `reel` CLI - resolve, classify and inspect episode sources

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use reel::stream::manifest::{resolve_manifest, ManifestKind, StreamTemplate};
use reel::{decode_xor, HttpContext, ReelConfig, ResolveRequest, Resolver, Stream};

#[derive(Parser)]
#[command(name = "reel")]
#[command(about = "Resolve episode source records into ranked, playable streams")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/reel/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a request file into ranked streams
    Resolve {
        /// JSON file with `sourceRecords` and `preferences`
        request: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        /// Concurrent extraction tasks (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Decode and classify a request file without touching the network
    Classify {
        /// JSON file with `sourceRecords` and `preferences`
        request: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Decode an XOR-obfuscated source URL
    Decode {
        /// Raw source URL (e.g. `-504c4c48...`)
        #[arg(allow_hyphen_values = true)]
        raw: String,
    },

    /// Fetch and parse HLS/DASH manifests
    Playlist {
        /// Manifest URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reel=info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { request, format, workers } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_resolve(config, &request, format, workers).await?;
        }
        Commands::Classify { request, format } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_classify(config, &request, format)?;
        }
        Commands::Decode { raw } => {
            println!("{}", decode_xor(&raw));
        }
        Commands::Playlist { urls } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_playlist(&config, &urls).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ReelConfig> {
    match path {
        Some(path) => ReelConfig::load_from(path),
        None => ReelConfig::load(),
    }
}

fn read_request(path: &Path) -> Result<ResolveRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file '{}'", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid request JSON in '{}'", path.display()))
}

async fn cmd_resolve(
    config: ReelConfig,
    request_path: &Path,
    format: Format,
    workers: Option<usize>,
) -> Result<()> {
    let request = read_request(request_path)?;
    let mut resolver = Resolver::new(config)?;
    if let Some(workers) = workers {
        resolver = resolver.with_workers(workers);
    }

    let response = resolver.resolve(&request).await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        Format::Text => {
            if response.is_empty() {
                eprintln!("No playable streams found");
            }
            print!("{}", response.to_log_text());
        }
    }
    Ok(())
}

fn cmd_classify(config: ReelConfig, request_path: &Path, format: Format) -> Result<()> {
    let request = read_request(request_path)?;
    let resolver = Resolver::new(config)?;
    let servers = resolver.classify(&request);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&servers)?),
        Format::Text => {
            for server in &servers {
                println!(
                    "{}\t{}\t{}\t{}",
                    server.category, server.priority, server.provider_name, server.decoded_url
                );
            }
            eprintln!("{} of {} records classified", servers.len(), request.source_records.len());
        }
    }
    Ok(())
}

async fn cmd_playlist(config: &ReelConfig, urls: &[String]) -> Result<()> {
    let ctx = HttpContext::new(&config.http)?;
    let template = StreamTemplate::new("playlist");

    let fetches = urls.iter().map(|url| {
        let kind = ManifestKind::detect(url).unwrap_or(ManifestKind::Hls);
        resolve_manifest(&ctx, kind, url, str::to_string, &template)
    });
    let results: Vec<Vec<Stream>> = futures::future::join_all(fetches).await;

    for (url, streams) in urls.iter().zip(results) {
        println!("# {url}");
        for stream in streams {
            println!("{}: {}", stream.quality_label, stream.url);
            for track in &stream.audio_tracks {
                println!("  Audio ({}): {}", track.label, track.url);
            }
            for track in &stream.subtitles {
                println!("  Subtitle ({}): {}", track.label, track.url);
            }
        }
    }
    Ok(())
}
