use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use crate::config;
use crate::domain::track::NewTrack;
use crate::enrich::Resolver;
use crate::http::server::HttpServer;
use crate::storage::operations::Storage;

#[derive(Parser)]
#[command(name = "jukebox")]
#[command(version = "0.1")]
#[command(about = "Track catalogue service with artwork and preview enrichment")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server exposing the track catalogue
    Serve,
    /// List stored tracks, newest first
    List,
    /// Look up artwork and preview for a track without storing anything
    Enrich {
        #[arg(short, long)]
        artist: String,
        #[arg(short, long)]
        title: String,
    },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config_path = cli.config.to_string_lossy();
    let cfg = config::Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    match cli.command {
        Commands::Serve => {
            let storage = Storage::new(&cfg.database).context("Failed to initialize storage")?;

            let resolver = if cfg.enrichment.enabled {
                log::info!(
                    "Enrichment enabled, {} ms budget per provider",
                    cfg.enrichment.timeout_ms
                );
                Some(Resolver::from_config(&cfg.enrichment))
            } else {
                log::info!("Enrichment disabled");
                None
            };

            let http_server = HttpServer::new(storage, resolver, cfg.http);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::List => {
            let mut storage = Storage::new(&cfg.database).context("Failed to initialize storage")?;

            let tracks = storage.list_tracks()?;
            if tracks.is_empty() {
                println!("No tracks stored");
            }

            for track in tracks {
                println!("{} - {} [{}]", track.artist, track.title, track.id);
                if let Some(url) = &track.cover_art_url {
                    println!("    cover art:  {url}");
                }
                if let Some(url) = &track.sound_clip_url {
                    println!("    sound clip: {url}");
                }
            }
        }

        Commands::Enrich { artist, title } => {
            let candidate = NewTrack {
                title,
                artist,
                ..Default::default()
            }
            .validated()?;

            let patch = Resolver::from_config(&cfg.enrichment).resolve(&candidate);
            println!("{}", serde_json::to_string_pretty(&patch)?);
        }
    }

    Ok(())
}
