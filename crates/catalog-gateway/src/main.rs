//! Catalog gateway CLI application.

use anyhow::{Context, Result};
use catalog_gateway::{
    CacheStore, CacheTtls, Catalog, Gateway, GatewaySettings, HttpTransport, MemoryStore,
    SqliteStore,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shared::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Query the anime/manga catalog through the caching gateway", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Keep the cache in memory for this run only
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top anime
    TopAnime {
        #[arg(long, default_value_t = 25)]
        limit: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search anime by title
    SearchAnime { query: String },
    /// Anime details by MAL ID
    Anime { id: u32 },
    /// Anime in a genre
    AnimeByGenre {
        genre: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Anime genre list
    AnimeGenres,
    /// Anime from a studio
    AnimeByStudio {
        studio: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// News for an anime
    AnimeNews { id: u32 },
    /// Top manga
    TopManga {
        #[arg(long, default_value_t = 25)]
        limit: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search manga by title
    SearchManga { query: String },
    /// Manga details by MAL ID
    Manga { id: u32 },
    /// Manga in a genre
    MangaByGenre {
        genre: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Manga genre list
    MangaGenres,
    /// News for a manga
    MangaNews { id: u32 },
    /// Remove every cached catalog response
    ClearCache,
    /// Show cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        config.logging.level()
    };

    shared::logging::init(shared::LogConfig {
        log_dir: config.log_dir().to_string_lossy().to_string(),
        component: "catalog-gateway".to_string(),
        default_level: log_level,
        console: config.logging.console,
        file: config.logging.file,
        json_format: config.logging.json_format,
    })?;

    info!(config_file = %args.config.display(), "Catalog gateway starting");

    let store: Arc<dyn CacheStore> = if config.catalog.cache.enabled && !args.memory {
        let cache_path = config.cache_path();
        Arc::new(SqliteStore::open(&cache_path).context("Failed to initialize cache")?)
    } else {
        info!("Using in-memory cache");
        Arc::new(MemoryStore::new())
    };

    let transport =
        HttpTransport::from_config(&config.catalog).context("Failed to create catalog transport")?;

    let gateway = Gateway::new(
        Arc::new(transport),
        store,
        GatewaySettings::from_config(&config.catalog),
    );
    let catalog = Catalog::new(gateway, CacheTtls::from(&config.catalog.cache));

    run(&catalog, args.command).await
}

async fn run(catalog: &Catalog, command: Command) -> Result<()> {
    match command {
        Command::TopAnime { limit, page } => print_json(&catalog.top_anime(limit, page).await?),
        Command::SearchAnime { query } => print_json(&catalog.search_anime(&query).await?),
        Command::Anime { id } => print_json(&catalog.anime_by_id(id).await?),
        Command::AnimeByGenre { genre, page } => {
            print_json(&catalog.anime_by_genre(genre, page).await?)
        }
        Command::AnimeGenres => print_json(&catalog.anime_genres().await?),
        Command::AnimeByStudio { studio, page } => {
            print_json(&catalog.anime_by_studio(studio, page).await?)
        }
        Command::AnimeNews { id } => print_json(&catalog.anime_news(id).await?),
        Command::TopManga { limit, page } => print_json(&catalog.top_manga(limit, page).await?),
        Command::SearchManga { query } => print_json(&catalog.search_manga(&query).await?),
        Command::Manga { id } => print_json(&catalog.manga_by_id(id).await?),
        Command::MangaByGenre { genre, page } => {
            print_json(&catalog.manga_by_genre(genre, page).await?)
        }
        Command::MangaGenres => print_json(&catalog.manga_genres().await?),
        Command::MangaNews { id } => print_json(&catalog.manga_news(id).await?),
        Command::ClearCache => {
            let removed = catalog.gateway().clear_cache()?;
            println!("Removed {} cached responses", removed);
            Ok(())
        }
        Command::Stats => {
            let stats = catalog.gateway().cache_stats()?;
            println!("Cached responses: {}", stats.total_entries);
            println!("Cache size: {} KB", stats.total_size_bytes / 1_000);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render payload")?;
    println!("{}", rendered);
    Ok(())
}
