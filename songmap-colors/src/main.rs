//! songmap-colors - Country color service
//!
//! **Module Identity:**
//! - Name: songmap-colors
//! - Port: 5731 (default)
//!
//! Colors every country of the catalog from its current top-songs chart,
//! caches the map for a day and serves it over HTTP. `compute` runs the
//! pipeline once and prints the map as JSON.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songmap_colors::config::{CliOverrides, ServiceSettings, MODULE_NAME};
use songmap_colors::db::{self, SqliteCacheStore};
use songmap_colors::services::{
    CountryCatalog, EnrichmentPipeline, GeoJsonCatalog, ItunesClient, ResultCache, StaticCatalog,
};
use songmap_colors::AppState;
use songmap_common::config::{
    load_module_config, load_toml_config, RootFolderInitializer, RootFolderResolver,
};

/// Command-line arguments for songmap-colors
#[derive(Parser, Debug)]
#[command(name = "songmap-colors")]
#[command(about = "Country color service derived from top-songs charts")]
#[command(version)]
struct Args {
    /// Explicit config file (default: platform config dir)
    #[arg(short, long, env = "SONGMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the service database
    #[arg(short, long, env = "SONGMAP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SONGMAP_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SONGMAP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Concurrent song fetches
    #[arg(long, env = "SONGMAP_PERMITS")]
    permits: Option<usize>,

    /// Catalog entries per scheduling batch
    #[arg(long, env = "SONGMAP_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Ranked titles fetched per country
    #[arg(long, env = "SONGMAP_SONG_LIMIT")]
    song_limit: Option<usize>,

    /// Per-fetch timeout in milliseconds
    #[arg(long, env = "SONGMAP_FETCH_TIMEOUT_MS")]
    fetch_timeout_ms: Option<u64>,

    /// Color cache lifetime in hours
    #[arg(long, env = "SONGMAP_CACHE_TTL_HOURS")]
    cache_ttl_hours: Option<u64>,

    /// Base URL of the top-songs feed
    #[arg(long, env = "SONGMAP_FEED_BASE_URL")]
    feed_base_url: Option<String>,

    /// GeoJSON country dataset (built-in table when unset)
    #[arg(long, env = "SONGMAP_COUNTRIES_GEOJSON")]
    countries_geojson: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Compute the color map once and print it as JSON
    Compute,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            log_level: self.log_level.clone(),
            permits: self.permits,
            batch_size: self.batch_size,
            song_limit: self.song_limit,
            fetch_timeout_ms: self.fetch_timeout_ms,
            cache_ttl_hours: self.cache_ttl_hours,
            feed_base_url: self.feed_base_url.clone(),
            countries_geojson: self.countries_geojson.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Load TOML and layer CLI/env over it
    let toml_config = match &args.config {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => load_module_config(MODULE_NAME, None),
    };
    let settings = ServiceSettings::resolve(&args.overrides(), &toml_config)
        .context("Invalid configuration")?;

    init_tracing(&settings)?;

    info!("Starting songmap-colors");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 2: Resolve and create the root folder
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder.clone())
        .with_toml_config(toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    // Step 3: Open or create the database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    // Step 4: Assemble the pipeline
    let cache = ResultCache::with_ttl_hours(
        Arc::new(SqliteCacheStore::new(db_pool)),
        settings.cache_ttl_hours,
    );

    let catalog: Arc<dyn CountryCatalog> = match &settings.countries_geojson {
        Some(path) => {
            info!("Country catalog: {}", path.display());
            Arc::new(GeoJsonCatalog::new(path))
        }
        None => {
            let builtin = StaticCatalog::builtin();
            info!("Country catalog: built-in table ({} countries)", builtin.len());
            Arc::new(builtin)
        }
    };

    let songs = Arc::new(
        ItunesClient::new(&settings.feed_base_url, settings.pipeline.fetch_timeout)
            .context("Failed to build feed client")?,
    );
    info!("Song feed: {}", settings.feed_base_url);

    let pipeline = Arc::new(
        EnrichmentPipeline::new(catalog, songs, cache, settings.pipeline.clone())
            .context("Failed to build pipeline")?,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pipeline, settings.port).await,
        Command::Compute => compute(&pipeline).await,
    }
}

/// Global subscriber: RUST_LOG wins, otherwise the configured level
fn init_tracing(settings: &ServiceSettings) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "songmap_colors={level},songmap_common={level},tower_http={level}",
            level = settings.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    match &settings.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    Ok(())
}

async fn serve(pipeline: Arc<EnrichmentPipeline>, port: u16) -> Result<()> {
    let app = songmap_colors::build_router(AppState::new(pipeline));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn compute(pipeline: &EnrichmentPipeline) -> Result<()> {
    let (colors, report) = pipeline
        .run(Arc::new(|percent: u8| info!(percent, "Progress")))
        .await;

    info!(
        countries = colors.len(),
        fallbacks = report.fallbacks,
        from_cache = report.from_cache,
        elapsed_ms = report.elapsed_ms,
        "Computation finished"
    );

    println!("{}", serde_json::to_string_pretty(&colors)?);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
