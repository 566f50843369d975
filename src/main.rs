//! Binary entrypoint for immich-frame.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use immich_frame::catalog::Catalog;
use immich_frame::catalog::cache::{AssetCache, CachedCatalog};
use immich_frame::catalog::immich::ImmichClient;
use immich_frame::config::Configuration;
use immich_frame::processing::compose::Composer;
use immich_frame::selection::SurfaceScope;
use immich_frame::setup::validate_connection;
use immich_frame::surface::{DisplaySurface, SurfaceOptions};
use immich_frame::tasks::scheduler::Slideshow;
use immich_frame::web;

#[derive(Debug, Parser)]
#[command(name = "immich-frame", version, about = "Immich-backed photo frame slideshow")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start every surface and the HTTP host (default)
    Run,
    /// Validate the server address and API key, then exit
    Check,
    /// List the albums visible to the API key
    Albums,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("immich_frame={level}").parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);
    fmt().with_env_filter(filter).with_target(false).compact().init();
    Ok(())
}

type FrameCatalog = CachedCatalog<ImmichClient>;

fn build_catalog(cfg: &Configuration) -> Result<FrameCatalog> {
    let client = ImmichClient::new(&cfg.host, &cfg.api_key, cfg.picture_type, &cfg.http)
        .context("failed to build HTTP client")?;
    let cache = cfg.cache_mode.then(|| AssetCache::new(&cfg.cache_dir));
    if let Some(cache) = &cache {
        info!(dir = %cache.dir().display(), "cache mode enabled");
    }
    Ok(CachedCatalog::new(client, cache))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?
        .validated()
        .context("invalid configuration values")?;
    let catalog = build_catalog(&cfg)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Check => {
            let info = validate_connection(&cfg.host, &catalog)
                .await
                .map_err(|err| anyhow::anyhow!("{} ({})", err, err.key()))?;
            println!("{}", info.title);
            Ok(())
        }
        Command::Albums => {
            let albums = catalog
                .list_all_albums()
                .await
                .context("failed to list albums")?;
            for album in albums {
                println!("{}\t{}", album.id, album.album_name);
            }
            Ok(())
        }
        Command::Run => run(cfg, catalog).await,
    }
}

async fn run(cfg: Configuration, catalog: FrameCatalog) -> Result<()> {
    let connection = validate_connection(&cfg.host, &catalog)
        .await
        .map_err(|err| anyhow::anyhow!("{} ({})", err, err.key()))?;
    info!(title = %connection.title, "connection validated");

    let scopes = surface_scopes(&cfg, &catalog).await?;
    if scopes.is_empty() {
        bail!("nothing to show: enable show-favorites or watch at least one album");
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    catalog.expect_scopes(scopes.iter().map(SurfaceScope::key));
    let catalog = Arc::new(catalog);
    let composer = Composer::new(cfg.canvas, cfg.background);
    let options = SurfaceOptions::from(&cfg);
    let slideshow = Arc::new(Slideshow::new(cfg.refresh_interval(), cancel.clone()));
    for scope in scopes {
        let surface = DisplaySurface::new(scope, catalog.clone(), composer, options.clone());
        info!(surface = surface.id(), name = surface.name(), "starting surface");
        slideshow.add(surface).await;
    }

    let mut tasks = JoinSet::new();
    tasks.spawn({
        let slideshow = slideshow.clone();
        let cancel = cancel.clone();
        let listen = cfg.listen;
        async move { web::serve(listen, slideshow, cancel).await }
    });

    let mut result = Ok(());
    tokio::select! {
        _ = cancel.cancelled() => {}
        joined = tasks.join_next() => {
            if let Some(joined) = joined {
                result = joined.context("http task panicked").and_then(|r| r);
            }
            cancel.cancel();
        }
    }

    slideshow.shutdown().await;
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined.context("http task panicked").and_then(|r| r) {
            warn!(error = ?err, "task exited with error");
        }
    }
    info!("shutdown complete");
    result
}

/// Favorites first, then every watched album that exists on the server.
async fn surface_scopes(cfg: &Configuration, catalog: &FrameCatalog) -> Result<Vec<SurfaceScope>> {
    let mut scopes = Vec::new();
    if cfg.show_favorites {
        scopes.push(SurfaceScope::Favorites);
    }
    if cfg.watched_albums.is_empty() {
        return Ok(scopes);
    }

    let names: HashMap<String, String> = catalog
        .list_all_albums()
        .await
        .context("failed to list albums")?
        .into_iter()
        .map(|a| (a.id, a.album_name))
        .collect();
    for id in &cfg.watched_albums {
        match names.get(id) {
            Some(name) => scopes.push(SurfaceScope::Album {
                id: id.clone(),
                name: name.clone(),
            }),
            None => warn!(album = %id, "watched album not found on server; ignoring"),
        }
    }
    Ok(scopes)
}
