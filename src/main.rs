mod cli;

use marquee::config::{self, Config};
use marquee::metadata::providers::{Disabled, TmdbProvider};
use marquee::metadata::{Enricher, MovieShowProvider, SharedItem};
use marquee_common::{MediaItem, MediaKind};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, KnownIds};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "marquee=trace,marquee_common=debug,reqwest=debug".to_string()
        } else {
            "marquee=info,marquee_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::LookupMovie {
            title,
            year,
            ids,
            force,
            json,
        } => {
            let mut item = MediaItem::new(MediaKind::Movie, title);
            item.year = year;
            apply_known_ids(&mut item, ids);
            run_lookup(item, cli.config.as_deref(), force, json)
        }
        Commands::LookupEpisode {
            show,
            season,
            episode,
            year,
            ids,
            force,
            json,
        } => {
            let mut item = MediaItem::episode(show, season, episode);
            item.year = year;
            apply_known_ids(&mut item, ids);
            run_lookup(item, cli.config.as_deref(), force, json)
        }
        Commands::CacheStats => cache_stats(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("marquee {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn apply_known_ids(item: &mut MediaItem, ids: KnownIds) {
    item.external_ids.imdb = ids.imdb;
    item.external_ids.tvdb = ids.tvdb;
    item.external_ids.tmdb = ids.tmdb;
    item.guid = ids.guid;
}

/// Build an enricher over the configured providers.
fn build_enricher(config: &Config) -> Result<Enricher> {
    let movies: Arc<dyn MovieShowProvider> = if config.tmdb.is_enabled() {
        Arc::new(TmdbProvider::new(&config.tmdb)?)
    } else {
        Arc::new(Disabled)
    };

    Ok(Enricher::from_config(config, Arc::new(Disabled), movies))
}

fn run_lookup(item: MediaItem, config_path: Option<&Path>, force: bool, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let enricher = build_enricher(&config)?;
    let snapshot_path = config.cache.snapshot_path();

    if let Some(ref path) = snapshot_path {
        enricher.load_snapshot_file(path);
    }

    let rt = tokio::runtime::Runtime::new()?;
    let shared = SharedItem::new(item);
    let report = rt.block_on(enricher.enrich(&shared, force))?;
    let item = rt.block_on(shared.snapshot());

    tracing::debug!(?report, "Enrichment finished");

    if let Some(ref path) = snapshot_path {
        if let Err(e) = enricher.save_snapshot(path) {
            tracing::warn!("Failed to save provider cache snapshot: {}", e);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    println!("Kind: {}", item.kind);
    println!("Title: {}", item.search_title());
    if let Some((season, episode)) = item.episode_number() {
        println!("Episode: S{:02}E{:02}", season, episode);
    }
    println!("IMDB: {}", item.external_ids.imdb().unwrap_or("-"));
    println!("TVDB: {}", item.external_ids.tvdb().unwrap_or("-"));
    println!("TMDB: {}", item.external_ids.tmdb().unwrap_or("-"));
    if item.kind == MediaKind::Episode {
        println!("Episode IMDB: {}", item.episode_ids.imdb().unwrap_or("-"));
        println!("Episode TVDB: {}", item.episode_ids.tvdb().unwrap_or("-"));
    }
    if let Some(link) = item.external_link() {
        println!("Link: {}", link);
    }

    if !item.roles.is_empty() {
        println!("\nCast:");
        for role in &item.roles {
            let imdb = role.external_ids.imdb().unwrap_or("-");
            println!("  {:>3}. {} as {} [{}]", role.id, role.actor, role.character, imdb);
        }
    }

    Ok(())
}

fn cache_stats(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let Some(path) = config.cache.snapshot_path() else {
        println!("No cache snapshot path configured");
        return Ok(());
    };

    let enricher = build_enricher(&config)?;
    let report = enricher.load_snapshot_file(&path);

    println!("Snapshot: {}", path.display());
    for (name, stats) in enricher.stats() {
        println!("  {:<24} {:>6} hits", name, stats.hits);
    }
    for name in &report.failed {
        println!("  {:<24} unreadable", name);
    }

    Ok(())
}

fn validate_config(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    config::validate_config(&config)?;

    println!("Configuration is valid");
    println!("  Failure TTL: {}s", config.cache.failure_ttl_secs);
    if let Some(ttl) = config.cache.unavailable_ttl_secs {
        println!("  Unavailable TTL: {}s", ttl);
    }
    match config.cache.snapshot_path() {
        Some(path) => println!("  Snapshot: {}", path.display()),
        None => println!("  Snapshot: disabled"),
    }
    println!(
        "  TMDB: {}",
        if config.tmdb.is_enabled() { "enabled" } else { "disabled" }
    );

    Ok(())
}
