use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "marquee")]
#[command(author, version, about = "Now-playing metadata enrichment")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identifiers already known for the item being looked up.
#[derive(Args, Debug, Default)]
pub struct KnownIds {
    /// IMDB id (e.g. tt0113277)
    #[arg(long)]
    pub imdb: Option<String>,

    /// TVDB id
    #[arg(long)]
    pub tvdb: Option<String>,

    /// TMDB id
    #[arg(long)]
    pub tmdb: Option<String>,

    /// Metadata agent guid (e.g. com.plexapp.agents.imdb://tt0113277?lang=en)
    #[arg(long)]
    pub guid: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enrich a movie and print its identifiers and cast
    LookupMovie {
        /// Movie title
        #[arg(required = true)]
        title: String,

        /// Release year
        #[arg(short, long)]
        year: Option<u16>,

        #[command(flatten)]
        ids: KnownIds,

        /// Consult providers even if the item was already populated
        #[arg(long)]
        force: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Enrich a TV episode from TMDB and print its identifiers and cast
    ///
    /// The CLI has no series (TVDB) provider configured, so the series pass
    /// always reports no data and TVDB ids are only filled from TMDB's
    /// external ids.
    LookupEpisode {
        /// Show name
        #[arg(required = true)]
        show: String,

        /// Season number
        #[arg(required = true)]
        season: u32,

        /// Episode number
        #[arg(required = true)]
        episode: u32,

        /// First-air year of the show
        #[arg(short, long)]
        year: Option<u16>,

        #[command(flatten)]
        ids: KnownIds,

        /// Consult providers even if the item was already populated
        #[arg(long)]
        force: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show entry counts of the persisted provider caches
    CacheStats,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
