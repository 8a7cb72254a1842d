//! Command-line interface parsing for moviefind
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! the client and cache settings the binary starts with.

use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::data::omdb::{ClientConfig, API_KEY_ENV, OMDB_API_BASE_URL};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A search page must be 1 or greater
    #[error("Invalid page: {0}. Pages start at 1")]
    InvalidPage(u32),

    /// A cache TTL of zero would expire every entry immediately
    #[error("Invalid cache TTL: must be at least 1 second")]
    InvalidCacheTtl,
}

/// moviefind - Search the OMDb movie database from the terminal
#[derive(Parser, Debug)]
#[command(name = "moviefind")]
#[command(about = "Search OMDb for movies and look up details, with a local response cache")]
#[command(version)]
pub struct Cli {
    /// OMDb API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// OMDb endpoint base URL
    #[arg(long, env = "OMDB_BASE_URL", default_value = OMDB_API_BASE_URL, global = true)]
    pub base_url: String,

    /// How long cached responses stay fresh, in seconds
    #[arg(long, default_value_t = 1800, global = true)]
    pub cache_ttl: u64,

    /// Keep the cache in memory for this run only
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Search movies by title
    ///
    /// Examples:
    ///   moviefind search batman
    ///   moviefind search "star wars" --page 2
    Search {
        /// Title to search for (at least 3 characters)
        query: String,

        /// Results page, 10 movies per page
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Show details for one or more IMDb ids
    Details {
        /// IMDb ids, e.g. tt0372784
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Cache maintenance actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Remove every cached response
    Clear,
    /// Remove only expired or unreadable entries
    Evict,
}

/// Settings derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// OMDb connection settings
    pub client: ClientConfig,
    /// Use an in-memory cache instead of the on-disk one
    pub in_memory_cache: bool,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with the resolved settings
    /// * `Err(CliError)` if a page or TTL is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if let Command::Search { page, .. } = cli.command {
            if page == 0 {
                return Err(CliError::InvalidPage(page));
            }
        }
        if cli.cache_ttl == 0 {
            return Err(CliError::InvalidCacheTtl);
        }

        Ok(StartupConfig {
            client: ClientConfig {
                api_key: cli.api_key.clone().filter(|k| !k.is_empty()),
                base_url: cli.base_url.clone(),
                cache_ttl: Duration::from_secs(cli.cache_ttl),
            },
            in_memory_cache: cli.no_cache,
        })
    }
}
