//! moviefind - Search the OMDb movie database from the terminal
//!
//! Looks up movies by title or IMDb id. Responses are cached on disk for a
//! configurable time so repeated lookups skip the network.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{warn, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use moviefind::cache::{CacheManager, FileStorage, MemoryStorage, Storage};
use moviefind::cli::{CacheAction, Cli, Command, StartupConfig};
use moviefind::controller::{SearchController, SearchState, MIN_SEARCH_LENGTH};
use moviefind::data::{MovieDetails, OmdbClient, OmdbError, RESULTS_PER_PAGE};

/// Sets up stderr logging; debug output only with --verbose
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("moviefind")
        .build();
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

/// Picks the on-disk cache, falling back to memory when there is no cache dir
fn open_storage(in_memory: bool) -> Arc<dyn Storage> {
    if in_memory {
        return Arc::new(MemoryStorage::new());
    }
    match FileStorage::new() {
        Some(storage) => Arc::new(storage),
        None => {
            warn!("No cache directory available; caching in memory for this run");
            Arc::new(MemoryStorage::new())
        }
    }
}

/// Runs a search through the controller and prints the page
async fn run_search(client: Arc<OmdbClient>, query: &str, page: u32) -> Result<(), String> {
    if query.trim().chars().count() < MIN_SEARCH_LENGTH {
        return Err(format!(
            "Search query must be at least {} characters",
            MIN_SEARCH_LENGTH
        ));
    }

    let mut controller = SearchController::new(client);
    let mut rx = controller.subscribe();
    controller.update(query, page);

    let state = rx
        .wait_for(|s| !s.is_loading())
        .await
        .map_err(|e| e.to_string())?
        .clone();

    match state {
        SearchState::Success {
            movies,
            total_results,
        } => {
            let total_pages = total_results.div_ceil(RESULTS_PER_PAGE);
            println!(
                "Found {} results (page {} of {})",
                total_results,
                page,
                total_pages.max(1)
            );
            for movie in movies {
                println!(
                    "{:<12} {:<6} {}",
                    movie.imdb_id,
                    movie.year.as_deref().unwrap_or("-"),
                    movie.title.as_deref().unwrap_or("(untitled)")
                );
            }
            Ok(())
        }
        SearchState::Failed { message } => Err(message),
        SearchState::Idle | SearchState::Loading => Ok(()),
    }
}

fn print_details(details: &MovieDetails) {
    println!(
        "{} ({})",
        details.title.as_deref().unwrap_or("(untitled)"),
        details.year.as_deref().unwrap_or("-")
    );
    println!("  IMDb id:  {}", details.imdb_id);
    if let Some(director) = &details.director {
        println!("  Director: {}", director);
    }
    if let Some(actors) = &details.actors {
        println!("  Actors:   {}", actors);
    }
    let genres = details.genres();
    if !genres.is_empty() {
        println!("  Genres:   {}", genres.join(", "));
    }
    if details.runtime_minutes() > 0 {
        println!("  Runtime:  {} min", details.runtime_minutes());
    }
    if let Some(rating) = details.imdb_rating() {
        println!("  Rating:   {:.1}/10", rating);
    }
    println!("  Poster:   {}", details.poster_url());
    if let Some(plot) = &details.plot {
        println!();
        println!("  {}", plot);
    }
}

/// Fetches all ids concurrently and prints them in the order given
async fn run_details(client: &OmdbClient, ids: &[String]) -> Result<(), String> {
    let futures = ids.iter().map(|id| client.movie_details(id));
    let results: Vec<Result<MovieDetails, OmdbError>> = futures::future::join_all(futures).await;

    let mut failures = 0;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(details) => {
                print_details(&details);
                println!();
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", id, e);
            }
        }
    }

    if failures > 0 {
        Err(format!("{} of {} lookups failed", failures, ids.len()))
    } else {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache = CacheManager::new(open_storage(config.in_memory_cache));
    let client = Arc::new(OmdbClient::new(config.client, cache));

    let outcome = match &cli.command {
        Command::Search { query, page } => run_search(Arc::clone(&client), query, *page).await,
        Command::Details { ids } => run_details(&client, ids).await,
        Command::Cache { action } => {
            match action {
                CacheAction::Clear => {
                    client.cache().clear();
                    println!("Cache cleared");
                }
                CacheAction::Evict => {
                    let removed = client.cache().evict_expired();
                    println!("Removed {} expired cache entries", removed);
                }
            }
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}
