//! OMDb API client
//!
//! Fetches search pages and movie details from the Open Movie Database,
//! reading through the response cache and mapping every failure mode onto
//! [`OmdbError`].

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::{MovieDetails, MovieSummary, SearchResult};
use crate::cache::{make_key, CacheManager, MemoryStorage, DEFAULT_TTL};

/// Base URL for the OMDb API
pub const OMDB_API_BASE_URL: &str = "https://www.omdbapi.com/";

/// Environment variable holding the OMDb API key
pub const API_KEY_ENV: &str = "OMDB_API_KEY";

/// Errors that can occur when talking to OMDb
#[derive(Debug, Error)]
pub enum OmdbError {
    /// The request was cancelled because a newer one superseded it
    #[error("Request cancelled")]
    Cancelled,

    /// The request never got a response
    #[error("Network error while contacting OMDb. Check your connection and try again.")]
    Network(#[source] reqwest::Error),

    /// OMDb rejected the API key (401/403)
    #[error("OMDb authentication failed. Check that OMDB_API_KEY is set correctly.")]
    Auth,

    /// Too many requests (429)
    #[error("OMDb rate limit exceeded. Please wait a moment and try again.")]
    RateLimited,

    /// Any other non-success status
    #[error("Failed to fetch movies (HTTP {status}). Please try again.")]
    Http { status: u16 },

    /// OMDb answered but found nothing (`"Response": "False"`)
    #[error("{0}")]
    NotFound(String),

    /// The response body was not the JSON we expected
    #[error("Unexpected response from OMDb: {0}")]
    InvalidResponse(String),
}

impl OmdbError {
    /// Whether this is the silent, superseded-request case
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OmdbError::Cancelled)
    }

    /// Whether trying again later might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, OmdbError::Network(_) | OmdbError::RateLimited)
    }
}

/// Connection settings for [`OmdbClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// OMDb API key; requests fail with [`OmdbError::Auth`] without one
    pub api_key: Option<String>,
    /// Endpoint base URL (overridable for testing)
    pub base_url: String,
    /// Lifetime of cached responses
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            base_url: OMDB_API_BASE_URL.to_string(),
            cache_ttl: DEFAULT_TTL,
        }
    }
}

/// Search endpoint payload
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Search", default)]
    search: Option<Vec<MovieSummary>>,
    #[serde(rename = "totalResults", default)]
    total_results: Option<Value>,
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

/// Just enough of a detail payload to spot a provider-level failure
#[derive(Debug, Deserialize)]
struct ResponseStatus {
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

/// Client for searching movies and fetching details from OMDb
#[derive(Debug, Clone)]
pub struct OmdbClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Response cache consulted before every request
    cache: CacheManager,
    /// OMDb API key
    api_key: Option<String>,
    /// Base URL for the API (allows override for testing)
    base_url: String,
}

impl OmdbClient {
    /// Creates a client with the given settings and cache
    ///
    /// A missing API key is logged but not fatal: requests will simply fail
    /// with [`OmdbError::Auth`].
    pub fn new(config: ClientConfig, cache: CacheManager) -> Self {
        if config.api_key.is_none() {
            warn!(
                "OMDb API key is missing. Set {} to enable searches.",
                API_KEY_ENV
            );
        }

        Self {
            http_client: Client::new(),
            cache: cache.with_default_ttl(config.cache_ttl),
            api_key: config.api_key,
            base_url: config.base_url,
        }
    }

    /// Creates a client from the environment with an in-memory cache
    pub fn from_env() -> Self {
        let cache = CacheManager::new(std::sync::Arc::new(MemoryStorage::new()));
        Self::new(ClientConfig::default(), cache)
    }

    /// The cache this client reads through
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Builds the search URL for a query and page
    pub fn search_url(&self, query: &str, page: u32) -> String {
        format!(
            "{}?apikey={}&s={}&page={}",
            self.base_url,
            urlencoding::encode(self.api_key.as_deref().unwrap_or_default()),
            urlencoding::encode(query),
            page
        )
    }

    /// Builds the detail URL for an IMDb id
    pub fn details_url(&self, movie_id: &str) -> String {
        format!(
            "{}?apikey={}&i={}",
            self.base_url,
            urlencoding::encode(self.api_key.as_deref().unwrap_or_default()),
            urlencoding::encode(movie_id)
        )
    }

    /// Searches OMDb for `query`, returning one page of results
    ///
    /// # Behavior
    /// - Returns a cached result without touching the network when present
    /// - Fails with [`OmdbError::Cancelled`] if `cancel` fires before the
    ///   response is fully read
    /// - Caches successful results only
    pub async fn search_movies(
        &self,
        query: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, OmdbError> {
        let page_token = page.to_string();
        let cache_key = make_key(["search", query, page_token.as_str()]);

        if let Some(cached) = self.cache.get::<SearchResult>(&cache_key) {
            debug!("Cache hit for {}", cache_key);
            return Ok(cached);
        }
        debug!("Cache miss for {}", cache_key);

        let body = self.fetch(&self.search_url(query, page), cancel).await?;
        let response: SearchResponse = serde_json::from_slice(&body)
            .map_err(|e| OmdbError::InvalidResponse(e.to_string()))?;
        let result = parse_search_response(response)?;

        if cancel.is_cancelled() {
            return Err(OmdbError::Cancelled);
        }
        self.cache.set(&cache_key, &result);

        Ok(result)
    }

    /// Fetches the full record for an IMDb id
    pub async fn movie_details(&self, movie_id: &str) -> Result<MovieDetails, OmdbError> {
        let cache_key = make_key(["details", movie_id]);

        if let Some(cached) = self.cache.get::<MovieDetails>(&cache_key) {
            debug!("Cache hit for {}", cache_key);
            return Ok(cached);
        }
        debug!("Cache miss for {}", cache_key);

        // Detail lookups are never superseded, so they get a token nobody cancels
        let body = self
            .fetch(&self.details_url(movie_id), &CancellationToken::new())
            .await?;
        let details = parse_details_response(&body)?;

        self.cache.set(&cache_key, &details);

        Ok(details)
    }

    /// Sends a GET and returns the body of a successful response
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>, OmdbError> {
        if cancel.is_cancelled() {
            return Err(OmdbError::Cancelled);
        }

        let response = cancellable(cancel, self.http_client.get(url).send())
            .await?
            .map_err(OmdbError::Network)?;

        if let Some(err) = status_error(response.status()) {
            return Err(err);
        }

        let body = cancellable(cancel, response.bytes())
            .await?
            .map_err(OmdbError::Network)?;

        Ok(body.to_vec())
    }
}

/// Runs `future` unless `cancel` fires first
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, OmdbError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OmdbError::Cancelled),
        output = future => Ok(output),
    }
}

/// Maps a non-success HTTP status onto the error taxonomy
fn status_error(status: StatusCode) -> Option<OmdbError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OmdbError::Auth,
        StatusCode::TOO_MANY_REQUESTS => OmdbError::RateLimited,
        other => OmdbError::Http {
            status: other.as_u16(),
        },
    })
}

/// Only the exact string `"False"` marks a provider-level failure
fn is_failure(response: Option<&str>) -> bool {
    response == Some("False")
}

fn not_found(error: Option<String>) -> OmdbError {
    OmdbError::NotFound(error.unwrap_or_else(|| "Movie not found".to_string()))
}

/// Converts a search payload into a [`SearchResult`]
fn parse_search_response(response: SearchResponse) -> Result<SearchResult, OmdbError> {
    if is_failure(response.response.as_deref()) {
        return Err(not_found(response.error));
    }

    Ok(SearchResult {
        movies: response.search.unwrap_or_default(),
        total_results: parse_total_results(response.total_results.as_ref()),
    })
}

/// Converts a detail payload into [`MovieDetails`]
fn parse_details_response(body: &[u8]) -> Result<MovieDetails, OmdbError> {
    let status: ResponseStatus =
        serde_json::from_slice(body).map_err(|e| OmdbError::InvalidResponse(e.to_string()))?;
    if is_failure(status.response.as_deref()) {
        return Err(not_found(status.error));
    }

    serde_json::from_slice(body).map_err(|e| OmdbError::InvalidResponse(e.to_string()))
}

/// Parses OMDb's `totalResults`, which normally arrives as a string
///
/// Reads leading digits the way a lenient integer parse would; anything
/// without them counts as 0.
fn parse_total_results(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::String(s)) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().unwrap_or(0)
        }
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}
