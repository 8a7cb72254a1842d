//! Core data models for moviefind
//!
//! This module contains the records returned by the OMDb API, shaped the way
//! the provider sends them, plus the search result wrapper that gets cached.

pub mod omdb;

pub use omdb::{ClientConfig, OmdbClient, OmdbError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of results OMDb returns per search page
pub const RESULTS_PER_PAGE: u64 = 10;

/// Placeholder used when a movie has no poster
pub const PLACEHOLDER_POSTER_URL: &str = "https://via.placeholder.com/200x300?text=No+Poster";

/// Value OMDb uses for fields it has no data for
const NOT_AVAILABLE: &str = "N/A";

/// A single row from an OMDb search response
///
/// Only the identifier and display fields are typed; anything else the
/// provider sends is kept in `extra` so the record survives a cache round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    /// IMDb identifier, e.g. `tt0372784`
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Year", default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// `movie`, `series` or `episode`
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "Poster", default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MovieSummary {
    /// Creates a summary carrying only an identifier
    pub fn new(imdb_id: impl Into<String>) -> Self {
        Self {
            imdb_id: imdb_id.into(),
            title: None,
            year: None,
            kind: None,
            poster: None,
            extra: Map::new(),
        }
    }

    /// Poster URL, or a placeholder when OMDb has none
    pub fn poster_url(&self) -> &str {
        poster_or_placeholder(self.poster.as_deref())
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Movies on this page, in provider order
    pub movies: Vec<MovieSummary>,
    /// Total number of matches across all pages
    pub total_results: u64,
}

impl SearchResult {
    /// Number of pages needed to show every result
    pub fn total_pages(&self) -> u64 {
        self.total_results.div_ceil(RESULTS_PER_PAGE)
    }
}

/// Full movie record from the OMDb detail endpoint
///
/// The payload is kept as the provider sent it: the commonly displayed fields
/// are typed, everything else lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    #[serde(rename = "imdbID", default)]
    pub imdb_id: String,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "Year", default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(rename = "Rated", default, skip_serializing_if = "Option::is_none")]
    pub rated: Option<String>,
    #[serde(rename = "Released", default, skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    /// Runtime as sent by OMDb, e.g. `"140 min"`
    #[serde(rename = "Runtime", default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Comma separated genre list
    #[serde(rename = "Genre", default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(rename = "Director", default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(rename = "Actors", default, skip_serializing_if = "Option::is_none")]
    pub actors: Option<String>,
    #[serde(rename = "Plot", default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(rename = "Poster", default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(rename = "imdbRating", default, skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MovieDetails {
    /// Runtime in minutes, parsed from strings like `"140 min"`
    ///
    /// Returns 0 when the runtime is missing or not numeric (`"N/A"`).
    pub fn runtime_minutes(&self) -> u32 {
        self.runtime
            .as_deref()
            .and_then(|r| r.split(' ').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    /// Genres split out of the comma separated `Genre` field
    pub fn genres(&self) -> Vec<&str> {
        match self.genre.as_deref() {
            Some(genre) if !genre.is_empty() && genre != NOT_AVAILABLE => {
                genre.split(", ").collect()
            }
            _ => Vec::new(),
        }
    }

    /// IMDb rating as a number, if OMDb has one
    pub fn imdb_rating(&self) -> Option<f64> {
        self.imdb_rating.as_deref().and_then(|r| r.parse().ok())
    }

    /// Poster URL, or a placeholder when OMDb has none
    pub fn poster_url(&self) -> &str {
        poster_or_placeholder(self.poster.as_deref())
    }
}

fn poster_or_placeholder(poster: Option<&str>) -> &str {
    match poster {
        Some(url) if !url.is_empty() && url != NOT_AVAILABLE => url,
        _ => PLACEHOLDER_POSTER_URL,
    }
}
