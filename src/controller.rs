//! Search controller driving one outstanding search at a time
//!
//! Every change of `(query, page)` cancels the previous request and starts a
//! new one on a background tokio task. State is published through a `watch`
//! channel so a front end can render whatever is current.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::data::{MovieSummary, OmdbClient};

/// Queries shorter than this (after trimming) are not sent to OMDb
pub const MIN_SEARCH_LENGTH: usize = 3;

/// What the search view should currently show
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchState {
    /// Nothing to search for yet
    #[default]
    Idle,
    /// A request is in flight
    Loading,
    /// The latest request succeeded
    Success {
        movies: Vec<MovieSummary>,
        total_results: u64,
    },
    /// The latest request failed with a user-facing message
    Failed { message: String },
}

impl SearchState {
    /// Movies to display; empty unless the last search succeeded
    pub fn movies(&self) -> &[MovieSummary] {
        match self {
            SearchState::Success { movies, .. } => movies,
            _ => &[],
        }
    }

    /// Total matches across all pages; 0 unless the last search succeeded
    pub fn total_results(&self) -> u64 {
        match self {
            SearchState::Success { total_results, .. } => *total_results,
            _ => 0,
        }
    }

    /// Error message to display, if the last search failed
    pub fn error(&self) -> Option<&str> {
        match self {
            SearchState::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SearchState::Loading)
    }
}

/// Drives searches for a changing `(query, page)` input
///
/// Only the most recent request may publish a result. Older requests are
/// cancelled when inputs change, and their tokens are checked under the
/// channel lock before anything is written, so a stale response can never
/// overwrite newer state. Dropping the controller cancels the active request.
pub struct SearchController {
    client: Arc<OmdbClient>,
    state_tx: Arc<watch::Sender<SearchState>>,
    /// Token of the request currently allowed to publish
    active: Option<CancellationToken>,
    /// Last inputs seen, to ignore repeated updates
    inputs: Option<(String, u32)>,
}

impl SearchController {
    /// Creates an idle controller searching through `client`
    pub fn new(client: Arc<OmdbClient>) -> Self {
        let (state_tx, _) = watch::channel(SearchState::Idle);
        Self {
            client,
            state_tx: Arc::new(state_tx),
            active: None,
            inputs: None,
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SearchState {
        self.state_tx.borrow().clone()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state_tx.subscribe()
    }

    /// Applies new inputs
    ///
    /// Does nothing if `(query, page)` is unchanged. Otherwise the previous
    /// request is cancelled, and a new one is started unless the trimmed
    /// query is shorter than [`MIN_SEARCH_LENGTH`]. Must be called from
    /// within a tokio runtime. Page 0 is treated as page 1.
    pub fn update(&mut self, query: &str, page: u32) {
        let query = query.trim();
        let page = page.max(1);
        if self
            .inputs
            .as_ref()
            .is_some_and(|(q, p)| q == query && *p == page)
        {
            return;
        }
        self.inputs = Some((query.to_string(), page));
        self.run();
    }

    /// Re-runs the search for the current inputs, e.g. after a failure
    pub fn refresh(&mut self) {
        self.run();
    }

    /// Cancels the active request and leaves the state as it is
    pub fn shutdown(&mut self) {
        if let Some(token) = self.active.take() {
            self.state_tx.send_if_modified(|_| {
                token.cancel();
                false
            });
        }
    }

    fn run(&mut self) {
        let previous = self.active.take();
        let Some((query, page)) = self.inputs.clone() else {
            return;
        };

        if query.chars().count() < MIN_SEARCH_LENGTH {
            self.state_tx.send_modify(|state| {
                if let Some(token) = previous {
                    token.cancel();
                }
                *state = SearchState::Idle;
            });
            return;
        }

        let token = CancellationToken::new();
        self.active = Some(token.clone());
        self.state_tx.send_modify(|state| {
            if let Some(token) = previous {
                token.cancel();
            }
            *state = SearchState::Loading;
        });

        let client = Arc::clone(&self.client);
        let state_tx = Arc::clone(&self.state_tx);

        tokio::spawn(async move {
            let outcome = client.search_movies(&query, page, &token).await;

            // Checked under the channel lock so a concurrent update's cancel
            // either happens before this check or after the write
            state_tx.send_if_modified(|state| {
                if token.is_cancelled() {
                    debug!("Discarding superseded search for {:?}", query);
                    return false;
                }

                match outcome {
                    Ok(result) => {
                        *state = SearchState::Success {
                            movies: result.movies,
                            total_results: result.total_results,
                        };
                    }
                    Err(e) if e.is_cancelled() => return false,
                    Err(e) => {
                        warn!("Search for {:?} failed: {}", query, e);
                        *state = SearchState::Failed {
                            message: e.to_string(),
                        };
                    }
                }
                true
            });
        });
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
