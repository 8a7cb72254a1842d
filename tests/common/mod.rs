//! Fake OMDb server shared by the integration tests
//!
//! The `s` or `i` parameter picks the behavior, so each test can provoke a
//! specific response. Every request is counted and its search text recorded.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

/// How long the `slowquery` search takes to answer
pub const SLOW_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Default)]
struct FakeState {
    hits: Arc<AtomicUsize>,
    searches: Arc<Mutex<Vec<String>>>,
}

/// Handle to a running fake server
pub struct FakeOmdb {
    pub addr: SocketAddr,
    state: FakeState,
}

impl FakeOmdb {
    /// Starts the server on an ephemeral local port
    pub async fn start() -> Self {
        let state = FakeState::default();
        let app = Router::new()
            .route("/", get(handle))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake OMDb");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake OMDb crashed");
        });

        Self { addr, state }
    }

    /// Base URL to hand to the client
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Number of requests received so far
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Decoded `s` parameters received so far, in arrival order
    pub fn searches(&self) -> Vec<String> {
        self.state.searches.lock().unwrap().clone()
    }
}

async fn handle(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    if params.get("apikey").map(String::as_str) == Some("") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"Response": "False", "Error": "No API key provided."})),
        )
            .into_response();
    }

    if let Some(query) = params.get("s") {
        state.searches.lock().unwrap().push(query.clone());
        return search(query).await;
    }

    match params.get("i").map(String::as_str) {
        Some("tt404") => Json(json!({"Response": "False", "Error": "Incorrect IMDb ID."}))
            .into_response(),
        Some(id) => Json(json!({
            "Title": format!("Movie {}", id),
            "Year": "2005",
            "Runtime": "140 min",
            "Genre": "Action, Drama",
            "imdbRating": "8.2",
            "imdbID": id,
            "Response": "True"
        }))
        .into_response(),
        None => (StatusCode::BAD_REQUEST, "missing parameter").into_response(),
    }
}

async fn search(query: &str) -> Response {
    match query {
        "ratelimited" => StatusCode::TOO_MANY_REQUESTS.into_response(),
        "forbidden" => StatusCode::FORBIDDEN.into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "garbled" => "<html>not json</html>".into_response(),
        "nothing" => Json(json!({"Response": "False", "Error": "Movie not found!"})).into_response(),
        _ => {
            if query == "slowquery" {
                tokio::time::sleep(SLOW_DELAY).await;
            }
            Json(json!({
                "Search": [{"imdbID": format!("tt-{}", query), "Title": query, "Year": "2024", "Type": "movie"}],
                "totalResults": "42",
                "Response": "True"
            }))
            .into_response()
        }
    }
}
