//! autoposter-server - HTTP API for publishing, cleanup and statistics
//!
//! The router is built from an [`AppState`] holding the service facade, so
//! tests can drive it with mock clients and no network.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use libautoposter::AutoPosterService;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: AutoPosterService,
}

impl AppState {
    pub fn new(service: AutoPosterService) -> Self {
        Self { service }
    }
}

/// Build the API router
///
/// Listing, deletion, statistics and cleanup exist only for WordPress; the
/// other platforms have no such endpoints upstream.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/{platform}/post", post(handlers::publish))
        .route("/note/draft", post(handlers::note_draft))
        .route(
            "/wordpress/posts",
            get(handlers::list_posts).delete(handlers::delete_posts),
        )
        .route("/wordpress/stats/views", get(handlers::post_views))
        .route("/wordpress/stats/search-terms", get(handlers::search_terms))
        .route("/wordpress/cleanup", post(handlers::cleanup))
        .with_state(state)
}
