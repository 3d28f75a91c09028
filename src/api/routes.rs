use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog maintenance and browsing
        .route("/restructureDatabase", get(handlers::restructure_database))
        .route("/topRatedMovies", get(handlers::top_rated_movies))
        .route("/search", get(handlers::search))
        // Per-user
        .route("/recommended", get(handlers::recommended))
        .route("/getRatedMovies", get(handlers::rated_movies))
        .route("/rateMovie/:movie_id/:rating", post(handlers::rate_movie))
        // Accounts
        .route("/login", post(handlers::login))
        .route("/createAccount", post(handlers::create_account))
        .with_state(state)
        .layer(
            // Request id first so the trace span can read it
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
