use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{
        CompleteResponse, MovieRecord, MovieView, MoviesResponse, ResultResponse, UserResponse,
    },
    services::{
        accounts::{self, Credentials},
        catalog, ratings, recommendations,
    },
};

use super::AppState;

/// Bearer token issued by the identity provider
pub const USER_TOKEN_HEADER: &str = "usertoken";
pub const USERNAME_HEADER: &str = "username";
pub const PASSWORD_HEADER: &str = "password";

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "searchText")]
    search_text: Option<String>,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn credentials(headers: &HeaderMap) -> AppResult<Credentials> {
    match (
        header_value(headers, USERNAME_HEADER),
        header_value(headers, PASSWORD_HEADER),
    ) {
        (Some(username), Some(password)) => Ok(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => Err(AppError::InvalidInput(
            "username and password headers are required".to_string(),
        )),
    }
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Merges the links collection into the movie catalog
pub async fn restructure_database(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<CompleteResponse>> {
    tracing::info!(request_id = %request_id, "Processing catalog restructure");

    let updated = catalog::restructure(state.store.as_ref()).await?;

    tracing::info!(request_id = %request_id, updated = updated, "Catalog restructure finished");
    Ok(Json(CompleteResponse { complete: true }))
}

/// Mean ratings for the movies in the recent rating window
pub async fn top_rated_movies(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<MoviesResponse<MovieView>>> {
    tracing::info!(
        request_id = %request_id,
        window = state.settings.top_rated_window,
        "Processing top rated request"
    );

    let aggregation =
        ratings::top_rated_movies(state.store.as_ref(), state.settings.top_rated_window).await?;

    Ok(Json(MoviesResponse {
        movies: aggregation.movies,
    }))
}

/// Title search
pub async fn search(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<MoviesResponse<MovieView>>> {
    let search_text = params
        .search_text
        .ok_or_else(|| AppError::InvalidInput("searchText is required".to_string()))?;

    tracing::info!(request_id = %request_id, search_text = %search_text, "Processing search request");

    let movies = catalog::search(state.store.as_ref(), &search_text).await?;
    Ok(Json(MoviesResponse { movies }))
}

/// Model recommendations for the caller
pub async fn recommended(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> AppResult<Json<MoviesResponse<MovieRecord>>> {
    tracing::info!(request_id = %request_id, "Processing recommendation request");

    let movies = recommendations::recommend_for_user(
        state.store.as_ref(),
        state.identity.as_ref(),
        state.model.as_ref(),
        header_value(&headers, USER_TOKEN_HEADER),
        state.settings.recommendation_count,
    )
    .await?;

    Ok(Json(MoviesResponse { movies }))
}

/// Movies the caller has rated
pub async fn rated_movies(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> AppResult<Json<MoviesResponse<MovieView>>> {
    tracing::info!(request_id = %request_id, "Processing rated movies request");

    let movies = ratings::rated_movies(
        state.store.as_ref(),
        state.identity.as_ref(),
        header_value(&headers, USER_TOKEN_HEADER),
    )
    .await?;

    Ok(Json(MoviesResponse { movies }))
}

/// Stores the caller's rating for a movie
pub async fn rate_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    path: Result<Path<(i64, f64)>, PathRejection>,
) -> AppResult<Json<ResultResponse>> {
    let Path((movie_id, rating)) = path.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    tracing::info!(
        request_id = %request_id,
        movie_id = movie_id,
        rating = rating,
        "Processing rating submission"
    );

    ratings::rate_movie(
        state.store.as_ref(),
        state.identity.as_ref(),
        header_value(&headers, USER_TOKEN_HEADER),
        movie_id,
        rating,
    )
    .await?;

    Ok(Json(ResultResponse::success()))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> AppResult<Json<UserResponse>> {
    let credentials = credentials(&headers)?;
    tracing::info!(request_id = %request_id, username = %credentials.username, "Processing login");

    let user = accounts::login(state.identity.as_ref(), &credentials).await?;
    Ok(Json(UserResponse { user }))
}

pub async fn create_account(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
) -> AppResult<Json<ResultResponse>> {
    let credentials = credentials(&headers)?;
    tracing::info!(request_id = %request_id, username = %credentials.username, "Processing account creation");

    accounts::create_account(state.identity.as_ref(), &credentials).await?;
    Ok(Json(ResultResponse::success()))
}
