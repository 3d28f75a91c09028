use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{rating_key, MovieView, RatingEvent},
    services::{
        accounts::authenticate,
        catalog::{load_index, CatalogIndex},
        providers::{IdentityProvider, RecordStore},
    },
};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

/// Arithmetic mean, `None` when there is nothing to average
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Per-movie rating statistics for a window of ratings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// One view per distinct movie, in order of first appearance
    pub movies: Vec<MovieView>,
    /// Movie ids rated in the window but absent from the catalog
    pub missing: Vec<i64>,
}

/// Groups ratings by movie and joins each group against the catalog.
///
/// Movies that cannot be resolved are reported in `missing` rather than
/// emitted with partial fields.
pub fn aggregate_ratings(ratings: &[RatingEvent], catalog: &CatalogIndex) -> Aggregation {
    let mut order = Vec::new();
    let mut groups: HashMap<i64, Vec<f64>> = HashMap::new();

    for event in ratings {
        groups
            .entry(event.movieid)
            .or_insert_with(|| {
                order.push(event.movieid);
                Vec::new()
            })
            .push(event.rating);
    }

    let mut aggregation = Aggregation::default();
    for movie_id in order {
        let values = groups.remove(&movie_id).unwrap_or_default();
        match catalog.get(movie_id) {
            Some(movie) => {
                let rating = mean(&values);
                aggregation.movies.push(MovieView {
                    ratings: Some(values),
                    rating,
                    ..MovieView::from(movie)
                });
            }
            None => aggregation.missing.push(movie_id),
        }
    }

    aggregation
}

/// Rating statistics over the last `window` ratings
pub async fn top_rated_movies(store: &dyn RecordStore, window: usize) -> AppResult<Aggregation> {
    let ratings = store.last_ratings(window).await?;
    let catalog = load_index(store).await?;
    let aggregation = aggregate_ratings(&ratings, &catalog);

    if !aggregation.missing.is_empty() {
        tracing::warn!(
            missing = ?aggregation.missing,
            "Rated movies missing from catalog"
        );
    }

    tracing::info!(
        ratings = ratings.len(),
        movies = aggregation.movies.len(),
        "Top rated movies aggregated"
    );

    Ok(aggregation)
}

/// The caller's rated movies, each carrying the caller's own rating
pub async fn rated_movies(
    store: &dyn RecordStore,
    identity: &dyn IdentityProvider,
    token: Option<&str>,
) -> AppResult<Vec<MovieView>> {
    let user = authenticate(identity, token).await?;
    let ratings = store.ratings_for_user(&user.local_id).await?;
    let catalog = load_index(store).await?;

    let mut movies = Vec::with_capacity(ratings.len());
    for event in &ratings {
        match catalog.get(event.movieid) {
            Some(movie) => movies.push(MovieView {
                rating: Some(event.rating),
                ..MovieView::from(movie)
            }),
            None => tracing::warn!(
                user_id = %user.local_id,
                movie_id = event.movieid,
                "Rated movie missing from catalog"
            ),
        }
    }

    Ok(movies)
}

pub fn validate_rating(rating: f64) -> AppResult<()> {
    if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::InvalidInput(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

/// Records the caller's rating for a movie, replacing any earlier one.
///
/// The old record is deleted before the new one is written, so no field from
/// a previous record shape survives.
pub async fn rate_movie(
    store: &dyn RecordStore,
    identity: &dyn IdentityProvider,
    token: Option<&str>,
    movie_id: i64,
    rating: f64,
) -> AppResult<()> {
    let user = authenticate(identity, token).await?;
    validate_rating(rating)?;

    if store.movies_with_id(movie_id).await?.is_empty() {
        return Err(AppError::NotFound(format!("Movie {} not found", movie_id)));
    }

    let key = rating_key(&user.local_id, movie_id);
    let event = RatingEvent {
        userid: user.local_id,
        movieid: movie_id,
        rating,
    };

    store.delete_rating(&key).await?;
    store.put_rating(&key, &event).await?;

    tracing::info!(
        user_id = %event.userid,
        movie_id = movie_id,
        rating = rating,
        "Rating stored"
    );

    Ok(())
}
