use serde::{Deserialize, Serialize};

pub mod movie;
pub mod rating;

pub use movie::{LinkRecord, MovieRecord, MovieView};
pub use rating::{rating_key, RatingEvent};

// ============================================================================
// Recommendation Model Types
// ============================================================================

/// One (movie, rating) pair describing a user's past preference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub movie_id: i64,
    pub rating: f64,
}

impl From<&RatingEvent> for Interaction {
    fn from(event: &RatingEvent) -> Self {
        Self {
            movie_id: event.movieid,
            rating: event.rating,
        }
    }
}

/// A recommended movie id with the model's relevance score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMovie {
    pub movie_id: i64,
    pub score: f64,
}

// ============================================================================
// Identity Provider Types
// ============================================================================

/// Session returned by the identity provider after a password sign-in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<String>,
    #[serde(default)]
    pub registered: Option<bool>,
}

/// Identity resolved from a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub local_id: String,
}

// ============================================================================
// Response Envelopes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MoviesResponse<T> {
    #[serde(rename = "Movies")]
    pub movies: Vec<T>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    #[serde(rename = "Result")]
    pub result: String,
}

impl ResultResponse {
    pub fn success() -> Self {
        Self {
            result: "success".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    #[serde(rename = "User")]
    pub user: AuthSession,
}
