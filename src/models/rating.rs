use serde::{Deserialize, Serialize};

/// A single user's rating of a movie, stored under [`rating_key`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingEvent {
    pub userid: String,
    pub movieid: i64,
    pub rating: f64,
}

impl RatingEvent {
    pub fn key(&self) -> String {
        rating_key(&self.userid, self.movieid)
    }
}

/// Store key for a rating: user id immediately followed by the movie id.
pub fn rating_key(user_id: &str, movie_id: i64) -> String {
    format!("{}{}", user_id, movie_id)
}
