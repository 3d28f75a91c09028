use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A catalog entry from the `movies` collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieRecord {
    pub movieid: i64,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_external_id")]
    pub imdbid: Option<String>,
    #[serde(default, deserialize_with = "deserialize_external_id")]
    pub tmdbid: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
}

/// An entry from the `links` collection mapping a movie to its external ids
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkRecord {
    pub movieid: i64,
    #[serde(default, deserialize_with = "deserialize_external_id")]
    pub imdbid: Option<String>,
    #[serde(default, deserialize_with = "deserialize_external_id")]
    pub tmdbid: Option<String>,
}

impl MovieRecord {
    /// Merges the external ids of `link` into this record.
    ///
    /// Title and genres come from the movie, ids come from the link.
    pub fn merged_with(&self, link: &LinkRecord) -> MovieRecord {
        MovieRecord {
            movieid: link.movieid,
            title: self.title.clone(),
            imdbid: link.imdbid.clone(),
            tmdbid: link.tmdbid.clone(),
            genres: self.genres.clone(),
        }
    }
}

/// Movie as returned to clients, optionally carrying rating statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieView {
    pub title: String,
    pub imdbid: Option<String>,
    pub tmdbid: Option<String>,
    pub movieid: i64,
    pub ratings: Option<Vec<f64>>,
    pub rating: Option<f64>,
}

impl From<&MovieRecord> for MovieView {
    fn from(movie: &MovieRecord) -> Self {
        Self {
            title: movie.title.clone(),
            imdbid: movie.imdbid.clone(),
            tmdbid: movie.tmdbid.clone(),
            movieid: movie.movieid,
            ratings: None,
            rating: None,
        }
    }
}

/// External ids were imported from CSV and live in the store as either
/// strings or numbers (integral floats included). Normalise to a string.
fn deserialize_external_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i.to_string()))
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()) {
                Ok(Some(format!("{}", f as i64)))
            } else {
                Ok(Some(n.to_string()))
            }
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number for external id, got {}",
            other
        ))),
    }
}
