use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{MovieRecord, MovieView},
    services::providers::RecordStore,
};

/// Upper bound appended to a search string to turn it into a title range.
/// Private-use codepoint, sorts after nearly every character in real titles.
pub const TITLE_RANGE_SUFFIX: char = '\u{f8ff}';

/// Catalog lookup by movie id
///
/// Built once per request from the full catalog. When several records share
/// a movie id, the first one seen wins.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    movies: HashMap<i64, MovieRecord>,
}

impl CatalogIndex {
    pub fn new(movies: Vec<MovieRecord>) -> Self {
        movies.into_iter().collect()
    }

    pub fn get(&self, movie_id: i64) -> Option<&MovieRecord> {
        self.movies.get(&movie_id)
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }
}

impl FromIterator<MovieRecord> for CatalogIndex {
    fn from_iter<I: IntoIterator<Item = MovieRecord>>(iter: I) -> Self {
        let mut movies = HashMap::new();
        for movie in iter {
            movies.entry(movie.movieid).or_insert(movie);
        }
        Self { movies }
    }
}

/// Fetches the full catalog and indexes it
pub async fn load_index(store: &dyn RecordStore) -> AppResult<CatalogIndex> {
    let index = CatalogIndex::new(store.catalog().await?);
    tracing::debug!(movies = index.len(), store = store.name(), "Catalog index built");
    Ok(index)
}

/// Denormalizes `links` into `movies`.
///
/// Every movie sharing a link's id is overwritten with the merged record.
/// Writes are per key, so a failure partway through leaves the earlier
/// records merged and the rest untouched. Returns the number of records
/// written.
pub async fn restructure(store: &dyn RecordStore) -> AppResult<usize> {
    let links = store.links().await?;
    let mut updated = 0;

    for link in &links {
        let movies = store.movies_with_id(link.movieid).await?;
        for (key, movie) in movies {
            let merged = movie.merged_with(link);
            store.update_movie(&key, &merged).await?;
            updated += 1;
        }
    }

    tracing::info!(
        links = links.len(),
        updated = updated,
        "Catalog restructure completed"
    );

    Ok(updated)
}

/// Inclusive title range approximating a "starts with" match
pub fn title_range(search_text: &str) -> (String, String) {
    let mut end = String::with_capacity(search_text.len() + TITLE_RANGE_SUFFIX.len_utf8());
    end.push_str(search_text);
    end.push(TITLE_RANGE_SUFFIX);
    (search_text.to_string(), end)
}

fn in_title_range(title: &str, start: &str, end: &str) -> bool {
    title >= start && title <= end
}

/// Searches the catalog for titles in the range starting at `search_text`.
///
/// This is a case-sensitive range filter, not a true prefix match. Empty text
/// yields `["", "\u{f8ff}"]`, which matches every title starting below U+F8FF.
pub async fn search(store: &dyn RecordStore, search_text: &str) -> AppResult<Vec<MovieView>> {
    let (start, end) = title_range(search_text);
    let mut movies = store.movies_by_title_range(&start, &end).await?;
    movies.retain(|movie| in_title_range(&movie.title, &start, &end));
    movies.sort_by(|a, b| a.title.cmp(&b.title));

    tracing::info!(
        search_text = %search_text,
        results = movies.len(),
        "Title search completed"
    );

    Ok(movies.iter().map(MovieView::from).collect())
}
