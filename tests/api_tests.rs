use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::Value;

use movie_rec_api::{
    api::{create_router, AppState, Settings},
    error::{AppError, AppResult},
    models::{
        AuthSession, Interaction, LinkRecord, MovieRecord, RatingEvent, ScoredMovie, UserIdentity,
    },
    services::providers::{IdentityProvider, RecommendationModel, RecordStore},
};

// ============================================================================
// In-memory collaborators
// ============================================================================

#[derive(Default)]
struct StoreData {
    links: Vec<LinkRecord>,
    movies: Vec<(String, MovieRecord)>,
    ratings: BTreeMap<String, RatingEvent>,
    writes: usize,
}

#[derive(Default, Clone)]
struct InMemoryStore {
    data: Arc<Mutex<StoreData>>,
}

impl InMemoryStore {
    fn with_catalog(movies: Vec<MovieRecord>, links: Vec<LinkRecord>) -> Self {
        let store = Self::default();
        {
            let mut data = store.data.lock().unwrap();
            data.movies = movies
                .into_iter()
                .enumerate()
                .map(|(i, movie)| (i.to_string(), movie))
                .collect();
            data.links = links;
        }
        store
    }

    fn insert_rating(&self, event: RatingEvent) {
        let mut data = self.data.lock().unwrap();
        data.ratings.insert(event.key(), event);
    }

    fn ratings(&self) -> Vec<RatingEvent> {
        self.data.lock().unwrap().ratings.values().cloned().collect()
    }

    fn movies(&self) -> Vec<MovieRecord> {
        let data = self.data.lock().unwrap();
        data.movies.iter().map(|(_, movie)| movie.clone()).collect()
    }

    fn writes(&self) -> usize {
        self.data.lock().unwrap().writes
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryStore {
    async fn links(&self) -> AppResult<Vec<LinkRecord>> {
        Ok(self.data.lock().unwrap().links.clone())
    }

    async fn movies_with_id(&self, movie_id: i64) -> AppResult<Vec<(String, MovieRecord)>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .movies
            .iter()
            .filter(|(_, movie)| movie.movieid == movie_id)
            .cloned()
            .collect())
    }

    async fn update_movie(&self, key: &str, movie: &MovieRecord) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        data.writes += 1;
        match data.movies.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => {
                *existing = movie.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(key.to_string())),
        }
    }

    async fn catalog(&self) -> AppResult<Vec<MovieRecord>> {
        Ok(self.movies())
    }

    async fn movies_by_title_range(&self, start: &str, end: &str) -> AppResult<Vec<MovieRecord>> {
        Ok(self
            .movies()
            .into_iter()
            .filter(|movie| movie.title.as_str() >= start && movie.title.as_str() <= end)
            .collect())
    }

    async fn last_ratings(&self, limit: usize) -> AppResult<Vec<RatingEvent>> {
        let mut ratings = self.ratings();
        ratings.sort_by(|a, b| a.rating.total_cmp(&b.rating));
        let skip = ratings.len().saturating_sub(limit);
        Ok(ratings.into_iter().skip(skip).collect())
    }

    async fn ratings_for_user(&self, user_id: &str) -> AppResult<Vec<RatingEvent>> {
        Ok(self
            .ratings()
            .into_iter()
            .filter(|event| event.userid == user_id)
            .collect())
    }

    async fn delete_rating(&self, key: &str) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        data.writes += 1;
        data.ratings.remove(key);
        Ok(())
    }

    async fn put_rating(&self, key: &str, rating: &RatingEvent) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        data.writes += 1;
        data.ratings.insert(key.to_string(), rating.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// Accepts `token-<uid>` bearer tokens and `<email>`/`password` credentials
#[derive(Default)]
struct StaticIdentity {
    accounts: Mutex<HashMap<String, String>>,
}

#[async_trait::async_trait]
impl IdentityProvider for StaticIdentity {
    async fn verify_token(&self, id_token: &str) -> AppResult<UserIdentity> {
        id_token
            .strip_prefix("token-")
            .map(|uid| UserIdentity {
                local_id: uid.to_string(),
            })
            .ok_or_else(|| AppError::Unauthorized("INVALID_ID_TOKEN".to_string()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some(stored) if stored == password => Ok(AuthSession {
                local_id: format!("uid-{}", email),
                email: Some(email.to_string()),
                display_name: None,
                id_token: format!("token-uid-{}", email),
                refresh_token: Some("refresh".to_string()),
                expires_in: Some("3600".to_string()),
                registered: Some(true),
            }),
            Some(_) => Err(AppError::Unauthorized("INVALID_PASSWORD".to_string())),
            None => Err(AppError::Unauthorized("EMAIL_NOT_FOUND".to_string())),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> AppResult<()> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(AppError::InvalidInput("EMAIL_EXISTS".to_string()));
        }
        accounts.insert(email.to_string(), password.to_string());
        Ok(())
    }
}

/// Returns a fixed ranking and remembers what it was asked
#[derive(Default)]
struct FixedModel {
    ranking: Vec<ScoredMovie>,
    fail: bool,
    seen: Mutex<Vec<Interaction>>,
}

#[async_trait::async_trait]
impl RecommendationModel for FixedModel {
    async fn recommend(&self, interactions: &[Interaction], k: usize) -> AppResult<Vec<ScoredMovie>> {
        if self.fail {
            return Err(AppError::ExternalApi(
                "model server returned 500: Traceback (most recent call last)".to_string(),
            ));
        }
        *self.seen.lock().unwrap() = interactions.to_vec();
        Ok(self.ranking.iter().take(k).copied().collect())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn movie(movieid: i64, title: &str) -> MovieRecord {
    MovieRecord {
        movieid,
        title: title.to_string(),
        imdbid: None,
        tmdbid: None,
        genres: Some("Drama".to_string()),
    }
}

fn catalog() -> Vec<MovieRecord> {
    vec![
        movie(1, "Toy Story (1995)"),
        movie(2, "Jumanji (1995)"),
        movie(3, "A Toy Story"),
        movie(4, "Toy Story 2 (1999)"),
        movie(5, "Heat (1995)"),
    ]
}

fn rating(userid: &str, movieid: i64, value: f64) -> RatingEvent {
    RatingEvent {
        userid: userid.to_string(),
        movieid,
        rating: value,
    }
}

fn header(name: &str, value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_bytes(name.as_bytes()).unwrap(),
        HeaderValue::from_str(value).unwrap(),
    )
}

fn create_test_server_with(store: InMemoryStore, model: FixedModel) -> TestServer {
    let state = AppState::new(
        Arc::new(store),
        Arc::new(StaticIdentity::default()),
        Arc::new(model),
        Settings::default(),
    );
    TestServer::new(create_router(state)).unwrap()
}

fn create_test_server(store: InMemoryStore) -> TestServer {
    create_test_server_with(store, FixedModel::default())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(InMemoryStore::default());
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_request_id_echoed() {
    let server = create_test_server(InMemoryStore::default());
    let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
    let (name, value) = header("x-request-id", id);

    let response = server.get("/health").add_header(name, value).await;
    assert_eq!(response.header("x-request-id"), id);
}

#[tokio::test]
async fn test_top_rated_movies_aggregates_window() {
    let store = InMemoryStore::with_catalog(catalog(), vec![]);
    store.insert_rating(rating("a", 1, 5.0));
    store.insert_rating(rating("b", 1, 4.0));
    store.insert_rating(rating("a", 5, 3.0));
    store.insert_rating(rating("c", 404, 2.0));
    let server = create_test_server(store);

    let response = server.get("/topRatedMovies").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let movies = body["Movies"].as_array().unwrap();
    assert_eq!(movies.len(), 2);

    let toy_story = movies.iter().find(|m| m["movieid"] == 1).unwrap();
    assert_eq!(toy_story["rating"], 4.5);
    assert_eq!(toy_story["ratings"].as_array().unwrap().len(), 2);
    assert_eq!(toy_story["title"], "Toy Story (1995)");
}

#[tokio::test]
async fn test_search_is_range_not_substring() {
    let server = create_test_server(InMemoryStore::with_catalog(catalog(), vec![]));

    let response = server.get("/search").add_query_param("searchText", "Toy").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let titles: Vec<&str> = body["Movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Toy Story (1995)", "Toy Story 2 (1999)"]);
    assert!(body["Movies"][0]["rating"].is_null());
}

#[tokio::test]
async fn test_search_with_empty_text_matches_whole_range() {
    let server = create_test_server(InMemoryStore::with_catalog(catalog(), vec![]));

    let response = server.get("/search").add_query_param("searchText", "").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let titles: Vec<&str> = body["Movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec![
            "A Toy Story",
            "Heat (1995)",
            "Jumanji (1995)",
            "Toy Story (1995)",
            "Toy Story 2 (1999)"
        ]
    );
}

#[tokio::test]
async fn test_search_without_text_is_bad_request() {
    let server = create_test_server(InMemoryStore::with_catalog(catalog(), vec![]));
    let response = server.get("/search").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rating_last_write_wins() {
    let store = InMemoryStore::with_catalog(catalog(), vec![]);
    let server = create_test_server(store.clone());

    for value in ["2", "4.5"] {
        let (name, token) = header("userToken", "token-u1");
        let response = server
            .post(&format!("/rateMovie/1/{}", value))
            .add_header(name, token)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["Result"], "success");
    }

    let stored = store.ratings();
    assert_eq!(stored, vec![rating("u1", 1, 4.5)]);
    assert_eq!(stored[0].key(), "u11");
}

#[tokio::test]
async fn test_rating_with_invalid_token_writes_nothing() {
    let store = InMemoryStore::with_catalog(catalog(), vec![]);
    let server = create_test_server(store.clone());

    let (name, token) = header("userToken", "forged");
    let response = server.post("/rateMovie/1/4").add_header(name, token).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["Message"], "INVALID_ID_TOKEN");
    assert!(store.ratings().is_empty());
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_rating_unknown_movie_is_not_found() {
    let store = InMemoryStore::with_catalog(catalog(), vec![]);
    let server = create_test_server(store.clone());

    let (name, token) = header("userToken", "token-u1");
    let response = server.post("/rateMovie/999/4").add_header(name, token).await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_rating_with_malformed_path_is_bad_request() {
    let server = create_test_server(InMemoryStore::with_catalog(catalog(), vec![]));

    let (name, token) = header("userToken", "token-u1");
    let response = server
        .post("/rateMovie/toy-story/4")
        .add_header(name, token)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rated_movies_for_user() {
    let store = InMemoryStore::with_catalog(catalog(), vec![]);
    store.insert_rating(rating("u1", 2, 3.5));
    store.insert_rating(rating("u2", 5, 1.0));
    let server = create_test_server(store);

    let (name, token) = header("userToken", "token-u1");
    let response = server.get("/getRatedMovies").add_header(name, token).await;
    response.assert_status_ok();

    let body: Value = response.json();
    let movies = body["Movies"].as_array().unwrap();
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0]["title"], "Jumanji (1995)");
    assert_eq!(movies[0]["rating"], 3.5);
}

#[tokio::test]
async fn test_recommendations_preserve_model_order() {
    let store = InMemoryStore::with_catalog(catalog(), vec![]);
    store.insert_rating(rating("u1", 1, 5.0));
    store.insert_rating(rating("u1", 2, 3.0));

    let model = Arc::new(FixedModel {
        ranking: vec![
            ScoredMovie {
                movie_id: 5,
                score: 0.9,
            },
            ScoredMovie {
                movie_id: 77,
                score: 0.8,
            },
            ScoredMovie {
                movie_id: 4,
                score: 0.7,
            },
        ],
        ..FixedModel::default()
    });
    let state = AppState::new(
        Arc::new(store),
        Arc::new(StaticIdentity::default()),
        model.clone(),
        Settings::default(),
    );
    let server = TestServer::new(create_router(state)).unwrap();

    let (name, token) = header("userToken", "token-u1");
    let response = server.get("/recommended").add_header(name, token).await;
    response.assert_status_ok();

    let body: Value = response.json();
    let ids: Vec<i64> = body["Movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["movieid"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![5, 4]);

    let mut seen = model.seen.lock().unwrap().clone();
    seen.sort_by_key(|i| i.movie_id);
    assert_eq!(
        seen,
        vec![
            Interaction {
                movie_id: 1,
                rating: 5.0
            },
            Interaction {
                movie_id: 2,
                rating: 3.0
            },
        ]
    );
}

#[tokio::test]
async fn test_recommendations_model_failure_is_bad_gateway() {
    let server = create_test_server_with(
        InMemoryStore::with_catalog(catalog(), vec![]),
        FixedModel {
            fail: true,
            ..FixedModel::default()
        },
    );

    let (name, token) = header("userToken", "token-u1");
    let response = server.get("/recommended").add_header(name, token).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["Message"], "Upstream service error");
}

#[tokio::test]
async fn test_recommendations_without_token_unauthorized() {
    let server = create_test_server(InMemoryStore::with_catalog(catalog(), vec![]));
    let response = server.get("/recommended").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_restructure_is_idempotent() {
    let mut movies = catalog();
    movies.push(movie(1, "Toy Story (1995)"));
    let links = vec![
        LinkRecord {
            movieid: 1,
            imdbid: Some("114709".to_string()),
            tmdbid: Some("862".to_string()),
        },
        LinkRecord {
            movieid: 5,
            imdbid: Some("113277".to_string()),
            tmdbid: None,
        },
    ];
    let store = InMemoryStore::with_catalog(movies, links);
    let server = create_test_server(store.clone());

    let response = server.get("/restructureDatabase").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["complete"], true);

    let after_first = store.movies();
    let merged: Vec<&MovieRecord> = after_first.iter().filter(|m| m.movieid == 1).collect();
    assert_eq!(merged.len(), 2);
    assert!(merged.iter().all(|m| m.imdbid.as_deref() == Some("114709")));
    assert_eq!(
        after_first.iter().find(|m| m.movieid == 5).unwrap().imdbid.as_deref(),
        Some("113277")
    );

    server.get("/restructureDatabase").await.assert_status_ok();
    assert_eq!(store.movies(), after_first);
}

#[tokio::test]
async fn test_account_flow() {
    let server = create_test_server(InMemoryStore::default());
    let credentials = || {
        vec![
            header("username", "viewer@example.com"),
            header("password", "popcorn1"),
        ]
    };

    let mut request = server.post("/createAccount");
    for (name, value) in credentials() {
        request = request.add_header(name, value);
    }
    let response = request.await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["Result"], "success");

    let mut request = server.post("/createAccount");
    for (name, value) in credentials() {
        request = request.add_header(name, value);
    }
    let response = request.await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["Message"], "EMAIL_EXISTS");

    let mut request = server.post("/login");
    for (name, value) in credentials() {
        request = request.add_header(name, value);
    }
    let response = request.await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["User"]["email"], "viewer@example.com");
    assert_eq!(body["User"]["idToken"], "token-uid-viewer@example.com");
}

#[tokio::test]
async fn test_login_wrong_password_unauthorized() {
    let server = create_test_server(InMemoryStore::default());

    let (user, email) = header("username", "nobody@example.com");
    let (pass, secret) = header("password", "wrong");
    let response = server
        .post("/login")
        .add_header(user, email)
        .add_header(pass, secret)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["Message"], "EMAIL_NOT_FOUND");
}

#[tokio::test]
async fn test_login_missing_headers_bad_request() {
    let server = create_test_server(InMemoryStore::default());
    let response = server.post("/login").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
