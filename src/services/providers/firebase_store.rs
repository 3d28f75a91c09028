/// Firebase Realtime Database record store
///
/// Talks to the database over its REST API. Collections are fetched as JSON
/// and filtered server-side with `orderBy` plus one of `equalTo`,
/// `startAt`/`endAt` or `limitToLast`. Collections with dense integer keys
/// come back as arrays (with `null` holes), everything else as objects.
use crate::{
    error::{AppError, AppResult},
    models::{LinkRecord, MovieRecord, RatingEvent},
    services::providers::RecordStore,
};
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{cmp::Ordering, time::Duration};

const LINKS: &str = "links";
const MOVIES: &str = "movies";
const RATINGS: &str = "ratings";

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct FirebaseStore {
    http_client: HttpClient,
    database_url: String,
    auth: Option<String>,
    max_retries: u32,
}

/// Server-side filter applied to a collection read
#[derive(Debug, Clone, PartialEq)]
enum Filter {
    All,
    EqualTo(&'static str, Value),
    Range(&'static str, String, String),
    LimitToLast(&'static str, usize),
}

impl Filter {
    /// Query parameters in the form the REST API expects: keys and string
    /// values are JSON-encoded, so `orderBy="title"`.
    fn query_params(&self) -> Vec<(&'static str, String)> {
        match self {
            Filter::All => vec![],
            Filter::EqualTo(child, value) => vec![
                ("orderBy", json_string(child)),
                ("equalTo", value.to_string()),
            ],
            Filter::Range(child, start, end) => vec![
                ("orderBy", json_string(child)),
                ("startAt", json_string(start)),
                ("endAt", json_string(end)),
            ],
            Filter::LimitToLast(child, limit) => vec![
                ("orderBy", json_string(child)),
                ("limitToLast", limit.to_string()),
            ],
        }
    }

    /// Child the server filtered on, if any
    fn order_by(&self) -> Option<&'static str> {
        match self {
            Filter::All => None,
            Filter::EqualTo(child, _)
            | Filter::Range(child, ..)
            | Filter::LimitToLast(child, _) => Some(*child),
        }
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

impl FirebaseStore {
    pub fn new(
        http_client: HttpClient,
        database_url: String,
        auth: Option<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            http_client,
            database_url: database_url.trim_end_matches('/').to_string(),
            auth,
            max_retries,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}.json", self.database_url, collection)
    }

    fn record_url(&self, collection: &str, key: &str) -> String {
        format!(
            "{}/{}/{}.json",
            self.database_url,
            collection,
            urlencoding::encode(key)
        )
    }

    /// Sends a request, retrying transient failures with exponential backoff.
    ///
    /// Only idempotent verbs go through here, so a retried write cannot apply
    /// twice with a different outcome.
    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> AppResult<Response> {
        let mut attempt = 0;

        loop {
            let mut request = self.http_client.request(method.clone(), url).query(params);
            if let Some(auth) = &self.auth {
                request = request.query(&[("auth", auth)]);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let result = request.send().await;
            let transient = match &result {
                Ok(response) => is_transient_status(response.status()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if transient && attempt < self.max_retries {
                let delay = retry_delay(attempt);
                tracing::warn!(
                    method = %method,
                    url = %url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Transient record store failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let response = result?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ExternalApi(format!(
                    "Record store returned status {}: {}",
                    status, body
                )));
            }

            return Ok(response);
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: Filter,
    ) -> AppResult<Vec<(String, T)>> {
        let url = self.collection_url(collection);
        let response = self
            .send(Method::GET, &url, &filter.query_params(), None)
            .await?;

        let payload: Value = response.json().await?;
        let mut entries = collection_entries(payload);
        // The REST API filters but does not sort
        if let Some(child) = filter.order_by() {
            sort_by_child(&mut entries, child);
        }
        let records = decode_entries(collection, entries);

        tracing::debug!(
            collection = collection,
            filter = ?filter,
            records = records.len(),
            "Record store query completed"
        );

        Ok(records)
    }
}

/// Flattens a collection payload into `(key, value)` pairs
fn collection_entries(payload: Value) -> Vec<(String, Value)> {
    match payload {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Value::Null => vec![],
        other => {
            tracing::warn!(payload = %other, "Unexpected collection payload");
            vec![]
        }
    }
}

/// Stable sort on `child` using the database's value ordering. Ties keep key order.
fn sort_by_child(entries: &mut [(String, Value)], child: &str) {
    entries.sort_by(|(_, a), (_, b)| compare_values(a.get(child), b.get(child)));
}

/// Missing/null < false < true < numbers < strings < objects
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(false)) => 1,
            Some(Value::Bool(true)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

fn decode_entries<T: DeserializeOwned>(
    collection: &str,
    entries: Vec<(String, Value)>,
) -> Vec<(String, T)> {
    entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<T>(value) {
            Ok(record) => Some((key, record)),
            Err(e) => {
                tracing::warn!(
                    collection = collection,
                    key = %key,
                    error = %e,
                    "Skipping malformed record"
                );
                None
            }
        })
        .collect()
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn values<T>(records: Vec<(String, T)>) -> Vec<T> {
    records.into_iter().map(|(_, record)| record).collect()
}

#[async_trait::async_trait]
impl RecordStore for FirebaseStore {
    async fn links(&self) -> AppResult<Vec<LinkRecord>> {
        self.query(LINKS, Filter::All).await.map(values)
    }

    async fn movies_with_id(&self, movie_id: i64) -> AppResult<Vec<(String, MovieRecord)>> {
        self.query(MOVIES, Filter::EqualTo("movieid", Value::from(movie_id)))
            .await
    }

    async fn update_movie(&self, key: &str, movie: &MovieRecord) -> AppResult<()> {
        let body = serde_json::to_value(movie)
            .map_err(|e| AppError::Internal(format!("Movie serialization error: {}", e)))?;
        self.send(Method::PATCH, &self.record_url(MOVIES, key), &[], Some(&body))
            .await?;
        Ok(())
    }

    async fn catalog(&self) -> AppResult<Vec<MovieRecord>> {
        self.query(MOVIES, Filter::All).await.map(values)
    }

    async fn movies_by_title_range(&self, start: &str, end: &str) -> AppResult<Vec<MovieRecord>> {
        self.query(
            MOVIES,
            Filter::Range("title", start.to_string(), end.to_string()),
        )
        .await
        .map(values)
    }

    async fn last_ratings(&self, limit: usize) -> AppResult<Vec<RatingEvent>> {
        self.query(RATINGS, Filter::LimitToLast("rating", limit))
            .await
            .map(values)
    }

    async fn ratings_for_user(&self, user_id: &str) -> AppResult<Vec<RatingEvent>> {
        self.query(RATINGS, Filter::EqualTo("userid", Value::from(user_id)))
            .await
            .map(values)
    }

    async fn delete_rating(&self, key: &str) -> AppResult<()> {
        self.send(Method::DELETE, &self.record_url(RATINGS, key), &[], None)
            .await?;
        Ok(())
    }

    async fn put_rating(&self, key: &str, rating: &RatingEvent) -> AppResult<()> {
        let body = serde_json::to_value(rating)
            .map_err(|e| AppError::Internal(format!("Rating serialization error: {}", e)))?;
        self.send(Method::PUT, &self.record_url(RATINGS, key), &[], Some(&body))
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "firebase"
    }
}
