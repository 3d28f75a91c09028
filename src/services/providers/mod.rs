/// External collaborators
///
/// The service owns no durable state. Everything lives behind one of three
/// traits: the record store holding movies, links and ratings, the identity
/// provider that resolves bearer tokens, and the pre-trained recommendation
/// model. Handlers receive these as trait objects through `AppState`, so tests
/// can swap in mocks or in-memory fakes.
use crate::{
    error::AppResult,
    models::{AuthSession, Interaction, LinkRecord, MovieRecord, RatingEvent, ScoredMovie, UserIdentity},
};

pub mod firebase_auth;
pub mod firebase_store;
pub mod model_server;

pub use firebase_auth::FirebaseAuth;
pub use firebase_store::FirebaseStore;
pub use model_server::ModelServer;

/// Remote record store holding the `links`, `movies` and `ratings` collections
///
/// Writes are atomic per key only. Nothing here spans multiple keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// All link records
    async fn links(&self) -> AppResult<Vec<LinkRecord>>;

    /// Movie records whose `movieid` equals `movie_id`, with their store keys
    async fn movies_with_id(&self, movie_id: i64) -> AppResult<Vec<(String, MovieRecord)>>;

    /// Overwrites the fields of the movie stored under `key`
    async fn update_movie(&self, key: &str, movie: &MovieRecord) -> AppResult<()>;

    /// The complete catalog
    async fn catalog(&self) -> AppResult<Vec<MovieRecord>>;

    /// Movies whose title sorts within `[start, end]`
    async fn movies_by_title_range(&self, start: &str, end: &str) -> AppResult<Vec<MovieRecord>>;

    /// The last `limit` ratings in the store's ordering on the rating value
    async fn last_ratings(&self, limit: usize) -> AppResult<Vec<RatingEvent>>;

    /// Every rating submitted by `user_id`
    async fn ratings_for_user(&self, user_id: &str) -> AppResult<Vec<RatingEvent>>;

    async fn delete_rating(&self, key: &str) -> AppResult<()>;

    async fn put_rating(&self, key: &str, rating: &RatingEvent) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Identity provider validating credentials and bearer tokens
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer token to a stable user id.
    ///
    /// Invalid or expired tokens yield `AppError::Unauthorized`.
    async fn verify_token(&self, id_token: &str) -> AppResult<UserIdentity>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession>;

    async fn sign_up(&self, email: &str, password: &str) -> AppResult<()>;
}

/// Pre-trained recommendation model
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationModel: Send + Sync {
    /// Returns up to `k` movie ids ranked by relevance for a user with the
    /// given interaction history. Order is significant.
    async fn recommend(&self, interactions: &[Interaction], k: usize) -> AppResult<Vec<ScoredMovie>>;
}
