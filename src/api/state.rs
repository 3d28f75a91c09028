use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::providers::{
    FirebaseAuth, FirebaseStore, IdentityProvider, ModelServer, RecommendationModel, RecordStore,
};

/// Tunables handlers need at request time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Ratings considered by /topRatedMovies
    pub top_rated_window: usize,
    /// Movies requested from the model per recommendation
    pub recommendation_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            top_rated_window: 2500,
            recommendation_count: 10,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            top_rated_window: config.top_rated_window,
            recommendation_count: config.recommendation_count,
        }
    }
}

/// Shared application state
///
/// Holds handles to the external collaborators only; there is no in-process
/// mutable state to coordinate.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub model: Arc<dyn RecommendationModel>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        model: Arc<dyn RecommendationModel>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            identity,
            model,
            settings,
        }
    }

    /// Builds the production collaborators from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let store = FirebaseStore::new(
            http_client.clone(),
            config.firebase_database_url.clone(),
            config.firebase_database_auth.clone(),
            config.store_max_retries,
        );
        let identity = FirebaseAuth::new(
            http_client.clone(),
            config.firebase_api_key.clone(),
            config.identity_url.clone(),
        );
        let model = ModelServer::new(http_client, config.model_url.clone());

        tracing::info!(
            store = store.name(),
            model_url = %config.model_url,
            "External collaborators configured"
        );

        Ok(Self::new(
            Arc::new(store),
            Arc::new(identity),
            Arc::new(model),
            Settings::from(config),
        ))
    }
}
