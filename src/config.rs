use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Firebase Realtime Database root URL (e.g. https://<project>.firebaseio.com)
    pub firebase_database_url: String,

    /// Web API key used for the Identity Toolkit endpoints
    pub firebase_api_key: String,

    /// Optional database secret or token appended as `auth=` to store requests
    #[serde(default)]
    pub firebase_database_auth: Option<String>,

    /// Identity Toolkit base URL
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    /// Recommendation model server base URL
    #[serde(default = "default_model_url")]
    pub model_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of ratings considered by /topRatedMovies
    #[serde(default = "default_top_rated_window")]
    pub top_rated_window: usize,

    /// Number of movies requested from the model per recommendation
    #[serde(default = "default_recommendation_count")]
    pub recommendation_count: usize,

    /// Timeout applied to every outbound HTTP request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Retries for transient record store failures
    #[serde(default = "default_store_max_retries")]
    pub store_max_retries: u32,
}

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_model_url() -> String {
    "http://localhost:8500".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_top_rated_window() -> usize {
    2500
}

fn default_recommendation_count() -> usize {
    10
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_store_max_retries() -> u32 {
    2
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of key/value pairs
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
