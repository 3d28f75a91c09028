/// Firebase Authentication provider
///
/// Uses the Identity Toolkit REST endpoints:
/// 1. Token lookup: /v1/accounts:lookup → resolves an ID token to a `localId`
/// 2. Sign in: /v1/accounts:signInWithPassword → returns a session
/// 3. Sign up: /v1/accounts:signUp
///
/// Rejections come back as `{"error": {"code": 400, "message": "REASON"}}`.
/// The reason code is passed on to the client; anything else is treated as an
/// upstream failure.
use crate::{
    error::{AppError, AppResult},
    models::{AuthSession, UserIdentity},
    services::providers::IdentityProvider,
};
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

#[derive(Clone)]
pub struct FirebaseAuth {
    http_client: HttpClient,
    api_key: String,
    identity_url: String,
}

/// Result of a call the provider answered, successfully or not
#[derive(Debug)]
enum Reply<T> {
    Accepted(T),
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

impl FirebaseAuth {
    pub fn new(http_client: HttpClient, api_key: String, identity_url: String) -> Self {
        Self {
            http_client,
            api_key,
            identity_url: identity_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/v1/accounts:{}", self.identity_url, endpoint)
    }

    async fn call<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> AppResult<Reply<T>> {
        let response = self
            .http_client
            .post(self.endpoint_url(endpoint))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let payload = serde_json::from_str(&text).map_err(|e| {
                AppError::ExternalApi(format!(
                    "Failed to parse identity provider response from {}: {}",
                    endpoint, e
                ))
            })?;
            return Ok(Reply::Accepted(payload));
        }

        if status.is_client_error() {
            if let Some(reason) = rejection_reason(&text) {
                return Ok(Reply::Rejected(reason));
            }
        }

        Err(AppError::ExternalApi(format!(
            "Identity provider returned status {}: {}",
            status, text
        )))
    }
}

fn rejection_reason(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn verify_token(&self, id_token: &str) -> AppResult<UserIdentity> {
        if id_token.trim().is_empty() {
            return Err(AppError::Unauthorized("Missing user token".to_string()));
        }

        let reply: Reply<LookupResponse> = self
            .call("lookup", json!({ "idToken": id_token }))
            .await?;

        match reply {
            Reply::Accepted(lookup) => lookup
                .users
                .into_iter()
                .next()
                .map(|user| UserIdentity {
                    local_id: user.local_id,
                })
                .ok_or_else(|| AppError::Unauthorized("USER_NOT_FOUND".to_string())),
            Reply::Rejected(reason) => Err(AppError::Unauthorized(reason)),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let reply = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        match reply {
            Reply::Accepted(session) => Ok(session),
            Reply::Rejected(reason) => Err(AppError::Unauthorized(reason)),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> AppResult<()> {
        let reply: Reply<Value> = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        match reply {
            Reply::Accepted(_) => Ok(()),
            Reply::Rejected(reason) => Err(AppError::InvalidInput(reason)),
        }
    }
}
