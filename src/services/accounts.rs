use crate::{
    error::{AppError, AppResult},
    models::{AuthSession, UserIdentity},
    services::providers::IdentityProvider,
};

/// Email/password pair supplied by the client
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn validate(&self) -> AppResult<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves the caller's bearer token to a user identity
pub async fn authenticate(
    identity: &dyn IdentityProvider,
    token: Option<&str>,
) -> AppResult<UserIdentity> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing user token".to_string()))?;

    identity.verify_token(token).await
}

pub async fn login(
    identity: &dyn IdentityProvider,
    credentials: &Credentials,
) -> AppResult<AuthSession> {
    credentials.validate()?;
    let session = identity
        .sign_in(&credentials.username, &credentials.password)
        .await?;

    tracing::info!(user_id = %session.local_id, "User signed in");
    Ok(session)
}

pub async fn create_account(
    identity: &dyn IdentityProvider,
    credentials: &Credentials,
) -> AppResult<()> {
    credentials.validate()?;
    identity
        .sign_up(&credentials.username, &credentials.password)
        .await?;

    tracing::info!(username = %credentials.username, "Account created");
    Ok(())
}
