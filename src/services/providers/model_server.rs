/// Client for the pre-trained recommendation model
///
/// The model is served out of process. One endpoint takes a user's
/// interaction history and returns ranked movie ids:
///
/// POST /recommend  {"interactions": [{"movieId": 1, "rating": 5.0}], "k": 10}
///   → {"recommendations": [{"movieId": 260, "score": 0.93}, ...]}
use crate::{
    error::{AppError, AppResult},
    models::{Interaction, ScoredMovie},
    services::providers::RecommendationModel,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct ModelServer {
    http_client: HttpClient,
    model_url: String,
}

#[derive(Debug, Serialize)]
struct RecommendRequest<'a> {
    interactions: &'a [Interaction],
    k: usize,
}

#[derive(Debug, Deserialize)]
struct RecommendResponse {
    recommendations: Vec<ScoredMovie>,
}

impl ModelServer {
    pub fn new(http_client: HttpClient, model_url: String) -> Self {
        Self {
            http_client,
            model_url: model_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl RecommendationModel for ModelServer {
    async fn recommend(&self, interactions: &[Interaction], k: usize) -> AppResult<Vec<ScoredMovie>> {
        let url = format!("{}/recommend", self.model_url);

        let response = self
            .http_client
            .post(&url)
            .json(&RecommendRequest { interactions, k })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Model server returned status {}: {}",
                status, body
            )));
        }

        let response_text = response.text().await?;
        let parsed: RecommendResponse = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                response = %response_text,
                "Failed to deserialize model response"
            );
            AppError::ExternalApi(format!("Failed to parse model response: {}", e))
        })?;

        tracing::info!(
            interactions = interactions.len(),
            recommendations = parsed.recommendations.len(),
            "Model recommendations received"
        );

        Ok(parsed.recommendations)
    }
}
