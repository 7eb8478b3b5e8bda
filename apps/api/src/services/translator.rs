use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Translates a user query into the language the book index was built in.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, query: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct TranslationRequest<'a> {
    queries: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    translations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TranslationClient {
    client: Client,
    url: String,
}

impl TranslationClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Translator for TranslationClient {
    async fn translate(&self, query: &str) -> Result<String> {
        let request = TranslationRequest { queries: [query] };

        debug!("Sending translation request");
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Translation(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Translation service error: {}", error_text);
            return Err(ApiError::Translation(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: TranslationResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Translation(format!("invalid response: {}", e)))?;

        body.translations
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Translation("response contained no translations".to_string()))
    }
}
