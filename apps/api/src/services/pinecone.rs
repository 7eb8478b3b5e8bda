use crate::{
    error::{ApiError, Result},
    models::{BookRecord, ScoredBook},
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Nearest-neighbour lookup over the book index.
#[async_trait]
pub trait BookIndex: Send + Sync {
    /// Returns up to `top_k` books in the order the index ranked them.
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredBook>>;
}

#[derive(Debug, Clone)]
pub struct PineconeClient {
    client: Client,
    index_host: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

impl PineconeClient {
    pub fn new(api_key: &str, index_host: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| ApiError::Config("Pinecone API key is not a valid header".to_string()))?;
        key.set_sensitive(true);
        headers.insert("Api-Key", key);
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        let index_host = if index_host.starts_with("http://") || index_host.starts_with("https://")
        {
            index_host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", index_host.trim_end_matches('/'))
        };

        Ok(Self { client, index_host })
    }
}

#[async_trait]
impl BookIndex for PineconeClient {
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredBook>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_values: false,
            include_metadata: true,
        };

        let response = self
            .client
            .post(format!("{}/query", self.index_host))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Search(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Pinecone query failed: {}", error_text);
            return Err(ApiError::Search(format!("HTTP {}: {}", status, error_text)));
        }

        let query_response: QueryResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Search(format!("invalid response: {}", e)))?;

        debug!(matches = query_response.matches.len(), "Pinecone query complete");

        let books = query_response
            .matches
            .into_iter()
            .filter_map(|m| {
                let Some(metadata) = m.metadata else {
                    warn!(id = %m.id, "Match has no metadata, skipping");
                    return None;
                };
                match serde_json::from_value::<BookRecord>(metadata) {
                    Ok(book) => Some(ScoredBook {
                        book,
                        score: m.score,
                    }),
                    Err(e) => {
                        warn!(id = %m.id, "Skipping match with unreadable metadata: {}", e);
                        None
                    }
                }
            })
            .collect();

        Ok(books)
    }
}
