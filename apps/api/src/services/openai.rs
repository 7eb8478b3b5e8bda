//! OpenAI-compatible client for embeddings and streamed chat completions.

use crate::{
    config::Secret,
    error::{ApiError, Result},
};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Turns texts into embedding vectors, one per input in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A finite, single-pass sequence of generated text chunks.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Generates text for a prompt, yielding it incrementally.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<TextStream>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: Secret,
    base_url: String,
    embedding_model: String,
    embedding_dimensions: usize,
    completion_model: String,
    system_prompt: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        embedding_model: &str,
        embedding_dimensions: usize,
        completion_model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: Secret::new(api_key),
            base_url: base_url.trim_end_matches('/').to_string(),
            embedding_model: embedding_model.to_string(),
            embedding_dimensions,
            completion_model: completion_model.to_string(),
            system_prompt: crate::services::prompt::SYSTEM_PROMPT.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            input: texts,
            model: &self.embedding_model,
            dimensions: self.embedding_dimensions,
        };

        debug!(count = texts.len(), model = %self.embedding_model, "Requesting embeddings");
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Embedding(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "OpenAI embedding error: {}", error_text);
            return Err(ApiError::Embedding(format!("HTTP {}: {}", status, error_text)));
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Embedding(format!("invalid response: {}", e)))?;

        if body.data.len() != texts.len() {
            return Err(ApiError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }

        body.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();

        if let Some(v) = vectors.iter().find(|v| v.len() != self.embedding_dimensions) {
            warn!(
                expected = self.embedding_dimensions,
                got = v.len(),
                "Embedding dimension differs from the configured index dimension"
            );
        }

        Ok(vectors)
    }
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<TextStream> {
        let request = ChatRequest {
            model: &self.completion_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Completion(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "OpenAI completion error: {}", error_text);
            return Err(ApiError::Completion(format!("HTTP {}: {}", status, error_text)));
        }

        let mut bytes = response.bytes_stream();

        let chunks = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            let mut ended = false;
            while !ended {
                let events = match bytes.next().await {
                    Some(Ok(data)) => decoder.feed(&data),
                    Some(Err(e)) => {
                        yield Err(ApiError::Completion(format!("stream interrupted: {}", e)));
                        return;
                    }
                    None => {
                        ended = true;
                        decoder.finish()
                    }
                };

                for event in events {
                    match decode_event(&event) {
                        Ok(Some(text)) => yield Ok(text),
                        Ok(None) => return,
                        Err(error) => {
                            yield Err(error);
                            return;
                        }
                    }
                }
            }
        };

        Ok(chunks.boxed())
    }
}

/// Reads one `data:` payload. `Ok(None)` marks the end of the stream.
fn decode_event(event: &str) -> Result<Option<String>> {
    if event == "[DONE]" {
        return Ok(None);
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(event)
        .map_err(|e| ApiError::Completion(format!("invalid stream event: {}", e)))?;

    Ok(Some(
        chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .unwrap_or_default(),
    ))
}

/// Splits a Server-Sent Events byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line is available, so events and UTF-8
/// sequences cut across network reads come out whole.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            events.extend(data_payload(&line));
        }
        events
    }

    /// Drains a trailing line that arrived without a newline.
    fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }
}

fn data_payload(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\n', '\r']);
    line.strip_prefix("data:")
        .map(|data| data.trim_start().to_string())
}
