use crate::error::{ApiError, Result};
use serde::Deserialize;
use std::{env, fmt};

const DEFAULT_TRANSLATION_URL: &str =
    "https://asia-northeast3-skilled-chalice-402604.cloudfunctions.net/translate";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Secret,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub completion_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PineconeConfig {
    pub api_key: Secret,
    pub index_host: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationConfig {
    /// Number of books requested from the index.
    pub top_k: usize,
    /// Fewest books the prompt will be written for.
    pub min_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub translation: TranslationConfig,
    pub openai: OpenAiConfig,
    pub pinecone: PineconeConfig,
    pub recommendation: RecommendationConfig,
}

impl Config {
    /// Load configuration from defaults, optional `config/default` and
    /// `config/local` files, `APP_*` variables and the two API key variables.
    pub fn load() -> Result<Self> {
        let config: Config = Self::builder()?
            .set_override_option("openai.api_key", env::var("OPENAI_API_KEY").ok())?
            .set_override_option("pinecone.api_key", env::var("PINECONE_API_KEY").ok())?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = Self::defaults()?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        Ok(builder)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("translation.url", DEFAULT_TRANSLATION_URL)?
            .set_default("translation.timeout_seconds", 30)?
            .set_default("openai.api_key", "")?
            .set_default("openai.base_url", DEFAULT_OPENAI_BASE_URL)?
            .set_default("openai.embedding_model", "text-embedding-3-small")?
            .set_default("openai.embedding_dimensions", 512)?
            .set_default("openai.completion_model", "gpt-3.5-turbo")?
            .set_default("openai.timeout_seconds", 120)?
            .set_default("pinecone.api_key", "")?
            .set_default("pinecone.index_host", "")?
            .set_default("pinecone.timeout_seconds", 30)?
            .set_default("recommendation.top_k", 3)?
            .set_default("recommendation.min_results", 3)?;

        Ok(builder)
    }

    pub fn validate(&self) -> Result<()> {
        if self.openai.api_key.is_blank() {
            return Err(ApiError::Config("OPENAI_API_KEY must be set".to_string()));
        }
        if self.pinecone.api_key.is_blank() {
            return Err(ApiError::Config("PINECONE_API_KEY must be set".to_string()));
        }
        if self.pinecone.index_host.trim().is_empty() {
            return Err(ApiError::Config(
                "APP_PINECONE__INDEX_HOST must be set".to_string(),
            ));
        }
        if self.openai.embedding_dimensions == 0 {
            return Err(ApiError::Config(
                "openai.embedding_dimensions must be at least 1".to_string(),
            ));
        }

        let rec = &self.recommendation;
        if rec.top_k == 0 {
            return Err(ApiError::Config(
                "recommendation.top_k must be at least 1".to_string(),
            ));
        }
        if rec.min_results == 0 || rec.min_results > rec.top_k {
            return Err(ApiError::Config(format!(
                "recommendation.min_results must be between 1 and top_k ({})",
                rec.top_k
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        translation: TranslationConfig {
            url: "http://localhost/translate".to_string(),
            timeout_seconds: 5,
        },
        openai: OpenAiConfig {
            api_key: Secret::new("sk-test"),
            base_url: "http://localhost/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 512,
            completion_model: "gpt-3.5-turbo".to_string(),
            timeout_seconds: 5,
        },
        pinecone: PineconeConfig {
            api_key: Secret::new("pc-test"),
            index_host: "http://localhost".to_string(),
            timeout_seconds: 5,
        },
        recommendation: RecommendationConfig {
            top_k: 3,
            min_results: 3,
        },
    }
}
