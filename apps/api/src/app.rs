use crate::{
    config::Config,
    error::Result,
    handlers::index_page,
    routes::api_routes,
    services::{
        OpenAiClient, PineconeClient, PromptBuilder, RecommendationService, ServiceContext,
        TranslationClient,
    },
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use log::info;
use std::{net::TcpListener, sync::Arc, time::Duration};

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

/// Build the external service clients once and wire them into the pipeline.
pub fn build_recommendation_service(config: &Config) -> Result<RecommendationService> {
    let translator = TranslationClient::new(
        &config.translation.url,
        Duration::from_secs(config.translation.timeout_seconds),
    )
    .context("Failed to initialize translation client")?;

    let openai = Arc::new(
        OpenAiClient::new(
            config.openai.api_key.expose(),
            &config.openai.base_url,
            &config.openai.embedding_model,
            config.openai.embedding_dimensions,
            &config.openai.completion_model,
            Duration::from_secs(config.openai.timeout_seconds),
        )
        .context("Failed to initialize OpenAI client")?,
    );

    let pinecone = PineconeClient::new(
        config.pinecone.api_key.expose(),
        &config.pinecone.index_host,
        Duration::from_secs(config.pinecone.timeout_seconds),
    )
    .context("Failed to initialize Pinecone client")?;

    let services = ServiceContext {
        translator: Arc::new(translator),
        embedder: openai.clone(),
        index: Arc::new(pinecone),
        completion: openai,
    };

    Ok(RecommendationService::new(
        services,
        PromptBuilder::new(config.recommendation.min_results),
        config.recommendation.top_k,
    ))
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}", bind_address);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let recommendation_service =
            web::Data::new(build_recommendation_service(&self.config)?);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(recommendation_service.clone())
                .service(index_page)
                .service(api_routes())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_build_recommendation_service_from_config() {
        assert!(build_recommendation_service(&test_config()).is_ok());
    }

    #[test]
    fn test_invalid_pinecone_key_is_config_error() {
        let mut config = test_config();
        config.pinecone.api_key = crate::config::Secret::new("bad\nkey");

        assert!(build_recommendation_service(&config).is_err());
    }
}
