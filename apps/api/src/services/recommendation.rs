use crate::{
    error::{ApiError, Result},
    models::{BookRecord, RecommendationPanel, RecommendationResponse},
    presentation::{render_panels, StreamRenderer},
    services::{BookIndex, CompletionModel, Embedder, PromptBuilder, Translator},
};
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Handles to the external services a recommendation run talks to.
#[derive(Clone)]
pub struct ServiceContext {
    pub translator: Arc<dyn Translator>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn BookIndex>,
    pub completion: Arc<dyn CompletionModel>,
}

/// Stages of a single run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Translating,
    Embedding,
    Searching,
    RenderingResults,
    PromptBuilding,
    Generating,
    StreamingRender,
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The run entered a stage.
    Stage(Stage),
    /// Result panels, in ranking order.
    Results(Vec<RecommendationPanel>),
    /// Everything generated so far, replacing the previous text.
    Text(String),
    /// Final generated text. Ends the run.
    Done(String),
    /// The run stopped. Output sent before this event stays valid.
    Failed { stage: Stage, error: ApiError },
}

/// Wire form of a [`PipelineEvent`].
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload<'a> {
    Stage {
        stage: Stage,
        message: &'static str,
    },
    Results {
        recommendations: &'a [RecommendationPanel],
    },
    Text {
        text: &'a str,
    },
    Done {
        text: &'a str,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

impl PipelineEvent {
    pub fn payload(&self) -> EventPayload<'_> {
        match self {
            PipelineEvent::Stage(stage) => EventPayload::Stage {
                stage: *stage,
                message: stage.message(),
            },
            PipelineEvent::Results(panels) => EventPayload::Results {
                recommendations: panels,
            },
            PipelineEvent::Text(text) => EventPayload::Text { text },
            PipelineEvent::Done(text) => EventPayload::Done { text },
            PipelineEvent::Failed { stage, error } => EventPayload::Failed {
                stage: *stage,
                error: error.user_message(),
            },
        }
    }
}

impl Stage {
    /// Progress text shown while the stage runs.
    pub fn message(self) -> &'static str {
        match self {
            Stage::Validating => "Checking your description...",
            Stage::Translating | Stage::Embedding | Stage::Searching => {
                "Looking for books that match..."
            }
            Stage::RenderingResults => "Found some books!",
            Stage::PromptBuilding | Stage::Generating => "Writing a recommendation...",
            Stage::StreamingRender => "Writing...",
        }
    }
}

/// Rejects queries that are empty once whitespace is ignored.
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Please describe the book you would like to read".to_string(),
        ));
    }
    Ok(())
}

pub struct RecommendationService {
    services: ServiceContext,
    prompt_builder: PromptBuilder,
    top_k: usize,
}

impl RecommendationService {
    pub fn new(services: ServiceContext, prompt_builder: PromptBuilder, top_k: usize) -> Self {
        Self {
            services,
            prompt_builder,
            top_k,
        }
    }

    /// Runs translate → embed → search → prompt → generate for one query and
    /// reports progress as a stream of events. The stream ends after `Done`
    /// or `Failed`.
    pub fn recommend(self: Arc<Self>, query: String) -> impl Stream<Item = PipelineEvent> + Send {
        let this = self;

        stream! {
            let request_id = Uuid::new_v4();
            info!(%request_id, "Starting recommendation run");

            yield PipelineEvent::Stage(Stage::Validating);
            if let Err(error) = validate_query(&query) {
                yield failed(request_id, Stage::Validating, error);
                return;
            }

            yield PipelineEvent::Stage(Stage::Translating);
            let translated = match this.services.translator.translate(&query).await {
                Ok(translated) => translated,
                Err(error) => {
                    yield failed(request_id, Stage::Translating, error);
                    return;
                }
            };
            debug!(%request_id, %translated, "Query translated");

            yield PipelineEvent::Stage(Stage::Embedding);
            let embedded = this
                .services
                .embedder
                .embed(std::slice::from_ref(&translated))
                .await
                .and_then(|vectors| {
                    vectors.into_iter().next().ok_or_else(|| {
                        ApiError::Embedding("no embedding returned".to_string())
                    })
                });
            let vector = match embedded {
                Ok(vector) => vector,
                Err(error) => {
                    yield failed(request_id, Stage::Embedding, error);
                    return;
                }
            };

            yield PipelineEvent::Stage(Stage::Searching);
            let books = match this.services.index.search(&vector, this.top_k).await {
                Ok(books) => books,
                Err(error) => {
                    yield failed(request_id, Stage::Searching, error);
                    return;
                }
            };
            info!(%request_id, found = books.len(), "Vector search complete");

            yield PipelineEvent::Stage(Stage::RenderingResults);
            yield PipelineEvent::Results(render_panels(&books));

            yield PipelineEvent::Stage(Stage::PromptBuilding);
            let records: Vec<BookRecord> = books.into_iter().map(|scored| scored.book).collect();
            let prompt = match this.prompt_builder.build(&query, &records) {
                Ok(prompt) => prompt,
                Err(error) => {
                    yield failed(request_id, Stage::PromptBuilding, error);
                    return;
                }
            };

            yield PipelineEvent::Stage(Stage::Generating);
            let mut chunks = match this.services.completion.generate(&prompt).await {
                Ok(chunks) => chunks,
                Err(error) => {
                    yield failed(request_id, Stage::Generating, error);
                    return;
                }
            };

            yield PipelineEvent::Stage(Stage::StreamingRender);
            let mut renderer = StreamRenderer::new();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => {
                        if let Some(text) = renderer.push(&chunk) {
                            yield PipelineEvent::Text(text);
                        }
                    }
                    Err(error) => {
                        yield failed(request_id, Stage::StreamingRender, error);
                        return;
                    }
                }
            }

            if renderer.is_empty() {
                let error = ApiError::Completion("model returned no text".to_string());
                yield failed(request_id, Stage::StreamingRender, error);
                return;
            }

            let text = renderer.finish();
            info!(%request_id, chars = text.chars().count(), "Recommendation run finished");
            yield PipelineEvent::Done(text);
        }
    }

    /// Runs the pipeline to the end and collects its output.
    ///
    /// A failure before any books were found is returned as the error; a later
    /// failure keeps the books and reports the message alongside them.
    pub async fn recommend_collected(
        self: Arc<Self>,
        query: String,
    ) -> Result<RecommendationResponse> {
        let mut events = Box::pin(self.recommend(query));
        let mut recommendations = Vec::new();
        let mut text = None;

        while let Some(event) = events.next().await {
            match event {
                PipelineEvent::Results(panels) => recommendations = panels,
                PipelineEvent::Text(rendered) => text = Some(rendered),
                PipelineEvent::Done(text) => {
                    return Ok(RecommendationResponse {
                        recommendations,
                        recommendation_text: Some(text),
                        error: None,
                    });
                }
                PipelineEvent::Failed { error, .. } => {
                    if recommendations.is_empty() {
                        return Err(error);
                    }
                    return Ok(RecommendationResponse {
                        recommendations,
                        recommendation_text: text,
                        error: Some(error.user_message()),
                    });
                }
                PipelineEvent::Stage(_) => {}
            }
        }

        Err(ApiError::InternalError(
            "recommendation run ended without a result".to_string(),
        ))
    }
}

fn failed(request_id: Uuid, stage: Stage, error: ApiError) -> PipelineEvent {
    match &error {
        ApiError::InvalidInput(_) | ApiError::InsufficientResults { .. } => {
            warn!(%request_id, ?stage, "Recommendation run stopped: {}", error);
        }
        _ => error!(%request_id, ?stage, "Recommendation run failed: {}", error),
    }
    PipelineEvent::Failed { stage, error }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::{
        models::ScoredBook,
        services::openai::TextStream,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Shared record of which external services were called, in order.
    #[derive(Debug, Default, Clone)]
    pub struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        pub fn push(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }

        pub fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    pub struct FakeTranslator {
        pub log: CallLog,
        pub fail: bool,
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate(&self, query: &str) -> Result<String> {
            self.log.push("translate");
            if self.fail {
                return Err(ApiError::Translation("service unavailable".to_string()));
            }
            Ok(format!("translated: {}", query))
        }
    }

    pub struct FakeEmbedder {
        pub log: CallLog,
        pub fail: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            for text in texts {
                self.log.push(format!("embed: {}", text));
            }
            if self.fail {
                return Err(ApiError::Embedding("HTTP 429: rate limited".to_string()));
            }
            Ok(texts.iter().map(|_| vec![0.5; 512]).collect())
        }
    }

    pub struct FakeIndex {
        pub log: CallLog,
        pub results: usize,
        pub fail: bool,
    }

    #[async_trait]
    impl BookIndex for FakeIndex {
        async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredBook>> {
            self.log.push(format!("search: {} dims, top {}", vector.len(), top_k));
            if self.fail {
                return Err(ApiError::Search("connection refused".to_string()));
            }
            Ok((0..self.results.min(top_k))
                .map(|i| ScoredBook {
                    book: sample_book(i),
                    score: 0.9 - i as f32 * 0.1,
                })
                .collect())
        }
    }

    pub struct FakeCompletion {
        pub log: CallLog,
        pub chunks: Vec<Result<String>>,
        pub prompts: Arc<Mutex<Vec<String>>>,
        pub fail: bool,
    }

    #[async_trait]
    impl CompletionModel for FakeCompletion {
        async fn generate(&self, prompt: &str) -> Result<TextStream> {
            self.log.push("generate");
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(ApiError::Completion("connection refused".to_string()));
            }
            Ok(futures::stream::iter(self.chunks.clone()).boxed())
        }
    }

    pub fn sample_book(i: usize) -> BookRecord {
        let samples = [
            ("Human Acts", "Han Kang", "A boy's death during the Gwangju uprising."),
            (
                "Letters",
                "Kim Ae-ran,Park Min-gyu,Hwang Jung-eun",
                "Letters about love that never arrive.",
            ),
            ("Almond", "Sohn Won-pyung", "A boy who cannot feel emotions."),
        ];
        let (title, authors, summary) = samples[i % samples.len()];
        BookRecord {
            title: title.to_string(),
            authors: authors.split(',').map(str::to_string).collect(),
            summary: summary.to_string(),
            publisher: "Changbi".to_string(),
            published_at: "2014-05-19".to_string(),
            url: format!("https://books.example/{}", i),
            img_url: format!("https://books.example/{}.jpg", i),
        }
    }

    pub struct Fakes {
        pub log: CallLog,
        pub prompts: Arc<Mutex<Vec<String>>>,
        pub translate_fails: bool,
        pub embed_fails: bool,
        pub search_fails: bool,
        pub generate_fails: bool,
        pub results: usize,
        pub chunks: Vec<Result<String>>,
    }

    impl Default for Fakes {
        fn default() -> Self {
            Self {
                log: CallLog::default(),
                prompts: Arc::default(),
                translate_fails: false,
                embed_fails: false,
                search_fails: false,
                generate_fails: false,
                results: 3,
                chunks: vec![
                    Ok(String::new()),
                    Ok("Hel".to_string()),
                    Ok("lo".to_string()),
                    Ok(" world ".to_string()),
                ],
            }
        }
    }

    impl Fakes {
        pub fn service(&self) -> RecommendationService {
            let services = ServiceContext {
                translator: Arc::new(FakeTranslator {
                    log: self.log.clone(),
                    fail: self.translate_fails,
                }),
                embedder: Arc::new(FakeEmbedder {
                    log: self.log.clone(),
                    fail: self.embed_fails,
                }),
                index: Arc::new(FakeIndex {
                    log: self.log.clone(),
                    results: self.results,
                    fail: self.search_fails,
                }),
                completion: Arc::new(FakeCompletion {
                    log: self.log.clone(),
                    chunks: self.chunks.clone(),
                    prompts: self.prompts.clone(),
                    fail: self.generate_fails,
                }),
            };
            RecommendationService::new(services, PromptBuilder::default(), 3)
        }
    }
}
