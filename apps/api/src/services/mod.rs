pub mod openai;
pub mod pinecone;
pub mod prompt;
pub mod recommendation;
pub mod translator;

// Re-export public types
pub use openai::{CompletionModel, Embedder, OpenAiClient, TextStream};
pub use pinecone::{BookIndex, PineconeClient};
pub use prompt::{build_prompt, PromptBuilder};
pub use recommendation::{PipelineEvent, RecommendationService, ServiceContext, Stage};
pub use translator::{TranslationClient, Translator};
