use serde::{Deserialize, Serialize};

pub use book::{BookRecord, ScoredBook};

mod book;

/// Request structure for a recommendation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// Free-text description of the book the user wants to read
    pub query: String,
}

/// One collapsible result panel in the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationPanel {
    pub rank: usize,
    /// Panel heading, e.g. `#1 Han Kang and 2 others - Human Acts`
    pub label: String,
    pub title: String,
    pub authors: String,
    pub publisher: String,
    pub published_at: String,
    pub url: String,
    pub img_url: String,
    pub summary: String,
    pub score: f32,
}

/// Collected outcome of a recommendation run
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendationPanel>,
    /// The generated blurb, or the part rendered before a failure
    pub recommendation_text: Option<String>,
    /// Failure message when the run stopped after producing partial output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
}
