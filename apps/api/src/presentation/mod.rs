//! View models for the result panels and the streamed recommendation text.

use crate::models::{RecommendationPanel, ScoredBook};

/// Short author label for a panel heading.
///
/// One author is shown as-is; several collapse to the first name plus a count.
pub fn author_label(authors: &[String]) -> String {
    match authors {
        [] => "Unknown author".to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => {
            let others = rest.len();
            let noun = if others == 1 { "other" } else { "others" };
            format!("{} and {} {}", first, others, noun)
        }
    }
}

/// Builds the panels in ranking order, numbered from 1.
pub fn render_panels(books: &[ScoredBook]) -> Vec<RecommendationPanel> {
    books
        .iter()
        .enumerate()
        .map(|(i, scored)| {
            let book = &scored.book;
            let rank = i + 1;
            RecommendationPanel {
                rank,
                label: format!("#{} {} - {}", rank, author_label(&book.authors), book.title),
                title: book.title.clone(),
                authors: book.authors.join(", "),
                publisher: book.publisher.clone(),
                published_at: book.published_at.clone(),
                url: book.url.clone(),
                img_url: book.img_url.clone(),
                summary: book.summary.clone(),
                score: scored.score,
            }
        })
        .collect()
}

/// Accumulates streamed chunks and produces the text to show after each one.
#[derive(Debug, Default)]
pub struct StreamRenderer {
    accumulated: String,
}

impl StreamRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk. Returns the full text to display, or `None` for an
    /// empty chunk that changes nothing.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        if chunk.is_empty() {
            return None;
        }
        self.accumulated.push_str(chunk);
        Some(self.accumulated.trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.accumulated.trim().is_empty()
    }

    /// Final text: every chunk in arrival order, trimmed.
    pub fn finish(self) -> String {
        self.accumulated.trim().to_string()
    }
}
