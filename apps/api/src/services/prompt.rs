use crate::{
    error::{ApiError, Result},
    models::BookRecord,
};

/// Number of books a recommendation is normally written for.
pub const RECOMMENDATION_COUNT: usize = 3;

pub const SYSTEM_PROMPT: &str =
    "You are Woo's, the keeper of a small bookshop who recommends books. \
     You always answer in a warm, friendly tone.";

const INSTRUCTIONS: &str = "\
You are given a description of a book the user would like to read, followed by the books recommended for it.
Using the user's description and each recommended book's title, authors and summary, write a recommendation.
Introduce yourself first and write in a friendly tone.
Use emoji here and there where they fit.";

/// Renders the instruction block sent to the completion model.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    min_items: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            min_items: RECOMMENDATION_COUNT,
        }
    }
}

impl PromptBuilder {
    pub fn new(min_items: usize) -> Self {
        Self {
            min_items: min_items.max(1),
        }
    }

    /// Builds the prompt for `query` (as the user typed it) and the ranked books.
    pub fn build(&self, query: &str, items: &[BookRecord]) -> Result<String> {
        if items.len() < self.min_items {
            return Err(ApiError::InsufficientResults {
                required: self.min_items,
                found: items.len(),
            });
        }

        let mut prompt = format!("{}\n\n---\nUser input: {}\n", INSTRUCTIONS, query);
        for (i, item) in items.iter().enumerate() {
            prompt.push_str(&format!(
                "\nRecommendation {}\nTitle: {}\nAuthors: {}\nSummary: {}\n",
                i + 1,
                item.title,
                item.authors.join(", "),
                item.summary
            ));
        }
        prompt.push_str("---\n");

        Ok(prompt)
    }
}

/// Builds the prompt with the default requirement of three books.
pub fn build_prompt(query: &str, items: &[BookRecord]) -> Result<String> {
    PromptBuilder::default().build(query, items)
}
