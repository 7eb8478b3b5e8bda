use serde::{Deserialize, Deserializer, Serialize};

fn deserialize_authors<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    let names = match StringOrVec::deserialize(deserializer)? {
        // The index stores author lists as "First,Second,Third"
        StringOrVec::String(s) => s.split(',').map(str::to_string).collect(),
        StringOrVec::Vec(v) => v,
    };

    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

/// Book metadata as stored alongside each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_authors")]
    pub authors: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "image_url")]
    pub img_url: String,
}

/// A book returned by the vector index together with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredBook {
    pub book: BookRecord,
    pub score: f32,
}
