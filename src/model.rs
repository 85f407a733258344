use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_SET_TITLE: &str = "Imported Set";
pub const DEFAULT_IMPORT_DESCRIPTION: &str = "imported set from pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardSet {
    pub title: String,
    pub cards: Vec<Card>,
}

impl CardSet {
    /// Builds a set, substituting the default title when none was found.
    pub fn titled(title: String, cards: Vec<Card>) -> Self {
        let title = if title.is_empty() {
            DEFAULT_SET_TITLE.to_string()
        } else {
            title
        };
        Self { title, cards }
    }
}

/// A persisted card set as stored in `cards.json`.
///
/// Fields the tool does not model (for example `name`, added when decks are
/// listed across users) are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "cards", default)]
    pub card_count: usize,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: Vec<Card>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Deck {
    pub fn from_card_set(set: CardSet, description: Option<&str>) -> Self {
        let description = description
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_IMPORT_DESCRIPTION)
            .to_string();

        Self {
            title: set.title,
            card_count: set.cards.len(),
            description,
            content: set.cards,
            extra: Map::new(),
        }
    }
}

/// An account entry of `users.json`; only the fields deck listings need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// Aggregate study results for one user (`stats.json`).
///
/// Per-set percentages live as top-level arrays keyed by set name, next to
/// the fixed counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyStats {
    #[serde(default)]
    pub right: i64,
    #[serde(default)]
    pub wrong: i64,
    #[serde(default)]
    pub questions: Vec<Value>,
    #[serde(flatten)]
    pub set_scores: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct TestResult {
    pub right: i64,
    pub wrong: i64,
    pub percent: Option<Value>,
    pub set_name: Option<String>,
    pub questions: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_path: String,
    pub source_sha256: String,
    pub strategy: String,
    pub page_count: usize,
    pub embedded_image_count: usize,
    pub title: String,
    pub card_count: usize,
    pub cards_with_image: usize,
}
