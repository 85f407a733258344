use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::images::ExtractedImage;
use super::{join_answer, segment};
use crate::model::{Card, CardSet};

static PAGE_FOOTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+ / \d+$").expect("valid page footer regex"));
static QUESTION_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("valid question number regex"));

const MIN_NAME_CHARS: usize = 3;

/// Field markers of a structured sheet. A card opens at `opening`, collects
/// `intermediate` fields and closes at `closing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub opening: String,
    pub intermediate: Vec<String>,
    pub closing: String,
    pub unnamed: String,
}

impl FieldSchema {
    pub fn entomology() -> Self {
        Self {
            opening: "Order:".to_string(),
            intermediate: vec!["Metamorphosis:".to_string()],
            closing: "Mouth Parts:".to_string(),
            unnamed: "Unknown Insect".to_string(),
        }
    }

    fn classify(&self, line: &str) -> LineKind {
        if line.starts_with(&self.opening) {
            LineKind::Opening
        } else if self
            .intermediate
            .iter()
            .any(|marker| line.starts_with(marker.as_str()))
        {
            LineKind::Intermediate
        } else if line.starts_with(&self.closing) {
            LineKind::Closing
        } else {
            LineKind::Text
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Opening,
    Intermediate,
    Closing,
    Text,
}

/// Scanner state. Both states carry the rolling name buffer: text lines keep
/// updating it even while a card is open.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    AwaitingName {
        name: Option<String>,
    },
    Accumulating {
        name: Option<String>,
        question: String,
        attributes: Vec<String>,
    },
}

impl ScanState {
    fn name_mut(&mut self) -> &mut Option<String> {
        match self {
            Self::AwaitingName { name } | Self::Accumulating { name, .. } => name,
        }
    }
}

#[derive(Debug)]
struct FieldScanner<'s> {
    schema: &'s FieldSchema,
    state: ScanState,
    cards: Vec<Card>,
}

impl<'s> FieldScanner<'s> {
    fn new(schema: &'s FieldSchema) -> Self {
        Self {
            schema,
            state: ScanState::AwaitingName { name: None },
            cards: Vec::new(),
        }
    }

    fn feed(&mut self, line: &str) {
        let state = std::mem::replace(&mut self.state, ScanState::AwaitingName { name: None });

        self.state = match (self.schema.classify(line), state) {
            (LineKind::Opening, state) => {
                let name = match state {
                    ScanState::AwaitingName { name } | ScanState::Accumulating { name, .. } => name,
                };
                ScanState::Accumulating {
                    question: name.clone().unwrap_or_else(|| self.schema.unnamed.clone()),
                    attributes: vec![line.to_string()],
                    name,
                }
            }
            (
                LineKind::Intermediate,
                ScanState::Accumulating {
                    name,
                    question,
                    mut attributes,
                },
            ) => {
                attributes.push(line.to_string());
                ScanState::Accumulating {
                    name,
                    question,
                    attributes,
                }
            }
            (
                LineKind::Closing,
                ScanState::Accumulating {
                    question,
                    mut attributes,
                    ..
                },
            ) => {
                attributes.push(line.to_string());
                self.finalize(&question, &attributes);
                ScanState::AwaitingName { name: None }
            }
            // A field seen before any card was opened changes nothing.
            (LineKind::Intermediate | LineKind::Closing, state @ ScanState::AwaitingName { .. }) => {
                state
            }
            (LineKind::Text, mut state) => {
                if is_name_candidate(line) {
                    *state.name_mut() = Some(line.to_string());
                }
                state
            }
        };
    }

    fn finalize(&mut self, question: &str, attributes: &[String]) {
        let question = QUESTION_NUMBER_REGEX.replace(question, "").into_owned();
        debug!(question = %question, fields = attributes.len(), "field card completed");
        self.cards.push(Card {
            question,
            answer: join_answer(attributes),
            image: None,
        });
    }

    fn finish(self) -> Vec<Card> {
        self.cards
    }
}

fn is_name_candidate(line: &str) -> bool {
    line.chars().count() >= MIN_NAME_CHARS && !PAGE_FOOTER_REGEX.is_match(line)
}

pub fn build(full_text: &str, images: &[ExtractedImage<'_>], schema: &FieldSchema) -> CardSet {
    let mut scanner = FieldScanner::new(schema);
    for line in segment::trimmed_lines(full_text) {
        scanner.feed(&line);
    }

    let mut cards = scanner.finish();
    for (card, image) in cards.iter_mut().zip(images) {
        card.image = Some(image.data_uri());
    }

    CardSet::titled(segment::segment(full_text).title_candidate, cards)
}
