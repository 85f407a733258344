use std::sync::LazyLock;

use regex::Regex;

use super::RawPage;

static NUMBERING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\d+\.\s+").expect("valid numbering regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// First line of the header, untrimmed. May be empty.
    pub title_candidate: String,
    /// Raw segments after the header, in source order. An entry is `None`
    /// when the segment has no non-empty line.
    pub segments: Vec<Option<Vec<String>>>,
}

impl Segmentation {
    pub fn non_empty(&self) -> impl Iterator<Item = &Vec<String>> {
        self.segments.iter().flatten()
    }
}

pub fn full_text(pages: &[RawPage]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(&page.text);
        text.push('\n');
    }
    text
}

pub fn segment(full_text: &str) -> Segmentation {
    let mut parts = NUMBERING_REGEX.split(full_text);

    let title_candidate = parts
        .next()
        .and_then(|header| header.split('\n').next())
        .unwrap_or_default()
        .to_string();

    let segments = parts
        .map(|raw| {
            let lines = trimmed_lines(raw);
            (!lines.is_empty()).then_some(lines)
        })
        .collect();

    Segmentation {
        title_candidate,
        segments,
    }
}

pub fn trimmed_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
