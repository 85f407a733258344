use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::images::ExtractedImage;
use super::{join_answer, segment};
use crate::model::{Card, CardSet};

static CARD_COUNTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*/\s*\d+$").expect("valid card counter regex"));

const EXPORT_SITE_MARKERS: [&str; 2] = ["quizlet.com", "study online at"];
const NO_DEFINITION: &str = "No definition";

pub fn build(full_text: &str, images: &[ExtractedImage<'_>]) -> CardSet {
    let segmentation = segment::segment(full_text);
    let title = clean_title(&segmentation.title_candidate);

    let blocks: Vec<Vec<String>> = segmentation
        .non_empty()
        .map(|lines| clean_lines(lines, &title))
        .filter(|lines| !lines.is_empty())
        .collect();

    let image_led = !blocks.is_empty() && images.len() >= blocks.len();
    debug!(
        blocks = blocks.len(),
        images = images.len(),
        image_led,
        "pairing hybrid blocks"
    );

    let cards = if image_led {
        blocks
            .iter()
            .zip(images)
            .map(|(lines, image)| Card {
                question: String::new(),
                answer: join_answer(lines),
                image: Some(image.data_uri()),
            })
            .collect()
    } else {
        // Any shortfall of images drops them all, even when some blocks
        // could have been paired.
        blocks
            .into_iter()
            .map(|lines| {
                let answer = if lines.len() > 1 {
                    join_answer(&lines[1..])
                } else {
                    NO_DEFINITION.to_string()
                };
                Card {
                    question: lines[0].clone(),
                    answer,
                    image: None,
                }
            })
            .collect()
    };

    CardSet::titled(title, cards)
}

fn clean_title(candidate: &str) -> String {
    candidate.trim().replace('&', "and").replace('?', "")
}

fn clean_lines(lines: &[String], title: &str) -> Vec<String> {
    let title = title.to_lowercase();

    lines
        .iter()
        .filter(|line| {
            let lowered = line.to_lowercase();
            !CARD_COUNTER_REGEX.is_match(line)
                && !EXPORT_SITE_MARKERS
                    .iter()
                    .any(|marker| lowered.contains(marker))
                && lowered != title
        })
        .cloned()
        .collect()
}
