use tracing::debug;

use super::images::ExtractedImage;
use super::{join_answer, segment};
use crate::model::{Card, CardSet};

const NO_ANSWER: &str = "No answer provided";

pub fn build(full_text: &str, images: &[ExtractedImage<'_>]) -> CardSet {
    let segmentation = segment::segment(full_text);

    let mut cards = Vec::new();
    for (index, lines) in segmentation.segments.iter().enumerate() {
        let Some(lines) = lines else {
            debug!(segment = index, "skipping empty segment");
            continue;
        };

        let answer = if lines.len() > 1 {
            join_answer(&lines[1..])
        } else {
            NO_ANSWER.to_string()
        };

        // Pairing follows the raw segment index, so a dropped segment
        // consumes its image slot.
        cards.push(Card {
            question: lines[0].clone(),
            answer,
            image: images.get(index).map(ExtractedImage::data_uri),
        });
    }

    CardSet::titled(segmentation.title_candidate, cards)
}
