//! PDF to flashcard extraction.
//!
//! Every strategy runs over the same decoded pages: image selection by size
//! (`images`) and numbered-list segmentation (`segment`). Strategies differ
//! only in how segments turn into cards and how images are paired with them.

use lopdf::ObjectId;

use crate::model::CardSet;

mod document;
mod fields;
mod generic;
mod hybrid;
mod images;
mod segment;

pub use document::{DecodeError, decode_document};
use fields::FieldSchema;
use images::{ICON_THRESHOLD_BYTES, SizeFilter};

const ANSWER_SEPARATOR: &str = " <br> ";

/// One decoded page: its text layer plus embedded raster images in
/// resource order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub text: String,
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub object: ObjectId,
    pub bytes: Vec<u8>,
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// First line is the question, remaining lines the answer; images by
    /// segment index.
    Generic,
    /// Field-structured sheets (`Order:` ... `Mouth Parts:`) named by the
    /// line preceding the first field.
    DomainSpecific,
    /// Cleaned segments, with images either driving every card or none.
    Hybrid,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::DomainSpecific => "fields",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn size_filter(self) -> SizeFilter {
        match self {
            Self::DomainSpecific => SizeFilter::AtLeast(ICON_THRESHOLD_BYTES),
            Self::Generic | Self::Hybrid => SizeFilter::Exceeds(ICON_THRESHOLD_BYTES),
        }
    }
}

pub fn extract(pdf_bytes: &[u8], strategy: Strategy) -> Result<CardSet, DecodeError> {
    let pages = decode_document(pdf_bytes)?;
    Ok(extract_pages(&pages, strategy))
}

pub fn extract_pages(pages: &[RawPage], strategy: Strategy) -> CardSet {
    let images = images::select_images(pages, strategy.size_filter());
    let full_text = segment::full_text(pages);

    match strategy {
        Strategy::Generic => generic::build(&full_text, &images),
        Strategy::DomainSpecific => fields::build(&full_text, &images, &FieldSchema::entomology()),
        Strategy::Hybrid => hybrid::build(&full_text, &images),
    }
}

fn join_answer(lines: &[String]) -> String {
    lines.join(ANSWER_SEPARATOR)
}
