use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::RawPage;

/// Embedded images at or below this size are bullets, logos and other icons.
pub const ICON_THRESHOLD_BYTES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeFilter {
    /// Keep when the payload is strictly larger than the threshold.
    Exceeds(usize),
    /// Keep unless the payload is smaller than the threshold.
    AtLeast(usize),
}

impl SizeFilter {
    pub fn accepts(self, len: usize) -> bool {
        match self {
            Self::Exceeds(threshold) => len > threshold,
            Self::AtLeast(threshold) => len >= threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedImage<'a> {
    pub bytes: &'a [u8],
    pub format: &'a str,
}

impl ExtractedImage<'_> {
    pub fn data_uri(&self) -> String {
        format!("data:image/{};base64,{}", self.format, STANDARD.encode(self.bytes))
    }
}

/// Images in page order then in-page order, keeping those the filter accepts.
pub fn select_images(pages: &[RawPage], filter: SizeFilter) -> Vec<ExtractedImage<'_>> {
    pages
        .iter()
        .flat_map(|page| page.images.iter())
        .filter(|image| filter.accepts(image.bytes.len()))
        .map(|image| ExtractedImage {
            bytes: &image.bytes,
            format: &image.format,
        })
        .collect()
}
