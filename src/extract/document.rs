use std::collections::HashSet;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;
use tracing::{debug, warn};

use super::{RawImage, RawPage};

const MAX_RESOURCE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input is not a readable PDF document")]
    Document(#[source] lopdf::Error),
    #[error("failed to extract page text: {0}")]
    Text(String),
    #[error("failed to load image object {object:?} on page {page}")]
    Image {
        page: u32,
        object: ObjectId,
        #[source]
        source: lopdf::Error,
    },
    #[error("failed to encode image object {object:?} as png")]
    Encode {
        object: ObjectId,
        #[source]
        source: image::ImageError,
    },
}

/// Decodes PDF bytes into pages carrying their text layer and embedded
/// raster images, in page order.
///
/// Text comes from `pdf_extract`, which follows text positioning and font
/// encodings; images are read from the page resources with `lopdf`.
pub fn decode_document(pdf_bytes: &[u8]) -> Result<Vec<RawPage>, DecodeError> {
    let document = Document::load_mem(pdf_bytes).map_err(DecodeError::Document)?;
    let mut texts = page_texts(pdf_bytes)?.into_iter();
    let page_ids = document.get_pages();

    let mut pages = Vec::with_capacity(page_ids.len());
    for (page_number, page_id) in page_ids {
        let text = texts.next().map(|raw| normalize_page_text(&raw)).unwrap_or_default();
        let images = extract_page_images(&document, page_number, page_id)?;
        debug!(
            page = page_number,
            text_chars = text.chars().count(),
            images = images.len(),
            "decoded page"
        );

        pages.push(RawPage { text, images });
    }

    Ok(pages)
}

/// `pdf_extract` can panic on malformed input; a panic is reported as a
/// text failure.
fn page_texts(pdf_bytes: &[u8]) -> Result<Vec<String>, DecodeError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
    }));

    match result {
        Ok(Ok(texts)) => Ok(texts),
        Ok(Err(err)) => Err(DecodeError::Text(err.to_string())),
        Err(_) => Err(DecodeError::Text("text extraction panicked on malformed document".to_string())),
    }
}

/// Drops trailing whitespace on each line and blank lines around the page.
pub(super) fn normalize_page_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|line| !line.is_empty());
    let end = lines.iter().rposition(|line| !line.is_empty());

    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

fn extract_page_images(
    document: &Document,
    page_number: u32,
    page_id: ObjectId,
) -> Result<Vec<RawImage>, DecodeError> {
    let Some(resources) = inherited_resources(document, page_id) else {
        return Ok(Vec::new());
    };

    let mut image_ids = Vec::new();
    let mut seen = HashSet::new();
    collect_image_ids(document, page_number, resources, &mut seen, &mut image_ids, 0)?;

    let mut images = Vec::with_capacity(image_ids.len());
    for object in image_ids {
        let stream = match document.get_object(object) {
            Ok(Object::Stream(stream)) => stream,
            Ok(_) => continue,
            Err(source) => {
                return Err(DecodeError::Image {
                    page: page_number,
                    object,
                    source,
                });
            }
        };

        if let Some(image) = decode_image(document, object, stream)? {
            images.push(image);
        }
    }

    Ok(images)
}

/// Resources are inherited from the page tree when the page itself has none.
fn inherited_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = document.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_RESOURCE_DEPTH {
        if let Ok(entry) = node.get(b"Resources") {
            return match resolve(document, entry) {
                Some(Object::Dictionary(dict)) => Some(dict),
                _ => None,
            };
        }

        let parent = match node.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => return None,
        };
        node = document.get_dictionary(parent).ok()?;
    }

    None
}

fn collect_image_ids(
    document: &Document,
    page_number: u32,
    resources: &Dictionary,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<ObjectId>,
    depth: usize,
) -> Result<(), DecodeError> {
    let xobjects = match resources.get(b"XObject").ok().and_then(|entry| resolve(document, entry)) {
        Some(Object::Dictionary(dict)) => dict,
        _ => return Ok(()),
    };

    for (_, entry) in xobjects.iter() {
        let Object::Reference(object) = entry else {
            continue;
        };
        if !seen.insert(*object) {
            continue;
        }

        let stream = match document.get_object(*object) {
            Ok(Object::Stream(stream)) => stream,
            Ok(_) => continue,
            Err(source) => {
                return Err(DecodeError::Image {
                    page: page_number,
                    object: *object,
                    source,
                });
            }
        };

        match name_of(document, stream.dict.get(b"Subtype").ok()) {
            Some(b"Image") => out.push(*object),
            Some(b"Form") if depth < MAX_RESOURCE_DEPTH => {
                if let Some(Object::Dictionary(nested)) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|entry| resolve(document, entry))
                {
                    collect_image_ids(document, page_number, nested, seen, out, depth + 1)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn decode_image(
    document: &Document,
    object: ObjectId,
    stream: &Stream,
) -> Result<Option<RawImage>, DecodeError> {
    let filters = stream_filters(document, &stream.dict);

    let passthrough = match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") => Some("jpeg"),
        Some(b"JPXDecode") => Some("jpx"),
        Some(b"JBIG2Decode") => Some("jb2"),
        _ => None,
    };

    if let Some(format) = passthrough {
        if filters.len() > 1 {
            warn!(?object, filters = filters.len(), "skipping image with chained encoded filters");
            return Ok(None);
        }
        return Ok(Some(RawImage {
            object,
            bytes: stream.content.clone(),
            format: format.to_string(),
        }));
    }

    let Some(bytes) = encode_png(document, object, stream)? else {
        return Ok(None);
    };

    Ok(Some(RawImage {
        object,
        bytes,
        format: "png".to_string(),
    }))
}

fn encode_png(
    document: &Document,
    object: ObjectId,
    stream: &Stream,
) -> Result<Option<Vec<u8>>, DecodeError> {
    let dict = &stream.dict;

    if matches!(resolve_opt(document, dict.get(b"ImageMask").ok()), Some(Object::Boolean(true))) {
        debug!(?object, "skipping stencil mask image");
        return Ok(None);
    }

    let width = integer_of(document, dict.get(b"Width").ok());
    let height = integer_of(document, dict.get(b"Height").ok());
    let bits = integer_of(document, dict.get(b"BitsPerComponent").ok()).unwrap_or(8);
    let components = color_components(document, dict.get(b"ColorSpace").ok());

    let (Some(width), Some(height), Some(components)) = (width, height, components) else {
        warn!(?object, "skipping image with unsupported color layout");
        return Ok(None);
    };
    if bits != 8 {
        warn!(?object, bits, "skipping image with unsupported sample depth");
        return Ok(None);
    }
    let dimensions = u32::try_from(width).ok().zip(u32::try_from(height).ok());
    let expected = dimensions.and_then(|(width, height)| {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(components)
    });
    let (Some((width, height)), Some(expected)) = (dimensions, expected) else {
        warn!(?object, width, height, "skipping image with unsupported dimensions");
        return Ok(None);
    };
    if width == 0 || height == 0 {
        warn!(?object, width, height, "skipping empty image");
        return Ok(None);
    }

    let samples = if stream.dict.get(b"Filter").is_ok() {
        match stream.decompressed_content() {
            Ok(samples) => samples,
            Err(err) => {
                warn!(?object, error = %err, "skipping image with undecodable stream");
                return Ok(None);
            }
        }
    } else {
        stream.content.clone()
    };

    if samples.len() < expected {
        warn!(?object, expected, actual = samples.len(), "skipping truncated image samples");
        return Ok(None);
    }
    let samples = &samples[..expected];

    let image = match components {
        1 => GrayImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageRgb8),
        _ => RgbImage::from_raw(width, height, cmyk_to_rgb(samples)).map(DynamicImage::ImageRgb8),
    };
    let Some(image) = image else {
        return Ok(None);
    };

    let mut encoded = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
        .map_err(|source| DecodeError::Encode { object, source })?;

    Ok(Some(encoded))
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u32::from(px[3]);
            [px[0], px[1], px[2]].map(|c| ((255 - u32::from(c)) * k / 255) as u8)
        })
        .collect()
}

fn color_components(document: &Document, entry: Option<&Object>) -> Option<usize> {
    match resolve_opt(document, entry)? {
        Object::Name(name) => device_components(name),
        Object::Array(items) => {
            let family = name_of(document, items.first())?;
            match family {
                b"ICCBased" => match resolve_opt(document, items.get(1))? {
                    Object::Stream(profile) => {
                        let n = integer_of(document, profile.dict.get(b"N").ok())?;
                        matches!(n, 1 | 3 | 4).then_some(n as usize)
                    }
                    _ => None,
                },
                b"CalGray" => Some(1),
                b"CalRGB" | b"Lab" => Some(3),
                other => device_components(other),
            }
        }
        _ => None,
    }
}

fn device_components(name: &[u8]) -> Option<usize> {
    match name {
        b"DeviceGray" | b"G" => Some(1),
        b"DeviceRGB" | b"RGB" => Some(3),
        b"DeviceCMYK" | b"CMYK" => Some(4),
        _ => None,
    }
}

fn stream_filters(document: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match resolve_opt(document, dict.get(b"Filter").ok()) {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| name_of(document, Some(item)).map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_opt<'a>(document: &'a Document, object: Option<&'a Object>) -> Option<&'a Object> {
    object.and_then(|value| resolve(document, value))
}

fn name_of<'a>(document: &'a Document, object: Option<&'a Object>) -> Option<&'a [u8]> {
    match resolve_opt(document, object)? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

fn integer_of(document: &Document, object: Option<&Object>) -> Option<i64> {
    match resolve_opt(document, object)? {
        Object::Integer(value) => Some(*value),
        Object::Real(value) => Some(*value as i64),
        _ => None,
    }
}
