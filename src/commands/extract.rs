use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ExtractArgs;
use crate::extract::{self, RawPage};
use crate::model::{CardSet, Deck, ExtractionReport};
use crate::util::{now_utc_string, read_file, sha256_bytes, write_json_pretty};

const REPORT_MANIFEST_VERSION: u32 = 1;

pub fn run(args: ExtractArgs) -> Result<()> {
    let pdf_path = args.data_root.join(&args.pdf);
    let bytes = read_file(&pdf_path)?;
    let strategy = args.strategy.strategy();

    info!(
        path = %pdf_path.display(),
        strategy = strategy.as_str(),
        bytes = bytes.len(),
        "extracting flashcards"
    );

    let set = extract::extract(&bytes, strategy)
        .with_context(|| format!("failed to decode {}", pdf_path.display()))?;

    info!(title = %set.title, cards = set.cards.len(), "extraction completed");

    if let Some(report_path) = &args.report {
        // The report needs page and image counts, which the card set does not keep.
        let pages = extract::decode_document(&bytes)
            .with_context(|| format!("failed to decode {}", pdf_path.display()))?;
        let report = build_report(&pdf_path.display().to_string(), &bytes, &pages, strategy, &set);
        let report_path = args.data_root.join(report_path);
        write_json_pretty(&report_path, &report)?;
        info!(path = %report_path.display(), "wrote extraction report");
    }

    let preview = vec![Deck::from_card_set(set, args.description.as_deref())];

    match &args.output {
        Some(output) => {
            let output_path = args.data_root.join(output);
            write_json_pretty(&output_path, &preview)?;
            info!(path = %output_path.display(), "wrote import preview");
        }
        None => {
            let rendered =
                serde_json::to_string_pretty(&preview).context("failed to serialize import preview")?;
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{rendered}").context("failed to write import preview")?;
        }
    }

    Ok(())
}

fn build_report(
    source_path: &str,
    bytes: &[u8],
    pages: &[RawPage],
    strategy: extract::Strategy,
    set: &CardSet,
) -> ExtractionReport {
    ExtractionReport {
        manifest_version: REPORT_MANIFEST_VERSION,
        generated_at: now_utc_string(),
        source_path: source_path.to_string(),
        source_sha256: sha256_bytes(bytes),
        strategy: strategy.as_str().to_string(),
        page_count: pages.len(),
        embedded_image_count: pages.iter().map(|page| page.images.len()).sum(),
        title: set.title.clone(),
        card_count: set.cards.len(),
        cards_with_image: set.cards.iter().filter(|card| card.image.is_some()).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{RawImage, Strategy};

    #[test]
    fn report_counts_pages_images_and_illustrated_cards() {
        let pages = vec![RawPage {
            text: "Capitals\n1. France\nParis\n2. Italy\nRome".to_string(),
            images: vec![RawImage {
                object: (7, 0),
                bytes: vec![0u8; 2500],
                format: "jpeg".to_string(),
            }],
        }];
        let set = extract::extract_pages(&pages, Strategy::Generic);

        let report = build_report("capitals.pdf", b"%PDF", &pages, Strategy::Generic, &set);

        assert_eq!(report.strategy, "generic");
        assert_eq!(report.page_count, 1);
        assert_eq!(report.embedded_image_count, 1);
        assert_eq!(report.card_count, 2);
        assert_eq!(report.cards_with_image, 1);
        assert_eq!(report.source_sha256, sha256_bytes(b"%PDF"));
        assert_eq!(report.title, "Capitals");
    }
}
