use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;

use crate::cli::ImportArgs;
use crate::model::Deck;
use crate::store::{DeckStore, ImportOutcome};
use crate::util::read_file;

/// `extract` prints a one-element array; a bare deck object is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum DeckPayload {
    Many(Vec<Deck>),
    One(Box<Deck>),
}

pub fn run(args: ImportArgs) -> Result<()> {
    let deck_path = args.data_root.join(&args.deck);
    let raw = read_file(&deck_path)?;
    let decks = parse_decks(&raw).with_context(|| format!("failed to parse {}", deck_path.display()))?;

    let store = DeckStore::new(&args.data_root);
    for deck in decks {
        let outcome = store.import_deck(&args.user, deck, args.replace.as_deref())?;
        if let ImportOutcome::Replaced { removed, .. } = &outcome {
            info!(removed = *removed, "replaced existing decks");
        }
        info!(user = %args.user, outcome = %outcome.message(), "import completed");
    }

    Ok(())
}

fn parse_decks(raw: &[u8]) -> Result<Vec<Deck>> {
    let payload: DeckPayload = serde_json::from_slice(raw)?;
    let mut decks = match payload {
        DeckPayload::Many(decks) => decks,
        DeckPayload::One(deck) => vec![*deck],
    };

    if decks.is_empty() {
        bail!("no deck to import");
    }

    for deck in &mut decks {
        deck.card_count = deck.content.len();
    }

    Ok(decks)
}
