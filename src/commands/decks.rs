use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::DecksArgs;
use crate::model::Deck;
use crate::store::DeckStore;

pub fn run(args: DecksArgs) -> Result<()> {
    let store = DeckStore::new(&args.data_root);

    if args.all {
        let owner = args.user.as_deref().zip(args.title.as_deref());
        let mut decks = store.all_decks(owner)?;
        if args.clear && owner.is_none() {
            clear_content(&mut decks);
        }
        info!(decks = decks.len(), filtered = owner.is_some(), "listing decks of all users");
        return print_json(&decks);
    }

    let user = args.user.as_deref().context("--user is required without --all")?;
    let mut decks = match &args.title {
        Some(title) => match store.find_deck(user, title)? {
            Some(deck) => vec![deck],
            None => bail!("no deck titled {title:?} for user {user}"),
        },
        None => store.load_decks(user)?,
    };

    if args.clear {
        clear_content(&mut decks);
    }

    info!(user, decks = decks.len(), "listing decks");

    match &args.title {
        Some(_) => print_json(&decks[0]),
        None => print_json(&decks),
    }
}

/// Keeps deck metadata only, as in a set overview.
fn clear_content(decks: &mut [Deck]) {
    for deck in decks {
        deck.content.clear();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize decks")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}").context("failed to write decks")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Card, CardSet};

    #[test]
    fn clear_keeps_titles_and_counts() {
        let set = CardSet::titled(
            "Bugs".to_string(),
            vec![Card {
                question: "Q".to_string(),
                answer: "A".to_string(),
                image: None,
            }],
        );
        let mut decks = vec![Deck::from_card_set(set, None)];

        clear_content(&mut decks);

        assert_eq!(decks[0].title, "Bugs");
        assert_eq!(decks[0].card_count, 1);
        assert!(decks[0].content.is_empty());
    }
}
