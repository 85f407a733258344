use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{info, warn};

use crate::model::{Deck, StudyStats, TestResult, UserRecord};
use crate::util::{ensure_directory, read_json_or_default, read_json_strict, write_json_pretty};

const USER_DATA_DIR: &str = "user_data";
const DECKS_FILE: &str = "cards.json";
const STATS_FILE: &str = "stats.json";
const USERS_FILE: &str = "users.json";
const UNKNOWN_USER_PREFIX_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Appended,
    Replaced { title: String, removed: usize },
}

impl ImportOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Appended => "Appended new set".to_string(),
            Self::Replaced { title, .. } => format!("Updated {title}"),
        }
    }
}

/// Flat per-user JSON storage rooted at `<root>/user_data/<user_id>/`.
#[derive(Debug, Clone)]
pub struct DeckStore {
    root: PathBuf,
    users_path: PathBuf,
}

impl DeckStore {
    pub fn new(data_root: &Path) -> Self {
        Self {
            root: data_root.join(USER_DATA_DIR),
            users_path: data_root.join(USERS_FILE),
        }
    }

    pub fn user_dir(&self, user_id: &str) -> Result<PathBuf> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("invalid user id: {user_id:?}");
        }
        Ok(self.root.join(user_id))
    }

    pub fn load_decks(&self, user_id: &str) -> Result<Vec<Deck>> {
        read_json_or_default(&self.user_dir(user_id)?.join(DECKS_FILE))
    }

    fn load_decks_for_update(&self, user_id: &str) -> Result<Vec<Deck>> {
        read_json_strict(&self.user_dir(user_id)?.join(DECKS_FILE))
    }

    pub fn find_deck(&self, user_id: &str, title: &str) -> Result<Option<Deck>> {
        Ok(self
            .load_decks(user_id)?
            .into_iter()
            .find(|deck| deck.title == title))
    }

    /// Decks of every user directory, in directory name order, each tagged
    /// with its owner's `name`. With `owner` set to `(username, title)` only
    /// that user's decks with that title are returned, untagged.
    pub fn all_decks(&self, owner: Option<(&str, &str)>) -> Result<Vec<Deck>> {
        let users: Vec<UserRecord> = read_json_or_default(&self.users_path)?;

        let mut decks = Vec::new();
        for user_id in self.user_ids()? {
            let path = self.root.join(&user_id).join(DECKS_FILE);
            if !path.exists() {
                continue;
            }

            let username = users
                .iter()
                .find(|user| user.id == user_id)
                .map(|user| user.username.clone())
                .unwrap_or_else(|| unknown_user_name(&user_id));
            let user_decks: Vec<Deck> = read_json_or_default(&path)?;

            match owner {
                Some((name, title)) if name == username => {
                    decks.extend(user_decks.into_iter().filter(|deck| deck.title == title));
                }
                Some(_) => {}
                None => {
                    for mut deck in user_decks {
                        deck.extra
                            .insert("name".to_string(), Value::String(username.clone()));
                        decks.push(deck);
                    }
                }
            }
        }

        Ok(decks)
    }

    fn user_ids(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {}", self.root.display()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to list {}", self.root.display()))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
        ids.sort();

        Ok(ids)
    }

    /// Appends `deck`, first removing every deck titled `replace` when given.
    pub fn import_deck(
        &self,
        user_id: &str,
        deck: Deck,
        replace: Option<&str>,
    ) -> Result<ImportOutcome> {
        let mut decks = self.load_decks_for_update(user_id)?;

        let outcome = match replace {
            Some(title) => {
                let before = decks.len();
                decks.retain(|existing| existing.title != title);
                ImportOutcome::Replaced {
                    title: title.to_string(),
                    removed: before - decks.len(),
                }
            }
            None => ImportOutcome::Appended,
        };

        info!(user = user_id, title = %deck.title, cards = deck.content.len(), "importing deck");
        decks.push(deck);
        self.save_decks(user_id, &decks)?;

        Ok(outcome)
    }

    /// Removes the first deck with `title`. Returns false, leaving the file
    /// untouched, when no deck matches.
    pub fn delete_deck(&self, user_id: &str, title: &str) -> Result<bool> {
        let mut decks = self.load_decks_for_update(user_id)?;

        let Some(index) = decks.iter().position(|deck| deck.title == title) else {
            warn!(user = user_id, title, "no deck with that title");
            return Ok(false);
        };

        decks.remove(index);
        self.save_decks(user_id, &decks)?;
        info!(user = user_id, title, remaining = decks.len(), "deleted deck");
        Ok(true)
    }

    pub fn load_stats(&self, user_id: &str) -> Result<StudyStats> {
        read_json_or_default(&self.user_dir(user_id)?.join(STATS_FILE))
    }

    pub fn record_test(&self, user_id: &str, result: TestResult) -> Result<StudyStats> {
        let mut stats = self.load_stats(user_id)?;

        stats.right += result.right;
        stats.wrong += result.wrong;

        if let (Some(percent), Some(set_name)) = (result.percent, result.set_name) {
            if is_reserved_stats_key(&set_name) {
                bail!("set name {set_name:?} collides with a stats field");
            }
            let scores = stats
                .set_scores
                .entry(set_name)
                .or_insert_with(|| Value::Array(Vec::new()));
            match scores {
                Value::Array(values) => values.push(percent),
                other => *other = Value::Array(vec![other.take(), percent]),
            }
        }

        if let Some(questions) = result.questions {
            stats.questions.extend(questions);
        }

        let path = self.user_dir(user_id)?.join(STATS_FILE);
        write_json_pretty(&path, &stats)?;
        info!(user = user_id, right = stats.right, wrong = stats.wrong, "recorded test result");

        Ok(stats)
    }

    fn save_decks(&self, user_id: &str, decks: &[Deck]) -> Result<()> {
        let dir = self.user_dir(user_id)?;
        ensure_directory(&dir)?;
        write_json_pretty(&dir.join(DECKS_FILE), &decks)
    }
}

fn unknown_user_name(user_id: &str) -> String {
    let prefix: String = user_id.chars().take(UNKNOWN_USER_PREFIX_CHARS).collect();
    format!("Unknown ({prefix})")
}

fn is_reserved_stats_key(name: &str) -> bool {
    matches!(name, "right" | "wrong" | "questions")
}
