use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::agent::SearchKind;
use crate::extract::Strategy;

#[derive(Parser, Debug)]
#[command(
    name = "quizdeck",
    version,
    about = "Flashcard extraction, storage and generation tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a flashcard set from a PDF and print it as an import preview.
    Extract(ExtractArgs),
    /// Store a deck for a user.
    Import(ImportArgs),
    /// List a user's decks or show one of them.
    Decks(DecksArgs),
    /// Delete a user's deck by title.
    Delete(DeleteArgs),
    /// Record a test result and print the user's study stats.
    Stats(StatsArgs),
    /// Research a topic on the web and generate new cards for it.
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub pdf: PathBuf,

    #[arg(long, value_enum, default_value_t = ExtractStrategy::Hybrid)]
    pub strategy: ExtractStrategy,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExtractStrategy {
    Hybrid,
    Generic,
    Fields,
}

impl ExtractStrategy {
    pub fn strategy(self) -> Strategy {
        match self {
            Self::Hybrid => Strategy::Hybrid,
            Self::Generic => Strategy::Generic,
            Self::Fields => Strategy::DomainSpecific,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub user: String,

    /// A deck object, or an array of them as printed by `extract`.
    #[arg(long)]
    pub deck: PathBuf,

    /// Replace existing decks with this title instead of appending.
    #[arg(long)]
    pub replace: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DecksArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// User id, or with `--all` the username to filter by.
    #[arg(long, required_unless_present = "all")]
    pub user: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    /// List the decks of every user, tagged with the owner's name.
    #[arg(long, default_value_t = false)]
    pub all: bool,

    /// Print deck metadata without card content.
    #[arg(long, default_value_t = false)]
    pub clear: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub title: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub right: Option<i64>,

    #[arg(long)]
    pub wrong: Option<i64>,

    /// Score for `--set-name`, stored as given (`75`, `87.5`).
    #[arg(long)]
    pub percent: Option<serde_json::Number>,

    #[arg(long)]
    pub set_name: Option<String>,

    /// JSON test result: `{"right", "wrong", "percent", "setname", "test"}`.
    #[arg(long)]
    pub test_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub message: String,

    #[arg(long, default_value_t = 5)]
    pub target: u32,

    /// JSON file with the cards the set already has.
    #[arg(long)]
    pub cards: Option<PathBuf>,

    #[arg(long, default_value = "keys.json")]
    pub keys_path: PathBuf,

    #[arg(long, default_value = "https://ai.hackclub.com/proxy/v1")]
    pub llm_base_url: String,

    #[arg(long, default_value = "https://search.hackclub.com/res/v1")]
    pub search_base_url: String,

    #[arg(long, default_value_t = crate::agent::DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    #[arg(long, value_enum, default_value_t = SearchMode::Web)]
    pub search: SearchMode,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SearchMode {
    Web,
    Image,
    News,
}

impl SearchMode {
    pub fn kind(self) -> SearchKind {
        match self {
            Self::Web => SearchKind::Web,
            Self::Image => SearchKind::Image,
            Self::News => SearchKind::News,
        }
    }
}
