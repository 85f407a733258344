pub mod decks;
pub mod delete;
pub mod extract;
pub mod generate;
pub mod import;
pub mod stats;
